//! Check (b): every declared member of the spec is present and typed

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use tree_sitter::Node;

use uiforge_core::ComponentSpec;

use super::ValidationInput;
use super::source;
use super::tree::{self, TsxTree};
use crate::ir::{SourceFile, Violation, ViolationKind, callback_name};

static CALLBACK_TYPE: Lazy<Regex> = Lazy::new(|| {
    // Normalized spelling: `(value:number)=>void`
    Regex::new(r"^\(\w+\??:(.+)\)=>void$").expect("valid regex")
});

/// A member of the props interface
#[derive(Debug, Clone, PartialEq, Eq)]
struct Member {
    optional: bool,
    ty: String,
    line: usize,
}

pub(super) fn check(input: &ValidationInput<'_>, tsx: &TsxTree<'_>) -> Vec<Violation> {
    let spec = input.spec;
    let mut out = Vec::new();

    check_props(spec, tsx, &mut out);
    check_state(spec, tsx, &mut out);
    check_handlers(spec, tsx, &mut out);
    check_children(input, tsx, &mut out);
    out
}

fn missing(spec: &ComponentSpec, attribute: String, message: String) -> Violation {
    Violation::new(ViolationKind::MissingType, &spec.name, message).attribute(attribute)
}

fn check_props(spec: &ComponentSpec, tsx: &TsxTree<'_>, out: &mut Vec<Violation>) {
    let callbacks: Vec<_> = spec.notified_props();
    if spec.props.is_empty() && callbacks.is_empty() {
        return;
    }

    let Some(members) = props_members(tsx, &spec.name) else {
        out.push(missing(
            spec,
            "props".to_string(),
            format!("props interface '{}Props' is not declared", spec.name),
        ));
        return;
    };

    for prop in &spec.props {
        let attribute = format!("props.{}", prop.name);
        let Some(member) = members.get(&prop.name) else {
            out.push(missing(spec, attribute, format!("prop '{}' is not declared", prop.name)));
            continue;
        };
        let expected = source::normalize_type(&prop.ty.ts());
        if member.ty != expected {
            out.push(
                missing(
                    spec,
                    attribute.clone(),
                    format!(
                        "prop '{}' is typed '{}' but the component declares '{}'",
                        prop.name,
                        prop.ty.ts(),
                        member.ty
                    ),
                )
                .at(SourceFile::Tsx, member.line),
            );
        }
        if member.optional == prop.required {
            let wanted = if prop.required { "required" } else { "optional" };
            out.push(
                missing(spec, attribute, format!("prop '{}' must be {}", prop.name, wanted))
                    .at(SourceFile::Tsx, member.line),
            );
        }
    }

    for prop in callbacks {
        let name = callback_name(&prop.name);
        let attribute = format!("props.{}", name);
        let Some(member) = members.get(&name) else {
            out.push(missing(
                spec,
                attribute,
                format!("change callback '{}' for prop '{}' is not declared", name, prop.name),
            ));
            continue;
        };
        let expected = source::normalize_type(&prop.ty.ts());
        let reported = CALLBACK_TYPE
            .captures(&member.ty)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string());
        if reported.as_deref() != Some(expected.as_str()) {
            out.push(
                missing(
                    spec,
                    attribute,
                    format!(
                        "callback '{}' must be typed (value: {}) => void, found '{}'",
                        name,
                        prop.ty.ts(),
                        member.ty
                    ),
                )
                .at(SourceFile::Tsx, member.line),
            );
        }
    }
}

/// Members of `interface NameProps { … }` or `type NameProps = { … }`
fn props_members(tsx: &TsxTree<'_>, component: &str) -> Option<BTreeMap<String, Member>> {
    let wanted = format!("{}Props", component);
    let body = tsx
        .of_kind(&["interface_declaration", "type_alias_declaration"])
        .into_iter()
        .filter(|d| d.child_by_field_name("name").is_some_and(|n| tsx.text(n) == wanted))
        .find_map(|d| {
            d.child_by_field_name("body")
                .or_else(|| d.child_by_field_name("value"))
        })?;

    let members = tree::named_children(body)
        .into_iter()
        .filter(|m| m.kind() == "property_signature")
        .filter_map(|m| {
            let name = tsx.text(m.child_by_field_name("name")?).to_string();
            let ty = m
                .child_by_field_name("type")
                .map(|t| source::normalize_type(tsx.text(t).trim_start().trim_start_matches(':')))
                .unwrap_or_default();
            Some((
                name,
                Member {
                    optional: tree::has_token(m, "?"),
                    ty,
                    line: tree::line(m),
                },
            ))
        })
        .collect();
    Some(members)
}

fn check_state(spec: &ComponentSpec, tsx: &TsxTree<'_>, out: &mut Vec<Violation>) {
    let hooks: Vec<(&str, Node<'_>)> = tsx
        .of_kind(&["variable_declarator"])
        .into_iter()
        .filter_map(|d| {
            let pattern = d.child_by_field_name("name").filter(|p| p.kind() == "array_pattern")?;
            let call = d.child_by_field_name("value").filter(|v| v.kind() == "call_expression")?;
            let callee = call.child_by_field_name("function").map(|f| tsx.text(f))?;
            if callee != "useState" && callee != "React.useState" {
                return None;
            }
            let first = tree::named_children(pattern).into_iter().next()?;
            Some((tsx.text(first), call))
        })
        .collect();

    for state in &spec.state {
        let attribute = format!("state.{}", state.name);
        let Some((_, call)) = hooks.iter().find(|(name, _)| *name == state.name) else {
            out.push(missing(
                spec,
                attribute,
                format!("state '{}' is not declared with useState", state.name),
            ));
            continue;
        };
        let line = tree::line(*call);
        let generic = call.child_by_field_name("type_arguments").map(|args| {
            let text = tsx.text(args).trim();
            text.strip_prefix('<')
                .and_then(|t| t.strip_suffix('>'))
                .unwrap_or(text)
        });

        match generic {
            None => out.push(
                missing(
                    spec,
                    attribute,
                    format!(
                        "state '{}' needs an explicit type: useState<{}>",
                        state.name,
                        state.ty.ts()
                    ),
                )
                .at(SourceFile::Tsx, line),
            ),
            Some(ty) if source::normalize_type(ty) != source::normalize_type(&state.ty.ts()) => {
                out.push(
                    missing(
                        spec,
                        attribute,
                        format!(
                            "state '{}' is typed '{}' but the component declares '{}'",
                            state.name,
                            state.ty.ts(),
                            ty.trim()
                        ),
                    )
                    .at(SourceFile::Tsx, line),
                )
            }
            Some(_) => {}
        }
    }
}

/// The function bound to `name`, with the node that declares it
fn handler_function<'t>(tsx: &'t TsxTree<'_>, name: &str) -> Option<(Node<'t>, Node<'t>)> {
    for node in tsx.of_kind(&["function_declaration", "variable_declarator"]) {
        if !node.child_by_field_name("name").is_some_and(|n| tsx.text(n) == name) {
            continue;
        }
        if node.kind() == "function_declaration" {
            return Some((node, node));
        }
        let Some(value) = node.child_by_field_name("value") else {
            continue;
        };
        let function = match value.kind() {
            "arrow_function" | "function_expression" | "function" => Some(value),
            "call_expression" => value
                .child_by_field_name("arguments")
                .and_then(|args| tree::named_children(args).into_iter().next())
                .filter(|f| matches!(f.kind(), "arrow_function" | "function_expression" | "function")),
            _ => None,
        };
        if let Some(function) = function {
            return Some((node, function));
        }
    }
    None
}

/// Parameters of a function node that carry no type annotation
fn untyped_parameters<'s>(tsx: &TsxTree<'s>, function: Node<'_>) -> Vec<&'s str> {
    if let Some(bare) = function.child_by_field_name("parameter") {
        return vec![tsx.text(bare)];
    }
    let Some(parameters) = function.child_by_field_name("parameters") else {
        return Vec::new();
    };
    tree::named_children(parameters)
        .into_iter()
        .filter(|p| matches!(p.kind(), "required_parameter" | "optional_parameter"))
        .filter(|p| p.child_by_field_name("type").is_none())
        .map(|p| {
            p.child_by_field_name("pattern")
                .map(|pattern| tsx.text(pattern))
                .unwrap_or_else(|| tsx.text(p))
        })
        .collect()
}

fn check_handlers(spec: &ComponentSpec, tsx: &TsxTree<'_>, out: &mut Vec<Violation>) {
    let identifiers = tsx.of_kind(&["identifier", "shorthand_property_identifier"]);

    for handler in &spec.handlers {
        let attribute = format!("handlers.{}", handler.name);
        let Some((declaration, function)) = handler_function(tsx, &handler.name) else {
            out.push(missing(
                spec,
                attribute,
                format!("handler '{}' is not declared", handler.name),
            ));
            continue;
        };
        let line = tree::line(declaration);

        for param in untyped_parameters(tsx, function) {
            out.push(
                missing(
                    spec,
                    attribute.clone(),
                    format!("handler '{}' has untyped parameter '{}'", handler.name, param),
                )
                .at(SourceFile::Tsx, line),
            );
        }

        let uses = identifiers
            .iter()
            .filter(|n| tsx.text(**n) == handler.name)
            .count();
        if uses < 2 {
            out.push(
                missing(
                    spec,
                    attribute,
                    format!("handler '{}' is never wired to an element", handler.name),
                )
                .at(SourceFile::Tsx, line),
            );
        }
    }
}

fn imports_child(tsx: &TsxTree<'_>, child: &str) -> bool {
    let paths = [
        format!("./{}", child),
        format!("./{}.tsx", child),
        format!("./{}.ts", child),
    ];
    tsx.of_kind(&["import_statement"]).into_iter().any(|import| {
        let from = import
            .child_by_field_name("source")
            .map(|s| tsx.text(s).trim_matches(|c: char| c == '"' || c == '\'' || c == '`'));
        from.is_some_and(|f| paths.iter().any(|p| p == f))
            && tree::descendants(import)
                .into_iter()
                .any(|n| n.kind() == "identifier" && tsx.text(n) == child)
    })
}

fn check_children(input: &ValidationInput<'_>, tsx: &TsxTree<'_>, out: &mut Vec<Violation>) {
    let spec = input.spec;
    let elements = tsx.of_kind(&["jsx_opening_element", "jsx_self_closing_element"]);
    let mut seen = BTreeSet::new();

    for child in &spec.children {
        if !seen.insert(child.as_str()) {
            continue;
        }
        let attribute = format!("children.{}", child);

        if !imports_child(tsx, child) {
            out.push(missing(
                spec,
                attribute.clone(),
                format!("child '{}' is not imported from './{}'", child, child),
            ));
        }

        let usages: Vec<_> = elements
            .iter()
            .filter(|e| e.child_by_field_name("name").is_some_and(|n| tsx.text(n) == child))
            .collect();
        if usages.is_empty() {
            out.push(missing(
                spec,
                attribute,
                format!("child '{}' is never composed", child),
            ));
            continue;
        }

        let Some(signature) = input.children.get(child) else {
            continue;
        };
        for usage in usages {
            let attributes = tree::named_children(*usage);
            if attributes.iter().any(|a| a.kind() == "jsx_expression") {
                // Spread props; what they carry is unknown here.
                continue;
            }
            let passed: BTreeSet<&str> = attributes
                .iter()
                .filter(|a| a.kind() == "jsx_attribute")
                .filter_map(|a| tree::named_children(*a).into_iter().next())
                .map(|name| tsx.text(name))
                .collect();
            for prop in signature.required_props() {
                if !passed.contains(prop.name.as_str()) {
                    out.push(
                        missing(
                            spec,
                            attribute.clone(),
                            format!("<{}> is missing required prop '{}'", child, prop.name),
                        )
                        .at(SourceFile::Tsx, tree::line(*usage)),
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{ComponentSignature, GeneratedUnit};
    use serde_json::json;
    use uiforge_core::DesignSystemContract;
    use uiforge_core::component::{
        HandlerAction, HandlerSpec, Interaction, PropSpec, StateSpec, TypeRef,
    };

    fn run(spec: &ComponentSpec, tsx: &str, children: &[ComponentSignature]) -> Vec<Violation> {
        let contract = DesignSystemContract::builtin();
        let unit = GeneratedUnit {
            component: spec.name.clone(),
            tsx: tsx.to_string(),
            css: String::new(),
            spec_fingerprint: spec.fingerprint(),
            contract_fingerprint: contract.fingerprint().clone(),
            signature: ComponentSignature::of(spec),
            child_surfaces: BTreeMap::new(),
        };
        let children: BTreeMap<_, _> = children.iter().map(|s| (s.name.clone(), s.clone())).collect();
        let tree = TsxTree::parse(tsx).unwrap();
        check(
            &ValidationInput {
                unit: &unit,
                spec,
                contract: &contract,
                children: &children,
            },
            &tree,
        )
    }

    fn stepper() -> ComponentSpec {
        let mut spec = ComponentSpec::new("Stepper");
        spec.props.push(PropSpec {
            name: "step".into(),
            ty: TypeRef::Number,
            required: false,
            default: Some(json!(1)),
        });
        spec.props.push(PropSpec {
            name: "total".into(),
            ty: TypeRef::Number,
            required: true,
            default: None,
        });
        spec.state.push(StateSpec {
            name: "count".into(),
            ty: TypeRef::Number,
            initial: json!(0),
        });
        spec.handlers.push(HandlerSpec {
            name: "increment".into(),
            trigger: Interaction::Click,
            effect: String::new(),
            affects: "count".into(),
            action: HandlerAction::Increment { by: 1.0 },
            label: None,
        });
        spec.handlers.push(HandlerSpec {
            name: "report".into(),
            trigger: Interaction::Click,
            effect: String::new(),
            affects: "total".into(),
            action: HandlerAction::Notify,
            label: None,
        });
        spec
    }

    const STEPPER: &str = r#"import { useState } from 'react';

export interface StepperProps {
  step?: number;
  total: number;
  onTotalChange?: (value: number) => void;
}

export function Stepper({ step = 1, total, onTotalChange }: StepperProps) {
  const [count, setCount] = useState<number>(0);
  const increment = () => {
    setCount((current) => current + step);
  };
  const report = () => {
    onTotalChange?.(total);
  };
  return (
    <div>
      <button onClick={increment}>+</button>
      <button onClick={report}>Report</button>
    </div>
  );
}
"#;

    #[test]
    fn test_complete_component_passes() {
        assert_eq!(run(&stepper(), STEPPER, &[]), vec![]);
    }

    #[test]
    fn test_dropped_state_is_reported() {
        let tsx = STEPPER.replace("const [count, setCount] = useState<number>(0);", "");
        let violations = run(&stepper(), &tsx, &[]);
        assert!(violations.iter().any(|v| v.attribute.as_deref() == Some("state.count")));
    }

    #[test]
    fn test_untyped_state_is_reported() {
        let tsx = STEPPER.replace("useState<number>(0)", "useState(0)");
        let violations = run(&stepper(), &tsx, &[]);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].message.contains("explicit type"));
    }

    #[test]
    fn test_mistyped_and_optional_prop_reported() {
        let tsx = STEPPER.replace("  total: number;", "  total?: string;");
        let violations = run(&stepper(), &tsx, &[]);
        let messages: Vec<_> = violations.iter().map(|v| v.message.as_str()).collect();
        assert!(messages.iter().any(|m| m.contains("typed 'number'")));
        assert!(messages.iter().any(|m| m.contains("must be required")));
    }

    #[test]
    fn test_unwired_handler_reported() {
        let tsx = STEPPER.replace("onClick={report}", "");
        let violations = run(&stepper(), &tsx, &[]);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].message.contains("never wired"));
    }

    #[test]
    fn test_untyped_handler_parameter_reported() {
        let tsx = STEPPER.replace("const report = () =>", "const report = (event) =>");
        let violations = run(&stepper(), &tsx, &[]);
        assert!(violations[0].message.contains("untyped parameter 'event'"));
    }

    #[test]
    fn test_children_must_be_imported_composed_and_fed() {
        let mut parent = ComponentSpec::new("Panel");
        parent.children.push("Stepper".into());
        let child = ComponentSignature::of(&stepper());

        let good = "import { Stepper } from './Stepper';\nexport function Panel() {\n  return <Stepper total={3} />;\n}\n";
        assert_eq!(run(&parent, good, &[child.clone()]), vec![]);

        let unfed = good.replace(" total={3}", "");
        let violations = run(&parent, &unfed, &[child.clone()]);
        assert!(violations[0].message.contains("missing required prop 'total'"));

        let inlined = "export function Panel() {\n  return <div>stepper</div>;\n}\n";
        let violations = run(&parent, inlined, &[child]);
        assert_eq!(violations.len(), 2);
    }
}
