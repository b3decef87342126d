//! Batch validation of the component IR
//!
//! Every batch entering the pipeline, whether freshly parsed or patched by a
//! change request, passes through [`validate_batch`]. It checks naming, the
//! type vocabulary, handler targets, child resolution, the single-root rule
//! and acyclicity, and reports every issue it finds rather than the first.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::component::{ComponentSpec, HandlerAction, TypeRef};
use crate::error::{Error, Result};
use crate::graph::ComponentGraph;

/// One IR validation finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaIssue {
    /// Component the issue belongs to (none for batch-level issues)
    pub component: Option<String>,
    /// Attribute path within the component (`props.label`, `children`)
    pub attribute: Option<String>,
    /// Description of the problem
    pub message: String,
}

impl SchemaIssue {
    /// A batch-level issue
    pub fn batch(message: impl Into<String>) -> Self {
        Self {
            component: None,
            attribute: None,
            message: message.into(),
        }
    }

    /// An issue on one attribute of one component
    pub fn at(component: &str, attribute: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            component: Some(component.to_string()),
            attribute: Some(attribute.into()),
            message: message.into(),
        }
    }
}

impl fmt::Display for SchemaIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.component, &self.attribute) {
            (Some(c), Some(a)) => write!(f, "{}.{}: {}", c, a, self.message),
            (Some(c), None) => write!(f, "{}: {}", c, self.message),
            _ => f.write_str(&self.message),
        }
    }
}

const RESERVED: &[&str] = &[
    "class", "const", "default", "delete", "export", "function", "import", "let", "new", "null",
    "return", "this", "typeof", "var", "void", "props", "children", "key", "ref",
];

/// Validate a batch and return the name of its single root component
pub fn validate_batch(specs: &[ComponentSpec]) -> Result<String> {
    let mut issues = Vec::new();

    if specs.is_empty() {
        return Err(Error::SchemaViolation {
            issues: vec![SchemaIssue::batch("batch contains no components")],
        });
    }

    let mut names = BTreeSet::new();
    for spec in specs {
        if !is_pascal_case(&spec.name) {
            issues.push(SchemaIssue::at(
                &spec.name,
                "name",
                "component names must be PascalCase identifiers",
            ));
        }
        if !names.insert(spec.name.as_str()) {
            issues.push(SchemaIssue::at(&spec.name, "name", "duplicate component name"));
        }
        check_members(spec, &mut issues);
    }

    let by_name: BTreeMap<&str, &ComponentSpec> =
        specs.iter().map(|s| (s.name.as_str(), s)).collect();

    for spec in specs {
        let mut seen = BTreeSet::new();
        for child in &spec.children {
            if child == &spec.name {
                issues.push(SchemaIssue::at(&spec.name, "children", "component lists itself as a child"));
            } else if !by_name.contains_key(child.as_str()) {
                issues.push(SchemaIssue::at(
                    &spec.name,
                    "children",
                    format!("child '{}' is not defined in this batch", child),
                ));
            }
            if !seen.insert(child.as_str()) {
                issues.push(SchemaIssue::at(
                    &spec.name,
                    "children",
                    format!("child '{}' listed twice", child),
                ));
            }
        }
    }

    if let Some(cycle) = ComponentGraph::new(specs).cycle() {
        issues.push(SchemaIssue::batch(format!(
            "component graph contains a cycle: {}",
            cycle.join(" -> ")
        )));
    }

    let referenced: BTreeSet<&str> = specs
        .iter()
        .flat_map(|s| s.children.iter().map(String::as_str))
        .collect();
    let roots: Vec<&str> = specs
        .iter()
        .map(|s| s.name.as_str())
        .filter(|n| !referenced.contains(n))
        .collect();

    let root = match roots.as_slice() {
        [root] => Some(root.to_string()),
        [] => {
            issues.push(SchemaIssue::batch("batch has no root component"));
            None
        }
        many => {
            issues.push(SchemaIssue::batch(format!(
                "batch must have exactly one root, found {}: {}",
                many.len(),
                many.join(", ")
            )));
            None
        }
    };

    match root {
        Some(root) if issues.is_empty() => Ok(root),
        _ => Err(Error::SchemaViolation { issues }),
    }
}

fn check_members(spec: &ComponentSpec, issues: &mut Vec<SchemaIssue>) {
    let mut members = BTreeSet::new();
    let mut claim = |kind: &str, name: &str, issues: &mut Vec<SchemaIssue>| {
        if !is_identifier(name) || RESERVED.contains(&name) {
            issues.push(SchemaIssue::at(
                &spec.name,
                format!("{}.{}", kind, name),
                "member names must be camelCase identifiers and not reserved words",
            ));
        }
        if !members.insert(name.to_string()) {
            issues.push(SchemaIssue::at(
                &spec.name,
                format!("{}.{}", kind, name),
                "member name collides with another prop, state or handler",
            ));
        }
    };

    for prop in &spec.props {
        claim("props", &prop.name, issues);
        if let Some(default) = &prop.default {
            if !prop.ty.accepts(default) {
                issues.push(SchemaIssue::at(
                    &spec.name,
                    format!("props.{}", prop.name),
                    format!("default {} is not a {}", default, prop.ty),
                ));
            }
        }
    }

    for state in &spec.state {
        claim("state", &state.name, issues);
        if !state.ty.accepts(&state.initial) {
            issues.push(SchemaIssue::at(
                &spec.name,
                format!("state.{}", state.name),
                format!("initial value {} is not a {}", state.initial, state.ty),
            ));
        }
    }

    for handler in &spec.handlers {
        claim("handlers", &handler.name, issues);
        let attribute = format!("handlers.{}", handler.name);

        let Some(target) = spec.member_type(&handler.affects) else {
            issues.push(SchemaIssue::at(
                &spec.name,
                attribute,
                format!(
                    "handler affects '{}', which is neither a state variable nor a prop",
                    handler.affects
                ),
            ));
            continue;
        };

        if let Some(message) = action_mismatch(spec, &handler.action, &handler.affects, target) {
            issues.push(SchemaIssue::at(&spec.name, attribute, message));
        }
    }

    for hint in &spec.layout.styles {
        let known = hint.target == "root"
            || spec.member_type(&hint.target).is_some()
            || spec.handler(&hint.target).is_some();
        if !known {
            issues.push(SchemaIssue::at(
                &spec.name,
                "layout.styles",
                format!("style target '{}' does not name an element", hint.target),
            ));
        }
    }
}

fn action_mismatch(
    spec: &ComponentSpec,
    action: &HandlerAction,
    affects: &str,
    target: &TypeRef,
) -> Option<String> {
    let expect = |ok: bool, wanted: &str| {
        (!ok).then(|| format!("{:?} needs a {} target, '{}' is {}", action, wanted, affects, target))
    };

    match action {
        HandlerAction::Increment { .. } | HandlerAction::Decrement { .. } => {
            expect(*target == TypeRef::Number, "number")
        }
        HandlerAction::Toggle => expect(*target == TypeRef::Boolean, "boolean"),
        HandlerAction::Clear => expect(target.element().is_some(), "list"),
        HandlerAction::Bind => expect(target.element().is_none(), "scalar"),
        HandlerAction::Set { value } => (!target.accepts(value))
            .then(|| format!("value {} is not a {}", value, target)),
        HandlerAction::Append { from } => {
            let Some(element) = target.element() else {
                return expect(false, "list");
            };
            match from {
                None => None,
                Some(source) => match spec.member_type(source) {
                    None => Some(format!("append source '{}' is not a member", source)),
                    Some(ty) if ty != element => Some(format!(
                        "append source '{}' is {}, list holds {}",
                        source, ty, element
                    )),
                    Some(_) => None,
                },
            }
        }
        HandlerAction::Reset => {
            let resettable = spec.state_var(affects).is_some()
                || spec.prop(affects).is_some_and(|p| p.default.is_some());
            (!resettable).then(|| {
                format!(
                    "reset needs a state variable or a prop with a default, '{}' has neither",
                    affects
                )
            })
        }
        HandlerAction::Notify | HandlerAction::Custom => None,
    }
}

/// PascalCase identifier: leading uppercase letter, alphanumeric
pub fn is_pascal_case(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_uppercase())
        && chars.all(|c| c.is_ascii_alphanumeric())
}

/// camelCase identifier: leading lowercase letter, alphanumeric
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_alphanumeric())
}
