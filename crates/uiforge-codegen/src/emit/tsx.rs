//! TSX rendering

use std::collections::{BTreeMap, BTreeSet};

use uiforge_core::ComponentSpec;
use uiforge_core::component::{TypeRef, humanize, kebab};

use super::handlers::{self, Body, EventType};
use super::{Control, Plan};
use crate::ir::{ComponentSignature, callback_name, setter_name};

/// Indented line writer
#[derive(Debug, Default)]
struct Lines {
    out: Vec<String>,
    depth: usize,
}

impl Lines {
    fn line(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if text.is_empty() {
            self.out.push(String::new());
        } else {
            self.out.push(format!("{}{}", "  ".repeat(self.depth), text));
        }
    }

    fn open(&mut self, text: impl AsRef<str>) {
        self.line(text);
        self.depth += 1;
    }

    fn close(&mut self, text: impl AsRef<str>) {
        self.depth = self.depth.saturating_sub(1);
        self.line(text);
    }

    fn finish(self) -> String {
        let mut text = self.out.join("\n");
        text.push('\n');
        text
    }
}

pub(super) fn render(
    spec: &ComponentSpec,
    plan: &Plan<'_>,
    children: &BTreeMap<String, ComponentSignature>,
) -> String {
    let class = spec.css_class();
    let bodies: Vec<(Control, &str, Body)> = plan
        .controls
        .iter()
        .map(|(h, c)| (*c, h.name.as_str(), handlers::body(spec, h, *c)))
        .collect();

    let mut w = Lines::default();
    imports(&mut w, spec, &bodies);
    props_interface(&mut w, spec);
    w.line("");

    w.open(format!("export function {}({}) {{", spec.name, parameters(spec)));
    for state in &spec.state {
        w.line(format!(
            "const [{}, {}] = useState<{}>({});",
            state.name,
            setter_name(&state.name),
            state.ty.ts(),
            handlers::json(&state.initial)
        ));
    }
    if !spec.state.is_empty() {
        w.line("");
    }

    for (_, name, body) in &bodies {
        let param = body
            .event
            .map(|e| format!("event: {}", e.ts()))
            .unwrap_or_default();
        w.open(format!("const {} = ({}) => {{", name, param));
        for line in &body.lines {
            w.line(line);
        }
        w.close("};");
        w.line("");
    }

    w.open("return (");
    root(&mut w, spec, plan, &class, children);
    w.close(");");
    w.close("}");
    w.finish()
}

fn imports(w: &mut Lines, spec: &ComponentSpec, bodies: &[(Control, &str, Body)]) {
    if !spec.state.is_empty() {
        w.line("import { useState } from 'react';");
    }
    let events: BTreeSet<&str> = bodies
        .iter()
        .filter_map(|(_, _, b)| b.event.map(EventType::import))
        .collect();
    if !events.is_empty() {
        w.line(format!(
            "import type {{ {} }} from 'react';",
            events.into_iter().collect::<Vec<_>>().join(", ")
        ));
    }
    let mut seen = BTreeSet::new();
    for child in &spec.children {
        if seen.insert(child.as_str()) {
            w.line(format!("import {{ {} }} from './{}';", child, child));
        }
    }
    w.line(format!("import './{}.css';", spec.name));
    w.line("");
}

fn props_interface(w: &mut Lines, spec: &ComponentSpec) {
    let callbacks = spec.notified_props();
    if spec.props.is_empty() && callbacks.is_empty() {
        w.line(format!("export interface {}Props {{}}", spec.name));
        return;
    }
    w.open(format!("export interface {}Props {{", spec.name));
    for prop in &spec.props {
        let marker = if prop.required { "" } else { "?" };
        w.line(format!("{}{}: {};", prop.name, marker, prop.ty.ts()));
    }
    for prop in callbacks {
        w.line(format!(
            "{}?: (value: {}) => void;",
            callback_name(&prop.name),
            prop.ty.ts()
        ));
    }
    w.close("}");
}

fn parameters(spec: &ComponentSpec) -> String {
    let mut names: Vec<String> = spec
        .props
        .iter()
        .map(|p| match (&p.default, p.required) {
            (Some(default), false) => format!("{} = {}", p.name, handlers::json(default)),
            _ => p.name.clone(),
        })
        .collect();
    names.extend(spec.notified_props().iter().map(|p| callback_name(&p.name)));

    if names.is_empty() {
        format!("_props: {}Props", spec.name)
    } else {
        format!("{{ {} }}: {}Props", names.join(", "), spec.name)
    }
}

fn root(
    w: &mut Lines,
    spec: &ComponentSpec,
    plan: &Plan<'_>,
    class: &str,
    children: &BTreeMap<String, ComponentSignature>,
) {
    let mut attributes = format!("className=\"{}\"", class);
    let element = match plan.submit() {
        Some(submit) => {
            attributes.push_str(&format!(" onSubmit={{{}}}", submit.name));
            "form"
        }
        None => "div",
    };
    for (attribute, handler) in plan.root_events() {
        attributes.push_str(&format!(" {}={{{}}}", attribute, handler.name));
    }

    w.open(format!("<{} {}>", element, attributes));

    for member in &plan.displayed {
        display(w, spec, member, class);
    }

    for child in &spec.children {
        w.line(compose(spec, child, children.get(child)));
    }

    if plan.has_controls_container() {
        w.open(format!("<div className=\"{}__controls\">", class));
        for (handler, control) in plan.inline_controls() {
            let member = handler.affects.as_str();
            let handler_class = format!("{}__{}", class, kebab(&handler.name));
            let label = text(&handler.display_label());
            match control {
                Control::Button => {
                    w.open(format!(
                        "<button type=\"button\" className=\"{}__control {}\" onClick={{{}}}>",
                        class, handler_class, handler.name
                    ));
                    w.line(&label);
                    w.close("</button>");
                }
                Control::Checkbox => {
                    let checked = if spec.member_type(member) == Some(&TypeRef::Boolean) {
                        format!(" checked={{{}}}", member)
                    } else {
                        String::new()
                    };
                    w.open(format!("<label className=\"{}__field\">", class));
                    w.line(format!(
                        "<input className=\"{}__input {}\" type=\"checkbox\"{} onChange={{{}}} />",
                        class, handler_class, checked, handler.name
                    ));
                    w.line(&label);
                    w.close("</label>");
                }
                Control::Select => {
                    w.open(format!("<label className=\"{}__field\">", class));
                    w.line(&label);
                    w.open(format!(
                        "<select className=\"{}__input {}\" value={{{}}} onChange={{{}}}>",
                        class, handler_class, member, handler.name
                    ));
                    if let Some(TypeRef::Enum(literals)) = spec.member_type(member) {
                        for literal in literals {
                            w.line(format!(
                                "<option value={}>{}</option>",
                                attribute_string(literal),
                                text(&humanize(literal))
                            ));
                        }
                    }
                    w.close("</select>");
                    w.close("</label>");
                }
                Control::Input { numeric, bound } => {
                    let kind = if numeric { "number" } else { "text" };
                    let value = if bound {
                        format!(" value={{{}}}", member)
                    } else {
                        String::new()
                    };
                    w.open(format!("<label className=\"{}__field\">", class));
                    w.line(&label);
                    w.line(format!(
                        "<input className=\"{}__input {}\" type=\"{}\"{} onChange={{{}}} />",
                        class, handler_class, kind, value, handler.name
                    ));
                    w.close("</label>");
                }
                Control::SubmitForm | Control::RootEvent(_) => {}
            }
        }
        if let Some(submit) = plan.submit() {
            w.open(format!(
                "<button type=\"submit\" className=\"{}__control {}__{}\">",
                class,
                class,
                kebab(&submit.name)
            ));
            w.line(text(&submit.display_label()));
            w.close("</button>");
        }
        w.close("</div>");
    }

    w.close(format!("</{}>", element));
}

fn display(w: &mut Lines, spec: &ComponentSpec, member: &str, class: &str) {
    let member_class = format!("{}__{}", class, kebab(member));
    match spec.member_type(member) {
        Some(TypeRef::Boolean) => w.line(format!(
            "<span className=\"{}\">{{{} ? \"Yes\" : \"No\"}}</span>",
            member_class, member
        )),
        Some(TypeRef::List(_)) => {
            w.open(format!("<ul className=\"{}__items {}\">", class, member_class));
            w.open(format!("{{{}.map((item, index) => (", member));
            w.line("<li key={index}>{item}</li>");
            w.close("))}");
            w.close("</ul>");
        }
        _ => w.line(format!("<span className=\"{}\">{{{}}}</span>", member_class, member)),
    }
}

/// `<Child prop={binding} onPropChange={callback} />`
fn compose(spec: &ComponentSpec, child: &str, signature: Option<&ComponentSignature>) -> String {
    let Some(signature) = signature else {
        return format!("<{} />", child);
    };

    let mut attributes = Vec::new();
    for prop in &signature.props {
        let same_member = spec
            .member_type(&prop.name)
            .is_some_and(|ty| ty.ts() == prop.ty);
        if same_member {
            attributes.push(format!("{}={{{}}}", prop.name, prop.name));
        } else if prop.required {
            let zero = prop
                .ty
                .parse::<TypeRef>()
                .map(|ty| handlers::json(&ty.zero_value()))
                .unwrap_or_else(|_| "undefined".to_string());
            attributes.push(format!("{}={{{}}}", prop.name, zero));
        }
    }
    for callback in &signature.callbacks {
        let state_matches = spec
            .state_var(&callback.prop)
            .is_some_and(|s| s.ty.ts() == callback.ty);
        let relays = spec
            .notified_props()
            .iter()
            .any(|p| p.name == callback.prop && p.ty.ts() == callback.ty);
        if state_matches {
            attributes.push(format!("{}={{{}}}", callback.name, setter_name(&callback.prop)));
        } else if relays {
            attributes.push(format!("{}={{{}}}", callback.name, callback_name(&callback.prop)));
        }
    }

    if attributes.is_empty() {
        format!("<{} />", child)
    } else {
        format!("<{} {} />", child, attributes.join(" "))
    }
}

/// JSX text for a label: plain when safe, otherwise a string expression
fn text(label: &str) -> String {
    let plain = label
        .chars()
        .all(|c| c.is_alphanumeric() || " .,!?:;'-()&+/".contains(c));
    if plain && !label.trim().is_empty() {
        label.to_string()
    } else {
        format!("{{{}}}", handlers::json(&serde_json::Value::String(label.to_string())))
    }
}

fn attribute_string(value: &str) -> String {
    if value.contains(['"', '\\', '\n', '{', '<']) {
        format!("{{{}}}", handlers::json(&serde_json::Value::String(value.to_string())))
    } else {
        format!("\"{}\"", value)
    }
}
