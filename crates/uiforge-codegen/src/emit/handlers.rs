//! Handler bodies from structured actions

use serde_json::Value;

use uiforge_core::ComponentSpec;
use uiforge_core::component::{HandlerAction, HandlerSpec, TypeRef, humanize};

use super::Control;
use crate::ir::{callback_name, setter_name};

/// Rendered handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Body {
    pub lines: Vec<String>,
    /// Event parameter type, when the body reads the event
    pub event: Option<EventType>,
}

/// Event parameter types the emitter uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(super) enum EventType {
    Change(&'static str),
    Form,
}

impl EventType {
    pub fn ts(self) -> String {
        match self {
            EventType::Change(element) => format!("ChangeEvent<{}>", element),
            EventType::Form => "FormEvent<HTMLFormElement>".to_string(),
        }
    }

    pub fn import(self) -> &'static str {
        match self {
            EventType::Change(_) => "ChangeEvent",
            EventType::Form => "FormEvent",
        }
    }
}

struct Next {
    expr: String,
    uses_current: bool,
    uses_event: bool,
}

pub(super) fn body(spec: &ComponentSpec, handler: &HandlerSpec, control: Control) -> Body {
    let mut lines = Vec::new();
    let mut uses_event = false;
    if control == Control::SubmitForm {
        lines.push("event.preventDefault();".to_string());
        uses_event = true;
    }

    let target = handler.affects.as_str();
    let is_state = spec.state_var(target).is_some();
    let current = if is_state { "current" } else { target };

    match next_value(spec, handler, control, current) {
        Some(next) => {
            uses_event |= next.uses_event;
            if !is_state {
                lines.push(format!("{}?.({});", callback_name(target), next.expr));
            } else if next.uses_current {
                lines.push(format!(
                    "{}((current) => {});",
                    setter_name(target),
                    next.expr
                ));
            } else {
                lines.push(format!("{}({});", setter_name(target), next.expr));
            }
        }
        None => {
            lines.push(format!("// {}", describe(handler)));
            if !is_state && spec.prop(target).is_some() {
                lines.push(format!("{}?.({});", callback_name(target), target));
            }
        }
    }

    let event = uses_event.then(|| event_type(control)).flatten();
    Body { lines, event }
}

fn event_type(control: Control) -> Option<EventType> {
    match control {
        Control::SubmitForm => Some(EventType::Form),
        Control::Checkbox | Control::Input { .. } => Some(EventType::Change("HTMLInputElement")),
        Control::Select => Some(EventType::Change("HTMLSelectElement")),
        Control::Button | Control::RootEvent(_) => None,
    }
}

fn next_value(
    spec: &ComponentSpec,
    handler: &HandlerSpec,
    control: Control,
    current: &str,
) -> Option<Next> {
    let target = handler.affects.as_str();
    let ty = spec.member_type(target)?;
    let plain = |expr: String| Next {
        expr,
        uses_current: false,
        uses_event: false,
    };
    let from_current = |expr: String| Next {
        expr,
        uses_current: true,
        uses_event: false,
    };

    let next = match &handler.action {
        HandlerAction::Increment { by } => from_current(format!("{} + {}", current, by)),
        HandlerAction::Decrement { by } => from_current(format!("{} - {}", current, by)),
        HandlerAction::Set { value } => plain(json(value)),
        HandlerAction::Toggle => from_current(format!("!{}", current)),
        HandlerAction::Reset => {
            let value = spec
                .state_var(target)
                .map(|s| s.initial.clone())
                .or_else(|| spec.prop(target).and_then(|p| p.default.clone()))
                .unwrap_or_else(|| ty.zero_value());
            plain(json(&value))
        }
        HandlerAction::Bind => {
            let (expr, uses_current) = event_value(ty, control, current)?;
            Next {
                expr,
                uses_current,
                uses_event: true,
            }
        }
        HandlerAction::Append { from } => {
            let item = from
                .as_deref()
                .filter(|member| spec.member_type(member).is_some())
                .map(str::to_string)
                .or_else(|| ty.element().map(|e| json(&e.zero_value())))?;
            from_current(format!("[...{}, {}]", current, item))
        }
        HandlerAction::Clear => plain("[]".to_string()),
        HandlerAction::Notify if spec.state_var(target).is_none() => plain(target.to_string()),
        HandlerAction::Notify | HandlerAction::Custom => return None,
    };
    Some(next)
}

/// Expression reading the new value from the control's event
fn event_value(ty: &TypeRef, control: Control, current: &str) -> Option<(String, bool)> {
    match (control, ty) {
        (Control::Checkbox, TypeRef::Boolean) => Some(("event.target.checked".to_string(), false)),
        (Control::Select, TypeRef::Enum(_)) => {
            Some((format!("event.target.value as {}", ty.ts()), false))
        }
        (Control::Input { .. }, TypeRef::Number) => {
            Some(("Number(event.target.value)".to_string(), false))
        }
        (Control::Input { .. }, TypeRef::String) => Some(("event.target.value".to_string(), false)),
        (Control::Input { .. }, TypeRef::List(inner)) => match inner.as_ref() {
            TypeRef::String => Some((format!("[...{}, event.target.value]", current), true)),
            TypeRef::Number => Some((format!("[...{}, Number(event.target.value)]", current), true)),
            _ => None,
        },
        _ => None,
    }
}

fn describe(handler: &HandlerSpec) -> String {
    let effect = handler.effect.split_whitespace().collect::<Vec<_>>().join(" ");
    if effect.is_empty() {
        humanize(&handler.name)
    } else {
        effect
    }
}

pub(super) fn json(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uiforge_core::component::{Interaction, PropSpec, StateSpec};

    fn spec() -> ComponentSpec {
        let mut spec = ComponentSpec::new("TodoList");
        spec.state.push(StateSpec {
            name: "items".into(),
            ty: TypeRef::List(Box::new(TypeRef::String)),
            initial: json!([]),
        });
        spec.state.push(StateSpec {
            name: "draft".into(),
            ty: TypeRef::String,
            initial: json!(""),
        });
        spec.props.push(PropSpec {
            name: "total".into(),
            ty: TypeRef::Number,
            required: true,
            default: None,
        });
        spec
    }

    fn handler(affects: &str, action: HandlerAction) -> HandlerSpec {
        HandlerSpec {
            name: "run".into(),
            trigger: Interaction::Click,
            effect: "Does  the\nthing".into(),
            affects: affects.into(),
            action,
            label: None,
        }
    }

    #[test]
    fn test_append_from_member() {
        let body = body(
            &spec(),
            &handler("items", HandlerAction::Append { from: Some("draft".into()) }),
            Control::Button,
        );
        assert_eq!(body.lines, vec!["setItems((current) => [...current, draft]);"]);
        assert_eq!(body.event, None);
    }

    #[test]
    fn test_prop_targets_report_through_callback() {
        let body = body(&spec(), &handler("total", HandlerAction::Increment { by: 2.0 }), Control::Button);
        assert_eq!(body.lines, vec!["onTotalChange?.(total + 2);"]);
    }

    #[test]
    fn test_custom_action_keeps_effect_as_comment() {
        let body = body(&spec(), &handler("total", HandlerAction::Custom), Control::Button);
        assert_eq!(body.lines, vec!["// Does the thing", "onTotalChange?.(total);"]);
    }

    #[test]
    fn test_bind_without_event_falls_back_to_comment() {
        let body = body(&spec(), &handler("draft", HandlerAction::Bind), Control::Button);
        assert_eq!(body.lines, vec!["// Does the thing"]);
    }

    #[test]
    fn test_bind_reads_input_event() {
        let control = Control::Input { numeric: false, bound: true };
        let body = body(&spec(), &handler("draft", HandlerAction::Bind), control);
        assert_eq!(body.lines, vec!["setDraft(event.target.value);"]);
        assert_eq!(body.event.map(EventType::ts).as_deref(), Some("ChangeEvent<HTMLInputElement>"));
    }

    #[test]
    fn test_clear_and_reset() {
        let clear = body(&spec(), &handler("items", HandlerAction::Clear), Control::Button);
        assert_eq!(clear.lines, vec!["setItems([]);"]);
        let reset = body(&spec(), &handler("draft", HandlerAction::Reset), Control::Button);
        assert_eq!(reset.lines, vec!["setDraft(\"\");"]);
    }
}
