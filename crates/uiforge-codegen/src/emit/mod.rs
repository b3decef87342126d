//! Deterministic template emitter
//!
//! Turns a `ComponentSpec` into a TSX function component and its stylesheet
//! without a provider. The same spec, contract and child signatures always
//! produce byte-identical output.
//!
//! Every handler is wired to one control chosen from its trigger and the type
//! of the member it affects:
//!
//! | Trigger                      | Control                         |
//! |------------------------------|---------------------------------|
//! | click (and fallbacks)        | `<button type="button">`        |
//! | first submit                 | root `<form onSubmit>` + submit |
//! | toggle, change on boolean    | checkbox                        |
//! | change on a literal union    | `<select>`                      |
//! | change on number/string/list | `<input>`                       |
//! | hover, focus, blur           | root event attribute            |

mod css;
mod handlers;
mod tsx;

use std::collections::BTreeMap;

use uiforge_core::component::{HandlerSpec, Interaction, TypeRef};
use uiforge_core::{ComponentSpec, DesignSystemContract};

use crate::ir::ComponentSignature;

/// Source text produced for one component
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Emitted {
    /// Component source
    pub tsx: String,
    /// Stylesheet
    pub css: String,
}

/// Emit TSX and CSS for a spec
pub fn emit(
    spec: &ComponentSpec,
    contract: &DesignSystemContract,
    children: &BTreeMap<String, ComponentSignature>,
) -> Emitted {
    let plan = Plan::of(spec);
    Emitted {
        tsx: tsx::render(spec, &plan, children),
        css: css::render(spec, &plan, contract),
    }
}

/// Element a handler is wired to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Control {
    Button,
    SubmitForm,
    Checkbox,
    Select,
    Input { numeric: bool, bound: bool },
    RootEvent(&'static str),
}

impl Control {
    /// Whether the control renders inside a labelled field
    fn is_field(self) -> bool {
        matches!(self, Control::Checkbox | Control::Select | Control::Input { .. })
    }

    /// Whether the control shows its member's value itself
    fn binds_value(self, ty: Option<&TypeRef>) -> bool {
        match self {
            Control::Checkbox => ty == Some(&TypeRef::Boolean),
            Control::Select => true,
            Control::Input { bound, .. } => bound,
            _ => false,
        }
    }
}

/// Layout decisions shared by the TSX and CSS renderers
#[derive(Debug)]
pub(crate) struct Plan<'s> {
    controls: Vec<(&'s HandlerSpec, Control)>,
    displayed: Vec<&'s str>,
}

impl<'s> Plan<'s> {
    fn of(spec: &'s ComponentSpec) -> Self {
        let mut controls = Vec::new();
        let mut submit_taken = false;
        let mut root_events: Vec<&'static str> = Vec::new();

        for handler in &spec.handlers {
            let ty = spec.member_type(&handler.affects);
            let control = match handler.trigger {
                Interaction::Submit if !submit_taken => {
                    submit_taken = true;
                    Control::SubmitForm
                }
                Interaction::Toggle => Control::Checkbox,
                Interaction::Change => match ty {
                    Some(TypeRef::Boolean) => Control::Checkbox,
                    Some(TypeRef::Enum(_)) => Control::Select,
                    Some(TypeRef::Number) => Control::Input {
                        numeric: true,
                        bound: true,
                    },
                    Some(TypeRef::String) => Control::Input {
                        numeric: false,
                        bound: true,
                    },
                    _ => Control::Input {
                        numeric: false,
                        bound: false,
                    },
                },
                Interaction::Hover | Interaction::Focus | Interaction::Blur => {
                    let attribute = match handler.trigger {
                        Interaction::Hover => "onMouseEnter",
                        Interaction::Focus => "onFocus",
                        _ => "onBlur",
                    };
                    if root_events.contains(&attribute) {
                        Control::Button
                    } else {
                        root_events.push(attribute);
                        Control::RootEvent(attribute)
                    }
                }
                _ => Control::Button,
            };
            controls.push((handler, control));
        }

        let bound: Vec<&str> = controls
            .iter()
            .filter(|(h, c)| c.binds_value(spec.member_type(&h.affects)))
            .map(|(h, _)| h.affects.as_str())
            .collect();
        let displayed = spec
            .state
            .iter()
            .map(|s| s.name.as_str())
            .chain(spec.props.iter().map(|p| p.name.as_str()))
            .filter(|name| !bound.contains(name))
            .collect();

        Self {
            controls,
            displayed,
        }
    }

    fn submit(&self) -> Option<&'s HandlerSpec> {
        self.controls
            .iter()
            .find(|(_, c)| *c == Control::SubmitForm)
            .map(|(h, _)| *h)
    }

    fn root_events(&self) -> impl Iterator<Item = (&'static str, &'s HandlerSpec)> + '_ {
        self.controls.iter().filter_map(|(h, c)| match c {
            Control::RootEvent(attribute) => Some((*attribute, *h)),
            _ => None,
        })
    }

    /// Controls rendered inside the controls container, in handler order
    fn inline_controls(&self) -> impl Iterator<Item = (&'s HandlerSpec, Control)> + '_ {
        self.controls
            .iter()
            .filter(|(_, c)| !matches!(c, Control::RootEvent(_) | Control::SubmitForm))
            .copied()
    }

    fn has_controls_container(&self) -> bool {
        self.submit().is_some() || self.inline_controls().next().is_some()
    }

    fn has_buttons(&self) -> bool {
        self.submit().is_some() || self.inline_controls().any(|(_, c)| c == Control::Button)
    }

    fn has_fields(&self) -> bool {
        self.inline_controls().any(|(_, c)| c.is_field())
    }
}
