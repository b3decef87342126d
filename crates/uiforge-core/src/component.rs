//! Component IR
//!
//! A `ComponentSpec` is the structured, validated description of one UI
//! component: its typed props, local state, event handlers, child components
//! (referenced by name), and layout intent. Specs are independent of the code
//! generated from them; the link between the two is the spec fingerprint.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::design::TokenCategory;
use crate::fingerprint::Fingerprint;

/// One UI component in the IR
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentSpec {
    /// Unique, stable PascalCase name
    pub name: String,

    /// What the component does
    #[serde(default)]
    pub description: String,

    /// Requirement text the component was derived from
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source: String,

    /// Ordered, typed props
    #[serde(default)]
    pub props: Vec<PropSpec>,

    /// Local state variables
    #[serde(default)]
    pub state: Vec<StateSpec>,

    /// Ordered event handlers
    #[serde(default)]
    pub handlers: Vec<HandlerSpec>,

    /// Ordered child component references (by name)
    #[serde(default)]
    pub children: Vec<String>,

    /// Layout hints (never raw styling)
    #[serde(default)]
    pub layout: LayoutIntent,
}

/// A typed prop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropSpec {
    /// Prop name (camelCase identifier)
    pub name: String,

    /// Prop type
    #[serde(rename = "type")]
    pub ty: TypeRef,

    /// Whether callers must supply the prop
    #[serde(default = "default_required")]
    pub required: bool,

    /// Default value for optional props
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

fn default_required() -> bool {
    true
}

/// A local state variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSpec {
    /// State name (camelCase identifier)
    pub name: String,

    /// State type
    #[serde(rename = "type")]
    pub ty: TypeRef,

    /// Initial value
    pub initial: Value,
}

/// An event handler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandlerSpec {
    /// Handler name (camelCase identifier)
    pub name: String,

    /// Interaction that fires the handler
    pub trigger: Interaction,

    /// Free-text effect description
    #[serde(default)]
    pub effect: String,

    /// State variable or prop the handler affects
    pub affects: String,

    /// Structured effect
    #[serde(default)]
    pub action: HandlerAction,

    /// Visible label for the control that fires the handler
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl HandlerSpec {
    /// Label shown on the control, derived from the name when absent
    pub fn display_label(&self) -> String {
        match &self.label {
            Some(label) if !label.trim().is_empty() => label.clone(),
            _ => humanize(&self.name),
        }
    }
}

/// User interaction that triggers a handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interaction {
    /// Button or element click
    Click,
    /// Input value change
    Change,
    /// Form submission
    Submit,
    /// Checkbox or switch toggle
    Toggle,
    /// Pointer enters the element
    Hover,
    /// Element gains focus
    Focus,
    /// Element loses focus
    Blur,
}

/// Structured effect of a handler on its target
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HandlerAction {
    /// Add `by` to a number
    Increment {
        /// Step size
        #[serde(default = "default_step")]
        by: f64,
    },
    /// Subtract `by` from a number
    Decrement {
        /// Step size
        #[serde(default = "default_step")]
        by: f64,
    },
    /// Assign a literal value
    Set {
        /// Value to assign
        value: Value,
    },
    /// Flip a boolean
    Toggle,
    /// Restore the initial (state) or default (prop) value
    Reset,
    /// Bind the target to the event's input value
    Bind,
    /// Append to a list, optionally taking the item from another member
    Append {
        /// Member supplying the appended item
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<String>,
    },
    /// Empty a list
    Clear,
    /// Report the current value through the change callback
    Notify,
    /// Behavior described only by the free-text effect
    #[default]
    Custom,
}

fn default_step() -> f64 {
    1.0
}

/// Layout intent: structured hints, not raw styling
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LayoutIntent {
    /// How children and controls are arranged
    #[serde(default)]
    pub arrangement: Arrangement,

    /// Spacing step between items (a spacing token name)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spacing: Option<String>,

    /// Container treatment
    #[serde(default)]
    pub container: Container,

    /// Requested styles for individual elements
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub styles: Vec<StyleHint>,
}

/// Arrangement of a component's content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Arrangement {
    /// Vertical stack
    #[default]
    Stack,
    /// Horizontal row
    Row,
    /// Responsive grid
    Grid,
}

/// Container treatment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Container {
    /// No container chrome
    #[default]
    Plain,
    /// Design-system card
    Card,
    /// Single-column form
    Form,
}

/// A requested style for one element of a component
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleHint {
    /// `root`, or the name of a handler (its control) or state/prop (its display)
    pub target: String,

    /// Styled property
    pub property: StyleProperty,

    /// Requested value; a token name or literal
    pub value: String,
}

/// Style property a hint applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StyleProperty {
    /// Text color
    Color,
    /// Background color
    Background,
    /// Border color
    BorderColor,
    /// Inner spacing
    Padding,
    /// Outer spacing
    Margin,
    /// Gap between items
    Gap,
    /// Font size
    FontSize,
    /// Font weight
    FontWeight,
    /// Font family
    FontFamily,
    /// Corner radius
    Radius,
    /// Box shadow
    Shadow,
}

impl StyleProperty {
    /// CSS property name
    pub fn css_name(self) -> &'static str {
        match self {
            StyleProperty::Color => "color",
            StyleProperty::Background => "background-color",
            StyleProperty::BorderColor => "border-color",
            StyleProperty::Padding => "padding",
            StyleProperty::Margin => "margin",
            StyleProperty::Gap => "gap",
            StyleProperty::FontSize => "font-size",
            StyleProperty::FontWeight => "font-weight",
            StyleProperty::FontFamily => "font-family",
            StyleProperty::Radius => "border-radius",
            StyleProperty::Shadow => "box-shadow",
        }
    }

    /// Token category the value must resolve into
    pub fn category(self) -> TokenCategory {
        match self {
            StyleProperty::Color | StyleProperty::Background | StyleProperty::BorderColor => {
                TokenCategory::Color
            }
            StyleProperty::Padding | StyleProperty::Margin | StyleProperty::Gap => {
                TokenCategory::Spacing
            }
            StyleProperty::FontSize => TokenCategory::FontSize,
            StyleProperty::FontWeight => TokenCategory::FontWeight,
            StyleProperty::FontFamily => TokenCategory::FontFamily,
            StyleProperty::Radius => TokenCategory::Radius,
            StyleProperty::Shadow => TokenCategory::Shadow,
        }
    }
}

/// Type vocabulary for props and state
///
/// Serialized in TypeScript notation: `string`, `number`, `boolean`,
/// `"low" | "high"`, `string[]`, `("a" | "b")[]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TypeRef {
    /// `string`
    String,
    /// `number`
    Number,
    /// `boolean`
    Boolean,
    /// Union of string literals
    Enum(Vec<String>),
    /// Homogeneous list
    List(Box<TypeRef>),
}

impl TypeRef {
    /// TypeScript spelling
    pub fn ts(&self) -> String {
        match self {
            TypeRef::String => "string".to_string(),
            TypeRef::Number => "number".to_string(),
            TypeRef::Boolean => "boolean".to_string(),
            TypeRef::Enum(literals) => literals
                .iter()
                .map(|l| format!("\"{}\"", l))
                .collect::<Vec<_>>()
                .join(" | "),
            TypeRef::List(inner) => match inner.as_ref() {
                TypeRef::Enum(_) => format!("({})[]", inner.ts()),
                other => format!("{}[]", other.ts()),
            },
        }
    }

    /// Whether a JSON value inhabits this type
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (TypeRef::String, Value::String(_)) => true,
            (TypeRef::Number, Value::Number(_)) => true,
            (TypeRef::Boolean, Value::Bool(_)) => true,
            (TypeRef::Enum(literals), Value::String(s)) => literals.contains(s),
            (TypeRef::List(inner), Value::Array(items)) => items.iter().all(|v| inner.accepts(v)),
            _ => false,
        }
    }

    /// Neutral value of the type (`""`, `0`, `false`, first literal, `[]`)
    pub fn zero_value(&self) -> Value {
        match self {
            TypeRef::String => Value::String(String::new()),
            TypeRef::Number => Value::from(0),
            TypeRef::Boolean => Value::Bool(false),
            TypeRef::Enum(literals) => literals
                .first()
                .map(|l| Value::String(l.clone()))
                .unwrap_or(Value::Null),
            TypeRef::List(_) => Value::Array(Vec::new()),
        }
    }

    /// Element type of a list
    pub fn element(&self) -> Option<&TypeRef> {
        match self {
            TypeRef::List(inner) => Some(inner),
            _ => None,
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.ts())
    }
}

impl From<TypeRef> for String {
    fn from(ty: TypeRef) -> Self {
        ty.ts()
    }
}

impl TryFrom<String> for TypeRef {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl FromStr for TypeRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("empty type".to_string());
        }

        if let Some(inner) = s.strip_suffix("[]") {
            let inner = inner.trim();
            let inner = inner
                .strip_prefix('(')
                .and_then(|i| i.strip_suffix(')'))
                .unwrap_or(inner);
            return Ok(TypeRef::List(Box::new(inner.parse()?)));
        }
        if let Some(inner) = s.strip_prefix("Array<").and_then(|i| i.strip_suffix('>')) {
            return Ok(TypeRef::List(Box::new(inner.parse()?)));
        }
        if let Some(inner) = s.strip_prefix("enum(").and_then(|i| i.strip_suffix(')')) {
            return enum_of(inner.split(',').map(|l| l.trim().to_string()));
        }
        if s.starts_with('"') || s.starts_with('\'') {
            return enum_of(s.split('|').map(|l| {
                l.trim()
                    .trim_matches(|c: char| c == '"' || c == '\'')
                    .to_string()
            }));
        }

        match s {
            "string" => Ok(TypeRef::String),
            "number" => Ok(TypeRef::Number),
            "boolean" => Ok(TypeRef::Boolean),
            other => Err(format!(
                "type '{}' is outside the vocabulary (string, number, boolean, literal union, list)",
                other
            )),
        }
    }
}

fn enum_of(literals: impl Iterator<Item = String>) -> Result<TypeRef, String> {
    let mut out: Vec<String> = Vec::new();
    for literal in literals {
        if literal.is_empty() {
            return Err("enum literal must not be empty".to_string());
        }
        if out.contains(&literal) {
            return Err(format!("duplicate enum literal '{}'", literal));
        }
        out.push(literal);
    }
    if out.is_empty() {
        return Err("enum needs at least one literal".to_string());
    }
    Ok(TypeRef::Enum(out))
}

impl ComponentSpec {
    /// Create an empty spec
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            source: String::new(),
            props: Vec::new(),
            state: Vec::new(),
            handlers: Vec::new(),
            children: Vec::new(),
            layout: LayoutIntent::default(),
        }
    }

    /// Content fingerprint of the spec
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of_parts([
            self.name.clone(),
            self.description.clone(),
            format!("{:?}", self.props),
            format!("{:?}", self.state),
            format!("{:?}", self.handlers),
            format!("{:?}", self.children),
            format!("{:?}", self.layout),
        ])
    }

    /// Requirement text to quote when reporting on this component.
    ///
    /// Falls back to the description, then the name, for specs that were
    /// written by hand.
    pub fn fragment(&self) -> &str {
        [self.source.as_str(), self.description.as_str()]
            .into_iter()
            .map(str::trim)
            .find(|text| !text.is_empty())
            .unwrap_or(&self.name)
    }

    /// Find a prop by name
    pub fn prop(&self, name: &str) -> Option<&PropSpec> {
        self.props.iter().find(|p| p.name == name)
    }

    /// Find a state variable by name
    pub fn state_var(&self, name: &str) -> Option<&StateSpec> {
        self.state.iter().find(|s| s.name == name)
    }

    /// Find a handler by name
    pub fn handler(&self, name: &str) -> Option<&HandlerSpec> {
        self.handlers.iter().find(|h| h.name == name)
    }

    /// Type of a prop or state member
    pub fn member_type(&self, name: &str) -> Option<&TypeRef> {
        self.state_var(name)
            .map(|s| &s.ty)
            .or_else(|| self.prop(name).map(|p| &p.ty))
    }

    /// Props that handlers report changes on, in declaration order
    pub fn notified_props(&self) -> Vec<&PropSpec> {
        self.props
            .iter()
            .filter(|p| {
                self.handlers
                    .iter()
                    .any(|h| h.affects == p.name && self.state_var(&h.affects).is_none())
            })
            .collect()
    }

    /// CSS class of the component root (`todo-list` for `TodoList`)
    pub fn css_class(&self) -> String {
        kebab(&self.name)
    }
}

/// `incrementCount` → `Increment count`
pub fn humanize(identifier: &str) -> String {
    let mut out = String::new();
    for (i, c) in identifier.chars().enumerate() {
        if i == 0 {
            out.extend(c.to_uppercase());
        } else if c.is_uppercase() {
            out.push(' ');
            out.extend(c.to_lowercase());
        } else if c == '_' || c == '-' {
            out.push(' ');
        } else {
            out.push(c);
        }
    }
    out
}

/// `TodoList` → `todo-list`, `isOpen` → `is-open`
pub fn kebab(identifier: &str) -> String {
    let mut out = String::new();
    for (i, c) in identifier.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                out.push('-');
            }
            out.extend(c.to_lowercase());
        } else if c == '_' {
            out.push('-');
        } else {
            out.push(c);
        }
    }
    out
}

/// `count` → `Count` (used for `setCount`, `onCountChange`)
pub fn capitalize(identifier: &str) -> String {
    let mut chars = identifier.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
