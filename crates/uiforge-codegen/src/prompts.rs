//! Prompt templates for the provider-backed stages
//!
//! Templates are Jinja (minijinja) sources rendered per request. The system
//! instructions pin the output format; the user prompts carry the data.

use minijinja::{Environment, context};
use once_cell::sync::Lazy;
use serde::Serialize;

use uiforge_core::component::ComponentSpec;
use uiforge_core::design::TokenCategory;
use uiforge_core::DesignSystemContract;

use crate::error::Result;
use crate::ir::{ComponentSignature, Violation};

static ENV: Lazy<Environment<'static>> = Lazy::new(|| {
    let mut env = Environment::new();
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);
    env
});

/// System instruction for requirement parsing
pub const PARSE_SYSTEM: &str = "You are a UI requirements analyst. You turn product \
requirements into a JSON component tree. Answer with a single ```json block and nothing else. \
If a phrase could reasonably describe two different structures, do not guess: list it under \
\"ambiguities\" with the competing readings and return no components.";

/// System instruction for component generation
pub const GENERATE_SYSTEM: &str = "You are a senior React and TypeScript engineer. You write \
one component per answer as a ```tsx block followed by a ```css block. Use only the design \
tokens you are given, through var(--token-id). Never write hex colors, rgb(), named colors, \
pixel or rem values, or font stacks directly. Never use `any`, `as any` or @ts-ignore.";

/// System instruction for change requests
pub const FEEDBACK_SYSTEM: &str = "You are maintaining an existing React component tree. \
Translate the change request into the smallest list of structured mutations on the listed \
components. Do not touch components that are not listed unless you must create a new one. \
Answer with a single ```json block and nothing else.";

const PARSE_TEMPLATE: &str = r#"Requirements:
"""
{{ requirements }}
"""

Describe the UI as components. Return JSON of this shape:

{
  "ambiguities": [{"fragment": "<text>", "alternatives": ["<reading>", "<reading>"]}],
  "root": "<PascalCase name of the top-level component>",
  "components": [
    {
      "name": "PascalCase",
      "description": "what it does",
      "source": "<the requirement phrase this component comes from, quoted exactly>",
      "props": [{"name": "camelCase", "type": "<type>", "required": true, "default": null}],
      "state": [{"name": "camelCase", "type": "<type>", "initial": <value>}],
      "handlers": [{
        "name": "camelCase",
        "trigger": "click|change|submit|toggle|hover|focus|blur",
        "effect": "what happens",
        "affects": "<state or prop name>",
        "action": {"kind": "increment|decrement|set|toggle|reset|bind|append|clear|notify|custom"},
        "label": "Button text"
      }],
      "children": ["ChildName"],
      "layout": {"arrangement": "stack|row|grid", "container": "plain|card|form", "spacing": "md"}
    }
  ]
}

Rules:
- Types are one of {{ vocabulary | join(", ") }}.
- Every handler affects exactly one state variable or prop of its own component.
- Children are referenced by name and every child is defined in "components".
- Exactly one component is not the child of another; it is the root.
- No component contains itself, directly or through its children.
- Forms are a single column of fields.
{% if issues %}

Your previous answer was rejected:
{% for issue in issues %}
- {{ issue }}
{% endfor %}
Return a corrected answer.
{% endif %}"#;

const GENERATE_TEMPLATE: &str = r#"Write the component `{{ name }}`.

Specification:
```json
{{ spec }}
```

Export `{{ name }}` as a named function component and an exported `{{ name }}Props`
interface. Declare every prop with its exact type, every state variable with
`useState<Type>(initial)`, and every handler as a typed const. Import the
stylesheet as `./{{ name }}.css` and give the root element class `{{ css_class }}`.
{% if children %}

Compose these children by name (import each from `./<Name>`), never inline them:
{% for child in children %}
- `{{ child.name }}`: props {% for p in child.props %}{{ p.name }}{% if not p.required %}?{% endif %}: {{ p.ty }}{% if not loop.last %}, {% endif %}{% else %}none{% endfor %}{% for c in child.callbacks %}, {{ c.name }}?: (value: {{ c.ty }}) => void{% endfor %}

{% endfor %}
{% endif %}

Design tokens (reference as var(--id)):
{% for group in tokens %}
{{ group.category }}: {{ group.ids | join(", ") }}
{% endfor %}
Media queries may use only these breakpoint widths: {{ breakpoints | join(", ") }}.
{% if corrections %}

The previous attempt failed validation:
{% for v in corrections %}
- {{ v }}
{% endfor %}
Fix every item.
{% endif %}"#;

const FEEDBACK_TEMPLATE: &str = r#"Change request:
"""
{{ request }}
"""

Components in scope:
{% for spec in scope %}
```json
{{ spec }}
```
{% endfor %}

Other components in the project: {{ others | join(", ") if others else "none" }}

Return JSON: {"mutations": [ ... ]} where each mutation is one of
- {"op": "add_prop", "component": C, "prop": {...}}
- {"op": "remove_prop", "component": C, "name": N}
- {"op": "modify_prop", "component": C, "prop": {...}}
- {"op": "add_state", "component": C, "state": {...}} / "remove_state" / "modify_state"
- {"op": "add_handler", "component": C, "handler": {...}} / "remove_handler" / "modify_handler"
- {"op": "add_child", "component": C, "child": Name} / "remove_child"
- {"op": "create_component", "parent": C, "spec": {...}}
- {"op": "remove_component", "name": Name}
- {"op": "set_style", "component": C, "target": "root|<handler>|<member>", "property": "color|background|border_color|padding|margin|gap|font_size|font_weight|font_family|radius|shadow", "value": V}
- {"op": "clear_style", "component": C, "target": T, "property": P}
- {"op": "set_layout", "component": C, "arrangement": A, "container": K, "spacing": S}

Style values should be design token ids ({{ token_hint }}); write the user's literal
value only if no token fits.
"#;

#[derive(Serialize)]
struct TokenGroup {
    category: &'static str,
    ids: Vec<String>,
}

/// Render the requirement-parsing prompt, with rejected-issue feedback on retries
pub fn parse_prompt(requirements: &str, issues: &[String]) -> Result<String> {
    Ok(ENV.render_named_str(
        "parse",
        PARSE_TEMPLATE,
        context! {
            requirements => requirements.trim(),
            vocabulary => ["string", "number", "boolean", "\"a\" | \"b\" (literal union)", "T[] (list)"],
            issues => issues,
        },
    )?)
}

/// Render the generation prompt for one component
pub fn generate_prompt(
    spec: &ComponentSpec,
    contract: &DesignSystemContract,
    children: &[&ComponentSignature],
    corrections: &[Violation],
) -> Result<String> {
    let tokens: Vec<TokenGroup> = TokenCategory::ALL
        .iter()
        .map(|category| TokenGroup {
            category: category.prefix(),
            ids: contract.by_category(*category).map(|t| t.id.clone()).collect(),
        })
        .filter(|g| !g.ids.is_empty())
        .collect();
    let breakpoints: Vec<String> = contract
        .by_category(TokenCategory::Breakpoint)
        .map(|t| t.value.css())
        .collect();
    let corrections: Vec<String> = corrections.iter().map(ToString::to_string).collect();

    Ok(ENV.render_named_str(
        "generate",
        GENERATE_TEMPLATE,
        context! {
            name => &spec.name,
            css_class => spec.css_class(),
            spec => serde_json::to_string_pretty(spec).unwrap_or_default(),
            children => children,
            tokens => tokens,
            breakpoints => breakpoints,
            corrections => corrections,
        },
    )?)
}

/// Render the change-request prompt
pub fn feedback_prompt(
    request: &str,
    scope: &[&ComponentSpec],
    others: &[String],
    contract: &DesignSystemContract,
) -> Result<String> {
    let scope: Vec<String> = scope
        .iter()
        .map(|s| serde_json::to_string_pretty(s).unwrap_or_default())
        .collect();
    let token_hint = contract
        .tokens()
        .filter(|t| t.category == TokenCategory::Color)
        .take(6)
        .map(|t| t.id.clone())
        .collect::<Vec<_>>()
        .join(", ");

    Ok(ENV.render_named_str(
        "feedback",
        FEEDBACK_TEMPLATE,
        context! {
            request => request.trim(),
            scope => scope,
            others => others,
            token_hint => token_hint,
        },
    )?)
}
