//! Stylesheet rendering
//!
//! Every value is a `var(--token)` reference picked from the contract. A
//! declaration whose category has no tokens is left out rather than filled
//! with a literal. Style hints on the root override its defaults; hints on
//! other targets get their own rules. Hints that do not resolve are written
//! verbatim so the validator reports them.

use uiforge_core::component::{Arrangement, Container, kebab};
use uiforge_core::design::TokenCategory;
use uiforge_core::{ComponentSpec, DesignSystemContract};

use super::Plan;

#[derive(Debug, Default)]
struct Block {
    selector: String,
    declarations: Vec<(String, String)>,
}

impl Block {
    fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            declarations: Vec::new(),
        }
    }

    fn set(&mut self, property: &str, value: impl Into<String>) -> &mut Self {
        let value = value.into();
        match self.declarations.iter_mut().find(|(p, _)| p == property) {
            Some(existing) => existing.1 = value,
            None => self.declarations.push((property.to_string(), value)),
        }
        self
    }

    fn maybe(&mut self, property: &str, value: Option<String>) -> &mut Self {
        if let Some(value) = value {
            self.set(property, value);
        }
        self
    }

    fn write(&self, out: &mut String, indent: &str) {
        out.push_str(&format!("{}{} {{\n", indent, self.selector));
        for (property, value) in &self.declarations {
            out.push_str(&format!("{}  {}: {};\n", indent, property, value));
        }
        out.push_str(&format!("{}}}\n", indent));
    }
}

/// Token lookup with preferred names
struct Tokens<'c> {
    contract: &'c DesignSystemContract,
}

impl Tokens<'_> {
    /// First preferred token that exists, else the first of the category
    fn pick(&self, category: TokenCategory, preferred: &[&str]) -> Option<String> {
        preferred
            .iter()
            .find_map(|name| self.contract.resolve(category, name))
            .or_else(|| self.contract.by_category(category).next())
            .map(|token| token.css_ref())
    }

    fn stroke(&self, width: &[&str], color: &[&str]) -> Option<String> {
        Some(format!(
            "{} solid {}",
            self.pick(TokenCategory::BorderWidth, width)?,
            self.pick(TokenCategory::Color, color)?
        ))
    }

    fn raw_value(&self, category: TokenCategory, preferred: &[&str]) -> Option<String> {
        preferred
            .iter()
            .find_map(|name| self.contract.resolve(category, name))
            .or_else(|| self.contract.by_category(category).next())
            .map(|token| token.value.css())
    }
}

pub(super) fn render(spec: &ComponentSpec, plan: &Plan<'_>, contract: &DesignSystemContract) -> String {
    let class = spec.css_class();
    let tokens = Tokens { contract };
    let is_form = spec.layout.container == Container::Form;
    let grid = spec.layout.arrangement == Arrangement::Grid && !is_form;

    let mut blocks = Vec::new();

    let mut root = Block::new(format!(".{}", class));
    if grid {
        root.set("display", "grid")
            .set("grid-template-columns", "repeat(2, minmax(0, 1fr))");
    } else if spec.layout.arrangement == Arrangement::Row && !is_form {
        root.set("display", "flex")
            .set("flex-direction", "row")
            .set("flex-wrap", "wrap")
            .set("align-items", "center");
    } else {
        root.set("display", "flex").set("flex-direction", "column");
    }
    let gap = match &spec.layout.spacing {
        Some(requested) => Some(
            contract
                .resolve(TokenCategory::Spacing, requested)
                .map(|t| t.css_ref())
                .unwrap_or_else(|| requested.clone()),
        ),
        None => tokens.pick(TokenCategory::Spacing, &["md"]),
    };
    root.maybe("gap", gap)
        .maybe("font-family", tokens.pick(TokenCategory::FontFamily, &["body"]))
        .maybe("font-size", tokens.pick(TokenCategory::FontSize, &["body"]))
        .maybe("line-height", tokens.pick(TokenCategory::LineHeight, &["normal"]))
        .maybe("color", tokens.pick(TokenCategory::Color, &["neutral-default"]));
    if spec.layout.container == Container::Card {
        root.maybe("padding", tokens.pick(TokenCategory::Spacing, &["lg"]))
            .maybe("border", tokens.stroke(&["thin"], &["bluegrey-100"]))
            .maybe("border-radius", tokens.pick(TokenCategory::Radius, &["md"]))
            .maybe("box-shadow", tokens.pick(TokenCategory::Shadow, &["md"]))
            .maybe("background-color", tokens.pick(TokenCategory::Color, &["white"]));
    }
    blocks.push(root);

    if plan.has_controls_container() {
        let mut controls = Block::new(format!(".{}__controls", class));
        controls.set("display", "flex");
        if is_form {
            controls.set("flex-direction", "column");
        } else {
            controls.set("flex-wrap", "wrap");
        }
        controls.maybe("gap", tokens.pick(TokenCategory::Spacing, &["sm"]));
        blocks.push(controls);
    }

    if plan.has_fields() {
        let mut field = Block::new(format!(".{}__field", class));
        field
            .set("display", "flex")
            .set("flex-direction", "column")
            .maybe("gap", tokens.pick(TokenCategory::Spacing, &["xs"]))
            .maybe("font-size", tokens.pick(TokenCategory::FontSize, &["body-small"]));
        blocks.push(field);

        let mut input = Block::new(format!(".{}__input", class));
        input
            .set("font", "inherit")
            .maybe("padding", tokens.pick(TokenCategory::Spacing, &["sm"]))
            .maybe("border", tokens.stroke(&["thin"], &["bluegrey-200"]))
            .maybe("border-radius", tokens.pick(TokenCategory::Radius, &["sm"]));
        blocks.push(input);

        let mut focus = Block::new(format!(".{}__input:focus-visible", class));
        focus.maybe("outline", tokens.stroke(&["medium"], &["focused", "primary-default"]));
        blocks.push(focus);
    }

    if plan.has_buttons() {
        let padding = tokens
            .pick(TokenCategory::Spacing, &["sm"])
            .zip(tokens.pick(TokenCategory::Spacing, &["md"]))
            .map(|(block, inline)| format!("{} {}", block, inline));
        let mut control = Block::new(format!(".{}__control", class));
        control
            .set("font", "inherit")
            .maybe("font-weight", tokens.pick(TokenCategory::FontWeight, &["medium"]))
            .maybe("padding", padding)
            .maybe("border", tokens.stroke(&["thin"], &["primary-default"]))
            .maybe("border-radius", tokens.pick(TokenCategory::Radius, &["md"]))
            .maybe("background-color", tokens.pick(TokenCategory::Color, &["primary-default"]))
            .maybe("color", tokens.pick(TokenCategory::Color, &["white"]))
            .set("cursor", "pointer")
            .maybe(
                "transition",
                tokens
                    .pick(TokenCategory::Duration, &["fast"])
                    .map(|d| format!("background-color {}", d)),
            );
        blocks.push(control);

        let mut hover = Block::new(format!(".{}__control:hover", class));
        hover.maybe(
            "background-color",
            tokens.pick(TokenCategory::Color, &["primary-hover", "primary-default"]),
        );
        blocks.push(hover);

        let mut focus = Block::new(format!(".{}__control:focus-visible", class));
        focus.maybe("outline", tokens.stroke(&["medium"], &["focused", "primary-default"]));
        blocks.push(focus);
    }

    let has_list = plan
        .displayed
        .iter()
        .any(|m| spec.member_type(m).is_some_and(|ty| ty.element().is_some()));
    if has_list {
        let mut items = Block::new(format!(".{}__items", class));
        items
            .set("margin", "0")
            .maybe("padding-left", tokens.pick(TokenCategory::Spacing, &["lg"]))
            .set("display", "flex")
            .set("flex-direction", "column")
            .maybe("gap", tokens.pick(TokenCategory::Spacing, &["xs"]));
        blocks.push(items);
    }

    let mut hinted: Vec<Block> = Vec::new();
    for hint in &spec.layout.styles {
        let selector = if hint.target.is_empty() || hint.target == "root" || hint.target == spec.name {
            format!(".{}", class)
        } else {
            format!(".{}__{}", class, kebab(&hint.target))
        };
        let value = contract
            .resolve(hint.property.category(), &hint.value)
            .map(|t| t.css_ref())
            .unwrap_or_else(|| hint.value.trim().to_string());
        if selector == blocks[0].selector {
            blocks[0].set(hint.property.css_name(), value);
            continue;
        }
        let position = match hinted.iter().position(|b| b.selector == selector) {
            Some(position) => position,
            None => {
                hinted.push(Block::new(selector));
                hinted.len() - 1
            }
        };
        hinted[position].set(hint.property.css_name(), value);
    }

    let mut out = String::new();
    for block in blocks.iter().chain(hinted.iter()).filter(|b| !b.declarations.is_empty()) {
        if !out.is_empty() {
            out.push('\n');
        }
        block.write(&mut out, "");
    }

    if grid {
        if let Some(width) = tokens.raw_value(TokenCategory::Breakpoint, &["sm"]) {
            let mut single = Block::new(format!(".{}", class));
            single.set("grid-template-columns", "minmax(0, 1fr)");
            out.push_str(&format!("\n@media (max-width: {}) {{\n", width));
            single.write(&mut out, "  ");
            out.push_str("}\n");
        }
    }
    out
}
