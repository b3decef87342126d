//! Check (c): design values must come from the contract
//!
//! Every color, spacing, typography, radius, shadow and breakpoint value in
//! the stylesheet (and in inline `style={{…}}` objects or string literals in
//! the TSX) must be a `var(--token)` reference to a declared token. A literal
//! is rejected even when it happens to equal a token's value; the message then
//! names the token to use instead. Media-query widths are the one place a
//! literal is allowed, and only when it equals a breakpoint token value.

use once_cell::sync::Lazy;
use regex::Regex;

use uiforge_core::DesignSystemContract;
use uiforge_core::design::TokenCategory;

use super::source;
use super::stylesheet::Stylesheet;
use super::tree::{self, TsxTree};
use crate::ir::{SourceFile, Violation, ViolationKind};

static VAR_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"var\(\s*(--[A-Za-z0-9_-]+)").expect("valid regex"));
static HEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"#(?:[0-9a-fA-F]{3,4}|[0-9a-fA-F]{6}|[0-9a-fA-F]{8})\b").expect("valid regex"));
static COLOR_FN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:rgba?|hsla?|hwb|lab|lch|oklab|oklch|color)\([^)]*\)").expect("valid regex")
});
static LENGTH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:^|[^\w.#-])(-?(?:\d+\.?\d*|\.\d+)(?:px|rem|em|pt|vh|vw)?)(?:\b|$)")
        .expect("valid regex")
});
static DURATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b\d*\.?\d+m?s\b").expect("valid regex"));
static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z][A-Za-z-]*").expect("valid regex"));

const NAMED_COLORS: &[&str] = &[
    "aqua", "aquamarine", "azure", "beige", "black", "blue", "blueviolet", "brown", "chartreuse",
    "chocolate", "coral", "cornflowerblue", "crimson", "cyan", "darkblue", "darkgray", "darkgreen",
    "darkgrey", "darkorange", "darkred", "deeppink", "deepskyblue", "dimgray", "dimgrey",
    "dodgerblue", "firebrick", "fuchsia", "gold", "goldenrod", "gray", "green", "greenyellow",
    "grey", "hotpink", "indianred", "indigo", "ivory", "khaki", "lavender", "lightblue",
    "lightgray", "lightgreen", "lightgrey", "lightpink", "lightyellow", "lime", "limegreen",
    "magenta", "maroon", "navy", "olive", "orange", "orangered", "orchid", "pink", "plum",
    "purple", "rebeccapurple", "red", "royalblue", "salmon", "seagreen", "silver", "skyblue",
    "slategray", "slategrey", "snow", "steelblue", "tan", "teal", "tomato", "turquoise",
    "violet", "wheat", "white", "whitesmoke", "yellow", "yellowgreen",
];

const KEYWORDS: &[&str] = &["inherit", "initial", "unset", "revert", "none", "auto", "normal"];

/// What a property's value is checked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueCheck {
    /// Color literals (hex, functions, named colors)
    Color,
    /// Non-zero lengths of the given category
    Length(TokenCategory),
    /// Lengths plus colors (`border`, `outline`)
    Stroke,
    /// Numeric or keyword weights
    Weight,
    /// Any leftover text (font stacks, shadows, line heights)
    Whole(TokenCategory),
    /// Time values
    Duration,
}

fn rule_for(property: &str) -> Option<ValueCheck> {
    let rule = match property {
        "color" | "background" | "background-color" | "border-color" | "border-top-color"
        | "border-right-color" | "border-bottom-color" | "border-left-color" | "outline-color"
        | "fill" | "stroke" | "caret-color" | "accent-color" | "text-decoration-color"
        | "column-rule-color" => ValueCheck::Color,
        "padding" | "padding-top" | "padding-right" | "padding-bottom" | "padding-left"
        | "padding-inline" | "padding-block" | "margin" | "margin-top" | "margin-right"
        | "margin-bottom" | "margin-left" | "margin-inline" | "margin-block" | "gap" | "row-gap"
        | "column-gap" => ValueCheck::Length(TokenCategory::Spacing),
        "font-size" => ValueCheck::Length(TokenCategory::FontSize),
        "border-radius" | "border-top-left-radius" | "border-top-right-radius"
        | "border-bottom-left-radius" | "border-bottom-right-radius" => {
            ValueCheck::Length(TokenCategory::Radius)
        }
        "border-width" | "outline-width" => ValueCheck::Length(TokenCategory::BorderWidth),
        "border" | "border-top" | "border-right" | "border-bottom" | "border-left" | "outline" => {
            ValueCheck::Stroke
        }
        "font-weight" => ValueCheck::Weight,
        "font-family" | "font" => ValueCheck::Whole(TokenCategory::FontFamily),
        "line-height" => ValueCheck::Whole(TokenCategory::LineHeight),
        "box-shadow" | "text-shadow" => ValueCheck::Whole(TokenCategory::Shadow),
        "transition-duration" | "animation-duration" | "transition" | "animation" => ValueCheck::Duration,
        _ => return None,
    };
    Some(rule)
}

/// A literal found in a value, with the category whose token should replace it
#[derive(Debug, Clone, PartialEq, Eq)]
struct Literal {
    text: String,
    category: TokenCategory,
}

pub(super) fn check(
    component: &str,
    tsx: &TsxTree<'_>,
    css: &str,
    contract: &DesignSystemContract,
) -> Vec<Violation> {
    let mut out = Vec::new();
    check_stylesheet(component, css, contract, &mut out);
    check_source(component, tsx, contract, &mut out);

    let mut seen = Vec::new();
    out.retain(|v: &Violation| {
        let key = (v.kind, v.file, v.line, v.message.clone());
        if seen.contains(&key) {
            false
        } else {
            seen.push(key);
            true
        }
    });
    out
}

fn check_stylesheet(
    component: &str,
    css: &str,
    contract: &DesignSystemContract,
    out: &mut Vec<Violation>,
) {
    let Ok(sheet) = Stylesheet::parse(css) else {
        return;
    };

    sheet.walk(|_, decl| {
        let at = |v: Violation| v.at(SourceFile::Css, decl.line).attribute(decl.property.clone());
        undeclared_vars(component, &decl.value, contract)
            .into_iter()
            .for_each(|v| out.push(at(v)));

        if decl.property.starts_with("--") {
            out.push(at(Violation::new(
                ViolationKind::UndeclaredToken,
                component,
                format!(
                    "defines custom property '{}'; only contract tokens may be used",
                    decl.property
                ),
            )));
            return;
        }

        for literal in literals_in(&decl.property, &decl.value) {
            out.push(at(forbidden(component, &decl.property, &literal, contract)));
        }
    });

    for rule in sheet.all_rules().into_iter().filter(|r| r.is_media()) {
        for caps in LENGTH.captures_iter(&rule.prelude) {
            let length = &caps[1];
            if !has_unit(length) || is_zero(length) {
                continue;
            }
            if !contract.matches_literal(TokenCategory::Breakpoint, length) {
                out.push(
                    Violation::new(
                        ViolationKind::ForbiddenLiteral,
                        component,
                        format!("media query width '{}' is not a breakpoint token", length),
                    )
                    .at(SourceFile::Css, rule.line)
                    .attribute("@media"),
                );
            }
        }
    }
}

fn check_source(
    component: &str,
    tsx: &TsxTree<'_>,
    contract: &DesignSystemContract,
    out: &mut Vec<Violation>,
) {
    for node in tsx.of_kind(&["string", "template_string"]) {
        if node.parent().is_some_and(|p| p.kind() == "import_statement") {
            continue;
        }
        let text = tsx.text(node);
        let line_at = |offset: usize| tree::line(node) + text[..offset].matches('\n').count();

        for caps in VAR_REF.captures_iter(text) {
            if let Some(name) = caps.get(1).filter(|m| !contract.declares_var(m.as_str())) {
                out.push(
                    Violation::new(
                        ViolationKind::UndeclaredToken,
                        component,
                        format!("var({}) is not a declared token", name.as_str()),
                    )
                    .at(SourceFile::Tsx, line_at(name.start())),
                );
            }
        }

        let stripped = strip_vars(text);
        for found in HEX.find_iter(&stripped).chain(COLOR_FN.find_iter(&stripped)) {
            let literal = Literal {
                text: found.as_str().to_string(),
                category: TokenCategory::Color,
            };
            out.push(
                forbidden(component, "string", &literal, contract)
                    .at(SourceFile::Tsx, line_at(found.start())),
            );
        }
    }

    for (property, value, line) in style_entries(tsx) {
        for literal in literals_in(&property, &value) {
            out.push(
                forbidden(component, &property, &literal, contract)
                    .at(SourceFile::Tsx, line)
                    .attribute(format!("style.{}", property)),
            );
        }
    }
}

/// `(css-property, css value, line)` for each entry of an inline `style={{…}}`
fn style_entries(tsx: &TsxTree<'_>) -> Vec<(String, String, usize)> {
    let mut entries = Vec::new();
    for attribute in tsx.of_kind(&["jsx_attribute"]) {
        let parts = tree::named_children(attribute);
        let is_style = parts.first().is_some_and(|name| tsx.text(*name) == "style");
        let object = parts
            .get(1)
            .filter(|v| v.kind() == "jsx_expression")
            .and_then(|v| tree::named_children(*v).into_iter().next())
            .filter(|o| o.kind() == "object");
        let (true, Some(object)) = (is_style, object) else {
            continue;
        };

        for pair in tree::named_children(object).into_iter().filter(|p| p.kind() == "pair") {
            let (Some(key), Some(value)) =
                (pair.child_by_field_name("key"), pair.child_by_field_name("value"))
            else {
                continue;
            };
            let property = css_property(tsx.text(key).trim_matches(|c: char| c == '"' || c == '\''));
            let raw = tsx.text(value);
            let css_value = match value.kind() {
                "string" | "template_string" => match unquote(raw) {
                    Some(quoted) => quoted.to_string(),
                    None => continue,
                },
                "number" if !is_zero(raw) && px_property(&property) => format!("{}px", raw),
                _ => continue,
            };
            entries.push((property, css_value, tree::line(pair)));
        }
    }
    entries
}

fn forbidden(
    component: &str,
    property: &str,
    literal: &Literal,
    contract: &DesignSystemContract,
) -> Violation {
    let mut message = format!("literal '{}' in '{}'", literal.text, property);
    match contract.resolve(literal.category, &literal.text) {
        Some(token) => message.push_str(&format!("; use {}", token.css_ref())),
        None => message.push_str(&format!(
            "; no {} token has this value",
            literal.category.prefix()
        )),
    }
    Violation::new(ViolationKind::ForbiddenLiteral, component, message)
}

fn undeclared_vars(component: &str, value: &str, contract: &DesignSystemContract) -> Vec<Violation> {
    VAR_REF
        .captures_iter(value)
        .filter_map(|caps| caps.get(1))
        .filter(|m| !contract.declares_var(m.as_str()))
        .map(|m| {
            Violation::new(
                ViolationKind::UndeclaredToken,
                component,
                format!("var({}) is not a declared token", m.as_str()),
            )
        })
        .collect()
}

/// Literals in one declaration value that should have been tokens
fn literals_in(property: &str, value: &str) -> Vec<Literal> {
    let Some(rule) = rule_for(property) else {
        return Vec::new();
    };
    let value = strip_vars(value).replace("!important", "");
    let value = value.trim();
    if value.is_empty() || KEYWORDS.contains(&value.to_ascii_lowercase().as_str()) {
        return Vec::new();
    }

    let literal = |text: &str, category| Literal {
        text: text.to_string(),
        category,
    };
    match rule {
        ValueCheck::Color => colors_in(value),
        ValueCheck::Length(category) => lengths_in(value)
            .into_iter()
            .map(|l| literal(&l, category))
            .collect(),
        ValueCheck::Stroke => {
            let mut found: Vec<Literal> = lengths_in(value)
                .into_iter()
                .map(|l| literal(&l, TokenCategory::BorderWidth))
                .collect();
            found.extend(colors_in(value));
            found
        }
        ValueCheck::Weight => {
            let lowered = value.to_ascii_lowercase();
            if lowered.chars().any(|c| c.is_ascii_digit())
                || matches!(lowered.as_str(), "bold" | "bolder" | "lighter")
            {
                vec![literal(value, TokenCategory::FontWeight)]
            } else {
                Vec::new()
            }
        }
        ValueCheck::Whole(category) => {
            let rest: Vec<&str> = value
                .split_whitespace()
                .filter(|w| !KEYWORDS.contains(&w.to_ascii_lowercase().as_str()))
                .collect();
            if rest.is_empty() {
                Vec::new()
            } else {
                vec![literal(value, category)]
            }
        }
        ValueCheck::Duration => DURATION
            .find_iter(value)
            .filter(|m| !is_zero(m.as_str().trim_end_matches(['m', 's', 'M', 'S'])))
            .map(|m| literal(m.as_str(), TokenCategory::Duration))
            .collect(),
    }
}

fn colors_in(value: &str) -> Vec<Literal> {
    let color = |text: &str| Literal {
        text: text.to_string(),
        category: TokenCategory::Color,
    };
    let mut found: Vec<Literal> = HEX
        .find_iter(value)
        .chain(COLOR_FN.find_iter(value))
        .map(|m| color(m.as_str()))
        .collect();
    let without_functions = COLOR_FN.replace_all(value, " ");
    found.extend(
        WORD.find_iter(&without_functions)
            .filter(|w| NAMED_COLORS.contains(&w.as_str().to_ascii_lowercase().as_str()))
            .map(|w| color(w.as_str())),
    );
    found
}

fn lengths_in(value: &str) -> Vec<String> {
    let without_functions = COLOR_FN.replace_all(value, " ");
    LENGTH
        .captures_iter(&without_functions)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|l| has_unit(l) && !is_zero(l))
        .collect()
}

fn has_unit(length: &str) -> bool {
    length.chars().last().is_some_and(|c| c.is_ascii_alphabetic())
}

fn is_zero(number: &str) -> bool {
    let digits: String = number
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    digits.parse::<f64>().is_ok_and(|n| n == 0.0)
}

/// Remove `var(--name)` references, keeping any fallback text for inspection
fn strip_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(start) = rest.find("var(") {
        out.push_str(&rest[..start]);
        let inner_start = start + 4;
        let mut depth = 1usize;
        let mut end = rest.len();
        for (i, c) in rest[inner_start..].char_indices() {
            match c {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        end = inner_start + i;
                        break;
                    }
                }
                _ => {}
            }
        }
        let inner = &rest[inner_start..end];
        let fallback = source::split_top_level(inner)
            .into_iter()
            .skip(1)
            .collect::<Vec<_>>()
            .join(",");
        // Keep offsets stable for callers that report positions.
        out.push_str(&" ".repeat(4 + inner.len() - fallback.len()));
        out.push_str(&fallback);
        if end < rest.len() {
            out.push(' ');
            rest = &rest[end + 1..];
        } else {
            rest = "";
        }
    }
    out.push_str(rest);
    out
}

fn unquote(value: &str) -> Option<&str> {
    let value = value.trim().trim_end_matches(',');
    ['"', '\'', '`'].iter().find_map(|q| {
        value
            .strip_prefix(*q)
            .and_then(|v| v.strip_suffix(*q))
    })
}

/// `backgroundColor` → `background-color`
fn css_property(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for c in key.chars() {
        if c.is_ascii_uppercase() {
            out.push('-');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Properties where React turns a bare number into pixels
fn px_property(property: &str) -> bool {
    matches!(
        rule_for(property),
        Some(ValueCheck::Length(_)) | Some(ValueCheck::Stroke)
    )
}
