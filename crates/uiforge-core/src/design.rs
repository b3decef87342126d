//! Design-system contract
//!
//! The contract is the closed vocabulary of design tokens generated code may
//! reference. It is loaded once per run, never mutated, and passed explicitly
//! (usually as `Arc<DesignSystemContract>`) to every stage that needs it.
//!
//! # Definition file
//!
//! ```yaml
//! name: Quantum
//! colors:
//!   bluegrey-900: "#131319"
//! semantic_colors:
//!   primary-default: "#041295"
//! spacing:
//!   md: 16px
//! typography:
//!   font_sizes: { body: 16px }
//!   font_weights: { medium: 500 }
//! radius:
//!   md: 8px
//! ```
//!
//! Every entry becomes a token with id `<category>-<key>`, e.g.
//! `color-primary-default` or `spacing-md`, exposed to CSS as `var(--<id>)`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{Error, Result};
use crate::fingerprint::Fingerprint;

/// Kind of design value a token carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenCategory {
    /// Palette and semantic colors
    Color,
    /// Margin, padding and gap steps
    Spacing,
    /// Type scale
    FontSize,
    /// Font weights
    FontWeight,
    /// Font family stacks
    FontFamily,
    /// Line heights
    LineHeight,
    /// Border radii
    Radius,
    /// Box shadows
    Shadow,
    /// Responsive breakpoints
    Breakpoint,
    /// Animation durations
    Duration,
    /// Border widths
    BorderWidth,
}

impl TokenCategory {
    /// Every category, in id-prefix order
    pub const ALL: [TokenCategory; 11] = [
        TokenCategory::Color,
        TokenCategory::Spacing,
        TokenCategory::FontSize,
        TokenCategory::FontWeight,
        TokenCategory::FontFamily,
        TokenCategory::LineHeight,
        TokenCategory::Radius,
        TokenCategory::Shadow,
        TokenCategory::Breakpoint,
        TokenCategory::Duration,
        TokenCategory::BorderWidth,
    ];

    /// Prefix used in token ids and CSS custom property names
    pub fn prefix(self) -> &'static str {
        match self {
            TokenCategory::Color => "color",
            TokenCategory::Spacing => "spacing",
            TokenCategory::FontSize => "font-size",
            TokenCategory::FontWeight => "font-weight",
            TokenCategory::FontFamily => "font-family",
            TokenCategory::LineHeight => "line-height",
            TokenCategory::Radius => "radius",
            TokenCategory::Shadow => "shadow",
            TokenCategory::Breakpoint => "breakpoint",
            TokenCategory::Duration => "duration",
            TokenCategory::BorderWidth => "border-width",
        }
    }
}

/// Typed token value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum TokenValue {
    /// Any CSS color (`#041295`, `rgba(...)`)
    Color(String),
    /// A CSS length (`16px`, `1.5rem`)
    Length(String),
    /// A font family stack
    Font(String),
    /// A numeric font weight
    Weight(u16),
    /// A unitless scalar (line heights)
    Scalar(String),
    /// A box-shadow value
    Shadow(String),
    /// A CSS time (`150ms`)
    Duration(String),
}

impl TokenValue {
    /// CSS text of the value
    pub fn css(&self) -> String {
        match self {
            TokenValue::Weight(w) => w.to_string(),
            TokenValue::Color(s)
            | TokenValue::Length(s)
            | TokenValue::Font(s)
            | TokenValue::Scalar(s)
            | TokenValue::Shadow(s)
            | TokenValue::Duration(s) => s.clone(),
        }
    }

    fn normalized(&self) -> String {
        normalize_literal(&self.css())
    }
}

/// A named, typed, immutable design value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Stable identifier, e.g. `color-danger-default`
    pub id: String,
    /// Token category
    pub category: TokenCategory,
    /// Typed value
    pub value: TokenValue,
}

impl Token {
    /// CSS custom property name (`--color-danger-default`)
    pub fn css_var(&self) -> String {
        format!("--{}", self.id)
    }

    /// CSS reference (`var(--color-danger-default)`)
    pub fn css_ref(&self) -> String {
        format!("var(--{})", self.id)
    }
}

/// The closed set of design tokens for one generation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesignSystemContract {
    name: String,
    tokens: BTreeMap<String, Token>,
    fingerprint: Fingerprint,
}

impl DesignSystemContract {
    /// Build a contract from a definition, rejecting malformed entries
    pub fn from_definition(definition: DesignSystemDefinition) -> Result<Self> {
        let name = definition.name.clone();
        let invalid = |message: String| Error::DesignSystemInvalid {
            name: name.clone(),
            message,
        };

        if name.trim().is_empty() {
            return Err(invalid("design system name must not be empty".to_string()));
        }

        let mut tokens = BTreeMap::new();
        for (category, key, value) in definition.entries() {
            let key = key.trim().replace('_', "-").to_lowercase();
            if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
                return Err(invalid(format!(
                    "token key '{}' in {} must be alphanumeric",
                    key,
                    category.prefix()
                )));
            }
            if value.css().trim().is_empty() {
                return Err(invalid(format!(
                    "token '{}-{}' has an empty value",
                    category.prefix(),
                    key
                )));
            }
            let id = format!("{}-{}", category.prefix(), key);
            if tokens.contains_key(&id) {
                return Err(invalid(format!("duplicate token id '{}'", id)));
            }
            tokens.insert(
                id.clone(),
                Token {
                    id,
                    category,
                    value,
                },
            );
        }

        if tokens.is_empty() {
            return Err(invalid("design system defines no tokens".to_string()));
        }

        let fingerprint = Fingerprint::of_parts(
            std::iter::once(name.clone()).chain(
                tokens
                    .values()
                    .map(|t| format!("{}={}", t.id, t.value.css())),
            ),
        );

        Ok(Self {
            name,
            tokens,
            fingerprint,
        })
    }

    /// Load a contract from a YAML or JSON definition file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let contents = std::fs::read_to_string(path)?;
        let definition: DesignSystemDefinition =
            if path.extension().is_some_and(|ext| ext == "json") {
                serde_json::from_str(&contents)?
            } else {
                serde_yaml::from_str(&contents)?
            };

        tracing::debug!("Loaded design system '{}' from {}", definition.name, path.display());
        Self::from_definition(definition)
    }

    /// The built-in default contract
    pub fn builtin() -> Self {
        // The built-in definition is static and always well-formed.
        match Self::from_definition(DesignSystemDefinition::builtin()) {
            Ok(contract) => contract,
            Err(e) => unreachable!("built-in design system is invalid: {e}"),
        }
    }

    /// Design system name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fingerprint over every token id and value
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// Number of tokens
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// True when the contract has no tokens (never true for a built contract)
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Look up a token by id
    pub fn get(&self, id: &str) -> Option<&Token> {
        self.tokens.get(id)
    }

    /// All tokens ordered by id
    pub fn tokens(&self) -> impl Iterator<Item = &Token> {
        self.tokens.values()
    }

    /// Tokens of one category ordered by id
    pub fn by_category(&self, category: TokenCategory) -> impl Iterator<Item = &Token> {
        self.tokens.values().filter(move |t| t.category == category)
    }

    /// True if `--name` is a declared token custom property
    pub fn declares_var(&self, var_name: &str) -> bool {
        var_name
            .strip_prefix("--")
            .is_some_and(|id| self.tokens.contains_key(id))
    }

    /// Resolve a requested style value to a token of `category`.
    ///
    /// Accepts a full token id (`color-danger-default`), an id without its
    /// category prefix (`danger-default`), a CSS reference
    /// (`var(--color-danger-default)`), or the token's literal value
    /// (`#E01E00`).
    pub fn resolve(&self, category: TokenCategory, requested: &str) -> Option<&Token> {
        let requested = requested.trim();
        let bare = requested
            .strip_prefix("var(--")
            .and_then(|s| s.strip_suffix(')'))
            .or_else(|| requested.strip_prefix("--"))
            .unwrap_or(requested)
            .to_lowercase();

        let by_id = self
            .tokens
            .get(&bare)
            .or_else(|| self.tokens.get(&format!("{}-{}", category.prefix(), bare)))
            .filter(|t| t.category == category);
        if by_id.is_some() {
            return by_id;
        }

        let literal = normalize_literal(requested);
        self.by_category(category)
            .find(|t| t.value.normalized() == literal)
    }

    /// True if a literal value equals some token value of `category`
    pub fn matches_literal(&self, category: TokenCategory, literal: &str) -> bool {
        let literal = normalize_literal(literal);
        self.by_category(category)
            .any(|t| t.value.normalized() == literal)
    }
}

fn normalize_literal(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}

/// Typography section of a design-system definition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypographyDefinition {
    /// Font sizes (`h1`, `body`, `caption`, ...)
    #[serde(default)]
    pub font_sizes: BTreeMap<String, String>,
    /// Font weights (`regular`, `bold`, ...)
    #[serde(default)]
    pub font_weights: BTreeMap<String, u16>,
    /// Font family stacks (`heading`, `body`, `mono`)
    #[serde(default)]
    pub font_families: BTreeMap<String, String>,
    /// Line heights (`tight`, `normal`, `relaxed`)
    #[serde(default)]
    pub line_heights: BTreeMap<String, String>,
}

/// On-disk shape of a design system
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DesignSystemDefinition {
    /// Design system name
    pub name: String,
    /// Palette colors
    #[serde(default)]
    pub colors: BTreeMap<String, String>,
    /// Semantic colors (primary, success, danger, ...)
    #[serde(default)]
    pub semantic_colors: BTreeMap<String, String>,
    /// Spacing scale
    #[serde(default)]
    pub spacing: BTreeMap<String, String>,
    /// Typography
    #[serde(default)]
    pub typography: TypographyDefinition,
    /// Border radii
    #[serde(default)]
    pub radius: BTreeMap<String, String>,
    /// Box shadows
    #[serde(default)]
    pub shadows: BTreeMap<String, String>,
    /// Breakpoints
    #[serde(default)]
    pub breakpoints: BTreeMap<String, String>,
    /// Animation durations
    #[serde(default)]
    pub durations: BTreeMap<String, String>,
    /// Border widths
    #[serde(default)]
    pub border_widths: BTreeMap<String, String>,
}

impl DesignSystemDefinition {
    fn entries(self) -> Vec<(TokenCategory, String, TokenValue)> {
        let mut out = Vec::new();
        let mut push = |category: TokenCategory,
                        map: BTreeMap<String, String>,
                        wrap: fn(String) -> TokenValue| {
            for (key, value) in map {
                out.push((category, key, wrap(value)));
            }
        };

        push(TokenCategory::Color, self.colors, TokenValue::Color);
        push(TokenCategory::Color, self.semantic_colors, TokenValue::Color);
        push(TokenCategory::Spacing, self.spacing, TokenValue::Length);
        push(TokenCategory::FontSize, self.typography.font_sizes, TokenValue::Length);
        push(TokenCategory::FontFamily, self.typography.font_families, TokenValue::Font);
        push(TokenCategory::LineHeight, self.typography.line_heights, TokenValue::Scalar);
        push(TokenCategory::Radius, self.radius, TokenValue::Length);
        push(TokenCategory::Shadow, self.shadows, TokenValue::Shadow);
        push(TokenCategory::Breakpoint, self.breakpoints, TokenValue::Length);
        push(TokenCategory::Duration, self.durations, TokenValue::Duration);
        push(TokenCategory::BorderWidth, self.border_widths, TokenValue::Length);

        for (key, weight) in self.typography.font_weights {
            out.push((TokenCategory::FontWeight, key, TokenValue::Weight(weight)));
        }
        out
    }

    /// The built-in definition (Quantum palette, 4px spacing grid)
    pub fn builtin() -> Self {
        fn map(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        }

        Self {
            name: "Quantum".to_string(),
            colors: map(&[
                ("white", "#FFFFFF"),
                ("bluegrey-25", "#FAFAFC"),
                ("bluegrey-50", "#F7F7F9"),
                ("bluegrey-100", "#EEEFF3"),
                ("bluegrey-200", "#BCBECE"),
                ("bluegrey-300", "#9A9DB5"),
                ("bluegrey-500", "#5D607E"),
                ("bluegrey-700", "#383A4B"),
                ("bluegrey-900", "#131319"),
            ]),
            semantic_colors: map(&[
                ("primary-default", "#041295"),
                ("primary-hover", "#020B59"),
                ("neutral-default", "#383A4B"),
                ("success-default", "#178244"),
                ("success-bg", "#E8F3ED"),
                ("success-text", "#0E4E29"),
                ("warning-default", "#E07900"),
                ("warning-bg", "#FCF2E6"),
                ("warning-text", "#864900"),
                ("danger-default", "#E01E00"),
                ("danger-bg", "#FCE9E6"),
                ("danger-text", "#861200"),
                ("info-default", "#041295"),
                ("info-bg", "#E6E7F4"),
                ("info-text", "#020B59"),
                ("focused", "#6871BF"),
            ]),
            spacing: map(&[
                ("xs", "4px"),
                ("sm", "8px"),
                ("md", "16px"),
                ("lg", "24px"),
                ("xl", "32px"),
                ("xxl", "48px"),
                ("xxxl", "64px"),
            ]),
            typography: TypographyDefinition {
                font_sizes: map(&[
                    ("h1", "48px"),
                    ("h2", "36px"),
                    ("h3", "28px"),
                    ("h4", "24px"),
                    ("h5", "20px"),
                    ("h6", "18px"),
                    ("body-large", "18px"),
                    ("body", "16px"),
                    ("body-small", "14px"),
                    ("caption", "12px"),
                ]),
                font_weights: [
                    ("light", 300),
                    ("regular", 400),
                    ("medium", 500),
                    ("semibold", 600),
                    ("bold", 700),
                ]
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
                font_families: map(&[
                    ("heading", "'Inter', -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif"),
                    ("body", "'Inter', -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif"),
                    ("mono", "'Monaco', 'Courier New', monospace"),
                ]),
                line_heights: map(&[("tight", "1.25"), ("normal", "1.5"), ("relaxed", "1.75")]),
            },
            radius: map(&[
                ("none", "0px"),
                ("sm", "4px"),
                ("md", "8px"),
                ("lg", "16px"),
                ("xl", "24px"),
                ("full", "9999px"),
            ]),
            shadows: map(&[
                ("sm", "0 1px 2px rgba(0,0,0,0.05)"),
                ("md", "0 4px 6px rgba(0,0,0,0.1)"),
                ("lg", "0 10px 15px rgba(0,0,0,0.1)"),
                ("xl", "0 20px 25px rgba(0,0,0,0.15)"),
            ]),
            breakpoints: map(&[
                ("sm", "640px"),
                ("md", "768px"),
                ("lg", "1024px"),
                ("xl", "1280px"),
            ]),
            durations: map(&[("fast", "150ms"), ("normal", "300ms"), ("slow", "500ms")]),
            border_widths: map(&[("thin", "1px"), ("medium", "2px"), ("thick", "4px")]),
        }
    }
}
