//! List design tokens command

use anyhow::{Context, Result};
use std::path::Path;

use uiforge_core::design::TokenCategory;

use super::load_config;

/// Run the tokens command
pub fn run(config_path: &Path, category: Option<&str>) -> Result<()> {
    let config = load_config(config_path)?;
    let contract = config.load_contract().context("Failed to load design system")?;

    let wanted = match category {
        Some(name) => Some(parse_category(name)?),
        None => None,
    };

    println!("{} ({} tokens)", contract.name(), contract.len());
    for token in contract.tokens() {
        if wanted.is_some_and(|c| c != token.category) {
            continue;
        }
        println!("  {:<32} {}", token.css_var(), token.value.css());
    }
    Ok(())
}

fn parse_category(name: &str) -> Result<TokenCategory> {
    let normalized = name.trim().to_ascii_lowercase().replace('_', "-");
    TokenCategory::ALL
        .into_iter()
        .find(|c| c.prefix() == normalized)
        .with_context(|| {
            let known: Vec<&str> = TokenCategory::ALL.iter().map(|c| c.prefix()).collect();
            format!("Unknown token category '{}' (expected one of {})", name, known.join(", "))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("color", TokenCategory::Color)]
    #[case("font_size", TokenCategory::FontSize)]
    #[case("Border-Width", TokenCategory::BorderWidth)]
    fn test_parse_category(#[case] name: &str, #[case] expected: TokenCategory) {
        assert_eq!(parse_category(name).unwrap(), expected);
    }

    #[test]
    fn test_unknown_category() {
        assert!(parse_category("sparkle").is_err());
    }
}
