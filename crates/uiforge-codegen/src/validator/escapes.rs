//! Check (d): no untyped escape hatches

use once_cell::sync::Lazy;
use regex::Regex;

use super::tree::{self, TsxTree};
use crate::ir::{SourceFile, Violation, ViolationKind};

static DIRECTIVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@ts-(?:ignore|nocheck|expect-error)\b").expect("valid regex"));

pub(super) fn check(component: &str, tsx: &TsxTree<'_>) -> Vec<Violation> {
    let escape = |message: String, line: usize| {
        Violation::new(ViolationKind::MissingType, component, message)
            .at(SourceFile::Tsx, line)
            .attribute("escape")
    };
    let mut out = Vec::new();

    for node in tsx.nodes() {
        match node.kind() {
            "comment" => {
                let text = tsx.text(node);
                for found in DIRECTIVE.find_iter(text) {
                    let line = tree::line(node) + text[..found.start()].matches('\n').count();
                    out.push(escape(
                        format!("type checking suppressed with '{}'", found.as_str()),
                        line,
                    ));
                }
            }
            "predefined_type" if tsx.text(node) == "any" => {
                out.push(escape("untyped escape hatch 'any'".to_string(), tree::line(node)));
            }
            "as_expression" if is_double_cast(tsx, node) => {
                out.push(escape(
                    "untyped escape hatch 'as unknown as'".to_string(),
                    tree::line(node),
                ));
            }
            _ => {}
        }
    }
    out
}

/// `value as unknown as T`
fn is_double_cast(tsx: &TsxTree<'_>, node: tree_sitter::Node<'_>) -> bool {
    tree::named_children(node)
        .first()
        .filter(|inner| inner.kind() == "as_expression")
        .and_then(|inner| tree::named_children(*inner).last().copied())
        .is_some_and(|ty| tsx.text(ty) == "unknown")
}
