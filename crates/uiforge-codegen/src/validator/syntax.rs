//! Check (a): structural well-formedness of the TSX and CSS

use tree_sitter::Node;

use super::stylesheet::Stylesheet;
use super::tree::{self, TsxTree};
use crate::ir::{SourceFile, Violation, ViolationKind};

pub(super) fn check(component: &str, tsx: &TsxTree<'_>, css: &str) -> Vec<Violation> {
    let mut out = Vec::new();
    let violation = |message: String, file: SourceFile, line: usize| {
        Violation::new(ViolationKind::Syntax, component, message).at(file, line)
    };

    if tsx.source().trim().is_empty() {
        out.push(violation("missing component source".to_string(), SourceFile::Tsx, 1));
    } else {
        for node in parse_errors(tsx) {
            out.push(violation(describe(tsx, node), SourceFile::Tsx, tree::line(node)));
        }
        for (message, line) in tag_mismatches(tsx) {
            out.push(violation(message, SourceFile::Tsx, line));
        }
        if !exports(tsx, component) {
            out.push(violation(
                format!("does not export a component named '{}'", component),
                SourceFile::Tsx,
                1,
            ));
        }
    }

    if let Err(errors) = Stylesheet::parse(css) {
        out.extend(
            errors
                .into_iter()
                .map(|e| violation(e.message, SourceFile::Css, e.line)),
        );
    }
    out
}

/// Outermost `ERROR` nodes and every `MISSING` node
fn parse_errors<'t>(tsx: &'t TsxTree<'_>) -> Vec<Node<'t>> {
    let mut found = Vec::new();
    let mut cursor = tsx.root().walk();
    loop {
        let node = cursor.node();
        let descend = if node.is_error() || node.is_missing() {
            found.push(node);
            false
        } else {
            node.has_error()
        };
        if descend && cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return found;
            }
        }
    }
}

fn describe(tsx: &TsxTree<'_>, node: Node<'_>) -> String {
    if node.is_missing() {
        return format!("expected '{}'", node.kind());
    }
    let snippet: String = tsx
        .text(node)
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("")
        .chars()
        .take(40)
        .collect();
    if snippet.is_empty() {
        "unexpected end of input".to_string()
    } else {
        format!("cannot parse '{}'", snippet)
    }
}

/// JSX elements whose closing tag names a different element
fn tag_mismatches(tsx: &TsxTree<'_>) -> Vec<(String, usize)> {
    let name_of = |tag: Option<Node<'_>>| {
        tag.and_then(|t| t.child_by_field_name("name"))
            .map(|n| tsx.text(n))
            .unwrap_or("")
    };
    tsx.of_kind(&["jsx_element"])
        .into_iter()
        .filter_map(|element| {
            let close_tag = element.child_by_field_name("close_tag")?;
            if close_tag.is_missing() {
                return None;
            }
            let open = name_of(element.child_by_field_name("open_tag"));
            let close = name_of(Some(close_tag));
            (open != close).then(|| {
                let shown = if open.is_empty() { "<>".to_string() } else { format!("<{}>", open) };
                (
                    format!("closing tag </{}> does not match {}", close, shown),
                    tree::line(close_tag),
                )
            })
        })
        .collect()
}

/// True if the module exports a binding named `component`
fn exports(tsx: &TsxTree<'_>, component: &str) -> bool {
    tsx.of_kind(&["export_statement"]).into_iter().any(|export| {
        let declared = ["declaration", "value"]
            .iter()
            .filter_map(|field| export.child_by_field_name(field))
            .any(|node| declares(tsx, node, component));
        let listed = tree::descendants(export)
            .into_iter()
            .filter(|n| n.kind() == "export_specifier")
            .any(|spec| {
                let exported = spec
                    .child_by_field_name("alias")
                    .or_else(|| spec.child_by_field_name("name"));
                exported.is_some_and(|n| tsx.text(n) == component)
            });
        declared || listed
    })
}

fn declares(tsx: &TsxTree<'_>, node: Node<'_>, component: &str) -> bool {
    match node.kind() {
        "identifier" => tsx.text(node) == component,
        "lexical_declaration" | "variable_declaration" => tree::named_children(node)
            .into_iter()
            .filter(|d| d.kind() == "variable_declarator")
            .filter_map(|d| d.child_by_field_name("name"))
            .any(|n| tsx.text(n) == component),
        _ => node
            .child_by_field_name("name")
            .is_some_and(|n| tsx.text(n) == component),
    }
}
