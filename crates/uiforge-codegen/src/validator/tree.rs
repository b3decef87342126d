//! TSX syntax trees
//!
//! A unit is parsed once with the tree-sitter TSX grammar and every check
//! walks the same tree. tree-sitter recovers from errors, so a tree exists
//! even for broken source; malformed regions appear as `ERROR` and `MISSING`
//! nodes.

use tree_sitter::{Node, Parser, Tree};

/// Parsed TSX source
pub struct TsxTree<'s> {
    source: &'s str,
    tree: Tree,
}

impl<'s> TsxTree<'s> {
    /// Parse `source` with the TSX grammar
    pub fn parse(source: &'s str) -> Result<Self, String> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_typescript::LANGUAGE_TSX.into())
            .map_err(|e| format!("TSX grammar unavailable: {}", e))?;
        let tree = parser
            .parse(source, None)
            .ok_or_else(|| "TSX parser produced no tree".to_string())?;
        Ok(Self { source, tree })
    }

    /// Source the tree was parsed from
    pub fn source(&self) -> &'s str {
        self.source
    }

    /// Root node
    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    /// Source text covered by `node`
    pub fn text(&self, node: Node<'_>) -> &'s str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }

    /// Every node in document order
    pub fn nodes(&self) -> Vec<Node<'_>> {
        descendants(self.root())
    }

    /// Nodes of any of the given kinds, in document order
    pub fn of_kind(&self, kinds: &[&str]) -> Vec<Node<'_>> {
        self.nodes()
            .into_iter()
            .filter(|n| kinds.contains(&n.kind()))
            .collect()
    }
}

/// 1-based line a node starts on
pub fn line(node: Node<'_>) -> usize {
    node.start_position().row + 1
}

/// `node` and everything below it, in document order
pub fn descendants(node: Node<'_>) -> Vec<Node<'_>> {
    let mut out = Vec::new();
    let mut cursor = node.walk();
    loop {
        out.push(cursor.node());
        if cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return out;
            }
        }
    }
}

/// Named children of `node`
pub fn named_children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

/// True if `node` has an anonymous child token spelled `token`
pub fn has_token(node: Node<'_>, token: &str) -> bool {
    let mut cursor = node.walk();
    node.children(&mut cursor)
        .any(|c| !c.is_named() && c.kind() == token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_walk() {
        let tree = TsxTree::parse("const a: number = 1;\nexport function B() {\n  return <div />;\n}\n")
            .unwrap();
        assert!(!tree.root().has_error());
        let elements = tree.of_kind(&["jsx_self_closing_element"]);
        assert_eq!(elements.len(), 1);
        assert_eq!(line(elements[0]), 3);
        assert_eq!(tree.text(elements[0]), "<div />");
    }

    #[test]
    fn test_broken_source_still_yields_a_tree() {
        let tree = TsxTree::parse("const x = ;").unwrap();
        assert!(tree.root().has_error());
    }
}
