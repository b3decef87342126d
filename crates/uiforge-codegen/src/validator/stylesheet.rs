//! Minimal CSS structure parser
//!
//! Enough of CSS to check well-formedness and walk declarations: rules,
//! nested rules, at-rules with blocks, and `@import`-style statements.

/// A `property: value` pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    /// Lowercased property name
    pub property: String,
    /// Raw value text
    pub value: String,
    /// 1-based line
    pub line: usize,
}

/// A rule or at-rule block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    /// Selector or at-rule prelude (`.counter`, `@media (max-width: 640px)`)
    pub prelude: String,
    /// 1-based line of the prelude
    pub line: usize,
    /// Declarations directly inside the block
    pub declarations: Vec<Declaration>,
    /// Nested blocks
    pub children: Vec<Rule>,
}

impl Rule {
    /// True for `@media` blocks
    pub fn is_media(&self) -> bool {
        self.prelude.starts_with("@media")
    }
}

/// A parse problem with its line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CssError {
    /// 1-based line
    pub line: usize,
    /// Description
    pub message: String,
}

/// Parsed stylesheet
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stylesheet {
    /// Top-level blocks
    pub rules: Vec<Rule>,
}

impl Stylesheet {
    /// Parse CSS text, collecting every structural error
    pub fn parse(css: &str) -> Result<Self, Vec<CssError>> {
        let text = strip_comments(css);
        let mut parser = Parser {
            text: &text,
            pos: 0,
            errors: Vec::new(),
        };
        let (declarations, rules, closed) = parser.block(0);

        for decl in declarations {
            parser.errors.push(CssError {
                line: decl.line,
                message: format!("declaration '{}' outside of any rule", decl.property),
            });
        }
        if closed {
            parser.errors.push(CssError {
                line: parser.line(),
                message: "unexpected '}'".to_string(),
            });
        }

        if parser.errors.is_empty() {
            Ok(Self { rules })
        } else {
            Err(parser.errors)
        }
    }

    /// Visit every declaration with the preludes of its enclosing blocks
    pub fn walk<'a>(&'a self, mut visit: impl FnMut(&[&'a Rule], &'a Declaration)) {
        fn go<'a>(
            rule: &'a Rule,
            stack: &mut Vec<&'a Rule>,
            visit: &mut impl FnMut(&[&'a Rule], &'a Declaration),
        ) {
            stack.push(rule);
            for decl in &rule.declarations {
                visit(stack.as_slice(), decl);
            }
            for child in &rule.children {
                go(child, stack, visit);
            }
            stack.pop();
        }

        let mut stack = Vec::new();
        for rule in &self.rules {
            go(rule, &mut stack, &mut visit);
        }
    }

    /// Every block, depth first
    pub fn all_rules(&self) -> Vec<&Rule> {
        fn go<'a>(rule: &'a Rule, out: &mut Vec<&'a Rule>) {
            out.push(rule);
            for child in &rule.children {
                go(child, out);
            }
        }
        let mut out = Vec::new();
        for rule in &self.rules {
            go(rule, &mut out);
        }
        out
    }
}

struct Parser<'a> {
    text: &'a str,
    pos: usize,
    errors: Vec<CssError>,
}

impl Parser<'_> {
    fn line(&self) -> usize {
        super::source::line_of(self.text, self.pos)
    }

    /// Parse items until `}` (returns closed = true) or end of input.
    fn block(&mut self, depth: usize) -> (Vec<Declaration>, Vec<Rule>, bool) {
        let mut declarations = Vec::new();
        let mut rules = Vec::new();

        loop {
            let segment_start = self.pos;
            let stop = self.text[self.pos..].find(['{', '}', ';']).map(|i| self.pos + i);
            let Some(stop) = stop else {
                let rest = self.text[segment_start..].trim();
                if !rest.is_empty() {
                    self.errors.push(CssError {
                        line: self.line_at_content(segment_start),
                        message: format!("unterminated text '{}'", truncate(rest)),
                    });
                }
                if depth > 0 {
                    self.errors.push(CssError {
                        line: super::source::line_of(self.text, self.text.len()),
                        message: "unclosed block at end of stylesheet".to_string(),
                    });
                }
                self.pos = self.text.len();
                return (declarations, rules, false);
            };

            let segment = &self.text[segment_start..stop];
            let line = self.line_at_content(segment_start);
            let delimiter = self.text.as_bytes()[stop];
            self.pos = stop + 1;

            match delimiter {
                b'{' => {
                    let prelude = segment.trim().to_string();
                    if prelude.is_empty() {
                        self.errors.push(CssError {
                            line,
                            message: "block without a selector".to_string(),
                        });
                    }
                    let (decls, children, closed) = self.block(depth + 1);
                    if !closed {
                        return (declarations, rules, false);
                    }
                    rules.push(Rule {
                        prelude,
                        line,
                        declarations: decls,
                        children,
                    });
                }
                b';' => {
                    let trimmed = segment.trim();
                    if trimmed.starts_with('@') && depth == 0 {
                        continue;
                    }
                    if let Some(decl) = self.declaration(trimmed, line) {
                        declarations.push(decl);
                    }
                }
                _ => {
                    let trimmed = segment.trim();
                    if let Some(decl) = self.declaration(trimmed, line) {
                        declarations.push(decl);
                    }
                    return (declarations, rules, true);
                }
            }
        }
    }

    fn declaration(&mut self, text: &str, line: usize) -> Option<Declaration> {
        if text.is_empty() {
            return None;
        }
        let Some((property, value)) = text.split_once(':') else {
            self.errors.push(CssError {
                line,
                message: format!("'{}' is not a declaration", truncate(text)),
            });
            return None;
        };
        let property = property.trim().to_ascii_lowercase();
        let value = value.trim();
        let valid_name = property
            .trim_start_matches('-')
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic())
            && property.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
        if !valid_name {
            self.errors.push(CssError {
                line,
                message: format!("invalid property name '{}'", property),
            });
            return None;
        }
        if value.is_empty() {
            self.errors.push(CssError {
                line,
                message: format!("property '{}' has no value", property),
            });
            return None;
        }
        Some(Declaration {
            property,
            value: value.to_string(),
            line,
        })
    }

    fn line_at_content(&self, from: usize) -> usize {
        let skipped = self.text[from..]
            .find(|c: char| !c.is_whitespace())
            .unwrap_or(0);
        super::source::line_of(self.text, from + skipped)
    }
}

fn truncate(text: &str) -> String {
    let mut out: String = text.chars().take(40).collect();
    if text.chars().count() > 40 {
        out.push('…');
    }
    out
}

fn strip_comments(css: &str) -> String {
    let mut out = String::with_capacity(css.len());
    let mut rest = css;
    while let Some(open) = rest.find("/*") {
        out.push_str(&rest[..open]);
        let after = &rest[open..];
        let close = after.find("*/").map_or(after.len(), |c| c + 2);
        for ch in after[..close].chars() {
            if ch == '\n' {
                out.push('\n');
            } else {
                out.extend(std::iter::repeat_n(' ', ch.len_utf8()));
            }
        }
        rest = &after[close..];
    }
    out.push_str(rest);
    out
}
