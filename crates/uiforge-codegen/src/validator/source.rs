//! Text helpers shared by the checks

/// 1-based line of a byte offset
pub fn line_of(src: &str, offset: usize) -> usize {
    src.as_bytes()[..offset.min(src.len())]
        .iter()
        .filter(|b| **b == b'\n')
        .count()
        + 1
}

/// Split at commas not nested in brackets
pub fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    let mut prev = ' ';
    for (i, c) in text.char_indices() {
        match c {
            '(' | '[' | '{' | '<' => depth += 1,
            '>' if prev == '=' => {}
            ')' | ']' | '}' | '>' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
        prev = c;
    }
    parts.push(&text[start..]);
    parts
}

/// Collapse whitespace and quote style so type spellings compare equal
pub fn normalize_type(ty: &str) -> String {
    let mut out: String = ty
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == '\'' { '"' } else { c })
        .collect();
    while out.ends_with(';') || out.ends_with(',') {
        out.pop();
    }
    if let Some(inner) = out.strip_prefix("Array<").and_then(|s| s.strip_suffix('>')) {
        out = if inner.contains('|') {
            format!("({})[]", inner)
        } else {
            format!("{}[]", inner)
        };
    }
    out
}
