//! Placeholder scanning for SQL templates.
//!
//! Only markers outside string literals, quoted identifiers, comments and
//! `$$` blocks count. A `?` inside `'what?'` is text, not a placeholder.

use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Positional,
    Named(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(sql: &str) -> Self {
        let bytes = sql.as_bytes();
        let mut segments = Vec::new();
        let mut text_start = 0;
        let mut idx = 0;

        while idx < bytes.len() {
            match bytes[idx] {
                b'\'' => idx = skip_quoted(bytes, idx, b'\''),
                b'"' => idx = skip_quoted(bytes, idx, b'"'),
                b'-' if bytes.get(idx + 1) == Some(&b'-') => {
                    idx = find(bytes, idx + 2, b"\n").map_or(bytes.len(), |end| end + 1);
                }
                b'/' if bytes.get(idx + 1) == Some(&b'*') => {
                    idx = find(bytes, idx + 2, b"*/").map_or(bytes.len(), |end| end + 2);
                }
                b'$' if bytes.get(idx + 1) == Some(&b'$') => {
                    idx = find(bytes, idx + 2, b"$$").map_or(bytes.len(), |end| end + 2);
                }
                b'?' => {
                    push_text(&mut segments, &sql[text_start..idx]);
                    segments.push(Segment::Positional);
                    idx += 1;
                    text_start = idx;
                }
                b':' if starts_named(bytes, idx) => {
                    let name_start = idx + 1;
                    let mut end = name_start;
                    while end < bytes.len() && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_') {
                        end += 1;
                    }
                    push_text(&mut segments, &sql[text_start..idx]);
                    segments.push(Segment::Named(sql[name_start..end].to_owned()));
                    idx = end;
                    text_start = idx;
                }
                _ => idx += 1,
            }
        }

        push_text(&mut segments, &sql[text_start..]);
        Self { segments }
    }

    pub fn positional_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|segment| matches!(segment, Segment::Positional))
            .count()
    }

    /// Named placeholders in order of appearance; repeats included.
    pub fn named(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Named(name) => Some(name.as_str()),
            _ => None,
        })
    }

    pub fn has_placeholders(&self) -> bool {
        self.segments
            .iter()
            .any(|segment| !matches!(segment, Segment::Text(_)))
    }

    pub fn is_mixed(&self) -> bool {
        self.positional_count() > 0 && self.named().next().is_some()
    }

    /// Substitutes literals; callers have already checked arity.
    pub(crate) fn render(&self, positional: &[String], named: &HashMap<String, String>) -> String {
        let mut out = String::new();
        let mut next = positional.iter();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Positional => {
                    if let Some(literal) = next.next() {
                        out.push_str(literal);
                    }
                }
                Segment::Named(name) => {
                    if let Some(literal) = named.get(name) {
                        out.push_str(literal);
                    }
                }
            }
        }
        out
    }
}

fn push_text(segments: &mut Vec<Segment>, text: &str) {
    if !text.is_empty() {
        segments.push(Segment::Text(text.to_owned()));
    }
}

/// Returns the index just past the closing quote. Single-quoted strings
/// honour both `''` and backslash escapes; identifiers only `""`.
fn skip_quoted(bytes: &[u8], start: usize, quote: u8) -> usize {
    let mut idx = start + 1;
    while idx < bytes.len() {
        let byte = bytes[idx];
        if quote == b'\'' && byte == b'\\' {
            idx += 2;
        } else if byte == quote {
            if bytes.get(idx + 1) == Some(&quote) {
                idx += 2;
            } else {
                return idx + 1;
            }
        } else {
            idx += 1;
        }
    }
    bytes.len()
}

fn find(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    if from >= bytes.len() {
        return None;
    }
    bytes[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|pos| pos + from)
}

/// `:name` after whitespace, an opening paren, a comma or an operator.
/// Excludes `::` casts and time literals such as `12:30`.
fn starts_named(bytes: &[u8], idx: usize) -> bool {
    let next_ok = bytes
        .get(idx + 1)
        .is_some_and(|next| next.is_ascii_alphabetic() || *next == b'_');
    let prev_ok = idx == 0
        || matches!(
            bytes[idx - 1],
            b' ' | b'\t' | b'\n' | b'\r' | b'(' | b',' | b'=' | b'<' | b'>' | b'+' | b'-' | b'*' | b'/'
        );
    next_ok && prev_ok
}
