//! Binding values produced by the grammars and consumed by the executor.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single value awaiting substitution into a SQL template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Type tag inferred from the variant alone.
    pub fn inferred_type(&self) -> BindType {
        match self {
            Value::Null => BindType::Null,
            Value::Bool(_) => BindType::Boolean,
            Value::Int(_) => BindType::Integer,
            Value::Float(_) => BindType::Float,
            Value::Text(_) => BindType::Text,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    /// PHP-style truthiness used for boolean defaults and boolean bindings
    /// given as text (`"1"`, `"true"`, `"on"`, `"yes"`).
    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(flag) => *flag,
            Value::Int(number) => *number != 0,
            Value::Float(number) => *number != 0.0,
            Value::Text(text) => matches!(
                text.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "on" | "yes"
            ),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(flag) => write!(f, "{flag}"),
            Value::Int(number) => write!(f, "{number}"),
            Value::Float(number) => write!(f, "{number}"),
            Value::Text(text) => f.write_str(text),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value.into())
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Int(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Declared or inferred type tag of a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindType {
    Text,
    Integer,
    Float,
    Boolean,
    Null,
}

/// Right-hand side of a clause: either a value bound through a placeholder
/// or a pre-rendered SQL fragment emitted verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Param {
    Raw { raw: String },
    Value(Value),
}

impl Param {
    pub fn raw(sql: impl Into<String>) -> Self {
        Param::Raw { raw: sql.into() }
    }
}

macro_rules! param_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Param {
                fn from(value: $ty) -> Self {
                    Param::Value(value.into())
                }
            }
        )*
    };
}

param_from!(Value, &str, String, i64, i32, u32, f64, bool);

/// Quotes `text` as a single-quoted string literal.
///
/// Embedded single quotes are doubled. The warehouse also treats backslash
/// as an escape character inside string literals, so backslashes are doubled
/// too; otherwise a trailing `\` would swallow the closing quote.
pub fn quote_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('\'');
    for ch in text.chars() {
        match ch {
            '\'' => out.push_str("''"),
            '\\' => out.push_str("\\\\"),
            other => out.push(other),
        }
    }
    out.push('\'');
    out
}

/// Strict numeric check: optional sign, digits, optional fraction, optional
/// exponent. Anything accepted here is safe to emit unquoted.
pub fn is_numeric_literal(text: &str) -> bool {
    let bytes = text.trim().as_bytes();
    let mut idx = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        idx += 1;
    }

    let int_start = idx;
    while idx < bytes.len() && bytes[idx].is_ascii_digit() {
        idx += 1;
    }
    let mut digits = idx - int_start;

    if idx < bytes.len() && bytes[idx] == b'.' {
        idx += 1;
        let frac_start = idx;
        while idx < bytes.len() && bytes[idx].is_ascii_digit() {
            idx += 1;
        }
        digits += idx - frac_start;
    }

    if digits == 0 {
        return false;
    }

    if idx < bytes.len() && (bytes[idx] == b'e' || bytes[idx] == b'E') {
        idx += 1;
        if matches!(bytes.get(idx), Some(b'+') | Some(b'-')) {
            idx += 1;
        }
        let exp_start = idx;
        while idx < bytes.len() && bytes[idx].is_ascii_digit() {
            idx += 1;
        }
        if idx == exp_start {
            return false;
        }
    }

    idx == bytes.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_and_backslashes_are_doubled() {
        assert_eq!(quote_literal("O'Brien"), "'O''Brien'");
        assert_eq!(quote_literal(r"C:\temp\"), r"'C:\\temp\\'");
        assert_eq!(quote_literal(""), "''");
    }

    #[test]
    fn numeric_literals_are_strict() {
        for ok in ["0", "42", "-7", "+3", "3.25", ".5", "5.", "1e10", "2.5E-3", " 12 "] {
            assert!(is_numeric_literal(ok), "{ok} should be numeric");
        }
        for bad in ["", "-", ".", "1e", "abc", "1 2", "0x1f", "inf", "NaN", "1;drop", "1e+"] {
            assert!(!is_numeric_literal(bad), "{bad} should not be numeric");
        }
    }

    #[test]
    fn truthiness_follows_text_flags() {
        assert!(Value::from("yes").truthy());
        assert!(Value::from("1").truthy());
        assert!(!Value::from("no").truthy());
        assert!(!Value::Null.truthy());
        assert!(Value::Int(3).truthy());
    }

    #[test]
    fn untagged_values_deserialize_from_json() {
        let values: Vec<Value> = serde_json::from_str(r#"[null, true, 42, 1.5, "x"]"#).unwrap();
        assert_eq!(
            values,
            vec![
                Value::Null,
                Value::Bool(true),
                Value::Int(42),
                Value::Float(1.5),
                Value::Text("x".into())
            ]
        );

        let raw: Param = serde_json::from_str(r#"{"raw": "now()"}"#).unwrap();
        assert_eq!(raw, Param::raw("now()"));
    }
}
