use snowodbc_grammar::{is_numeric_literal, quote_literal, BindType, Value};

/// Renders one binding as SQL literal text.
///
/// Never fails: anything that does not fit its declared type falls back to
/// a quoted string literal.
///
/// Numeric-looking text declared `Integer` or `Float` is emitted exactly as
/// written, fraction included: `"12.75"` stays `12.75` and is never
/// truncated. Negative numbers are parenthesised (`(-5)`) so that a `-`
/// in front of the placeholder cannot form a `--` line comment.
pub fn coerce(value: &Value, declared: Option<BindType>) -> String {
    if value.is_null() || declared == Some(BindType::Null) {
        return "null".to_owned();
    }

    match (value, declared) {
        (Value::Bool(flag), _) => boolean(*flag),
        (other, Some(BindType::Boolean)) => boolean(other.truthy()),
        (Value::Int(number), _) => signed(number.to_string()),
        (Value::Float(number), _) if number.is_finite() => signed(float(*number)),
        (Value::Float(number), _) => quote_literal(&number.to_string()),
        (Value::Text(text), Some(BindType::Integer | BindType::Float) | None)
            if is_numeric_literal(text) =>
        {
            signed(text.trim().to_owned())
        }
        (Value::Text(text), _) => quote_literal(text),
        (Value::Null, _) => "null".to_owned(),
    }
}

fn boolean(flag: bool) -> String {
    let keyword = if flag { "TRUE" } else { "FALSE" };
    keyword.to_owned()
}

fn signed(number: String) -> String {
    if number.starts_with('-') {
        format!("({number})")
    } else {
        number
    }
}

fn float(number: f64) -> String {
    let text = number.to_string();
    if text.contains(['.', 'e', 'E']) {
        text
    } else {
        format!("{text}.0")
    }
}
