//! Result post-processing for idioms the warehouse lacks natively.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use snowodbc_grammar::{is_numeric_literal, Value};

use crate::driver::Row;
use crate::error::ConfigError;

const DEFAULT_SEQUENCE: &str = "id";

/// How the id of a freshly inserted row is recovered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessorKind {
    /// `select max(<seq>)` over the target table.
    #[default]
    MaxId,
    /// Time-travel read of the table as of the last statement.
    LastQueryId,
}

impl FromStr for ProcessorKind {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "max_id" | "max" => Ok(ProcessorKind::MaxId),
            "last_query_id" => Ok(ProcessorKind::LastQueryId),
            other => Err(ConfigError::InvalidValue {
                key: "options.processor".into(),
                reason: format!("unknown processor `{other}`"),
            }),
        }
    }
}

/// Type details of one column as reported by information_schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnTypeInfo {
    pub column: String,
    pub type_name: String,
    pub precision: Option<i64>,
    pub scale: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Processor {
    kind: ProcessorKind,
}

impl Processor {
    pub fn new(kind: ProcessorKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> ProcessorKind {
        self.kind
    }

    /// Follow-up query that reads back the generated id. `wrapped_table`
    /// is already quoted by the query grammar.
    pub fn id_query(&self, wrapped_table: &str, sequence: Option<&str>) -> String {
        let sequence = sequence.unwrap_or(DEFAULT_SEQUENCE);
        match self.kind {
            ProcessorKind::MaxId => format!(
                "select max(\"{sequence}\") as \"{sequence}\" from {wrapped_table}"
            ),
            ProcessorKind::LastQueryId => {
                format!("select * from {wrapped_table} at(statement=>last_query_id())")
            }
        }
    }

    /// Pulls the id out of the follow-up row.
    pub fn extract_id(&self, row: &Row, sequence: Option<&str>) -> Option<Value> {
        let sequence = sequence.unwrap_or(DEFAULT_SEQUENCE);
        let raw = match self.kind {
            ProcessorKind::MaxId => row.get_ignore_case(sequence).or_else(|| row.first()),
            ProcessorKind::LastQueryId => row.first(),
        }?;
        if raw.is_null() {
            return None;
        }
        Some(normalize_id(raw))
    }

    pub fn column_listing(&self, rows: &[Row]) -> Vec<String> {
        rows.iter()
            .filter_map(|row| row.get_ignore_case("column_name").or_else(|| row.first()))
            .map(ToString::to_string)
            .collect()
    }

    pub fn column_type(&self, rows: &[Row]) -> Option<ColumnTypeInfo> {
        let row = rows.first()?;
        let text = |key: &str| row.get_ignore_case(key).map(ToString::to_string);
        Some(ColumnTypeInfo {
            column: text("column_name").unwrap_or_default(),
            type_name: text("column_type")
                .or_else(|| text("data_type"))
                .unwrap_or_default(),
            precision: row.get_ignore_case("numeric_precision").and_then(as_integer),
            scale: row.get_ignore_case("numeric_scale").and_then(as_integer),
        })
    }
}

/// Numeric-looking ids come back as integers, anything else as text.
pub fn normalize_id(value: &Value) -> Value {
    match value {
        Value::Int(_) => value.clone(),
        Value::Float(number) if number.fract() == 0.0 => Value::Int(*number as i64),
        other => match as_integer(other) {
            Some(number) => Value::Int(number),
            None => Value::Text(other.to_string()),
        },
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Int(number) => Some(*number),
        Value::Float(number) if number.is_finite() => Some(number.trunc() as i64),
        Value::Text(text) if is_numeric_literal(text) => {
            let text = text.trim();
            text.parse::<i64>()
                .ok()
                .or_else(|| text.parse::<f64>().ok().map(|number| number.trunc() as i64))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_id_query_quotes_the_sequence() {
        let processor = Processor::default();
        assert_eq!(
            processor.id_query("\"USERS\"", None),
            "select max(\"id\") as \"id\" from \"USERS\""
        );
        assert_eq!(
            processor.id_query("USERS", Some("user_id")),
            "select max(\"user_id\") as \"user_id\" from USERS"
        );
    }

    #[test]
    fn last_query_id_uses_time_travel() {
        let processor = Processor::new(ProcessorKind::LastQueryId);
        assert_eq!(
            processor.id_query("USERS", None),
            "select * from USERS at(statement=>last_query_id())"
        );
        let row = Row::new(vec![("ID".into(), Value::from("17")), ("NAME".into(), Value::from("x"))]);
        assert_eq!(processor.extract_id(&row, None), Some(Value::Int(17)));
    }

    #[test]
    fn ids_are_normalized() {
        let processor = Processor::default();
        let numeric = Row::new(vec![("id".into(), Value::from("42"))]);
        assert_eq!(processor.extract_id(&numeric, None), Some(Value::Int(42)));

        let upper = Row::new(vec![("ID".into(), Value::Int(7))]);
        assert_eq!(processor.extract_id(&upper, None), Some(Value::Int(7)));

        let uuid = Row::new(vec![("id".into(), Value::from("a1b2-c3"))]);
        assert_eq!(processor.extract_id(&uuid, None), Some(Value::from("a1b2-c3")));

        let empty = Row::new(vec![("id".into(), Value::Null)]);
        assert_eq!(processor.extract_id(&empty, None), None);
    }

    #[test]
    fn column_listing_reads_column_name() {
        let rows = vec![
            Row::new(vec![("column_name".into(), Value::from("ID"))]),
            Row::new(vec![("COLUMN_NAME".into(), Value::from("NAME"))]),
        ];
        assert_eq!(Processor::default().column_listing(&rows), vec!["ID", "NAME"]);
    }

    #[test]
    fn column_type_coerces_precision_to_integers() {
        let rows = vec![Row::new(vec![
            ("column_name".into(), Value::from("PRICE")),
            ("column_type".into(), Value::from("NUMBER")),
            ("numeric_precision".into(), Value::from("38")),
            ("numeric_scale".into(), Value::Float(2.0)),
        ])];
        assert_eq!(
            Processor::default().column_type(&rows),
            Some(ColumnTypeInfo {
                column: "PRICE".into(),
                type_name: "NUMBER".into(),
                precision: Some(38),
                scale: Some(2),
            })
        );
        assert_eq!(Processor::default().column_type(&[]), None);
    }

    #[test]
    fn processor_kind_parses() {
        assert_eq!("last_query_id".parse::<ProcessorKind>().unwrap(), ProcessorKind::LastQueryId);
        assert!("nope".parse::<ProcessorKind>().is_err());
    }
}
