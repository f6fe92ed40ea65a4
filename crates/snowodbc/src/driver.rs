//! Seam to the raw connectivity layer.
//!
//! The executor only ever hands literal SQL to these traits. Implementations
//! wrap whatever actually talks to the warehouse (an ODBC handle, the native
//! driver, or the sqlx-backed connection used in tests).

use async_trait::async_trait;
use snowodbc_grammar::Value;
use thiserror::Error;

/// SQL states that mean "nothing happened" rather than "something failed".
const SUCCESS_STATES: &[&str] = &["00000", "01000"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrepareMode {
    /// Prepare then execute.
    Prepared,
    /// Send the text as-is without a prepare round trip.
    Direct,
}

/// Diagnostic record of the last operation on a raw statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub sql_state: String,
    pub code: Option<i64>,
    pub message: Option<String>,
}

impl ErrorInfo {
    pub fn ok() -> Self {
        Self {
            sql_state: "00000".to_owned(),
            code: None,
            message: None,
        }
    }

    pub fn is_success_state(&self) -> bool {
        SUCCESS_STATES.contains(&self.sql_state.as_str())
    }
}

impl Default for ErrorInfo {
    fn default() -> Self {
        Self::ok()
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("[{sql_state}] {message}")]
pub struct DriverError {
    pub sql_state: String,
    pub message: String,
}

impl DriverError {
    pub fn new(sql_state: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            sql_state: sql_state.into(),
            message: message.into(),
        }
    }
}

/// One result row with its columns in select order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    pub fn new(columns: Vec<(String, Value)>) -> Self {
        Self { columns }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Case-insensitive lookup; the warehouse upper-cases unquoted aliases.
    pub fn get_ignore_case(&self, column: &str) -> Option<&Value> {
        self.get(column).or_else(|| {
            self.columns
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(column))
                .map(|(_, value)| value)
        })
    }

    pub fn first(&self) -> Option<&Value> {
        self.columns.first().map(|(_, value)| value)
    }

    pub fn columns(&self) -> &[(String, Value)] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

#[async_trait]
pub trait RawStatement: Send {
    /// Runs the statement. `Ok(false)` means the driver reported failure
    /// without raising; consult [`RawStatement::error_info`].
    async fn execute(&mut self) -> Result<bool, DriverError>;

    fn error_info(&self) -> ErrorInfo;

    /// Rows produced by the last execution.
    async fn fetch_all(&mut self) -> Result<Vec<Row>, DriverError>;

    fn rows_affected(&self) -> u64;
}

#[async_trait]
pub trait RawConnection: Send + Sync {
    async fn prepare(
        &self,
        sql: &str,
        mode: PrepareMode,
    ) -> Result<Box<dyn RawStatement>, DriverError>;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_states() {
        assert!(ErrorInfo::ok().is_success_state());
        let warning = ErrorInfo {
            sql_state: "01000".into(),
            ..ErrorInfo::ok()
        };
        assert!(warning.is_success_state());
        let failure = ErrorInfo {
            sql_state: "42S02".into(),
            ..ErrorInfo::ok()
        };
        assert!(!failure.is_success_state());
    }

    #[test]
    fn row_lookup() {
        let row = Row::new(vec![
            ("ID".into(), Value::Int(1)),
            ("name".into(), Value::from("x")),
        ]);
        assert_eq!(row.get("name"), Some(&Value::from("x")));
        assert_eq!(row.get("id"), None);
        assert_eq!(row.get_ignore_case("id"), Some(&Value::Int(1)));
        assert_eq!(row.first(), Some(&Value::Int(1)));
    }
}
