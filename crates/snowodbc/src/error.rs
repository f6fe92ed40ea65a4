use snowodbc_grammar::GrammarError;
use thiserror::Error;

use crate::driver::DriverError;

/// Failures of the deferred-binding executor.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StatementError {
    #[error("statement has {expected} positional placeholder(s) but {actual} binding(s) were supplied")]
    BindingArity { expected: usize, actual: usize },
    #[error("no value bound for named placeholder :{0}")]
    MissingNamedBinding(String),
    #[error("binding :{0} does not match any placeholder")]
    UnusedNamedBinding(String),
    #[error("statement mixes positional and named placeholders")]
    MixedPlaceholders,
    #[error("positional bindings start at 1, got {0}")]
    InvalidPosition(usize),
    #[error("statement was already executed; prepare a new one")]
    AlreadyExecuted,
    #[error("statement has not been executed")]
    NotExecuted,
    #[error("driver reported SQLSTATE {sql_state}: {message}")]
    Driver { sql_state: String, message: String },
}

impl From<DriverError> for StatementError {
    fn from(err: DriverError) -> Self {
        StatementError::Driver {
            sql_state: err.sql_state,
            message: err.message,
        }
    }
}

/// Invalid connection configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("odbc_driver must be the absolute path of the ODBC driver library when no dsn is given")]
    MissingOdbcDriver,
    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
    #[error("failed to parse connection config: {0}")]
    Parse(String),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Grammar(#[from] GrammarError),
    #[error(transparent)]
    Statement(#[from] StatementError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("expected a row from: {0}")]
    MissingRecord(String),
}

impl From<DriverError> for Error {
    fn from(err: DriverError) -> Self {
        Error::Statement(err.into())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
