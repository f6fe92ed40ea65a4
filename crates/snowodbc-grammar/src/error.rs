//! Grammar error types

use thiserror::Error;

/// Errors raised while turning a structured description into SQL text.
///
/// Compilation never returns partial SQL: any error aborts the whole statement.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GrammarError {
    #[error("cannot compile statement: {0}")]
    Compilation(String),

    #[error("operation not supported by the warehouse dialect: {0}")]
    Unsupported(String),
}

impl GrammarError {
    pub(crate) fn compilation(message: impl Into<String>) -> Self {
        GrammarError::Compilation(message.into())
    }

    pub(crate) fn unsupported(message: impl Into<String>) -> Self {
        GrammarError::Unsupported(message.into())
    }
}

pub type Result<T, E = GrammarError> = std::result::Result<T, E>;
