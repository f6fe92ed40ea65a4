//! Dialect policy shared by the query and schema grammars.

use serde::{Deserialize, Serialize};

/// Read-only identifier policy fixed when a grammar is constructed.
///
/// The warehouse folds unquoted identifiers to upper case. With
/// `case_sensitive` disabled the grammars fold every identifier themselves
/// and emit it unquoted; with it enabled identifiers are double-quoted and
/// keep their case.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialectPolicy {
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default)]
    pub table_prefix: String,
}

impl DialectPolicy {
    pub fn new(case_sensitive: bool, table_prefix: impl Into<String>) -> Self {
        Self {
            case_sensitive,
            table_prefix: table_prefix.into(),
        }
    }

    pub fn case_sensitive() -> Self {
        Self::new(true, "")
    }

    pub fn case_insensitive() -> Self {
        Self::new(false, "")
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.table_prefix = prefix.into();
        self
    }

    /// Applies the case policy to a bare table name the way the warehouse
    /// resolves it (used for information_schema lookups).
    pub fn resolve_table_name(&self, table: &str) -> String {
        let name = format!("{}{}", self.table_prefix, table);
        if self.case_sensitive {
            name
        } else {
            name.to_uppercase()
        }
    }
}
