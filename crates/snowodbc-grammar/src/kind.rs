//! Configuration-selected grammar strategies.

use serde::{Deserialize, Serialize};

use crate::policy::DialectPolicy;
use crate::query::{QueryGrammar, SnowflakeQueryGrammar};
use crate::schema::{SchemaGrammar, SnowflakeSchemaGrammar, TableDefaults};

/// Which grammar implementation a connection compiles with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrammarKind {
    /// Degrades unsupported constructs (row locks) silently.
    #[default]
    Snowflake,
    /// Rejects unsupported constructs with an error.
    SnowflakeStrict,
}

impl GrammarKind {
    pub fn query_grammar(self, policy: DialectPolicy) -> Box<dyn QueryGrammar> {
        match self {
            GrammarKind::Snowflake => Box::new(SnowflakeQueryGrammar::new(policy)),
            GrammarKind::SnowflakeStrict => Box::new(SnowflakeQueryGrammar::strict(policy)),
        }
    }

    pub fn schema_grammar(
        self,
        policy: DialectPolicy,
        defaults: TableDefaults,
    ) -> Box<dyn SchemaGrammar> {
        match self {
            GrammarKind::Snowflake => Box::new(SnowflakeSchemaGrammar::new(policy, defaults)),
            GrammarKind::SnowflakeStrict => {
                Box::new(SnowflakeSchemaGrammar::strict(policy, defaults))
            }
        }
    }
}

impl std::str::FromStr for GrammarKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "snowflake" => Ok(GrammarKind::Snowflake),
            "snowflake_strict" | "strict" => Ok(GrammarKind::SnowflakeStrict),
            other => Err(format!("unknown grammar '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Lock, Query};

    #[test]
    fn strict_kind_selects_strict_grammar() {
        let query = Query::table("t").lock(Lock::Shared);
        let lenient = GrammarKind::Snowflake.query_grammar(DialectPolicy::default());
        let strict = GrammarKind::SnowflakeStrict.query_grammar(DialectPolicy::default());
        assert!(lenient.compile_select(&query).is_ok());
        assert!(strict.compile_select(&query).is_err());
    }

    #[test]
    fn parses_from_config_strings() {
        assert_eq!("Snowflake".parse::<GrammarKind>(), Ok(GrammarKind::Snowflake));
        assert_eq!("strict".parse::<GrammarKind>(), Ok(GrammarKind::SnowflakeStrict));
        assert!("mysql".parse::<GrammarKind>().is_err());
    }
}
