//! Connection configuration and DSN building.

use std::collections::BTreeMap;
use std::env;

use serde::{Deserialize, Serialize};
use snowodbc_grammar::{DialectPolicy, GrammarKind, TableDefaults};

use crate::error::ConfigError;
use crate::processor::ProcessorKind;
use crate::statement::StatementOptions;

/// Keys never copied into a dynamically built DSN.
const DSN_IGNORED: &[&str] = &["driver", "odbc_driver", "dsn", "options", "username", "password", "name", "prefix"];
/// Extra keys the native driver takes from elsewhere.
const NATIVE_IGNORED: &[&str] = &["port", "server"];

/// Properties read by [`ConnectionConfig::from_env`] as `SNOWFLAKE_<KEY>`.
const ENV_PROPERTIES: &[&str] = &["server", "port", "warehouse", "schema", "role", "account", "region"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriverKind {
    /// The ODBC path; statements go through the deferred-binding executor.
    #[default]
    #[serde(rename = "snowflake")]
    Odbc,
    /// The native driver. It still receives literal SQL.
    #[serde(rename = "snowflake_native")]
    Native,
}

impl DriverKind {
    fn dsn_prefix(self) -> &'static str {
        match self {
            DriverKind::Odbc => "odbc",
            DriverKind::Native => "snowflake",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrammarOptions {
    pub query: GrammarKind,
    pub schema: GrammarKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionOptions {
    pub grammar: GrammarOptions,
    pub processor: ProcessorKind,
    pub skip_constraint_statements: bool,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            grammar: GrammarOptions::default(),
            processor: ProcessorKind::default(),
            skip_constraint_statements: true,
        }
    }
}

impl ConnectionOptions {
    pub fn statement_options(&self) -> StatementOptions {
        StatementOptions {
            skip_constraint_statements: self.skip_constraint_statements,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub driver: DriverKind,
    pub dsn: Option<String>,
    pub odbc_driver: Option<String>,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub prefix: String,
    pub charset: Option<String>,
    pub collation: Option<String>,
    pub engine: Option<String>,
    pub case_sensitive: bool,
    pub quoted_identifiers_ignore_case: bool,
    pub options: ConnectionOptions,
    /// Everything else ends up in the DSN as `key=value`.
    #[serde(flatten)]
    pub properties: BTreeMap<String, serde_json::Value>,
}

impl ConnectionConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads `SNOWFLAKE_*` keys through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(&format!("SNOWFLAKE_{key}"))
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };
        let flag = |key: &str| -> Result<bool, ConfigError> {
            match var(key) {
                None => Ok(false),
                Some(value) => parse_bool(&value).ok_or_else(|| ConfigError::InvalidValue {
                    key: format!("SNOWFLAKE_{key}"),
                    reason: format!("`{value}` is not a boolean"),
                }),
            }
        };

        let mut config = ConnectionConfig {
            dsn: var("DSN"),
            odbc_driver: var("ODBC_DRIVER"),
            database: var("DATABASE").unwrap_or_default(),
            username: var("USERNAME"),
            password: var("PASSWORD"),
            prefix: var("PREFIX").unwrap_or_default(),
            case_sensitive: flag("COLUMNS_CASE_SENSITIVE")?,
            quoted_identifiers_ignore_case: flag("QUOTED_IDENTIFIERS_IGNORE_CASE")?,
            ..ConnectionConfig::default()
        };

        if let Some(driver) = var("DRIVER") {
            config.driver = match driver.as_str() {
                "snowflake" | "odbc" => DriverKind::Odbc,
                "snowflake_native" | "native" => DriverKind::Native,
                other => {
                    return Err(ConfigError::InvalidValue {
                        key: "SNOWFLAKE_DRIVER".into(),
                        reason: format!("unknown driver `{other}`"),
                    })
                }
            };
        }
        if let Some(kind) = var("QUERY_GRAMMAR") {
            config.options.grammar.query = parse_grammar("SNOWFLAKE_QUERY_GRAMMAR", &kind)?;
        }
        if let Some(kind) = var("SCHEMA_GRAMMAR") {
            config.options.grammar.schema = parse_grammar("SNOWFLAKE_SCHEMA_GRAMMAR", &kind)?;
        }
        if let Some(kind) = var("PROCESSOR") {
            config.options.processor = kind.parse()?;
        }
        for key in ENV_PROPERTIES {
            if let Some(value) = var(&key.to_ascii_uppercase()) {
                config.properties.insert((*key).to_owned(), serde_json::Value::String(value));
            }
        }
        Ok(config)
    }

    /// Identifier policy for the grammars; fixed once the connection exists.
    pub fn policy(&self) -> DialectPolicy {
        DialectPolicy::new(self.case_sensitive, self.prefix.clone())
    }

    pub fn table_defaults(&self) -> TableDefaults {
        TableDefaults {
            charset: self.charset.clone(),
            collation: self.collation.clone(),
            engine: self.engine.clone(),
        }
    }

    /// Builds the DSN. An explicit `dsn` wins; otherwise it is assembled
    /// from the remaining properties.
    pub fn dsn(&self) -> Result<String, ConfigError> {
        let prefix = self.driver.dsn_prefix();
        if let Some(dsn) = self.dsn.as_deref().filter(|dsn| !dsn.trim().is_empty()) {
            return Ok(if dsn.starts_with(&format!("{prefix}:")) {
                dsn.to_owned()
            } else {
                format!("{prefix}:{dsn}")
            });
        }

        let mut pieces = Vec::new();
        if self.driver == DriverKind::Odbc {
            let driver = self
                .odbc_driver
                .as_deref()
                .filter(|path| !path.trim().is_empty())
                .ok_or(ConfigError::MissingOdbcDriver)?;
            pieces.push(format!("driver={driver}"));
        }
        if !self.database.is_empty() {
            pieces.push(format!("database={}", self.database));
        }
        for (key, value) in &self.properties {
            if DSN_IGNORED.contains(&key.as_str())
                || (self.driver == DriverKind::Native && NATIVE_IGNORED.contains(&key.as_str()))
            {
                continue;
            }
            let value = match value {
                serde_json::Value::String(text) => text.clone(),
                serde_json::Value::Null => continue,
                other => other.to_string(),
            };
            pieces.push(format!("{key}={value}"));
        }

        Ok(format!("{prefix}:{}", pieces.join(";")))
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_grammar(key: &str, value: &str) -> Result<GrammarKind, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_owned(),
        reason: format!("unknown grammar `{value}`"),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn explicit_dsn_gets_prefixed_once() {
        let mut config = ConnectionConfig {
            dsn: Some("Driver=/opt/snowflake/libSnowflake.so;server=acme".into()),
            ..ConnectionConfig::default()
        };
        assert_eq!(
            config.dsn().unwrap(),
            "odbc:Driver=/opt/snowflake/libSnowflake.so;server=acme"
        );

        config.dsn = Some("odbc:already".into());
        assert_eq!(config.dsn().unwrap(), "odbc:already");
    }

    #[test]
    fn dynamic_dsn_requires_the_driver_path() {
        let config = ConnectionConfig::default();
        assert_eq!(config.dsn().unwrap_err(), ConfigError::MissingOdbcDriver);
    }

    #[test]
    fn dynamic_dsn_from_json() {
        let config = ConnectionConfig::from_json(
            r#"{
                "driver": "snowflake",
                "odbc_driver": "/usr/lib/libSnowflake.so",
                "database": "ANALYTICS",
                "username": "svc",
                "password": "secret",
                "prefix": "app_",
                "server": "acme.snowflakecomputing.com",
                "warehouse": "WH",
                "port": 443,
                "options": {"grammar": {"query": "snowflake_strict"}, "processor": "last_query_id"}
            }"#,
        )
        .unwrap();

        assert_eq!(
            config.dsn().unwrap(),
            "odbc:driver=/usr/lib/libSnowflake.so;database=ANALYTICS;port=443;server=acme.snowflakecomputing.com;warehouse=WH"
        );
        assert_eq!(config.options.grammar.query, GrammarKind::SnowflakeStrict);
        assert_eq!(config.options.grammar.schema, GrammarKind::Snowflake);
        assert_eq!(config.options.processor, ProcessorKind::LastQueryId);
        assert!(config.options.skip_constraint_statements);
        assert_eq!(config.policy(), DialectPolicy::new(false, "app_"));
    }

    #[test]
    fn native_dsn_skips_driver_server_and_port() {
        let config = ConnectionConfig::from_json(
            r#"{"driver": "snowflake_native", "account": "acme", "server": "x", "port": 443, "database": "DB"}"#,
        )
        .unwrap();
        assert_eq!(config.dsn().unwrap(), "snowflake:database=DB;account=acme");
    }

    #[test]
    fn env_lookup() {
        let config = ConnectionConfig::from_lookup(lookup(&[
            ("SNOWFLAKE_ODBC_DRIVER", "/lib/sf.so"),
            ("SNOWFLAKE_DATABASE", "DB"),
            ("SNOWFLAKE_COLUMNS_CASE_SENSITIVE", "true"),
            ("SNOWFLAKE_WAREHOUSE", "WH"),
            ("SNOWFLAKE_PROCESSOR", "max_id"),
        ]))
        .unwrap();
        assert!(config.case_sensitive);
        assert_eq!(config.database, "DB");
        assert_eq!(config.dsn().unwrap(), "odbc:driver=/lib/sf.so;database=DB;warehouse=WH");

        let err = ConnectionConfig::from_lookup(lookup(&[("SNOWFLAKE_COLUMNS_CASE_SENSITIVE", "maybe")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(matches!(
            ConnectionConfig::from_json("{not json").unwrap_err(),
            ConfigError::Parse(_)
        ));
    }
}
