//! Dialect grammar compiler for the Snowflake warehouse.
//!
//! Turns structured query and schema descriptions into SQL templates with
//! positional `?` placeholders plus their bindings. Identifier quoting and
//! case folding are driven by a [`DialectPolicy`] fixed at construction;
//! nothing here touches a connection.

mod compiled;
mod error;
mod kind;
mod policy;
mod value;
mod wrapper;

pub mod query;
pub mod schema;

pub use compiled::Compiled;
pub use error::{GrammarError, Result};
pub use kind::GrammarKind;
pub use policy::DialectPolicy;
pub use query::{Query, QueryGrammar, Record, SnowflakeQueryGrammar, UpsertUpdate};
pub use schema::{Blueprint, ColumnDefinition, ColumnType, SchemaGrammar, SnowflakeSchemaGrammar, TableDefaults};
pub use value::{is_numeric_literal, quote_literal, BindType, Param, Value};
pub use wrapper::{Expr, Wrapper};
