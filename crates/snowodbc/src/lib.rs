//! Deferred-binding execution for the Snowflake warehouse over ODBC.
//!
//! The ODBC driver's parameter binding cannot be trusted, so statements
//! compiled by [`snowodbc_grammar`] are executed by inlining every binding
//! as an escaped literal and handing the final text to a [`RawConnection`].
//! [`Connection`] ties the grammars, the executor and the id/introspection
//! [`Processor`] together; [`SchemaBuilder`] adds the DDL helpers.

mod config;
mod connection;
mod driver;
mod error;
mod literal;
mod processor;
mod schema;
mod sqlx_driver;
mod statement;
mod template;

pub use config::{ConnectionConfig, ConnectionOptions, DriverKind, GrammarOptions};
pub use connection::{BindValue, Bindings, Connection, LoggedQuery};
pub use driver::{DriverError, ErrorInfo, PrepareMode, RawConnection, RawStatement, Row};
pub use error::{ConfigError, Error, Result, StatementError};
pub use literal::coerce;
pub use processor::{normalize_id, ColumnTypeInfo, Processor, ProcessorKind};
pub use schema::SchemaBuilder;
pub use sqlx_driver::SqlxConnection;
pub use statement::{
    interpolate, DeferredStatement, Outcome, Resolution, StatementOptions, StatementState,
};
pub use template::Template;
