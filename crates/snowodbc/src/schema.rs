//! Schema builder: introspection and DDL helpers over a [`Connection`].

use snowodbc_grammar::{Blueprint, Value};
use tracing::debug;

use crate::connection::{Bindings, Connection};
use crate::driver::Row;
use crate::error::Result;
use crate::processor::ColumnTypeInfo;

const DB_NAME_TOKEN: &str = "{DB_NAME}";

#[derive(Debug, Clone, Copy)]
pub struct SchemaBuilder<'c> {
    connection: &'c Connection,
}

impl<'c> SchemaBuilder<'c> {
    pub fn new(connection: &'c Connection) -> Self {
        Self { connection }
    }

    /// Table name as the warehouse stores it: prefixed and case-folded.
    fn stored_table(&self, table: &str) -> String {
        self.connection.policy().resolve_table_name(table)
    }

    fn stored_column(&self, column: &str) -> String {
        if self.connection.policy().case_sensitive {
            column.to_owned()
        } else {
            column.to_uppercase()
        }
    }

    fn with_database(&self, sql: &str) -> String {
        sql.replace(DB_NAME_TOKEN, self.connection.database_name())
    }

    pub async fn has_table(&self, table: &str) -> Result<bool> {
        let grammar = self.connection.schema_grammar();
        let rows = self
            .connection
            .select(
                &grammar.compile_table_exists(),
                vec![
                    Value::from(self.connection.database_name()),
                    Value::from(self.stored_table(table)),
                ],
            )
            .await?;
        Ok(!rows.is_empty())
    }

    pub async fn column_listing(&self, table: &str) -> Result<Vec<String>> {
        let sql = self.with_database(&self.connection.schema_grammar().compile_column_listing());
        let rows = self
            .connection
            .select(
                &sql,
                vec![
                    Value::from(self.connection.database_name()),
                    Value::from(self.stored_table(table)),
                ],
            )
            .await?;
        Ok(self.connection.processor().column_listing(&rows))
    }

    /// Case-insensitive column check.
    pub async fn has_column(&self, table: &str, column: &str) -> Result<bool> {
        let columns = self.column_listing(table).await?;
        Ok(columns
            .iter()
            .any(|existing| existing.eq_ignore_ascii_case(column)))
    }

    pub async fn has_columns(&self, table: &str, columns: &[&str]) -> Result<bool> {
        let existing = self.column_listing(table).await?;
        Ok(columns.iter().all(|wanted| {
            existing
                .iter()
                .any(|column| column.eq_ignore_ascii_case(wanted))
        }))
    }

    pub async fn column_type(&self, table: &str, column: &str) -> Result<Option<ColumnTypeInfo>> {
        let sql = self.with_database(&self.connection.schema_grammar().compile_column_type());
        let rows = self
            .connection
            .select(
                &sql,
                vec![
                    Value::from(self.stored_table(table)),
                    Value::from(self.stored_column(column)),
                ],
            )
            .await?;
        Ok(self.connection.processor().column_type(&rows))
    }

    pub async fn table_details(&self, table: &str) -> Result<Vec<Row>> {
        let sql = self
            .connection
            .schema_grammar()
            .compile_table_details(&self.stored_table(table));
        self.connection.select(&sql, Bindings::new()).await
    }

    pub async fn create(&self, table: &str, build: impl FnOnce(&mut Blueprint)) -> Result<()> {
        let mut blueprint = Blueprint::new(table);
        blueprint.create();
        build(&mut blueprint);
        self.connection.run_blueprint(&blueprint).await
    }

    /// Alters an existing table.
    pub async fn table(&self, table: &str, build: impl FnOnce(&mut Blueprint)) -> Result<()> {
        let mut blueprint = Blueprint::new(table);
        build(&mut blueprint);
        self.connection.run_blueprint(&blueprint).await
    }

    pub async fn drop(&self, table: &str) -> Result<()> {
        self.table(table, |blueprint| {
            blueprint.drop();
        })
        .await
    }

    pub async fn drop_if_exists(&self, table: &str) -> Result<()> {
        self.table(table, |blueprint| {
            blueprint.drop_if_exists();
        })
        .await
    }

    pub async fn rename(&self, from: &str, to: &str) -> Result<()> {
        self.table(from, |blueprint| {
            blueprint.rename(to);
        })
        .await
    }

    pub async fn get_all_tables(&self) -> Result<Vec<String>> {
        let sql = self.connection.schema_grammar().compile_get_all_tables();
        let rows = self.connection.select(&sql, Bindings::new()).await?;
        Ok(object_names(&rows))
    }

    pub async fn get_all_views(&self) -> Result<Vec<String>> {
        let sql = self.connection.schema_grammar().compile_get_all_views();
        let rows = self.connection.select(&sql, Bindings::new()).await?;
        Ok(object_names(&rows))
    }

    pub async fn drop_all_tables(&self) -> Result<()> {
        let tables = self.get_all_tables().await?;
        if tables.is_empty() {
            return Ok(());
        }
        debug!(count = tables.len(), "dropping all tables");

        let grammar = self.connection.schema_grammar();
        self.disable_foreign_key_constraints().await?;
        self.connection
            .statement(&grammar.compile_drop_all_tables(&tables), Bindings::new())
            .await?;
        self.enable_foreign_key_constraints().await?;
        Ok(())
    }

    pub async fn drop_all_views(&self) -> Result<()> {
        let views = self.get_all_views().await?;
        if views.is_empty() {
            return Ok(());
        }
        let sql = self.connection.schema_grammar().compile_drop_all_views(&views);
        self.connection.statement(&sql, Bindings::new()).await?;
        Ok(())
    }

    pub async fn create_database(&self, name: &str) -> Result<bool> {
        let sql = self.connection.schema_grammar().compile_create_database(name);
        self.connection.statement(&sql, Bindings::new()).await
    }

    pub async fn drop_database(&self, name: &str) -> Result<bool> {
        let sql = self.connection.schema_grammar().compile_drop_database(name);
        self.connection.statement(&sql, Bindings::new()).await
    }

    pub async fn drop_database_if_exists(&self, name: &str) -> Result<bool> {
        let sql = self
            .connection
            .schema_grammar()
            .compile_drop_database_if_exists(name);
        self.connection.statement(&sql, Bindings::new()).await
    }

    pub async fn enable_foreign_key_constraints(&self) -> Result<bool> {
        let sql = self
            .connection
            .schema_grammar()
            .compile_enable_foreign_key_constraints();
        self.connection.statement(&sql, Bindings::new()).await
    }

    pub async fn disable_foreign_key_constraints(&self) -> Result<bool> {
        let sql = self
            .connection
            .schema_grammar()
            .compile_disable_foreign_key_constraints();
        self.connection.statement(&sql, Bindings::new()).await
    }
}

/// `SHOW TABLES` / `SHOW VIEWS` rows carry the object in `name`.
fn object_names(rows: &[Row]) -> Vec<String> {
    rows.iter()
        .filter_map(|row| row.get_ignore_case("name").or_else(|| row.first()))
        .map(ToString::to_string)
        .collect()
}
