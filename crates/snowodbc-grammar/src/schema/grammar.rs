use std::fmt;

use serde::{Deserialize, Serialize};

use super::modifiers::{ColumnSql, Nullability};
use super::{Blueprint, Command, ForeignKey, IndexCommand};
use crate::error::{GrammarError, Result};
use crate::policy::DialectPolicy;
use crate::value::quote_literal;
use crate::wrapper::{Expr, Wrapper};

const REFERENTIAL_ACTIONS: &[&str] = &["cascade", "restrict", "set null", "set default", "no action"];

/// Connection-level create-table suffixes used when the blueprint sets none.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableDefaults {
    pub charset: Option<String>,
    pub collation: Option<String>,
    pub engine: Option<String>,
}

/// Capability interface for schema compilation.
pub trait SchemaGrammar: Send + Sync + fmt::Debug {
    fn wrapper(&self) -> &Wrapper;

    /// One command may expand to several statements.
    fn compile_command(&self, blueprint: &Blueprint, command: &Command) -> Result<Vec<String>>;

    fn compile_create(&self, blueprint: &Blueprint) -> Result<String>;

    fn compile_add(&self, blueprint: &Blueprint) -> Result<Vec<String>>;

    fn compile_change(&self, blueprint: &Blueprint) -> Result<Vec<String>>;

    fn compile_table_exists(&self) -> String;

    fn compile_table_details(&self, table: &str) -> String;

    fn compile_column_listing(&self) -> String;

    fn compile_column_type(&self) -> String;

    fn compile_get_all_tables(&self) -> String;

    fn compile_get_all_views(&self) -> String;

    fn compile_drop_all_tables(&self, tables: &[String]) -> String;

    fn compile_drop_all_views(&self, views: &[String]) -> String;

    fn compile_create_database(&self, name: &str) -> String;

    fn compile_drop_database(&self, name: &str) -> String;

    fn compile_drop_database_if_exists(&self, name: &str) -> String;

    fn compile_enable_foreign_key_constraints(&self) -> String;

    fn compile_disable_foreign_key_constraints(&self) -> String;
}

#[derive(Debug, Clone, Default)]
pub struct SnowflakeSchemaGrammar {
    wrapper: Wrapper,
    defaults: TableDefaults,
    strict: bool,
}

impl SnowflakeSchemaGrammar {
    pub fn new(policy: DialectPolicy, defaults: TableDefaults) -> Self {
        Self {
            wrapper: Wrapper::new(policy),
            defaults,
            strict: false,
        }
    }

    /// Plain and spatial index commands fail with
    /// [`GrammarError::Unsupported`] instead of compiling.
    pub fn strict(policy: DialectPolicy, defaults: TableDefaults) -> Self {
        Self {
            strict: true,
            ..Self::new(policy, defaults)
        }
    }

    fn table(&self, blueprint: &Blueprint) -> String {
        self.wrapper.wrap_table(&Expr::from(blueprint.table.as_str()))
    }

    fn database(&self, name: &str) -> String {
        self.wrapper.wrap_table_with_prefix(name, "")
    }

    fn alter(&self, blueprint: &Blueprint, action: impl fmt::Display) -> String {
        format!("alter table {} {action}", self.table(blueprint))
    }

    fn index_name(&self, blueprint: &Blueprint, columns: &[String], kind: &str) -> String {
        format!(
            "{}{}_{}_{}",
            self.wrapper.policy().table_prefix,
            blueprint.table,
            columns.join("_"),
            kind
        )
        .to_lowercase()
        .replace(['-', '.'], "_")
    }

    fn ensure_index_supported(&self, what: &str) -> Result<()> {
        if self.strict {
            return Err(GrammarError::unsupported(format!(
                "{what} has no equivalent in this dialect"
            )));
        }
        Ok(())
    }

    fn compile_key(
        &self,
        blueprint: &Blueprint,
        key: &IndexCommand,
        sql_type: &str,
        name_kind: &str,
    ) -> Result<String> {
        if key.columns.is_empty() {
            return Err(GrammarError::compilation(format!(
                "{sql_type} on '{}' lists no columns",
                blueprint.table
            )));
        }

        let name = key
            .index
            .clone()
            .unwrap_or_else(|| self.index_name(blueprint, &key.columns, name_kind));
        let using = key
            .algorithm
            .as_ref()
            .map(|algorithm| format!(" using {algorithm}"))
            .unwrap_or_default();

        Ok(self.alter(
            blueprint,
            format_args!(
                "add constraint {} {sql_type}{using} ({})",
                self.wrapper.wrap_column(&name),
                self.wrapper.columnize(&key.columns)
            ),
        ))
    }

    fn compile_foreign(&self, blueprint: &Blueprint, foreign: &ForeignKey) -> Result<String> {
        if foreign.columns.is_empty() || foreign.references.is_empty() || foreign.on.is_empty() {
            return Err(GrammarError::compilation(format!(
                "foreign key on '{}' needs columns, a referenced table and referenced columns",
                blueprint.table
            )));
        }

        let name = foreign
            .index
            .clone()
            .unwrap_or_else(|| self.index_name(blueprint, &foreign.columns, "foreign"));
        let mut sql = self.alter(
            blueprint,
            format_args!(
                "add constraint {} foreign key ({}) references {} ({})",
                self.wrapper.wrap_column(&name),
                self.wrapper.columnize(&foreign.columns),
                self.wrapper.wrap_table(&Expr::from(foreign.on.as_str())),
                self.wrapper.columnize(&foreign.references)
            ),
        );

        if let Some(action) = &foreign.on_delete {
            sql.push_str(&format!(" on delete {}", referential_action(action)?));
        }
        if let Some(action) = &foreign.on_update {
            sql.push_str(&format!(" on update {}", referential_action(action)?));
        }
        Ok(sql)
    }
}

impl SchemaGrammar for SnowflakeSchemaGrammar {
    fn wrapper(&self) -> &Wrapper {
        &self.wrapper
    }

    fn compile_command(&self, blueprint: &Blueprint, command: &Command) -> Result<Vec<String>> {
        let statement = match command {
            Command::Create => self.compile_create(blueprint)?,
            Command::Add => return self.compile_add(blueprint),
            Command::Change => return self.compile_change(blueprint),
            Command::DropColumn { columns } => {
                if columns.is_empty() {
                    return Err(GrammarError::compilation("drop column lists no columns"));
                }
                let drops = columns
                    .iter()
                    .map(|column| format!("drop column {}", self.wrapper.wrap_name(column)))
                    .collect::<Vec<_>>()
                    .join(", ");
                self.alter(blueprint, drops)
            }
            Command::RenameColumn { from, to } => self.alter(
                blueprint,
                format_args!(
                    "rename column {} to {}",
                    self.wrapper.wrap_name(from),
                    self.wrapper.wrap_name(to)
                ),
            ),
            Command::Primary(key) => self.compile_key(blueprint, key, "primary key", "primary")?,
            Command::Unique(key) => self.compile_key(blueprint, key, "unique", "unique")?,
            Command::Index(key) => {
                self.ensure_index_supported("index")?;
                self.compile_key(blueprint, key, "index", "index")?
            }
            Command::SpatialIndex(key) => {
                self.ensure_index_supported("spatial index")?;
                self.compile_key(blueprint, key, "spatial index", "spatialindex")?
            }
            Command::Foreign(foreign) => self.compile_foreign(blueprint, foreign)?,
            Command::DropPrimary => self.alter(blueprint, "drop primary key"),
            Command::DropUnique { index } => self.alter(
                blueprint,
                format_args!("drop index {}", self.wrapper.wrap_column(index)),
            ),
            Command::DropIndex { index } | Command::DropSpatialIndex { index } => {
                self.ensure_index_supported("drop index")?;
                self.alter(
                    blueprint,
                    format_args!("drop index {}", self.wrapper.wrap_column(index)),
                )
            }
            Command::DropForeign { index } => self.alter(
                blueprint,
                format_args!("drop foreign key {}", self.wrapper.wrap_column(index)),
            ),
            Command::RenameIndex { from, to } => {
                self.ensure_index_supported("rename index")?;
                self.alter(
                    blueprint,
                    format_args!(
                        "rename index {} to {}",
                        self.wrapper.wrap_column(from),
                        self.wrapper.wrap_column(to)
                    ),
                )
            }
            Command::Drop => format!("drop table {}", self.table(blueprint)),
            Command::DropIfExists => format!("drop table if exists {}", self.table(blueprint)),
            Command::Rename { to } => self.alter(
                blueprint,
                format_args!(
                    "rename to {}",
                    self.wrapper.wrap_table(&Expr::from(to.as_str()))
                ),
            ),
        };
        Ok(vec![statement])
    }

    fn compile_create(&self, blueprint: &Blueprint) -> Result<String> {
        let columns = blueprint
            .added_columns()
            .map(|column| ColumnSql::compile(column, &self.wrapper).map(|sql| sql.definition()))
            .collect::<Result<Vec<_>>>()?;
        if columns.is_empty() {
            return Err(GrammarError::compilation(format!(
                "create table '{}' defines no columns",
                blueprint.table
            )));
        }

        let mut sql = format!(
            "{} table {} ({})",
            if blueprint.temporary {
                "create temporary"
            } else {
                "create"
            },
            self.table(blueprint),
            columns.join(", ")
        );

        if let Some(charset) = blueprint.charset.as_ref().or(self.defaults.charset.as_ref()) {
            sql.push_str(&format!(" default character set {charset}"));
        }
        if let Some(collation) = blueprint
            .collation
            .as_ref()
            .or(self.defaults.collation.as_ref())
        {
            sql.push_str(&format!(" collate {}", quote_literal(collation)));
        }
        if let Some(engine) = blueprint.engine.as_ref().or(self.defaults.engine.as_ref()) {
            sql.push_str(&format!(" engine = {engine}"));
        }
        Ok(sql)
    }

    fn compile_add(&self, blueprint: &Blueprint) -> Result<Vec<String>> {
        blueprint
            .added_columns()
            .map(|column| {
                let sql = ColumnSql::compile(column, &self.wrapper)?;
                Ok(self.alter(blueprint, format_args!("add column {}", sql.definition())))
            })
            .collect()
    }

    /// Base `modify column` statements first, then one nullability
    /// statement per column, then sequence restarts.
    fn compile_change(&self, blueprint: &Blueprint) -> Result<Vec<String>> {
        let mut base = Vec::new();
        let mut nullability = Vec::new();
        let mut restarts = Vec::new();

        for column in blueprint.changed_columns() {
            let sql = ColumnSql::compile(column, &self.wrapper)?;
            base.push(self.alter(
                blueprint,
                format_args!("modify column {}", sql.change_definition()),
            ));

            match sql.nullability() {
                Some(Nullability::NotNull) => nullability.push(self.alter(
                    blueprint,
                    format_args!("modify column {} set not null", sql.name),
                )),
                Some(Nullability::Null) => nullability.push(self.alter(
                    blueprint,
                    format_args!("modify column {} drop not null", sql.name),
                )),
                None => {}
            }

            if let (true, Some(start)) = (column.auto_increment, column.starting_value) {
                restarts.push(self.alter(blueprint, format_args!("autoincrement start {start}")));
            }
        }

        base.extend(nullability);
        base.extend(restarts);
        Ok(base)
    }

    fn compile_table_exists(&self) -> String {
        "select * from information_schema.tables where table_catalog = ? and table_name = ? and table_type = 'BASE TABLE'".to_owned()
    }

    fn compile_table_details(&self, table: &str) -> String {
        format!(
            "select * from information_schema.tables where table_name = {} order by ordinal_position",
            quote_literal(table)
        )
    }

    fn compile_column_listing(&self) -> String {
        "select column_name as \"column_name\", data_type as \"column_type\", lower(is_nullable) as \"is_nullable\" from {DB_NAME}.information_schema.columns where table_catalog = ? and table_name = ?".to_owned()
    }

    fn compile_column_type(&self) -> String {
        "select column_name as \"column_name\", data_type as \"column_type\", numeric_precision as \"numeric_precision\", numeric_scale as \"numeric_scale\" from {DB_NAME}.information_schema.columns where table_name = ? and column_name = ?".to_owned()
    }

    fn compile_get_all_tables(&self) -> String {
        "SHOW TABLES".to_owned()
    }

    fn compile_get_all_views(&self) -> String {
        "SHOW VIEWS".to_owned()
    }

    fn compile_drop_all_tables(&self, tables: &[String]) -> String {
        format!("drop table {}", wrap_list(&self.wrapper, tables))
    }

    fn compile_drop_all_views(&self, views: &[String]) -> String {
        format!("drop view {}", wrap_list(&self.wrapper, views))
    }

    fn compile_create_database(&self, name: &str) -> String {
        format!("create database {}", self.database(name))
    }

    fn compile_drop_database(&self, name: &str) -> String {
        format!("drop database {}", self.database(name))
    }

    fn compile_drop_database_if_exists(&self, name: &str) -> String {
        format!("drop database if exists {}", self.database(name))
    }

    fn compile_enable_foreign_key_constraints(&self) -> String {
        "SET FOREIGN_KEY_CHECKS=1;".to_owned()
    }

    fn compile_disable_foreign_key_constraints(&self) -> String {
        "SET FOREIGN_KEY_CHECKS=0;".to_owned()
    }
}

fn wrap_list(wrapper: &Wrapper, names: &[String]) -> String {
    names
        .iter()
        .map(|name| wrapper.wrap_name(name))
        .collect::<Vec<_>>()
        .join(",")
}

fn referential_action(action: &str) -> Result<String> {
    let normalized = action.trim().to_lowercase();
    if REFERENTIAL_ACTIONS.contains(&normalized.as_str()) {
        Ok(normalized)
    } else {
        Err(GrammarError::compilation(format!(
            "invalid referential action '{action}'"
        )))
    }
}
