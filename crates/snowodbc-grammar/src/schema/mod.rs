//! Structured schema-change descriptions consumed by the schema grammar.

mod grammar;
mod modifiers;
mod types;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::value::Param;

pub use grammar::{SchemaGrammar, SnowflakeSchemaGrammar, TableDefaults};
pub use types::ColumnType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ColumnType,
    #[serde(default)]
    pub length: Option<u32>,
    #[serde(default)]
    pub total: Option<u32>,
    #[serde(default)]
    pub places: Option<u32>,
    #[serde(default)]
    pub precision: Option<u32>,
    #[serde(default)]
    pub allowed: Vec<String>,
    /// `None` behaves like `Some(false)` except on generated columns.
    #[serde(default)]
    pub nullable: Option<bool>,
    #[serde(default)]
    pub default: Option<Param>,
    #[serde(default)]
    pub auto_increment: bool,
    #[serde(default)]
    pub starting_value: Option<u64>,
    #[serde(default)]
    pub charset: Option<String>,
    #[serde(default)]
    pub collation: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub after: Option<String>,
    #[serde(default)]
    pub first: bool,
    #[serde(default)]
    pub virtual_as: Option<String>,
    #[serde(default)]
    pub stored_as: Option<String>,
    #[serde(default)]
    pub srid: Option<u32>,
    #[serde(default)]
    pub use_current: bool,
    #[serde(default)]
    pub use_current_on_update: bool,
    /// Modify an existing column instead of adding one.
    #[serde(default)]
    pub change: bool,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub index: bool,
}

impl ColumnDefinition {
    pub fn new(kind: ColumnType, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            length: None,
            total: None,
            places: None,
            precision: None,
            allowed: Vec::new(),
            nullable: None,
            default: None,
            auto_increment: false,
            starting_value: None,
            charset: None,
            collation: None,
            comment: None,
            after: None,
            first: false,
            virtual_as: None,
            stored_as: None,
            srid: None,
            use_current: false,
            use_current_on_update: false,
            change: false,
            primary: false,
            unique: false,
            index: false,
        }
    }

    pub fn nullable(&mut self) -> &mut Self {
        self.nullable = Some(true);
        self
    }

    pub fn not_null(&mut self) -> &mut Self {
        self.nullable = Some(false);
        self
    }

    pub fn default(&mut self, value: impl Into<Param>) -> &mut Self {
        self.default = Some(value.into());
        self
    }

    pub fn comment(&mut self, comment: impl Into<String>) -> &mut Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn after(&mut self, column: impl Into<String>) -> &mut Self {
        self.after = Some(column.into());
        self
    }

    pub fn auto_increment(&mut self) -> &mut Self {
        self.auto_increment = true;
        self
    }

    pub fn starting_value(&mut self, value: u64) -> &mut Self {
        self.starting_value = Some(value);
        self
    }

    pub fn use_current(&mut self) -> &mut Self {
        self.use_current = true;
        self
    }

    pub fn virtual_as(&mut self, expression: impl Into<String>) -> &mut Self {
        self.virtual_as = Some(expression.into());
        self
    }

    pub fn stored_as(&mut self, expression: impl Into<String>) -> &mut Self {
        self.stored_as = Some(expression.into());
        self
    }

    pub fn change(&mut self) -> &mut Self {
        self.change = true;
        self
    }

    pub fn primary(&mut self) -> &mut Self {
        self.primary = true;
        self
    }

    pub fn unique(&mut self) -> &mut Self {
        self.unique = true;
        self
    }

    pub fn index(&mut self) -> &mut Self {
        self.index = true;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexCommand {
    /// Generated from prefix, table, columns and key type when absent.
    #[serde(default)]
    pub index: Option<String>,
    pub columns: Vec<String>,
    #[serde(default)]
    pub algorithm: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    #[serde(default)]
    pub index: Option<String>,
    pub columns: Vec<String>,
    pub on: String,
    pub references: Vec<String>,
    #[serde(default)]
    pub on_delete: Option<String>,
    #[serde(default)]
    pub on_update: Option<String>,
}

/// Foreign key just added to a blueprint. It is always the last command,
/// since the blueprint stays mutably borrowed until this is dropped.
#[derive(Debug)]
pub struct PendingForeign<'b> {
    commands: &'b mut Vec<Command>,
}

impl PendingForeign<'_> {
    fn edit(&mut self, apply: impl FnOnce(&mut ForeignKey)) -> &mut Self {
        if let Some(Command::Foreign(foreign)) = self.commands.last_mut() {
            apply(foreign);
        }
        self
    }

    pub fn references<I, S>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        self.edit(|foreign| foreign.references = columns)
    }

    pub fn on(&mut self, table: impl Into<String>) -> &mut Self {
        let table = table.into();
        self.edit(|foreign| foreign.on = table)
    }

    pub fn on_delete(&mut self, action: impl Into<String>) -> &mut Self {
        let action = action.into();
        self.edit(|foreign| foreign.on_delete = Some(action))
    }

    pub fn on_update(&mut self, action: impl Into<String>) -> &mut Self {
        let action = action.into();
        self.edit(|foreign| foreign.on_update = Some(action))
    }

    pub fn index(&mut self, name: impl Into<String>) -> &mut Self {
        let name = name.into();
        self.edit(|foreign| foreign.index = Some(name))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum Command {
    Create,
    Add,
    Change,
    DropColumn { columns: Vec<String> },
    RenameColumn { from: String, to: String },
    Primary(IndexCommand),
    Unique(IndexCommand),
    Index(IndexCommand),
    SpatialIndex(IndexCommand),
    Foreign(ForeignKey),
    DropPrimary,
    DropUnique { index: String },
    DropIndex { index: String },
    DropSpatialIndex { index: String },
    DropForeign { index: String },
    RenameIndex { from: String, to: String },
    Drop,
    DropIfExists,
    Rename { to: String },
}

/// Table definition plus the change operations to apply to it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Blueprint {
    pub table: String,
    pub temporary: bool,
    pub charset: Option<String>,
    pub collation: Option<String>,
    pub engine: Option<String>,
    pub columns: Vec<ColumnDefinition>,
    pub commands: Vec<Command>,
}

impl Blueprint {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    pub fn creating(&self) -> bool {
        self.commands.iter().any(|command| *command == Command::Create)
    }

    pub fn added_columns(&self) -> impl Iterator<Item = &ColumnDefinition> {
        self.columns.iter().filter(|column| !column.change)
    }

    pub fn changed_columns(&self) -> impl Iterator<Item = &ColumnDefinition> {
        self.columns.iter().filter(|column| column.change)
    }

    /// Compiles every explicit and implied command, in order.
    pub fn to_sql(&self, grammar: &dyn SchemaGrammar) -> Result<Vec<String>> {
        let mut statements = Vec::new();
        for command in self.commands_with_implied() {
            statements.extend(grammar.compile_command(self, &command)?);
        }
        Ok(statements)
    }

    fn commands_with_implied(&self) -> Vec<Command> {
        let mut commands = Vec::with_capacity(self.commands.len() + 2);
        if self.changed_columns().next().is_some() {
            commands.push(Command::Change);
        }
        if !self.creating() && self.added_columns().next().is_some() {
            commands.push(Command::Add);
        }
        commands.extend(self.commands.iter().cloned());

        for column in &self.columns {
            let key = || IndexCommand {
                index: None,
                columns: vec![column.name.clone()],
                algorithm: None,
            };
            if column.primary {
                commands.push(Command::Primary(key()));
            }
            if column.unique {
                commands.push(Command::Unique(key()));
            }
            if column.index {
                commands.push(Command::Index(key()));
            }
        }
        commands
    }

    pub fn create(&mut self) -> &mut Self {
        self.commands.push(Command::Create);
        self
    }

    pub fn temporary(&mut self) -> &mut Self {
        self.temporary = true;
        self
    }

    pub fn column(&mut self, kind: ColumnType, name: impl Into<String>) -> &mut ColumnDefinition {
        self.columns.push(ColumnDefinition::new(kind, name));
        let last = self.columns.len() - 1;
        &mut self.columns[last]
    }

    /// Auto-incrementing big integer primary key named `id`.
    pub fn id(&mut self) -> &mut ColumnDefinition {
        self.big_increments("id")
    }

    pub fn big_increments(&mut self, name: impl Into<String>) -> &mut ColumnDefinition {
        self.column(ColumnType::BigInteger, name).auto_increment()
    }

    pub fn increments(&mut self, name: impl Into<String>) -> &mut ColumnDefinition {
        self.column(ColumnType::Integer, name).auto_increment()
    }

    pub fn string(&mut self, name: impl Into<String>, length: u32) -> &mut ColumnDefinition {
        let column = self.column(ColumnType::String, name);
        column.length = Some(length);
        column
    }

    pub fn text(&mut self, name: impl Into<String>) -> &mut ColumnDefinition {
        self.column(ColumnType::Text, name)
    }

    pub fn integer(&mut self, name: impl Into<String>) -> &mut ColumnDefinition {
        self.column(ColumnType::Integer, name)
    }

    pub fn big_integer(&mut self, name: impl Into<String>) -> &mut ColumnDefinition {
        self.column(ColumnType::BigInteger, name)
    }

    pub fn boolean(&mut self, name: impl Into<String>) -> &mut ColumnDefinition {
        self.column(ColumnType::Boolean, name)
    }

    pub fn decimal(
        &mut self,
        name: impl Into<String>,
        total: u32,
        places: u32,
    ) -> &mut ColumnDefinition {
        let column = self.column(ColumnType::Decimal, name);
        column.total = Some(total);
        column.places = Some(places);
        column
    }

    pub fn json(&mut self, name: impl Into<String>) -> &mut ColumnDefinition {
        self.column(ColumnType::Json, name)
    }

    pub fn uuid(&mut self, name: impl Into<String>) -> &mut ColumnDefinition {
        self.column(ColumnType::Uuid, name)
    }

    pub fn timestamp(&mut self, name: impl Into<String>) -> &mut ColumnDefinition {
        self.column(ColumnType::Timestamp, name)
    }

    /// Nullable `created_at` and `updated_at` columns.
    pub fn timestamps(&mut self) -> &mut Self {
        self.timestamp("created_at").nullable();
        self.timestamp("updated_at").nullable();
        self
    }

    pub fn drop_column<I, S>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.commands.push(Command::DropColumn {
            columns: columns.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn rename_column(&mut self, from: impl Into<String>, to: impl Into<String>) -> &mut Self {
        self.commands.push(Command::RenameColumn {
            from: from.into(),
            to: to.into(),
        });
        self
    }

    fn key<I, S>(columns: I) -> IndexCommand
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        IndexCommand {
            index: None,
            columns: columns.into_iter().map(Into::into).collect(),
            algorithm: None,
        }
    }

    pub fn primary<I, S>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.commands.push(Command::Primary(Self::key(columns)));
        self
    }

    pub fn unique<I, S>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.commands.push(Command::Unique(Self::key(columns)));
        self
    }

    pub fn index<I, S>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.commands.push(Command::Index(Self::key(columns)));
        self
    }

    pub fn foreign<I, S>(&mut self, columns: I) -> PendingForeign<'_>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.commands.push(Command::Foreign(ForeignKey {
            columns: columns.into_iter().map(Into::into).collect(),
            ..ForeignKey::default()
        }));
        PendingForeign {
            commands: &mut self.commands,
        }
    }

    pub fn drop_primary(&mut self) -> &mut Self {
        self.commands.push(Command::DropPrimary);
        self
    }

    pub fn drop_unique(&mut self, index: impl Into<String>) -> &mut Self {
        self.commands.push(Command::DropUnique {
            index: index.into(),
        });
        self
    }

    pub fn drop_index(&mut self, index: impl Into<String>) -> &mut Self {
        self.commands.push(Command::DropIndex {
            index: index.into(),
        });
        self
    }

    pub fn drop_foreign(&mut self, index: impl Into<String>) -> &mut Self {
        self.commands.push(Command::DropForeign {
            index: index.into(),
        });
        self
    }

    pub fn rename_index(&mut self, from: impl Into<String>, to: impl Into<String>) -> &mut Self {
        self.commands.push(Command::RenameIndex {
            from: from.into(),
            to: to.into(),
        });
        self
    }

    pub fn drop(&mut self) -> &mut Self {
        self.commands.push(Command::Drop);
        self
    }

    pub fn drop_if_exists(&mut self) -> &mut Self {
        self.commands.push(Command::DropIfExists);
        self
    }

    pub fn rename(&mut self, to: impl Into<String>) -> &mut Self {
        self.commands.push(Command::Rename { to: to.into() });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn implied_commands_precede_explicit_ones() {
        let mut blueprint = Blueprint::new("users");
        blueprint.string("email", 100).unique();
        blueprint.integer("votes").change();
        blueprint.drop_column(["legacy"]);

        let commands = blueprint.commands_with_implied();
        assert_eq!(commands[0], Command::Change);
        assert_eq!(commands[1], Command::Add);
        assert!(matches!(commands[2], Command::DropColumn { .. }));
        assert!(matches!(&commands[3], Command::Unique(key) if key.columns == ["email"]));
    }

    #[test]
    fn creating_suppresses_implied_add() {
        let mut blueprint = Blueprint::new("users");
        blueprint.create();
        blueprint.id();
        assert_eq!(blueprint.commands_with_implied(), vec![Command::Create]);
    }

    #[test]
    fn blueprints_deserialize_from_json() {
        let blueprint: Blueprint = serde_json::from_str(
            r#"{
                "table": "users",
                "columns": [
                    {"name": "id", "type": "bigInteger", "auto_increment": true},
                    {"name": "name", "type": "string", "length": 80, "nullable": true}
                ],
                "commands": [
                    {"name": "create"},
                    {"name": "unique", "columns": ["name"]},
                    {"name": "rename_column", "from": "a", "to": "b"}
                ]
            }"#,
        )
        .unwrap();

        assert!(blueprint.creating());
        assert_eq!(blueprint.columns[1].length, Some(80));
        assert!(matches!(&blueprint.commands[1], Command::Unique(key) if key.index.is_none()));
    }
}
