//! Column modifiers, rendered as typed fragments in the fixed order
//! charset, collate, virtual-as, stored-as, nullable, srid, default,
//! increment, comment, after, first.
//!
//! Keeping fragments typed lets the change-column path remove nullability
//! and defaults without searching the rendered text.

use super::types::{type_sql, ColumnType, TypeSql};
use super::ColumnDefinition;
use crate::error::Result;
use crate::value::{is_numeric_literal, quote_literal, Param, Value};
use crate::wrapper::Wrapper;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Nullability {
    Null,
    NotNull,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Fragment {
    Nullability(Nullability),
    Default(String),
    Increment(String),
    Other(String),
}

impl Fragment {
    fn sql(&self) -> &str {
        match self {
            Fragment::Nullability(Nullability::Null) => "null",
            Fragment::Nullability(Nullability::NotNull) => "not null",
            Fragment::Default(sql) | Fragment::Increment(sql) | Fragment::Other(sql) => sql,
        }
    }
}

/// A column compiled into its wrapped name, type, and modifier fragments.
#[derive(Debug, Clone)]
pub(crate) struct ColumnSql {
    pub name: String,
    pub ty: String,
    pub fragments: Vec<Fragment>,
}

impl ColumnSql {
    pub fn compile(column: &ColumnDefinition, wrapper: &Wrapper) -> Result<Self> {
        let TypeSql {
            ty,
            current_default,
        } = type_sql(column)?;

        let mut fragments = Vec::new();
        if let Some(current) = current_default {
            fragments.push(Fragment::Default(current));
        }

        if let Some(charset) = &column.charset {
            fragments.push(Fragment::Other(format!("character set {charset}")));
        }
        if let Some(collation) = &column.collation {
            fragments.push(Fragment::Other(format!("collate {}", quote_literal(collation))));
        }
        if let Some(expression) = &column.virtual_as {
            fragments.push(Fragment::Other(format!("as ({expression})")));
        }
        if let Some(expression) = &column.stored_as {
            fragments.push(Fragment::Other(format!("as ({expression}) stored")));
        }

        let generated = column.virtual_as.is_some() || column.stored_as.is_some();
        match (generated, column.nullable) {
            (false, Some(true)) => fragments.push(Fragment::Nullability(Nullability::Null)),
            (false, _) | (true, Some(false)) => {
                fragments.push(Fragment::Nullability(Nullability::NotNull))
            }
            (true, _) => {}
        }

        if let Some(srid) = column.srid.filter(|srid| *srid > 0) {
            fragments.push(Fragment::Other(format!("srid {srid}")));
        }
        if let Some(default) = column.default.as_ref().and_then(|d| default_value(d, column.kind)) {
            fragments.push(Fragment::Default(format!("default {default}")));
        }
        if column.kind.is_serial() && column.auto_increment {
            fragments.push(Fragment::Increment("autoincrement primary key".into()));
        }
        if let Some(comment) = &column.comment {
            fragments.push(Fragment::Other(format!("comment {}", quote_literal(comment))));
        }
        if let Some(after) = &column.after {
            fragments.push(Fragment::Other(format!("after {}", wrapper.wrap_name(after))));
        }
        if column.first {
            fragments.push(Fragment::Other("first".into()));
        }

        Ok(Self {
            name: wrapper.wrap_column(&column.name),
            ty,
            fragments,
        })
    }

    /// Definition for create table / add column. Columns are nullable by
    /// default there, so an explicit `null` is left out.
    pub fn definition(&self) -> String {
        self.render(|fragment| !matches!(fragment, Fragment::Nullability(Nullability::Null)))
    }

    /// Definition for `modify column`: no nullability, no increment, and
    /// only sequence-backed defaults.
    pub fn change_definition(&self) -> String {
        self.render(|fragment| match fragment {
            Fragment::Nullability(_) | Fragment::Increment(_) => false,
            Fragment::Default(sql) => sql.contains(".nextval"),
            Fragment::Other(_) => true,
        })
    }

    pub fn nullability(&self) -> Option<Nullability> {
        self.fragments.iter().find_map(|fragment| match fragment {
            Fragment::Nullability(state) => Some(*state),
            _ => None,
        })
    }

    fn render(&self, keep: impl Fn(&Fragment) -> bool) -> String {
        let mut sql = format!("{} {}", self.name, self.ty);
        for fragment in self.fragments.iter().filter(|fragment| keep(fragment)) {
            sql.push(' ');
            sql.push_str(fragment.sql());
        }
        sql
    }
}

/// Formats a default value; `None` when the column has no default.
fn default_value(default: &Param, kind: ColumnType) -> Option<String> {
    let value = match default {
        Param::Raw { raw } => return Some(raw.clone()),
        Param::Value(value) => value,
    };

    if kind == ColumnType::Boolean {
        if value.is_null() {
            return None;
        }
        return Some(if value.truthy() { "TRUE" } else { "FALSE" }.to_owned());
    }

    match value {
        Value::Null => None,
        Value::Bool(flag) => Some(if *flag { "TRUE" } else { "FALSE" }.to_owned()),
        Value::Int(number) => Some(number.to_string()),
        Value::Float(number) => Some(number.to_string()),
        Value::Text(text) if is_numeric_literal(text) => Some(text.trim().to_owned()),
        Value::Text(text) => Some(quote_literal(text)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::DialectPolicy;

    fn wrapper() -> Wrapper {
        Wrapper::new(DialectPolicy::case_sensitive())
    }

    #[test]
    fn modifiers_follow_fixed_order() {
        let mut column = ColumnDefinition::new(ColumnType::String, "title");
        column.comment = Some("Headline".into());
        column.default = Some(Param::from("untitled"));
        column.collation = Some("utf8".into());
        column.charset = Some("utf8mb4".into());
        column.after = Some("id".into());

        let sql = ColumnSql::compile(&column, &wrapper()).unwrap();
        assert_eq!(
            sql.definition(),
            "\"title\" varchar(255) character set utf8mb4 collate 'utf8' not null default 'untitled' comment 'Headline' after \"id\""
        );
    }

    #[test]
    fn explicit_null_is_dropped_for_new_columns() {
        let mut column = ColumnDefinition::new(ColumnType::Integer, "votes");
        column.nullable = Some(true);
        let sql = ColumnSql::compile(&column, &wrapper()).unwrap();
        assert_eq!(sql.definition(), "\"votes\" int");
        assert_eq!(sql.nullability(), Some(Nullability::Null));
    }

    #[test]
    fn generated_columns_only_state_not_null_explicitly() {
        let mut column = ColumnDefinition::new(ColumnType::Integer, "total");
        column.virtual_as = Some("price * qty".into());
        let sql = ColumnSql::compile(&column, &wrapper()).unwrap();
        assert_eq!(sql.definition(), "\"total\" int as (price * qty)");

        column.nullable = Some(false);
        let sql = ColumnSql::compile(&column, &wrapper()).unwrap();
        assert_eq!(sql.definition(), "\"total\" int as (price * qty) not null");
    }

    #[test]
    fn defaults_by_type() {
        let mut flag = ColumnDefinition::new(ColumnType::Boolean, "active");
        flag.default = Some(Param::from("yes"));
        assert!(ColumnSql::compile(&flag, &wrapper())
            .unwrap()
            .definition()
            .ends_with("default TRUE"));

        let mut count = ColumnDefinition::new(ColumnType::Integer, "count");
        count.default = Some(Param::from("10"));
        assert!(ColumnSql::compile(&count, &wrapper())
            .unwrap()
            .definition()
            .ends_with("default 10"));

        let mut raw = ColumnDefinition::new(ColumnType::BigInteger, "seq");
        raw.default = Some(Param::raw("my_seq.nextval"));
        let sql = ColumnSql::compile(&raw, &wrapper()).unwrap();
        assert!(sql.change_definition().ends_with("default my_seq.nextval"));
    }

    #[test]
    fn change_definition_strips_plain_defaults_and_nullability() {
        let mut column = ColumnDefinition::new(ColumnType::String, "name");
        column.length = Some(50);
        column.default = Some(Param::from("x"));
        column.comment = Some("c".into());
        let sql = ColumnSql::compile(&column, &wrapper()).unwrap();
        assert_eq!(sql.change_definition(), "\"name\" varchar(50) comment 'c'");
        assert_eq!(sql.nullability(), Some(Nullability::NotNull));
    }

    #[test]
    fn serial_columns_get_autoincrement() {
        let mut id = ColumnDefinition::new(ColumnType::BigInteger, "id");
        id.auto_increment = true;
        let sql = ColumnSql::compile(&id, &wrapper()).unwrap();
        assert_eq!(
            sql.definition(),
            "\"id\" bigint not null autoincrement primary key"
        );
    }
}
