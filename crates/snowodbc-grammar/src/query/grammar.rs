//! Query grammar for the warehouse dialect.
//!
//! Every compile function threads a binding sink through the clause
//! compilers. A value is pushed at the moment its `?` is written, so the
//! binding list always matches placeholder order in the final text.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};
use tracing::debug;

use super::{
    Aggregate, DatePart, Distinct, Having, HavingKind, Join, Lock, Order, Query, Record, Where,
    WhereKind,
};
use crate::compiled::{concatenate, Compiled};
use crate::error::{GrammarError, Result};
use crate::policy::DialectPolicy;
use crate::value::{Param, Value};
use crate::wrapper::{is_json_selector, split_alias, Expr, Wrapper};

/// Implicit per-row identity column used to emulate multi-table DML.
const ROW_ID: &str = "rowid";

const OPERATORS: &[&str] = &[
    "=", "<", ">", "<=", ">=", "<>", "!=", "like", "not like", "ilike", "not ilike", "rlike",
    "regexp",
];

/// Assignment in the `do update set` part of an upsert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UpsertUpdate {
    /// Take the value proposed by the conflicting row (`excluded.<column>`).
    Column(String),
    /// Assign an explicit value.
    Assign { column: String, value: Param },
}

/// Capability interface for query compilation.
pub trait QueryGrammar: Send + Sync + fmt::Debug {
    fn wrapper(&self) -> &Wrapper;

    fn compile_select(&self, query: &Query) -> Result<Compiled>;

    fn compile_insert(&self, query: &Query, rows: &[Record]) -> Result<Compiled>;

    fn compile_insert_or_ignore(&self, query: &Query, rows: &[Record]) -> Result<Compiled>;

    /// The id itself is fetched afterwards by the post-processor; the
    /// sequence name does not change the insert text.
    fn compile_insert_get_id(
        &self,
        query: &Query,
        record: &Record,
        sequence: Option<&str>,
    ) -> Result<Compiled>;

    fn compile_upsert(
        &self,
        query: &Query,
        rows: &[Record],
        unique_by: &[String],
        update: &[UpsertUpdate],
    ) -> Result<Compiled>;

    fn compile_update(&self, query: &Query, values: &Record) -> Result<Compiled>;

    fn compile_delete(&self, query: &Query) -> Result<Compiled>;

    fn compile_truncate(&self, query: &Query) -> Result<Compiled>;

    fn compile_aggregate(&self, query: &Query, aggregate: &Aggregate) -> Result<String>;

    fn compile_lock(&self, lock: &Lock) -> Result<String>;

    fn compile_date_where(
        &self,
        part: DatePart,
        column: &Expr,
        operator: &str,
        value: &Param,
        bindings: &mut Vec<Value>,
    ) -> Result<String>;
}

#[derive(Debug, Clone, Default)]
pub struct SnowflakeQueryGrammar {
    wrapper: Wrapper,
    strict: bool,
}

impl SnowflakeQueryGrammar {
    pub fn new(policy: DialectPolicy) -> Self {
        Self {
            wrapper: Wrapper::new(policy),
            strict: false,
        }
    }

    /// Lock clauses fail with [`GrammarError::Unsupported`] instead of
    /// being dropped.
    pub fn strict(policy: DialectPolicy) -> Self {
        Self {
            wrapper: Wrapper::new(policy),
            strict: true,
        }
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    fn target_table(&self, query: &Query) -> Result<String> {
        query
            .from
            .as_ref()
            .map(|from| self.wrapper.wrap_table(from))
            .ok_or_else(|| GrammarError::compilation("query has no target table"))
    }

    fn parameter(&self, param: &Param, bindings: &mut Vec<Value>) -> String {
        match param {
            Param::Raw { raw } => raw.clone(),
            Param::Value(value) => {
                bindings.push(value.clone());
                "?".to_owned()
            }
        }
    }

    fn parameterize(&self, params: &[Param], bindings: &mut Vec<Value>) -> String {
        params
            .iter()
            .map(|param| self.parameter(param, bindings))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn select_sql(&self, query: &Query, bindings: &mut Vec<Value>) -> Result<String> {
        if query.aggregate.is_some() && (!query.unions.is_empty() || !query.havings.is_empty()) {
            return self.union_aggregate_sql(query, bindings);
        }

        let mut parts = Vec::new();
        match &query.aggregate {
            Some(aggregate) => parts.push(self.compile_aggregate(query, aggregate)?),
            None => parts.push(self.columns_sql(query)),
        }

        if let Some(from) = &query.from {
            parts.push(format!("from {}", self.wrapper.wrap_table(from)));
        }
        if !query.joins.is_empty() {
            parts.push(self.joins_sql(&query.joins, bindings)?);
        }
        if !query.wheres.is_empty() {
            parts.push(self.wheres_sql(&query.wheres, "where", bindings)?);
        }
        if !query.groups.is_empty() {
            parts.push(format!(
                "group by {}",
                self.wrapper.columnize_exprs(&query.groups)
            ));
        }
        if !query.havings.is_empty() {
            parts.push(self.havings_sql(&query.havings, bindings)?);
        }
        if !query.orders.is_empty() {
            parts.push(self.orders_sql(&query.orders));
        }
        if let Some(limit) = query.limit {
            parts.push(format!("limit {limit}"));
        }
        if let Some(offset) = query.offset {
            parts.push(format!("offset {offset}"));
        }
        if let Some(lock) = &query.lock {
            parts.push(self.compile_lock(lock)?);
        }

        let sql = concatenate(&parts);
        if query.unions.is_empty() {
            return Ok(sql);
        }

        let unions = self.unions_sql(query, bindings)?;
        Ok(format!("{} {}", self.wrap_union(&sql), unions))
    }

    fn union_aggregate_sql(&self, query: &Query, bindings: &mut Vec<Value>) -> Result<String> {
        let aggregate = query
            .aggregate
            .as_ref()
            .ok_or_else(|| GrammarError::compilation("aggregate missing"))?;
        let head = self.compile_aggregate(query, aggregate)?;

        let mut inner = query.clone();
        inner.aggregate = None;
        let inner_sql = self.select_sql(&inner, bindings)?;

        Ok(format!(
            "{head} from ({inner_sql}) as {}",
            self.wrapper.wrap_table(&Expr::from("temp_table"))
        ))
    }

    fn columns_sql(&self, query: &Query) -> String {
        let select = if query.distinct.is_set() {
            "select distinct"
        } else {
            "select"
        };

        if query.columns.is_empty() {
            return format!("{select} *");
        }
        format!("{select} {}", self.wrapper.columnize_exprs(&query.columns))
    }

    fn joins_sql(&self, joins: &[Join], bindings: &mut Vec<Value>) -> Result<String> {
        let mut out = Vec::with_capacity(joins.len());
        for join in joins {
            let table = self.wrapper.wrap_table(&join.table);
            if join.wheres.is_empty() {
                out.push(format!("{} join {table}", join.kind.as_str()));
            } else {
                let on = self.wheres_sql(&join.wheres, "on", bindings)?;
                out.push(format!("{} join {table} {on}", join.kind.as_str()));
            }
        }
        Ok(out.join(" "))
    }

    fn wheres_sql(
        &self,
        wheres: &[Where],
        conjunction: &str,
        bindings: &mut Vec<Value>,
    ) -> Result<String> {
        let clauses = self.where_clauses(wheres, bindings)?;
        Ok(format!("{conjunction} {clauses}"))
    }

    /// Clauses joined by their booleans with the leading boolean removed.
    fn where_clauses(&self, wheres: &[Where], bindings: &mut Vec<Value>) -> Result<String> {
        let mut out = Vec::with_capacity(wheres.len());
        for (idx, clause) in wheres.iter().enumerate() {
            let sql = self.where_sql(&clause.kind, bindings)?;
            if idx == 0 {
                out.push(sql);
            } else {
                out.push(format!("{} {sql}", clause.boolean.as_str()));
            }
        }
        Ok(out.join(" "))
    }

    fn where_sql(&self, kind: &WhereKind, bindings: &mut Vec<Value>) -> Result<String> {
        match kind {
            WhereKind::Basic {
                column,
                operator,
                value,
            } => {
                let operator = self.operator(operator)?;
                let column = self.wrapper.wrap(column);
                if let Param::Value(Value::Null) = value {
                    match operator.as_str() {
                        "=" => return Ok(format!("{column} is null")),
                        "!=" | "<>" => return Ok(format!("{column} is not null")),
                        _ => {}
                    }
                }
                let value = self.parameter(value, bindings);
                Ok(format!("{column} {operator} {value}"))
            }
            WhereKind::Column {
                first,
                operator,
                second,
            } => Ok(format!(
                "{} {} {}",
                self.wrapper.wrap(first),
                self.operator(operator)?,
                self.wrapper.wrap(second)
            )),
            WhereKind::In { column, values, not } => {
                if values.is_empty() {
                    return Ok(if *not { "1 = 1" } else { "0 = 1" }.to_owned());
                }
                let keyword = if *not { "not in" } else { "in" };
                let params = self.parameterize(values, bindings);
                Ok(format!("{} {keyword} ({params})", self.wrapper.wrap(column)))
            }
            WhereKind::Null { column, not } => {
                let test = if *not { "is not null" } else { "is null" };
                Ok(format!("{} {test}", self.wrapper.wrap(column)))
            }
            WhereKind::Between {
                column,
                min,
                max,
                not,
            } => {
                let keyword = if *not { "not between" } else { "between" };
                let column = self.wrapper.wrap(column);
                let min = self.parameter(min, bindings);
                let max = self.parameter(max, bindings);
                Ok(format!("{column} {keyword} {min} and {max}"))
            }
            WhereKind::Nested { wheres } => {
                if wheres.is_empty() {
                    return Err(GrammarError::compilation(
                        "nested where group has no conditions",
                    ));
                }
                Ok(format!("({})", self.where_clauses(wheres, bindings)?))
            }
            WhereKind::Raw { sql, bindings: raw } => {
                bindings.extend(raw.iter().cloned());
                Ok(sql.clone())
            }
            WhereKind::Exists { query, not } => {
                let keyword = if *not { "not exists" } else { "exists" };
                Ok(format!("{keyword} ({})", self.select_sql(query, bindings)?))
            }
            WhereKind::InSub { column, query, not } => {
                let keyword = if *not { "not in" } else { "in" };
                let column = self.wrapper.wrap(column);
                Ok(format!(
                    "{column} {keyword} ({})",
                    self.select_sql(query, bindings)?
                ))
            }
            WhereKind::Date {
                part,
                column,
                operator,
                value,
            } => self.compile_date_where(*part, column, operator, value, bindings),
        }
    }

    fn havings_sql(&self, havings: &[Having], bindings: &mut Vec<Value>) -> Result<String> {
        let mut out = Vec::with_capacity(havings.len());
        for (idx, having) in havings.iter().enumerate() {
            let sql = match &having.kind {
                HavingKind::Basic {
                    column,
                    operator,
                    value,
                } => {
                    let operator = self.operator(operator)?;
                    let column = self.wrapper.wrap(column);
                    format!("{column} {operator} {}", self.parameter(value, bindings))
                }
                HavingKind::Between {
                    column,
                    min,
                    max,
                    not,
                } => {
                    let keyword = if *not { "not between" } else { "between" };
                    let column = self.wrapper.wrap(column);
                    let min = self.parameter(min, bindings);
                    let max = self.parameter(max, bindings);
                    format!("{column} {keyword} {min} and {max}")
                }
                HavingKind::Raw { sql, bindings: raw } => {
                    bindings.extend(raw.iter().cloned());
                    sql.clone()
                }
            };
            if idx == 0 {
                out.push(sql);
            } else {
                out.push(format!("{} {sql}", having.boolean.as_str()));
            }
        }
        Ok(format!("having {}", out.join(" ")))
    }

    fn orders_sql(&self, orders: &[Order]) -> String {
        let orders = orders
            .iter()
            .map(|order| match order {
                Order::Raw { sql } => sql.clone(),
                Order::Column { column, direction } => {
                    format!("{} {}", self.wrapper.wrap(column), direction.as_str())
                }
            })
            .collect::<Vec<_>>();
        format!("order by {}", orders.join(", "))
    }

    fn unions_sql(&self, query: &Query, bindings: &mut Vec<Value>) -> Result<String> {
        let mut sql = String::new();
        for union in &query.unions {
            let inner = self.select_sql(&union.query, bindings)?;
            sql.push_str(if union.all { " union all " } else { " union " });
            sql.push_str(&self.wrap_union(&inner));
        }

        if !query.union_orders.is_empty() {
            sql.push(' ');
            sql.push_str(&self.orders_sql(&query.union_orders));
        }
        if let Some(limit) = query.union_limit {
            sql.push_str(&format!(" limit {limit}"));
        }
        if let Some(offset) = query.union_offset {
            sql.push_str(&format!(" offset {offset}"));
        }

        Ok(sql.trim_start().to_owned())
    }

    fn wrap_union(&self, sql: &str) -> String {
        format!("select * from ({sql})")
    }

    fn operator(&self, operator: &str) -> Result<String> {
        let normalized = operator.trim().to_lowercase();
        if OPERATORS.contains(&normalized.as_str()) {
            Ok(normalized)
        } else {
            Err(GrammarError::compilation(format!(
                "invalid operator '{operator}'"
            )))
        }
    }

    fn update_columns(&self, values: &Record, bindings: &mut Vec<Value>) -> Result<String> {
        let mut assignments = Vec::with_capacity(values.len());
        let mut json_groups: BTreeMap<String, JsonMap<String, JsonValue>> = BTreeMap::new();

        for (key, value) in values {
            if is_json_selector(key) {
                let (column, path) = key.split_once("->").unwrap_or((key.as_str(), ""));
                let column = last_segment(column).to_owned();
                let json = json_value(value).ok_or_else(|| {
                    GrammarError::compilation(format!(
                        "raw expressions cannot be written into JSON path '{key}'"
                    ))
                })?;
                let group = json_groups.entry(column).or_default();
                set_json_path(group, &path.split("->").collect::<Vec<_>>(), json);
                continue;
            }

            let column = self.wrapper.wrap_column(last_segment(key));
            let value = self.parameter(value, bindings);
            assignments.push(format!("{column} = {value}"));
        }

        for (column, group) in json_groups {
            let wrapped = self.wrapper.wrap_column(&column);
            let mut expression = format!("coalesce({wrapped}, object_construct())");
            for (key, subtree) in group {
                bindings.push(Value::Text(subtree.to_string()));
                expression = format!(
                    "object_insert({expression}, {}, parse_json(?), true)",
                    self.wrapper.wrap_value(&key)
                );
            }
            assignments.push(format!("{wrapped} = {expression}"));
        }

        if assignments.is_empty() {
            return Err(GrammarError::compilation("update has no values to set"));
        }
        Ok(assignments.join(", "))
    }

    /// Builds `select <alias>.rowid ...` under the original constraints.
    fn row_id_subselect(&self, query: &Query, bindings: &mut Vec<Value>) -> Result<String> {
        let alias = match &query.from {
            Some(Expr::Name(name)) => row_id_alias(name),
            Some(Expr::Raw { .. }) => None,
            None => None,
        }
        .ok_or_else(|| {
            GrammarError::compilation(
                "cannot derive a row-identifier alias for a joined or limited update/delete",
            )
        })?;

        let mut select = query.clone();
        select.columns = vec![Expr::Name(format!("{alias}.{ROW_ID}"))];
        select.aggregate = None;
        select.distinct = Distinct::None;
        self.select_sql(&select, bindings)
    }
}

impl QueryGrammar for SnowflakeQueryGrammar {
    fn wrapper(&self) -> &Wrapper {
        &self.wrapper
    }

    fn compile_select(&self, query: &Query) -> Result<Compiled> {
        let mut bindings = Vec::new();
        let sql = self.select_sql(query, &mut bindings)?;
        Ok(Compiled::new(sql, bindings))
    }

    fn compile_insert(&self, query: &Query, rows: &[Record]) -> Result<Compiled> {
        let table = self.target_table(query)?;
        let Some(first) = rows.first().filter(|row| !row.is_empty()) else {
            return Ok(Compiled::bare(format!("insert into {table} default values")));
        };

        let columns: Vec<&String> = first.keys().collect();
        if rows
            .iter()
            .any(|row| !row.keys().eq(columns.iter().copied()))
        {
            return Err(GrammarError::compilation(
                "every inserted row must provide the same columns",
            ));
        }

        let mut bindings = Vec::new();
        let values = rows
            .iter()
            .map(|row| {
                let params: Vec<Param> = row.values().cloned().collect();
                format!("({})", self.parameterize(&params, &mut bindings))
            })
            .collect::<Vec<_>>()
            .join(", ");

        let sql = format!(
            "insert into {table} ({}) values {values}",
            self.wrapper.columnize(&columns)
        );
        Ok(Compiled::new(sql, bindings))
    }

    fn compile_insert_or_ignore(&self, query: &Query, rows: &[Record]) -> Result<Compiled> {
        let compiled = self.compile_insert(query, rows)?;
        Ok(Compiled::new(
            compiled.sql.replacen("insert", "insert or ignore", 1),
            compiled.bindings,
        ))
    }

    fn compile_insert_get_id(
        &self,
        query: &Query,
        record: &Record,
        _sequence: Option<&str>,
    ) -> Result<Compiled> {
        self.compile_insert(query, std::slice::from_ref(record))
    }

    fn compile_upsert(
        &self,
        query: &Query,
        rows: &[Record],
        unique_by: &[String],
        update: &[UpsertUpdate],
    ) -> Result<Compiled> {
        if unique_by.is_empty() {
            return Err(GrammarError::compilation(
                "upsert requires at least one unique-by column",
            ));
        }

        let Compiled { mut sql, mut bindings } = self.compile_insert(query, rows)?;
        sql.push_str(&format!(
            " on conflict ({})",
            self.wrapper.columnize(unique_by)
        ));

        if update.is_empty() {
            sql.push_str(" do nothing");
            return Ok(Compiled::new(sql, bindings));
        }

        let assignments = update
            .iter()
            .map(|assignment| match assignment {
                UpsertUpdate::Column(column) => {
                    let wrapped = self.wrapper.wrap_name(column);
                    format!("{wrapped} = excluded.{wrapped}")
                }
                UpsertUpdate::Assign { column, value } => format!(
                    "{} = {}",
                    self.wrapper.wrap_name(column),
                    self.parameter(value, &mut bindings)
                ),
            })
            .collect::<Vec<_>>()
            .join(", ");

        sql.push_str(" do update set ");
        sql.push_str(&assignments);
        Ok(Compiled::new(sql, bindings))
    }

    fn compile_update(&self, query: &Query, values: &Record) -> Result<Compiled> {
        let table = self.target_table(query)?;
        let mut bindings = Vec::new();
        let columns = self.update_columns(values, &mut bindings)?;

        if query.has_joins() || query.limit.is_some() {
            let subselect = self.row_id_subselect(query, &mut bindings)?;
            let sql = format!(
                "update {table} set {columns} where {} in ({subselect})",
                self.wrapper.wrap_column(ROW_ID)
            );
            return Ok(Compiled::new(sql, bindings));
        }

        let mut parts = vec![format!("update {table} set {columns}")];
        if !query.wheres.is_empty() {
            parts.push(self.wheres_sql(&query.wheres, "where", &mut bindings)?);
        }
        Ok(Compiled::new(concatenate(&parts), bindings))
    }

    fn compile_delete(&self, query: &Query) -> Result<Compiled> {
        let table = self.target_table(query)?;
        let mut bindings = Vec::new();

        if query.has_joins() || query.limit.is_some() {
            let subselect = self.row_id_subselect(query, &mut bindings)?;
            let sql = format!(
                "delete from {table} where {} in ({subselect})",
                self.wrapper.wrap_column(ROW_ID)
            );
            return Ok(Compiled::new(sql, bindings));
        }

        let mut parts = vec![format!("delete from {table}")];
        if !query.wheres.is_empty() {
            parts.push(self.wheres_sql(&query.wheres, "where", &mut bindings)?);
        }
        Ok(Compiled::new(concatenate(&parts), bindings))
    }

    fn compile_truncate(&self, query: &Query) -> Result<Compiled> {
        Ok(Compiled::bare(format!(
            "truncate table {}",
            self.target_table(query)?
        )))
    }

    fn compile_aggregate(&self, query: &Query, aggregate: &Aggregate) -> Result<String> {
        let function = aggregate.function.trim();
        if function.is_empty()
            || !function
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
        {
            return Err(GrammarError::compilation(format!(
                "invalid aggregate function '{}'",
                aggregate.function
            )));
        }

        let mut column = if aggregate.columns.is_empty() {
            "*".to_owned()
        } else {
            self.wrapper.columnize_exprs(&aggregate.columns)
        };

        match &query.distinct {
            Distinct::Columns(columns) => {
                column = format!("distinct {}", self.wrapper.columnize(columns));
            }
            Distinct::All if column != "*" => {
                column = format!("distinct {column}");
            }
            _ => {}
        }

        Ok(format!("select {function}({column}) as \"aggregate\""))
    }

    fn compile_lock(&self, lock: &Lock) -> Result<String> {
        if self.strict {
            return Err(GrammarError::unsupported(format!(
                "row locks ({lock:?}) have no equivalent in this dialect"
            )));
        }
        debug!(?lock, "dropping lock clause; the dialect has no row locks");
        Ok(String::new())
    }

    fn compile_date_where(
        &self,
        part: DatePart,
        column: &Expr,
        operator: &str,
        value: &Param,
        bindings: &mut Vec<Value>,
    ) -> Result<String> {
        let operator = self.operator(operator)?;
        let column = self.wrapper.wrap(column);
        let value = self.parameter(value, bindings);
        Ok(format!(
            "strftime('{}', {column}) {operator} cast({value} as text)",
            part.format()
        ))
    }
}

/// `users as u` yields `u`; `analytics.users` yields `users`.
fn row_id_alias(from: &str) -> Option<String> {
    let alias = match split_alias(from) {
        Some((_, alias)) => alias,
        None => last_segment(from),
    };
    let alias = alias.trim();
    (!alias.is_empty()).then(|| alias.to_owned())
}

fn last_segment(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

fn json_value(param: &Param) -> Option<JsonValue> {
    match param {
        Param::Raw { .. } => None,
        Param::Value(value) => Some(match value {
            Value::Null => JsonValue::Null,
            Value::Bool(flag) => JsonValue::Bool(*flag),
            Value::Int(number) => JsonValue::from(*number),
            Value::Float(number) => JsonValue::from(*number),
            Value::Text(text) => JsonValue::String(text.clone()),
        }),
    }
}

fn set_json_path(target: &mut JsonMap<String, JsonValue>, path: &[&str], value: JsonValue) {
    let Some((head, rest)) = path.split_first() else {
        return;
    };
    let key = head.trim().to_owned();
    if rest.is_empty() {
        target.insert(key, value);
        return;
    }

    let entry = target
        .entry(key)
        .or_insert_with(|| JsonValue::Object(JsonMap::new()));
    if !entry.is_object() {
        *entry = JsonValue::Object(JsonMap::new());
    }
    if let JsonValue::Object(inner) = entry {
        set_json_path(inner, rest, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{record, Direction, Join};

    fn grammar() -> SnowflakeQueryGrammar {
        SnowflakeQueryGrammar::new(DialectPolicy::case_sensitive())
    }

    fn folded() -> SnowflakeQueryGrammar {
        SnowflakeQueryGrammar::new(DialectPolicy::case_insensitive())
    }

    #[test]
    fn basic_select_with_bindings_in_order() {
        let query = Query::table("users")
            .select(["id", "name"])
            .where_("age", ">", 18)
            .or_where("name", "like", "a%")
            .order_by("id", Direction::Desc)
            .limit(10)
            .offset(5);

        let compiled = grammar().compile_select(&query).unwrap();
        assert_eq!(
            compiled.sql,
            "select \"id\", \"name\" from \"users\" where \"age\" > ? or \"name\" like ? order by \"id\" desc limit 10 offset 5"
        );
        assert_eq!(compiled.bindings, vec![Value::Int(18), Value::from("a%")]);
    }

    #[test]
    fn empty_columns_select_star() {
        let compiled = folded().compile_select(&Query::table("users")).unwrap();
        assert_eq!(compiled.sql, "select * from USERS");
    }

    #[test]
    fn lock_is_dropped_silently() {
        let query = Query::table("users").lock(Lock::Update);
        let compiled = grammar().compile_select(&query).unwrap();
        assert_eq!(compiled.sql, "select * from \"users\"");
        assert_eq!(grammar().compile_lock(&Lock::Shared).unwrap(), "");
    }

    #[test]
    fn strict_grammar_rejects_locks() {
        let strict = SnowflakeQueryGrammar::strict(DialectPolicy::case_sensitive());
        let err = strict
            .compile_select(&Query::table("users").lock(Lock::Update))
            .unwrap_err();
        assert!(matches!(err, GrammarError::Unsupported(_)));
    }

    #[test]
    fn aggregate_honors_distinct() {
        let query = Query::table("users").aggregate("count", ["*"]);
        assert_eq!(
            grammar().compile_select(&query).unwrap().sql,
            "select count(*) as \"aggregate\" from \"users\""
        );

        let distinct_star = Query::table("users").distinct().aggregate("count", ["*"]);
        assert_eq!(
            grammar().compile_select(&distinct_star).unwrap().sql,
            "select count(*) as \"aggregate\" from \"users\""
        );

        let distinct_column = Query::table("users")
            .distinct()
            .aggregate("count", ["email"]);
        assert_eq!(
            grammar().compile_select(&distinct_column).unwrap().sql,
            "select count(distinct \"email\") as \"aggregate\" from \"users\""
        );

        let distinct_on = Query::table("users")
            .distinct_on(["email", "name"])
            .aggregate("count", ["*"]);
        assert_eq!(
            folded().compile_select(&distinct_on).unwrap().sql,
            "select count(distinct EMAIL, NAME) as \"aggregate\" from USERS"
        );
    }

    #[test]
    fn aggregate_function_names_are_validated() {
        let query = Query::table("users").aggregate("count(*); drop table x; --", ["*"]);
        assert!(matches!(
            grammar().compile_select(&query),
            Err(GrammarError::Compilation(_))
        ));
    }

    #[test]
    fn date_component_wheres_use_strftime() {
        let cases = [
            (DatePart::Date, "%Y-%m-%d"),
            (DatePart::Day, "%d"),
            (DatePart::Month, "%m"),
            (DatePart::Year, "%Y"),
            (DatePart::Time, "%H:%M:%S"),
        ];
        for (part, format) in cases {
            let query = Query::table("events").where_date_part(part, "created_at", "=", "2024");
            let compiled = grammar().compile_select(&query).unwrap();
            assert_eq!(
                compiled.sql,
                format!(
                    "select * from \"events\" where strftime('{format}', \"created_at\") = cast(? as text)"
                )
            );
            assert_eq!(compiled.bindings.len(), 1);
        }
    }

    #[test]
    fn where_variants() {
        let query = Query::table("users")
            .where_in("id", [1, 2, 3])
            .where_not_in("role", Vec::<Param>::new())
            .where_null("deleted_at")
            .where_not_null("email")
            .where_between("age", 18, 65)
            .where_column("created_at", "<=", "updated_at")
            .where_nested(|q| q.where_("a", "=", 1).or_where("b", "=", 2))
            .where_raw("score > ?", [Value::Int(10)])
            .where_("manager_id", "=", Value::Null);

        let compiled = grammar().compile_select(&query).unwrap();
        assert_eq!(
            compiled.sql,
            "select * from \"users\" where \"id\" in (?, ?, ?) and 1 = 1 and \"deleted_at\" is null \
             and \"email\" is not null and \"age\" between ? and ? and \"created_at\" <= \"updated_at\" \
             and (\"a\" = ? or \"b\" = ?) and score > ? and \"manager_id\" is null"
        );
        assert_eq!(
            compiled.bindings,
            vec![
                Value::Int(1),
                Value::Int(2),
                Value::Int(3),
                Value::Int(18),
                Value::Int(65),
                Value::Int(1),
                Value::Int(2),
                Value::Int(10),
            ]
        );
    }

    #[test]
    fn empty_in_list_is_false() {
        let query = Query::table("users").where_in("id", Vec::<Param>::new());
        assert_eq!(
            grammar().compile_select(&query).unwrap().sql,
            "select * from \"users\" where 0 = 1"
        );
    }

    #[test]
    fn invalid_operators_are_rejected() {
        let query = Query::table("users").where_("id", "= 1 or 1 =", 1);
        assert!(matches!(
            grammar().compile_select(&query),
            Err(GrammarError::Compilation(_))
        ));
    }

    #[test]
    fn joins_use_on_clauses() {
        let query = Query::table("users")
            .join(
                Join::inner("contacts")
                    .on("users.id", "=", "contacts.user_id")
                    .where_value("contacts.kind", "=", "email"),
            )
            .join(Join::cross("regions"));
        let compiled = folded().compile_select(&query).unwrap();
        assert_eq!(
            compiled.sql,
            "select * from USERS inner join CONTACTS on USERS.ID = CONTACTS.USER_ID and CONTACTS.KIND = ? cross join REGIONS"
        );
        assert_eq!(compiled.bindings, vec![Value::from("email")]);
    }

    #[test]
    fn groups_and_havings() {
        let query = Query::table("orders")
            .select(["customer_id"])
            .group_by(["customer_id"])
            .having("total", ">", 100)
            .having_raw("count(*) > ?", [Value::Int(2)]);
        let compiled = folded().compile_select(&query).unwrap();
        assert_eq!(
            compiled.sql,
            "select CUSTOMER_ID from ORDERS group by CUSTOMER_ID having TOTAL > ? and count(*) > ?"
        );
        assert_eq!(compiled.bindings, vec![Value::Int(100), Value::Int(2)]);
    }

    #[test]
    fn unions_are_wrapped_in_subselects() {
        let query = Query::table("a")
            .where_("x", "=", 1)
            .union(Query::table("b").where_("y", "=", 2), true);
        let compiled = folded().compile_select(&query).unwrap();
        assert_eq!(
            compiled.sql,
            "select * from (select * from A where X = ?) union all select * from (select * from B where Y = ?)"
        );
        assert_eq!(compiled.bindings, vec![Value::Int(1), Value::Int(2)]);
    }

    #[test]
    fn union_aggregate_wraps_temp_table() {
        let query = Query::table("a")
            .union(Query::table("b"), false)
            .aggregate("count", ["*"]);
        let compiled = folded().compile_select(&query).unwrap();
        assert_eq!(
            compiled.sql,
            "select count(*) as \"aggregate\" from (select * from (select * from A) union select * from (select * from B)) as TEMP_TABLE"
        );
    }

    #[test]
    fn json_selector_in_where() {
        let query = Query::table("users").where_("options->language", "=", "en");
        assert_eq!(
            grammar().compile_select(&query).unwrap().sql,
            "select * from \"users\" where get_path(\"options\", 'language') = ?"
        );
    }

    #[test]
    fn insert_single_and_multi_row() {
        let rows = vec![
            record([("name", Value::from("a")), ("email", Value::from("a@x"))]),
            record([("name", Value::from("b")), ("email", Value::from("b@x"))]),
        ];
        let compiled = grammar()
            .compile_insert(&Query::table("users"), &rows)
            .unwrap();
        assert_eq!(
            compiled.sql,
            "insert into \"users\" (\"email\", \"name\") values (?, ?), (?, ?)"
        );
        assert_eq!(
            compiled.bindings,
            vec![
                Value::from("a@x"),
                Value::from("a"),
                Value::from("b@x"),
                Value::from("b")
            ]
        );
    }

    #[test]
    fn insert_without_values_uses_defaults() {
        let compiled = grammar().compile_insert(&Query::table("users"), &[]).unwrap();
        assert_eq!(compiled.sql, "insert into \"users\" default values");
    }

    #[test]
    fn insert_rows_must_align() {
        let rows = vec![record([("a", 1)]), record([("b", 2)])];
        assert!(grammar().compile_insert(&Query::table("t"), &rows).is_err());
    }

    #[test]
    fn insert_or_ignore_rewrites_keyword() {
        let compiled = grammar()
            .compile_insert_or_ignore(&Query::table("users"), &[record([("id", 1)])])
            .unwrap();
        assert_eq!(compiled.sql, "insert or ignore into \"users\" (\"id\") values (?)");
    }

    #[test]
    fn upsert_assignments() {
        let compiled = folded()
            .compile_upsert(
                &Query::table("users"),
                &[record([("id", Value::Int(1)), ("name", Value::from("y"))])],
                &["id".to_owned()],
                &[
                    UpsertUpdate::Assign {
                        column: "name".into(),
                        value: Param::from("x"),
                    },
                    UpsertUpdate::Column("email".into()),
                ],
            )
            .unwrap();
        assert_eq!(
            compiled.sql,
            "insert into USERS (ID, NAME) values (?, ?) on conflict (ID) do update set NAME = ?, EMAIL = excluded.EMAIL"
        );
        assert_eq!(
            compiled.bindings,
            vec![Value::Int(1), Value::from("y"), Value::from("x")]
        );
    }

    #[test]
    fn update_plain_and_qualified_columns() {
        let query = Query::table("users").where_("id", "=", 7);
        let compiled = grammar()
            .compile_update(&query, &record([("users.name", "n"), ("age", "3")]))
            .unwrap();
        assert_eq!(
            compiled.sql,
            "update \"users\" set \"age\" = ?, \"name\" = ? where \"id\" = ?"
        );
        assert_eq!(
            compiled.bindings,
            vec![Value::from("3"), Value::from("n"), Value::Int(7)]
        );
    }

    #[test]
    fn update_with_join_uses_row_id_subselect() {
        let query = Query::table("users as u")
            .join(Join::inner("teams as t").on("u.team_id", "=", "t.id"))
            .where_("t.name", "=", "core");
        let compiled = grammar()
            .compile_update(&query, &record([("active", true)]))
            .unwrap();
        assert_eq!(
            compiled.sql,
            "update \"users\" as \"u\" set \"active\" = ? where \"rowid\" in \
             (select \"u\".\"rowid\" from \"users\" as \"u\" inner join \"teams\" as \"t\" on \"u\".\"team_id\" = \"t\".\"id\" where \"t\".\"name\" = ?)"
        );
        assert_eq!(
            compiled.bindings,
            vec![Value::Bool(true), Value::from("core")]
        );
    }

    #[test]
    fn delete_with_limit_uses_row_id_subselect() {
        let query = Query::table("logs")
            .where_("level", "=", "debug")
            .order_by("id", Direction::Asc)
            .limit(100);
        let compiled = folded().compile_delete(&query).unwrap();
        assert_eq!(
            compiled.sql,
            "delete from LOGS where ROWID in (select LOGS.ROWID from LOGS where LEVEL = ? order by ID asc limit 100)"
        );
        assert_eq!(compiled.bindings, vec![Value::from("debug")]);
    }

    #[test]
    fn joined_delete_on_raw_table_is_a_compilation_error() {
        let query = Query::table(Expr::raw("table(flatten(input => x))"))
            .join(Join::cross("y"));
        assert!(matches!(
            grammar().compile_delete(&query),
            Err(GrammarError::Compilation(_))
        ));
    }

    #[test]
    fn plain_delete() {
        let compiled = grammar()
            .compile_delete(&Query::table("users").where_("id", "=", 1))
            .unwrap();
        assert_eq!(compiled.sql, "delete from \"users\" where \"id\" = ?");
    }

    #[test]
    fn truncate_statement() {
        let compiled = folded().compile_truncate(&Query::table("users")).unwrap();
        assert_eq!(compiled.sql, "truncate table USERS");
    }

    #[test]
    fn json_update_groups_paths_per_column() {
        let compiled = grammar()
            .compile_update(
                &Query::table("users"),
                &record([
                    ("options->theme->color", Value::from("dark")),
                    ("options->theme->size", Value::Int(2)),
                    ("options->lang", Value::from("en")),
                ]),
            )
            .unwrap();
        assert_eq!(
            compiled.sql,
            "update \"users\" set \"options\" = object_insert(object_insert(coalesce(\"options\", object_construct()), 'lang', parse_json(?), true), 'theme', parse_json(?), true)"
        );
        assert_eq!(
            compiled.bindings,
            vec![
                Value::from("\"en\""),
                Value::from(r#"{"color":"dark","size":2}"#)
            ]
        );
    }

    #[test]
    fn missing_table_is_an_error() {
        assert!(grammar().compile_insert(&Query::default(), &[]).is_err());
    }
}
