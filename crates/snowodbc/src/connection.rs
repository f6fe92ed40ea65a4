//! Connection facade tying the grammars, the executor and the processor
//! to one raw connection.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde::Serialize;
use snowodbc_grammar::query::Record;
use snowodbc_grammar::{
    is_numeric_literal, BindType, Blueprint, Compiled, DialectPolicy, Query, QueryGrammar,
    SchemaGrammar, UpsertUpdate, Value,
};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::config::ConnectionConfig;
use crate::driver::{RawConnection, Row};
use crate::error::{Error, Result};
use crate::processor::Processor;
use crate::schema::SchemaBuilder;
use crate::statement::{DeferredStatement, StatementOptions};

const SESSION_IGNORE_CASE: &str = "alter session set QUOTED_IDENTIFIERS_IGNORE_CASE = true";
const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A caller-supplied binding before normalisation.
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Value(Value),
    DateTime(NaiveDateTime),
    Uuid(Uuid),
}

impl BindValue {
    fn normalize(&self) -> Value {
        match self {
            BindValue::Value(value) => value.clone(),
            BindValue::DateTime(at) => Value::Text(at.format(DATE_FORMAT).to_string()),
            BindValue::Uuid(id) => Value::Text(id.to_string()),
        }
    }
}

macro_rules! bind_value_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for BindValue {
                fn from(value: $ty) -> Self {
                    BindValue::Value(value.into())
                }
            }
        )*
    };
}

bind_value_from!(Value, &str, String, i64, i32, u32, f64, bool);

impl From<NaiveDateTime> for BindValue {
    fn from(at: NaiveDateTime) -> Self {
        BindValue::DateTime(at)
    }
}

impl From<DateTime<Utc>> for BindValue {
    fn from(at: DateTime<Utc>) -> Self {
        BindValue::DateTime(at.naive_utc())
    }
}

impl From<NaiveDate> for BindValue {
    fn from(day: NaiveDate) -> Self {
        BindValue::DateTime(day.and_hms_opt(0, 0, 0).unwrap_or_default())
    }
}

impl From<Uuid> for BindValue {
    fn from(id: Uuid) -> Self {
        BindValue::Uuid(id)
    }
}

/// Positional and named bindings for one statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bindings {
    positional: Vec<BindValue>,
    named: Vec<(String, BindValue)>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, value: impl Into<BindValue>) -> Self {
        self.positional.push(value.into());
        self
    }

    pub fn named(mut self, name: impl Into<String>, value: impl Into<BindValue>) -> Self {
        self.named.push((name.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }

    /// Every value, positional first, as the query log records them.
    pub fn values(&self) -> Vec<Value> {
        self.positional
            .iter()
            .chain(self.named.iter().map(|(_, value)| value))
            .map(BindValue::normalize)
            .collect()
    }
}

impl From<Vec<Value>> for Bindings {
    fn from(values: Vec<Value>) -> Self {
        Self {
            positional: values.into_iter().map(BindValue::Value).collect(),
            named: Vec::new(),
        }
    }
}

impl From<&[Value]> for Bindings {
    fn from(values: &[Value]) -> Self {
        values.to_vec().into()
    }
}

impl From<Vec<BindValue>> for Bindings {
    fn from(positional: Vec<BindValue>) -> Self {
        Self {
            positional,
            named: Vec::new(),
        }
    }
}

/// One entry of the query log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoggedQuery {
    pub sql: String,
    pub bindings: Vec<Value>,
    /// What was (or would have been) sent to the raw connection.
    pub literal: String,
    pub elapsed: Duration,
    pub at: DateTime<Utc>,
}

pub struct Connection {
    raw: Arc<dyn RawConnection>,
    config: ConnectionConfig,
    policy: DialectPolicy,
    query_grammar: Box<dyn QueryGrammar>,
    schema_grammar: Box<dyn SchemaGrammar>,
    processor: Processor,
    statement_options: StatementOptions,
    pretending: AtomicBool,
    logging: AtomicBool,
    query_log: Mutex<Vec<LoggedQuery>>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("database", &self.config.database)
            .field("policy", &self.policy)
            .field("query_grammar", &self.query_grammar)
            .field("schema_grammar", &self.schema_grammar)
            .field("processor", &self.processor)
            .finish()
    }
}

impl Connection {
    /// Builds the facade without touching the raw connection.
    pub fn new(raw: Arc<dyn RawConnection>, config: ConnectionConfig) -> Self {
        let policy = config.policy();
        let grammar = config.options.grammar;
        Self {
            raw,
            query_grammar: grammar.query.query_grammar(policy.clone()),
            schema_grammar: grammar
                .schema
                .schema_grammar(policy.clone(), config.table_defaults()),
            processor: Processor::new(config.options.processor),
            statement_options: config.options.statement_options(),
            policy,
            config,
            pretending: AtomicBool::new(false),
            logging: AtomicBool::new(false),
            query_log: Mutex::new(Vec::new()),
        }
    }

    /// Builds the facade and issues the session setup statements.
    #[instrument(skip(raw, config), fields(database = %config.database))]
    pub async fn connect(raw: Arc<dyn RawConnection>, config: ConnectionConfig) -> Result<Self> {
        let connection = Self::new(raw, config);
        if connection.config.quoted_identifiers_ignore_case {
            info!(sql = SESSION_IGNORE_CASE, "forcing case-insensitive identifier resolution");
            connection.statement(SESSION_IGNORE_CASE, Bindings::new()).await?;
        }
        Ok(connection)
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn policy(&self) -> &DialectPolicy {
        &self.policy
    }

    pub fn database_name(&self) -> &str {
        &self.config.database
    }

    pub fn query_grammar(&self) -> &dyn QueryGrammar {
        self.query_grammar.as_ref()
    }

    pub fn schema_grammar(&self) -> &dyn SchemaGrammar {
        self.schema_grammar.as_ref()
    }

    pub fn processor(&self) -> &Processor {
        &self.processor
    }

    pub fn schema(&self) -> SchemaBuilder<'_> {
        SchemaBuilder::new(self)
    }

    /// A fresh single-use statement for `sql`.
    pub fn prepare(&self, sql: &str) -> DeferredStatement {
        DeferredStatement::new(Arc::clone(&self.raw), sql, self.statement_options)
    }

    /// Normalises caller values: date-times become `Y-m-d H:M:S` text and
    /// uuids become text. Booleans stay typed.
    pub fn prepare_bindings(&self, bindings: &Bindings) -> Bindings {
        Bindings {
            positional: bindings
                .positional
                .iter()
                .map(|value| BindValue::Value(value.normalize()))
                .collect(),
            named: bindings
                .named
                .iter()
                .map(|(name, value)| (name.clone(), BindValue::Value(value.normalize())))
                .collect(),
        }
    }

    /// Binds positionally from 1, or by name. Numeric-looking text is
    /// declared as an integer.
    pub fn bind_values(&self, statement: &mut DeferredStatement, bindings: &Bindings) -> Result<()> {
        for (idx, value) in bindings.positional.iter().enumerate() {
            let value = value.normalize();
            let declared = declared_type(&value);
            statement.bind(idx + 1, value, declared)?;
        }
        for (name, value) in &bindings.named {
            let value = value.normalize();
            let declared = declared_type(&value);
            statement.bind_named(name, value, declared)?;
        }
        Ok(())
    }

    pub async fn statement(&self, sql: &str, bindings: impl Into<Bindings>) -> Result<bool> {
        self.run(sql, bindings.into()).await?;
        Ok(true)
    }

    /// Runs `sql` and reports the number of affected rows.
    pub async fn affecting_statement(&self, sql: &str, bindings: impl Into<Bindings>) -> Result<u64> {
        Ok(self
            .run(sql, bindings.into())
            .await?
            .map_or(0, |statement| statement.rows_affected()))
    }

    pub async fn select(&self, sql: &str, bindings: impl Into<Bindings>) -> Result<Vec<Row>> {
        match self.run(sql, bindings.into()).await? {
            Some(mut statement) => Ok(statement.fetch_all().await?),
            None => Ok(Vec::new()),
        }
    }

    pub async fn select_one(&self, sql: &str, bindings: impl Into<Bindings>) -> Result<Option<Row>> {
        Ok(self.select(sql, bindings).await?.into_iter().next())
    }

    pub async fn insert(&self, sql: &str, bindings: impl Into<Bindings>) -> Result<bool> {
        self.statement(sql, bindings).await
    }

    pub async fn update(&self, sql: &str, bindings: impl Into<Bindings>) -> Result<u64> {
        self.affecting_statement(sql, bindings).await
    }

    pub async fn delete(&self, sql: &str, bindings: impl Into<Bindings>) -> Result<u64> {
        self.affecting_statement(sql, bindings).await
    }

    pub async fn run_select(&self, query: &Query) -> Result<Vec<Row>> {
        let compiled = self.query_grammar.compile_select(query)?;
        self.select(&compiled.sql, compiled.bindings).await
    }

    pub async fn run_insert(&self, query: &Query, rows: &[Record]) -> Result<bool> {
        let compiled = self.query_grammar.compile_insert(query, rows)?;
        self.insert(&compiled.sql, compiled.bindings).await
    }

    pub async fn run_insert_or_ignore(&self, query: &Query, rows: &[Record]) -> Result<u64> {
        let compiled = self.query_grammar.compile_insert_or_ignore(query, rows)?;
        self.affecting(compiled).await
    }

    pub async fn run_update(&self, query: &Query, values: &Record) -> Result<u64> {
        let compiled = self.query_grammar.compile_update(query, values)?;
        self.affecting(compiled).await
    }

    pub async fn run_delete(&self, query: &Query) -> Result<u64> {
        let compiled = self.query_grammar.compile_delete(query)?;
        self.affecting(compiled).await
    }

    pub async fn run_truncate(&self, query: &Query) -> Result<bool> {
        let compiled = self.query_grammar.compile_truncate(query)?;
        self.statement(&compiled.sql, compiled.bindings).await
    }

    pub async fn run_upsert(
        &self,
        query: &Query,
        rows: &[Record],
        unique_by: &[String],
        update: &[UpsertUpdate],
    ) -> Result<u64> {
        let compiled = self
            .query_grammar
            .compile_upsert(query, rows, unique_by, update)?;
        self.affecting(compiled).await
    }

    /// Inserts one row and reads its id back through the processor.
    /// Returns `Value::Null` while pretending.
    #[instrument(skip(self, query, record))]
    pub async fn insert_get_id(
        &self,
        query: &Query,
        record: &Record,
        sequence: Option<&str>,
    ) -> Result<Value> {
        let compiled = self
            .query_grammar
            .compile_insert_get_id(query, record, sequence)?;
        self.insert(&compiled.sql, compiled.bindings).await?;

        let table = query
            .from
            .as_ref()
            .map(|from| self.query_grammar.wrapper().wrap_table(from))
            .ok_or_else(|| Error::MissingRecord("insert target table".to_owned()))?;
        let id_sql = self.processor.id_query(&table, sequence);
        let row = self.select_one(&id_sql, Bindings::new()).await?;
        if self.is_pretending() {
            return Ok(Value::Null);
        }
        row.and_then(|row| self.processor.extract_id(&row, sequence))
            .ok_or(Error::MissingRecord(id_sql))
    }

    pub async fn run_blueprint(&self, blueprint: &Blueprint) -> Result<()> {
        for sql in blueprint.to_sql(self.schema_grammar.as_ref())? {
            self.statement(&sql, Bindings::new()).await?;
        }
        Ok(())
    }

    /// Runs `work` with execution switched off and returns what it would
    /// have sent.
    pub async fn pretend<F>(&self, work: F) -> Result<Vec<LoggedQuery>>
    where
        F: for<'c> FnOnce(&'c Connection) -> BoxFuture<'c, Result<()>>,
    {
        let start = self.query_log.lock().len();
        self.pretending.store(true, Ordering::SeqCst);
        let outcome = work(self).await;
        self.pretending.store(false, Ordering::SeqCst);
        outcome?;

        let log = self.query_log.lock();
        Ok(log.get(start..).map(<[LoggedQuery]>::to_vec).unwrap_or_default())
    }

    pub fn is_pretending(&self) -> bool {
        self.pretending.load(Ordering::SeqCst)
    }

    pub fn enable_query_log(&self) {
        self.logging.store(true, Ordering::SeqCst);
    }

    pub fn disable_query_log(&self) {
        self.logging.store(false, Ordering::SeqCst);
    }

    pub fn query_log(&self) -> Vec<LoggedQuery> {
        self.query_log.lock().clone()
    }

    pub fn flush_query_log(&self) {
        self.query_log.lock().clear();
    }

    async fn affecting(&self, compiled: Compiled) -> Result<u64> {
        self.affecting_statement(&compiled.sql, compiled.bindings).await
    }

    /// Binds and executes `sql`; `None` while pretending.
    async fn run(&self, sql: &str, bindings: Bindings) -> Result<Option<DeferredStatement>> {
        let bindings = self.prepare_bindings(&bindings);
        let mut statement = self.prepare(sql);
        self.bind_values(&mut statement, &bindings)?;
        let literal = statement.literal_sql()?;

        let started = Instant::now();
        let pretending = self.is_pretending();
        if !pretending {
            statement.execute(None).await?;
        }
        let elapsed = started.elapsed();
        debug!(%sql, ?elapsed, pretending, "statement finished");

        if pretending || self.logging.load(Ordering::SeqCst) {
            self.query_log.lock().push(LoggedQuery {
                sql: sql.to_owned(),
                bindings: bindings.values(),
                literal,
                elapsed,
                at: Utc::now(),
            });
        }
        Ok((!pretending).then_some(statement))
    }
}

fn declared_type(value: &Value) -> Option<BindType> {
    match value {
        Value::Text(text) if is_numeric_literal(text) => Some(BindType::Integer),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use snowodbc_grammar::query::record;

    use super::*;
    use crate::driver::mock::{MockConnection, Scripted};

    fn connection(mock: &MockConnection, config: ConnectionConfig) -> Connection {
        Connection::new(Arc::new(mock.clone()), config)
    }

    #[tokio::test]
    async fn connect_sets_session_case_once() {
        let mock = MockConnection::new();
        let config = ConnectionConfig {
            quoted_identifiers_ignore_case: true,
            ..ConnectionConfig::default()
        };
        Connection::connect(Arc::new(mock.clone()), config).await.unwrap();
        assert_eq!(mock.sent(), vec![SESSION_IGNORE_CASE]);

        let quiet = MockConnection::new();
        Connection::connect(Arc::new(quiet.clone()), ConnectionConfig::default())
            .await
            .unwrap();
        assert!(quiet.sent().is_empty());
    }

    #[tokio::test]
    async fn compiled_queries_reach_the_driver_as_literals() {
        let mock = MockConnection::new();
        let conn = connection(&mock, ConnectionConfig::default());

        conn.run_insert(
            &Query::table("users"),
            &[record([("name", Value::from("O'Brien")), ("age", Value::Int(40))])],
        )
        .await
        .unwrap();

        assert_eq!(mock.sent(), vec!["insert into USERS (AGE, NAME) values (40, 'O''Brien')"]);
    }

    #[tokio::test]
    async fn bindings_are_normalized() {
        let mock = MockConnection::new();
        let conn = connection(&mock, ConnectionConfig::default());
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap();
        let id = Uuid::nil();

        let bindings = Bindings::new()
            .push(true)
            .push("17")
            .push(at)
            .push(id);
        conn.statement("insert into t values (?, ?, ?, ?)", bindings)
            .await
            .unwrap();

        assert_eq!(
            mock.sent(),
            vec!["insert into t values (TRUE, 17, '2024-03-09 14:05:00', '00000000-0000-0000-0000-000000000000')"]
        );
    }

    #[tokio::test]
    async fn named_bindings() {
        let mock = MockConnection::new();
        let conn = connection(&mock, ConnectionConfig::default());
        conn.select(
            "select * from t where a = :a and b = :b",
            Bindings::new().named("a", 1).named(":b", "x"),
        )
        .await
        .unwrap();
        assert_eq!(mock.sent(), vec!["select * from t where a = 1 and b = 'x'"]);
    }

    #[tokio::test]
    async fn arity_errors_never_reach_the_driver() {
        let mock = MockConnection::new();
        let conn = connection(&mock, ConnectionConfig::default());
        let err = conn
            .statement("update t set a = ? where b = ?", Bindings::new().push(1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Statement(crate::StatementError::BindingArity { .. })));
        assert!(mock.sent().is_empty());
    }

    #[tokio::test]
    async fn insert_get_id_reads_back_max_id() {
        let mock = MockConnection::new();
        mock.push(Scripted::Rows(Vec::new()));
        mock.push(Scripted::Rows(vec![Row::new(vec![("id".into(), Value::from("12"))])]));
        let conn = connection(&mock, ConnectionConfig::default());

        let id = conn
            .insert_get_id(&Query::table("users"), &record([("name", "a")]), None)
            .await
            .unwrap();

        assert_eq!(id, Value::Int(12));
        assert_eq!(
            mock.sent(),
            vec![
                "insert into USERS (NAME) values ('a')",
                "select max(\"id\") as \"id\" from USERS"
            ]
        );
    }

    #[tokio::test]
    async fn insert_get_id_without_a_row_is_an_error() {
        let mock = MockConnection::new();
        let conn = connection(&mock, ConnectionConfig::default());
        let err = conn
            .insert_get_id(&Query::table("users"), &record([("name", "a")]), Some("user_id"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingRecord(_)));
    }

    #[tokio::test]
    async fn pretend_records_literal_sql_without_executing() {
        let mock = MockConnection::new();
        let conn = connection(&mock, ConnectionConfig::default());

        let log = conn
            .pretend(|c| {
                Box::pin(async move {
                    c.run_delete(&Query::table("users").where_("id", "=", 3)).await?;
                    c.statement("alter table T add constraint PK primary key (ID)", Bindings::new())
                        .await?;
                    Ok(())
                })
            })
            .await
            .unwrap();

        assert!(mock.sent().is_empty());
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].sql, "delete from USERS where ID = ?");
        assert_eq!(log[0].bindings, vec![Value::Int(3)]);
        assert_eq!(log[0].literal, "delete from USERS where ID = 3");
        assert!(!conn.is_pretending());
    }

    #[tokio::test]
    async fn query_log_is_opt_in() {
        let mock = MockConnection::new();
        let conn = connection(&mock, ConnectionConfig::default());
        conn.statement("select 1", Bindings::new()).await.unwrap();
        assert!(conn.query_log().is_empty());

        conn.enable_query_log();
        conn.statement("select ?", Bindings::new().push(2)).await.unwrap();
        let log = conn.query_log();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].literal, "select 2");

        conn.flush_query_log();
        assert!(conn.query_log().is_empty());
    }

    #[tokio::test]
    async fn blueprints_run_one_statement_each() {
        let mock = MockConnection::new();
        let conn = connection(&mock, ConnectionConfig::default());
        let mut blueprint = Blueprint::new("users");
        blueprint.string("nickname", 40).nullable();
        blueprint.rename_column("email", "login");

        conn.run_blueprint(&blueprint).await.unwrap();
        assert_eq!(
            mock.sent(),
            vec![
                "alter table USERS add column NICKNAME varchar(40)",
                "alter table USERS rename column EMAIL to LOGIN",
            ]
        );
    }
}
