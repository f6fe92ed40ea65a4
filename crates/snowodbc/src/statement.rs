//! Deferred-binding statement executor.
//!
//! The ODBC path cannot be trusted with parameter binding, so values are
//! collected here and inlined as escaped literals before the text reaches
//! the raw connection. A statement is single use: once executed, every
//! further `bind` or `execute` fails with [`StatementError::AlreadyExecuted`].

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use snowodbc_grammar::{BindType, Value};
use tracing::{debug, instrument, warn};

use crate::driver::{PrepareMode, RawConnection, RawStatement, Row};
use crate::error::StatementError;
use crate::literal::coerce;
use crate::template::Template;

/// Keyword marking statements the ODBC path is known to reject.
const CONSTRAINT_MARKER: &str = "add constraint";

#[derive(Debug, Clone, PartialEq)]
struct Binding {
    value: Value,
    declared: Option<BindType>,
}

impl Binding {
    fn literal(&self) -> String {
        coerce(&self.value, self.declared)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Literal SQL was handed to the raw connection.
    Delegated,
    /// A known-unsupported constraint statement was treated as done.
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementState {
    Created,
    Bound,
    Executed(Outcome),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatementOptions {
    pub skip_constraint_statements: bool,
}

impl Default for StatementOptions {
    fn default() -> Self {
        Self {
            skip_constraint_statements: true,
        }
    }
}

/// What `execute` would do with the current bindings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Constraint statement short-circuited without a round trip.
    Skip(String),
    /// Placeholder-free text sent without a prepare.
    Direct(String),
    /// Template with every placeholder replaced by a literal.
    Literal(String),
}

impl Resolution {
    pub fn sql(&self) -> &str {
        match self {
            Resolution::Skip(sql) | Resolution::Direct(sql) | Resolution::Literal(sql) => sql,
        }
    }
}

pub struct DeferredStatement {
    connection: Arc<dyn RawConnection>,
    sql: String,
    template: Template,
    positional: BTreeMap<usize, Binding>,
    named: HashMap<String, Binding>,
    options: StatementOptions,
    state: StatementState,
    raw: Option<Box<dyn RawStatement>>,
}

impl std::fmt::Debug for DeferredStatement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredStatement")
            .field("sql", &self.sql)
            .field("state", &self.state)
            .field("positional", &self.positional.len())
            .field("named", &self.named.len())
            .finish()
    }
}

impl DeferredStatement {
    pub fn new(
        connection: Arc<dyn RawConnection>,
        sql: impl Into<String>,
        options: StatementOptions,
    ) -> Self {
        let sql = sql.into();
        Self {
            connection,
            template: Template::parse(&sql),
            sql,
            positional: BTreeMap::new(),
            named: HashMap::new(),
            options,
            state: StatementState::Created,
            raw: None,
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn state(&self) -> StatementState {
        self.state
    }

    /// Records a value for the 1-based `position`; the driver is not
    /// touched until `execute`.
    pub fn bind(
        &mut self,
        position: usize,
        value: Value,
        declared: Option<BindType>,
    ) -> Result<(), StatementError> {
        self.ensure_fresh()?;
        if position == 0 {
            return Err(StatementError::InvalidPosition(0));
        }
        self.positional.insert(position, Binding { value, declared });
        self.state = StatementState::Bound;
        Ok(())
    }

    /// Records a value for `:name`. The leading colon is optional.
    pub fn bind_named(
        &mut self,
        name: &str,
        value: Value,
        declared: Option<BindType>,
    ) -> Result<(), StatementError> {
        self.ensure_fresh()?;
        let name = name.trim_start_matches(':').to_owned();
        self.named.insert(name, Binding { value, declared });
        self.state = StatementState::Bound;
        Ok(())
    }

    /// Binds `values` at positions 1..=n with inferred types.
    pub fn bind_all(&mut self, values: &[Value]) -> Result<(), StatementError> {
        for (idx, value) in values.iter().enumerate() {
            self.bind(idx + 1, value.clone(), None)?;
        }
        Ok(())
    }

    /// Works out the text `execute` would send, without sending it.
    pub fn resolve(&self) -> Result<Resolution, StatementError> {
        if !self.template.has_placeholders() {
            if self.options.skip_constraint_statements && is_constraint_statement(&self.sql) {
                return Ok(Resolution::Skip(self.sql.clone()));
            }
            let supplied = self.positional.len() + self.named.len();
            if supplied > 0 {
                return Err(StatementError::BindingArity {
                    expected: 0,
                    actual: supplied,
                });
            }
            return Ok(Resolution::Direct(self.sql.clone()));
        }

        if self.template.is_mixed() {
            return Err(StatementError::MixedPlaceholders);
        }

        let literals = self.positional_literals()?;
        let named = self.named_literals()?;
        Ok(Resolution::Literal(self.template.render(&literals, &named)))
    }

    /// Final literal SQL for logging and pretend mode.
    pub fn literal_sql(&self) -> Result<String, StatementError> {
        self.resolve().map(|resolution| resolution.sql().to_owned())
    }

    /// Runs the statement. `params`, when given, replace the positional
    /// bindings recorded so far.
    #[instrument(skip(self, params), fields(state = ?self.state))]
    pub async fn execute(&mut self, params: Option<Vec<Value>>) -> Result<bool, StatementError> {
        self.ensure_fresh()?;
        if let Some(params) = params {
            self.positional.clear();
            self.bind_all(&params)?;
        }

        let (sql, mode) = match self.resolve()? {
            Resolution::Skip(sql) => {
                warn!(%sql, "constraint statement is not supported over ODBC; treating as succeeded");
                self.state = StatementState::Executed(Outcome::Skipped);
                return Ok(true);
            }
            Resolution::Direct(sql) => (sql, PrepareMode::Direct),
            Resolution::Literal(sql) => (sql, PrepareMode::Prepared),
        };

        debug!(%sql, ?mode, "sending literal sql");
        self.state = StatementState::Executed(Outcome::Delegated);
        self.positional.clear();
        self.named.clear();

        let mut raw = self.connection.prepare(&sql, mode).await?;
        let succeeded = raw.execute().await?;
        if !succeeded {
            let info = raw.error_info();
            if !info.is_success_state() {
                return Err(StatementError::Driver {
                    sql_state: info.sql_state,
                    message: info
                        .message
                        .unwrap_or_else(|| "statement execution failed".to_owned()),
                });
            }
            debug!(sql_state = %info.sql_state, "falsy result with success state; treating as succeeded");
        }
        self.raw = Some(raw);
        Ok(true)
    }

    /// Rows produced by the execution. Skipped statements produce none.
    pub async fn fetch_all(&mut self) -> Result<Vec<Row>, StatementError> {
        match (self.state, self.raw.as_mut()) {
            (StatementState::Executed(Outcome::Skipped), _) => Ok(Vec::new()),
            (StatementState::Executed(Outcome::Delegated), Some(raw)) => Ok(raw.fetch_all().await?),
            _ => Err(StatementError::NotExecuted),
        }
    }

    pub fn rows_affected(&self) -> u64 {
        self.raw.as_ref().map_or(0, |raw| raw.rows_affected())
    }

    fn ensure_fresh(&self) -> Result<(), StatementError> {
        match self.state {
            StatementState::Executed(_) => Err(StatementError::AlreadyExecuted),
            _ => Ok(()),
        }
    }

    fn positional_literals(&self) -> Result<Vec<String>, StatementError> {
        let expected = self.template.positional_count();
        if expected == 0 {
            if !self.positional.is_empty() {
                return Err(StatementError::BindingArity {
                    expected: 0,
                    actual: self.positional.len(),
                });
            }
            return Ok(Vec::new());
        }

        if let Some(name) = self.named.keys().next() {
            return Err(StatementError::UnusedNamedBinding(name.clone()));
        }
        let contiguous = self.positional.keys().copied().eq(1..=self.positional.len());
        if self.positional.len() != expected || !contiguous {
            return Err(StatementError::BindingArity {
                expected,
                actual: self.positional.len(),
            });
        }
        Ok(self.positional.values().map(Binding::literal).collect())
    }

    fn named_literals(&self) -> Result<HashMap<String, String>, StatementError> {
        let mut literals = HashMap::new();
        for name in self.template.named() {
            let binding = self
                .named
                .get(name)
                .ok_or_else(|| StatementError::MissingNamedBinding(name.to_owned()))?;
            literals.insert(name.to_owned(), binding.literal());
        }
        if let Some(unused) = self.named.keys().find(|name| !literals.contains_key(*name)) {
            return Err(StatementError::UnusedNamedBinding(unused.clone()));
        }
        Ok(literals)
    }
}

fn is_constraint_statement(sql: &str) -> bool {
    sql.to_ascii_lowercase().contains(CONSTRAINT_MARKER)
}

/// Inlines positional `values` into `sql` with inferred types.
pub fn interpolate(sql: &str, values: &[Value]) -> Result<String, StatementError> {
    let template = Template::parse(sql);
    if let Some(name) = template.named().next() {
        return Err(StatementError::MissingNamedBinding(name.to_owned()));
    }
    let expected = template.positional_count();
    if expected != values.len() {
        return Err(StatementError::BindingArity {
            expected,
            actual: values.len(),
        });
    }
    let literals: Vec<String> = values.iter().map(|value| coerce(value, None)).collect();
    Ok(template.render(&literals, &HashMap::new()))
}
