//! JSON request shapes and their rendering to SQL lines.

use anyhow::{Context, Result};
use serde::Deserialize;
use snowodbc::{interpolate, ConnectionConfig, Processor};
use snowodbc_grammar::query::Record;
use snowodbc_grammar::{
    Blueprint, Compiled, Query, QueryGrammar, SchemaGrammar, UpsertUpdate,
};

/// One query operation read from a description file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum QueryRequest {
    Select {
        query: Query,
    },
    Insert {
        query: Query,
        #[serde(default)]
        rows: Vec<Record>,
    },
    InsertOrIgnore {
        query: Query,
        #[serde(default)]
        rows: Vec<Record>,
    },
    InsertGetId {
        query: Query,
        values: Record,
        #[serde(default)]
        sequence: Option<String>,
    },
    Upsert {
        query: Query,
        rows: Vec<Record>,
        unique_by: Vec<String>,
        #[serde(default)]
        update: Vec<UpsertUpdate>,
    },
    Update {
        query: Query,
        values: Record,
    },
    Delete {
        query: Query,
    },
    Truncate {
        query: Query,
    },
}

/// Grammars and processor selected by the connection config.
pub struct Renderer {
    query: Box<dyn QueryGrammar>,
    schema: Box<dyn SchemaGrammar>,
    processor: Processor,
}

impl Renderer {
    pub fn from_config(config: &ConnectionConfig) -> Self {
        let policy = config.policy();
        let grammar = config.options.grammar;
        Self {
            query: grammar.query.query_grammar(policy.clone()),
            schema: grammar.schema.schema_grammar(policy, config.table_defaults()),
            processor: Processor::new(config.options.processor),
        }
    }

    /// Compiled statements for `request`, in execution order.
    pub fn compile_query(&self, request: &QueryRequest) -> Result<Vec<Compiled>> {
        let grammar = self.query.as_ref();
        let compiled = match request {
            QueryRequest::Select { query } => grammar.compile_select(query)?,
            QueryRequest::Insert { query, rows } => grammar.compile_insert(query, rows)?,
            QueryRequest::InsertOrIgnore { query, rows } => {
                grammar.compile_insert_or_ignore(query, rows)?
            }
            QueryRequest::InsertGetId {
                query,
                values,
                sequence,
            } => {
                let insert = grammar.compile_insert_get_id(query, values, sequence.as_deref())?;
                let table = query
                    .from
                    .as_ref()
                    .map(|from| grammar.wrapper().wrap_table(from))
                    .context("insert_get_id needs a target table")?;
                let follow_up = self.processor.id_query(&table, sequence.as_deref());
                return Ok(vec![insert, Compiled::bare(follow_up)]);
            }
            QueryRequest::Upsert {
                query,
                rows,
                unique_by,
                update,
            } => grammar.compile_upsert(query, rows, unique_by, update)?,
            QueryRequest::Update { query, values } => grammar.compile_update(query, values)?,
            QueryRequest::Delete { query } => grammar.compile_delete(query)?,
            QueryRequest::Truncate { query } => grammar.compile_truncate(query)?,
        };
        Ok(vec![compiled])
    }

    /// One terminated line per statement. With `literal`, bindings are
    /// inlined the way the executor would inline them; otherwise they trail
    /// the terminator as a comment.
    pub fn render_query(&self, request: &QueryRequest, literal: bool) -> Result<Vec<String>> {
        self.compile_query(request)?
            .into_iter()
            .map(|compiled| {
                if literal {
                    let sql = interpolate(&compiled.sql, &compiled.bindings)
                        .with_context(|| format!("cannot inline bindings into `{}`", compiled.sql))?;
                    Ok(format!("{sql};"))
                } else if compiled.bindings.is_empty() {
                    Ok(format!("{};", compiled.sql))
                } else {
                    Ok(format!(
                        "{}; -- bindings: {}",
                        compiled.sql,
                        serde_json::to_string(&compiled.bindings)?
                    ))
                }
            })
            .collect()
    }

    pub fn render_schema(&self, blueprint: &Blueprint) -> Result<Vec<String>> {
        Ok(blueprint
            .to_sql(self.schema.as_ref())?
            .into_iter()
            .map(|sql| format!("{sql};"))
            .collect())
    }
}

pub fn parse_query(text: &str) -> Result<QueryRequest> {
    serde_json::from_str(text).context("invalid query description")
}

pub fn parse_blueprint(text: &str) -> Result<Blueprint> {
    serde_json::from_str(text).context("invalid schema description")
}
