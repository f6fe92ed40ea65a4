//! Structured query descriptions consumed by the query grammar.
//!
//! A [`Query`] is plain data: the grammar only reads it. The fluent helpers
//! exist so callers (and tests) can build descriptions without spelling out
//! every struct literal.

mod grammar;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::value::{Param, Value};
use crate::wrapper::Expr;

pub use grammar::{QueryGrammar, SnowflakeQueryGrammar, UpsertUpdate};

/// Column values for one inserted or updated row. Keys are kept sorted so
/// every row of a multi-row insert lines up with the same column list.
pub type Record = BTreeMap<String, Param>;

/// Builds a [`Record`] from `(column, value)` pairs.
pub fn record<K, V, I>(pairs: I) -> Record
where
    K: Into<String>,
    V: Into<Param>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(key, value)| (key.into(), value.into()))
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Query {
    pub from: Option<Expr>,
    pub columns: Vec<Expr>,
    pub distinct: Distinct,
    pub aggregate: Option<Aggregate>,
    pub joins: Vec<Join>,
    pub wheres: Vec<Where>,
    pub groups: Vec<Expr>,
    pub havings: Vec<Having>,
    pub orders: Vec<Order>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub lock: Option<Lock>,
    pub unions: Vec<Union>,
    pub union_orders: Vec<Order>,
    pub union_limit: Option<u64>,
    pub union_offset: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Distinct {
    #[default]
    None,
    All,
    Columns(Vec<String>),
}

impl Distinct {
    pub fn is_set(&self) -> bool {
        !matches!(self, Distinct::None)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregate {
    pub function: String,
    pub columns: Vec<Expr>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Boolean {
    #[default]
    And,
    Or,
}

impl Boolean {
    pub fn as_str(&self) -> &'static str {
        match self {
            Boolean::And => "and",
            Boolean::Or => "or",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatePart {
    Date,
    Day,
    Month,
    Year,
    Time,
}

impl DatePart {
    /// strftime-style format compared against the bound value.
    pub fn format(&self) -> &'static str {
        match self {
            DatePart::Date => "%Y-%m-%d",
            DatePart::Day => "%d",
            DatePart::Month => "%m",
            DatePart::Year => "%Y",
            DatePart::Time => "%H:%M:%S",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Where {
    #[serde(default)]
    pub boolean: Boolean,
    #[serde(flatten)]
    pub kind: WhereKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WhereKind {
    Basic {
        column: Expr,
        operator: String,
        value: Param,
    },
    Column {
        first: Expr,
        operator: String,
        second: Expr,
    },
    In {
        column: Expr,
        values: Vec<Param>,
        #[serde(default)]
        not: bool,
    },
    Null {
        column: Expr,
        #[serde(default)]
        not: bool,
    },
    Between {
        column: Expr,
        min: Param,
        max: Param,
        #[serde(default)]
        not: bool,
    },
    Nested {
        wheres: Vec<Where>,
    },
    Raw {
        sql: String,
        #[serde(default)]
        bindings: Vec<Value>,
    },
    Exists {
        query: Box<Query>,
        #[serde(default)]
        not: bool,
    },
    InSub {
        column: Expr,
        query: Box<Query>,
        #[serde(default)]
        not: bool,
    },
    Date {
        part: DatePart,
        column: Expr,
        operator: String,
        value: Param,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinKind {
    #[default]
    Inner,
    Left,
    Right,
    Cross,
}

impl JoinKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinKind::Inner => "inner",
            JoinKind::Left => "left",
            JoinKind::Right => "right",
            JoinKind::Cross => "cross",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Join {
    #[serde(default)]
    pub kind: JoinKind,
    pub table: Expr,
    #[serde(default)]
    pub wheres: Vec<Where>,
}

impl Join {
    pub fn new(kind: JoinKind, table: impl Into<Expr>) -> Self {
        Self {
            kind,
            table: table.into(),
            wheres: Vec::new(),
        }
    }

    pub fn inner(table: impl Into<Expr>) -> Self {
        Self::new(JoinKind::Inner, table)
    }

    pub fn left(table: impl Into<Expr>) -> Self {
        Self::new(JoinKind::Left, table)
    }

    pub fn cross(table: impl Into<Expr>) -> Self {
        Self::new(JoinKind::Cross, table)
    }

    /// Adds a column-to-column `on` condition.
    pub fn on(mut self, first: impl Into<Expr>, operator: &str, second: impl Into<Expr>) -> Self {
        self.wheres.push(Where {
            boolean: Boolean::And,
            kind: WhereKind::Column {
                first: first.into(),
                operator: operator.to_owned(),
                second: second.into(),
            },
        });
        self
    }

    /// Adds a value condition bound through a placeholder.
    pub fn where_value(
        mut self,
        column: impl Into<Expr>,
        operator: &str,
        value: impl Into<Param>,
    ) -> Self {
        self.wheres.push(Where {
            boolean: Boolean::And,
            kind: WhereKind::Basic {
                column: column.into(),
                operator: operator.to_owned(),
                value: value.into(),
            },
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Having {
    #[serde(default)]
    pub boolean: Boolean,
    #[serde(flatten)]
    pub kind: HavingKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HavingKind {
    Basic {
        column: Expr,
        operator: String,
        value: Param,
    },
    Between {
        column: Expr,
        min: Param,
        max: Param,
        #[serde(default)]
        not: bool,
    },
    Raw {
        sql: String,
        #[serde(default)]
        bindings: Vec<Value>,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Order {
    Raw {
        sql: String,
    },
    Column {
        column: Expr,
        #[serde(default)]
        direction: Direction,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lock {
    Update,
    Shared,
    Raw(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Union {
    pub query: Query,
    #[serde(default)]
    pub all: bool,
}

impl Query {
    pub fn table(table: impl Into<Expr>) -> Self {
        Self {
            from: Some(table.into()),
            ..Self::default()
        }
    }

    pub fn select<I, E>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<Expr>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn add_select(mut self, column: impl Into<Expr>) -> Self {
        self.columns.push(column.into());
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = Distinct::All;
        self
    }

    pub fn distinct_on<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.distinct = Distinct::Columns(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn aggregate<I, E>(mut self, function: &str, columns: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<Expr>,
    {
        self.aggregate = Some(Aggregate {
            function: function.to_owned(),
            columns: columns.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    fn push_where(mut self, boolean: Boolean, kind: WhereKind) -> Self {
        self.wheres.push(Where { boolean, kind });
        self
    }

    pub fn where_(self, column: impl Into<Expr>, operator: &str, value: impl Into<Param>) -> Self {
        self.push_where(
            Boolean::And,
            WhereKind::Basic {
                column: column.into(),
                operator: operator.to_owned(),
                value: value.into(),
            },
        )
    }

    pub fn or_where(
        self,
        column: impl Into<Expr>,
        operator: &str,
        value: impl Into<Param>,
    ) -> Self {
        self.push_where(
            Boolean::Or,
            WhereKind::Basic {
                column: column.into(),
                operator: operator.to_owned(),
                value: value.into(),
            },
        )
    }

    pub fn where_column(
        self,
        first: impl Into<Expr>,
        operator: &str,
        second: impl Into<Expr>,
    ) -> Self {
        self.push_where(
            Boolean::And,
            WhereKind::Column {
                first: first.into(),
                operator: operator.to_owned(),
                second: second.into(),
            },
        )
    }

    pub fn where_in<I, P>(self, column: impl Into<Expr>, values: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Param>,
    {
        self.push_where(
            Boolean::And,
            WhereKind::In {
                column: column.into(),
                values: values.into_iter().map(Into::into).collect(),
                not: false,
            },
        )
    }

    pub fn where_not_in<I, P>(self, column: impl Into<Expr>, values: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Param>,
    {
        self.push_where(
            Boolean::And,
            WhereKind::In {
                column: column.into(),
                values: values.into_iter().map(Into::into).collect(),
                not: true,
            },
        )
    }

    pub fn where_null(self, column: impl Into<Expr>) -> Self {
        self.push_where(
            Boolean::And,
            WhereKind::Null {
                column: column.into(),
                not: false,
            },
        )
    }

    pub fn where_not_null(self, column: impl Into<Expr>) -> Self {
        self.push_where(
            Boolean::And,
            WhereKind::Null {
                column: column.into(),
                not: true,
            },
        )
    }

    pub fn where_between(
        self,
        column: impl Into<Expr>,
        min: impl Into<Param>,
        max: impl Into<Param>,
    ) -> Self {
        self.push_where(
            Boolean::And,
            WhereKind::Between {
                column: column.into(),
                min: min.into(),
                max: max.into(),
                not: false,
            },
        )
    }

    /// Groups the conditions added by `build` in parentheses.
    pub fn where_nested(self, build: impl FnOnce(Query) -> Query) -> Self {
        let nested = build(Query::default());
        self.push_where(
            Boolean::And,
            WhereKind::Nested {
                wheres: nested.wheres,
            },
        )
    }

    pub fn or_where_nested(self, build: impl FnOnce(Query) -> Query) -> Self {
        let nested = build(Query::default());
        self.push_where(
            Boolean::Or,
            WhereKind::Nested {
                wheres: nested.wheres,
            },
        )
    }

    pub fn where_raw<I>(self, sql: &str, bindings: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        self.push_where(
            Boolean::And,
            WhereKind::Raw {
                sql: sql.to_owned(),
                bindings: bindings.into_iter().collect(),
            },
        )
    }

    pub fn where_exists(self, query: Query) -> Self {
        self.push_where(
            Boolean::And,
            WhereKind::Exists {
                query: Box::new(query),
                not: false,
            },
        )
    }

    pub fn where_in_sub(self, column: impl Into<Expr>, query: Query) -> Self {
        self.push_where(
            Boolean::And,
            WhereKind::InSub {
                column: column.into(),
                query: Box::new(query),
                not: false,
            },
        )
    }

    pub fn where_date_part(
        self,
        part: DatePart,
        column: impl Into<Expr>,
        operator: &str,
        value: impl Into<Param>,
    ) -> Self {
        self.push_where(
            Boolean::And,
            WhereKind::Date {
                part,
                column: column.into(),
                operator: operator.to_owned(),
                value: value.into(),
            },
        )
    }

    pub fn group_by<I, E>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<Expr>,
    {
        self.groups.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn having(
        mut self,
        column: impl Into<Expr>,
        operator: &str,
        value: impl Into<Param>,
    ) -> Self {
        self.havings.push(Having {
            boolean: Boolean::And,
            kind: HavingKind::Basic {
                column: column.into(),
                operator: operator.to_owned(),
                value: value.into(),
            },
        });
        self
    }

    pub fn having_raw<I>(mut self, sql: &str, bindings: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        self.havings.push(Having {
            boolean: Boolean::And,
            kind: HavingKind::Raw {
                sql: sql.to_owned(),
                bindings: bindings.into_iter().collect(),
            },
        });
        self
    }

    pub fn order_by(mut self, column: impl Into<Expr>, direction: Direction) -> Self {
        self.orders.push(Order::Column {
            column: column.into(),
            direction,
        });
        self
    }

    pub fn order_by_raw(mut self, sql: &str) -> Self {
        self.orders.push(Order::Raw {
            sql: sql.to_owned(),
        });
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn lock(mut self, lock: Lock) -> Self {
        self.lock = Some(lock);
        self
    }

    pub fn union(mut self, query: Query, all: bool) -> Self {
        self.unions.push(Union { query, all });
        self
    }

    pub fn has_joins(&self) -> bool {
        !self.joins.is_empty()
    }
}
