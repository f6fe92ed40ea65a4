//! Identifier and literal wrapping shared by the query and schema grammars.
//!
//! Values are wrapped in single quotes, identifiers in double quotes, unless
//! the policy folds identifiers to upper case (see [`DialectPolicy`]).

use serde::{Deserialize, Serialize};

use crate::policy::DialectPolicy;
use crate::value::quote_literal;

/// A column or table reference: either a name to be wrapped or a raw,
/// pre-rendered SQL fragment that bypasses wrapping entirely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Expr {
    Raw { raw: String },
    Name(String),
}

impl Expr {
    pub fn raw(sql: impl Into<String>) -> Self {
        Expr::Raw { raw: sql.into() }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Expr::Name(name) => Some(name),
            Expr::Raw { .. } => None,
        }
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, Expr::Raw { .. })
    }
}

impl From<&str> for Expr {
    fn from(value: &str) -> Self {
        Expr::Name(value.to_owned())
    }
}

impl From<String> for Expr {
    fn from(value: String) -> Self {
        Expr::Name(value)
    }
}

/// Stateless wrapper composed into both grammars.
#[derive(Debug, Clone, Default)]
pub struct Wrapper {
    policy: DialectPolicy,
}

impl Wrapper {
    pub fn new(policy: DialectPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &DialectPolicy {
        &self.policy
    }

    /// Wraps a single identifier. `*` is never wrapped.
    pub fn wrap_column(&self, name: &str) -> String {
        if name == "*" {
            return name.to_owned();
        }

        if !self.policy.case_sensitive {
            return name.to_uppercase().replace('"', "");
        }

        format!("\"{}\"", name.replace('"', "\"\""))
    }

    /// Wraps a table name with the configured prefix.
    pub fn wrap_table(&self, table: &Expr) -> String {
        match table {
            Expr::Raw { raw } => raw.clone(),
            Expr::Name(name) => self.wrap_table_name(name, &self.policy.table_prefix),
        }
    }

    /// Wraps a table name with an explicit prefix instead of the configured one.
    pub fn wrap_table_with_prefix(&self, table: &str, prefix: &str) -> String {
        self.wrap_table_name(table, prefix)
    }

    fn wrap_table_name(&self, table: &str, prefix: &str) -> String {
        if let Some((name, alias)) = split_alias(table) {
            return format!(
                "{} as {}",
                self.wrap_table_name(name, prefix),
                self.wrap_column(&format!("{prefix}{alias}"))
            );
        }

        let table = if self.policy.case_sensitive {
            table.to_owned()
        } else {
            table.to_uppercase()
        };

        // schema-qualified names carry the prefix on the last segment only
        let mut segments: Vec<&str> = table.split('.').collect();
        let last = segments.pop().unwrap_or_default();
        segments
            .iter()
            .map(|segment| self.wrap_column(segment))
            .chain(std::iter::once(self.wrap_column(&format!("{prefix}{last}"))))
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Wraps a string literal. `*` passes through unescaped.
    pub fn wrap_value(&self, value: &str) -> String {
        if value == "*" {
            return value.to_owned();
        }
        quote_literal(value)
    }

    /// Wraps a column reference: handles aliases, JSON selectors and dotted
    /// `table.column` paths. Raw expressions are emitted verbatim.
    pub fn wrap(&self, expr: &Expr) -> String {
        match expr {
            Expr::Raw { raw } => raw.clone(),
            Expr::Name(name) => self.wrap_name(name),
        }
    }

    pub fn wrap_name(&self, name: &str) -> String {
        if let Some((column, alias)) = split_alias(name) {
            return format!("{} as {}", self.wrap_name(column), self.wrap_column(alias));
        }

        if is_json_selector(name) {
            return self.wrap_json_selector(name);
        }

        let segments: Vec<&str> = name.split('.').collect();
        self.wrap_segments(&segments)
    }

    /// The first segment of a multi-segment path is a table; all others
    /// (including a lone segment) are columns.
    pub fn wrap_segments(&self, segments: &[&str]) -> String {
        segments
            .iter()
            .enumerate()
            .map(|(idx, segment)| {
                if idx == 0 && segments.len() > 1 {
                    self.wrap_table_name(segment, &self.policy.table_prefix)
                } else {
                    self.wrap_column(segment)
                }
            })
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Joins wrapped column names with `, `.
    pub fn columnize<S: AsRef<str>>(&self, columns: &[S]) -> String {
        columns
            .iter()
            .map(|column| self.wrap_name(column.as_ref()))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn columnize_exprs(&self, columns: &[Expr]) -> String {
        columns
            .iter()
            .map(|column| self.wrap(column))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// `meta->address->city` becomes `get_path(META, 'address.city')`.
    pub fn wrap_json_selector(&self, selector: &str) -> String {
        let (field, path) = self.wrap_json_field_and_path(selector);
        match path {
            Some(path) => format!("get_path({field}, {})", quote_literal(&path)),
            None => field,
        }
    }

    pub(crate) fn wrap_json_field_and_path(&self, selector: &str) -> (String, Option<String>) {
        let mut parts = selector.splitn(2, "->");
        let column = parts.next().unwrap_or_default();
        let segments: Vec<&str> = column.split('.').collect();
        let field = self.wrap_segments(&segments);
        let path = parts.next().map(|path| {
            path.split("->")
                .map(|segment| segment.trim().trim_matches(|c| c == '"' || c == '\''))
                .collect::<Vec<_>>()
                .join(".")
        });
        (field, path)
    }
}

pub(crate) fn is_json_selector(name: &str) -> bool {
    name.contains("->")
}

/// Splits `name as alias` (case-insensitive, any whitespace) on the last
/// `as` keyword.
pub(crate) fn split_alias(value: &str) -> Option<(&str, &str)> {
    let bytes = value.as_bytes();
    let mut found = None;
    let mut idx = 1;
    while idx + 2 < bytes.len() {
        if bytes[idx].eq_ignore_ascii_case(&b'a')
            && bytes[idx + 1].eq_ignore_ascii_case(&b's')
            && bytes[idx - 1].is_ascii_whitespace()
            && bytes[idx + 2].is_ascii_whitespace()
        {
            found = Some(idx);
        }
        idx += 1;
    }

    let at = found?;
    let left = value[..at].trim_end();
    let right = value[at + 2..].trim_start();
    if left.is_empty() || right.is_empty() {
        return None;
    }
    Some((left, right))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sensitive() -> Wrapper {
        Wrapper::new(DialectPolicy::case_sensitive())
    }

    fn insensitive() -> Wrapper {
        Wrapper::new(DialectPolicy::case_insensitive())
    }

    #[test]
    fn wrap_column_follows_case_policy() {
        assert_eq!(insensitive().wrap_column("Name"), "NAME");
        assert_eq!(sensitive().wrap_column("Name"), "\"Name\"");
        assert_eq!(sensitive().wrap_column("*"), "*");
        assert_eq!(insensitive().wrap_column("*"), "*");
    }

    #[test]
    fn embedded_quotes_round_trip() {
        let wrapper = sensitive();
        for ident in ["a\"b", "\"", "plain", "x\"\"y", "tail\""] {
            let wrapped = wrapper.wrap_column(ident);
            let inner = &wrapped[1..wrapped.len() - 1];
            assert_eq!(inner.replace("\"\"", "\""), ident);
        }
    }

    #[test]
    fn insensitive_mode_strips_quotes() {
        assert_eq!(insensitive().wrap_column("we\"ird"), "WEIRD");
    }

    #[test]
    fn tables_carry_the_prefix() {
        let wrapper = Wrapper::new(DialectPolicy::case_sensitive().with_prefix("app_"));
        assert_eq!(wrapper.wrap_table(&"users".into()), "\"app_users\"");
        assert_eq!(
            wrapper.wrap_table(&"users as u".into()),
            "\"app_users\" as \"app_u\""
        );
        assert_eq!(
            wrapper.wrap_table(&"analytics.events".into()),
            "\"analytics\".\"app_events\""
        );
        assert_eq!(wrapper.wrap_table(&Expr::raw("table(flatten(x))")), "table(flatten(x))");

        let folded = Wrapper::new(DialectPolicy::case_insensitive().with_prefix("app_"));
        assert_eq!(folded.wrap_table(&"users".into()), "APP_USERS");
    }

    #[test]
    fn segments_wrap_first_as_table() {
        let wrapper = sensitive();
        assert_eq!(wrapper.wrap_name("users.id"), "\"users\".\"id\"");
        assert_eq!(wrapper.wrap_name("id"), "\"id\"");
        assert_eq!(wrapper.wrap_name("users.*"), "\"users\".*");
        assert_eq!(
            wrapper.wrap_name("users.name as label"),
            "\"users\".\"name\" as \"label\""
        );
    }

    #[test]
    fn values_use_single_quotes() {
        let wrapper = insensitive();
        assert_eq!(wrapper.wrap_value("it's"), "'it''s'");
        assert_eq!(wrapper.wrap_value("*"), "*");
    }

    #[test]
    fn columnize_joins_with_commas() {
        assert_eq!(insensitive().columnize(&["id", "name"]), "ID, NAME");
        assert_eq!(sensitive().columnize(&["id", "name"]), "\"id\", \"name\"");
    }

    #[test]
    fn json_selectors_become_get_path() {
        assert_eq!(
            sensitive().wrap_name("meta->address->city"),
            "get_path(\"meta\", 'address.city')"
        );
        assert_eq!(
            insensitive().wrap_name("users.meta->tags[0]"),
            "get_path(USERS.META, 'tags[0]')"
        );
    }

    #[test]
    fn raw_expressions_bypass_wrapping() {
        assert_eq!(sensitive().wrap(&Expr::raw("count(*) over ()")), "count(*) over ()");
    }

    #[test]
    fn alias_split_is_case_insensitive() {
        assert_eq!(split_alias("users AS u"), Some(("users", "u")));
        assert_eq!(split_alias("users\tas\tu"), Some(("users", "u")));
        assert_eq!(split_alias("basket"), None);
        assert_eq!(split_alias("alias"), None);
    }
}
