//! Declarative PostgREST queries.
//!
//! A [`Query`] names a table and carries filters, ordering, a limit and a
//! column selection. It renders to the query-string parameters PostgREST
//! understands, e.g. `folder_id=is.null&order=created_at.desc&limit=20`.

use std::fmt::Display;

/// A single row filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// `column=eq.value`
    Eq(String, String),
    /// `column=is.null`
    IsNull(String),
    /// `column=in.(a,b)`
    In(String, Vec<String>),
    /// `column=cs.{a,b}`: array column contains every value.
    Contains(String, Vec<String>),
    /// `column=ilike.pattern`, with `*` as the wildcard.
    ILike(String, String),
    /// `column=wfts(english).query`: web-search style full-text match.
    FullText(String, String),
    /// `or=(f1,f2)`: at least one filter matches.
    Any(Vec<Filter>),
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Display) -> Self {
        Filter::Eq(column.into(), value.to_string())
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Filter::IsNull(column.into())
    }

    pub fn in_list<V: Display>(column: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Filter::In(column.into(), values.into_iter().map(|value| value.to_string()).collect())
    }

    pub fn contains<V: Display>(column: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Filter::Contains(column.into(), values.into_iter().map(|value| value.to_string()).collect())
    }

    pub fn ilike(column: impl Into<String>, pattern: impl Into<String>) -> Self {
        Filter::ILike(column.into(), pattern.into())
    }

    pub fn full_text(column: impl Into<String>, query: impl Into<String>) -> Self {
        Filter::FullText(column.into(), query.into())
    }

    /// Top-level rendering: `(key, value)` for the query string.
    fn to_param(&self) -> (String, String) {
        match self {
            Filter::Any(filters) => ("or".to_string(), format!("({})", join_nested(filters))),
            Filter::Eq(column, _)
            | Filter::IsNull(column)
            | Filter::In(column, _)
            | Filter::Contains(column, _)
            | Filter::ILike(column, _)
            | Filter::FullText(column, _) => (column.clone(), self.operation(false)),
        }
    }

    /// Rendering inside a logic tree: `column.op.value`.
    fn to_nested(&self) -> String {
        match self {
            Filter::Any(filters) => format!("or({})", join_nested(filters)),
            Filter::Eq(column, _)
            | Filter::IsNull(column)
            | Filter::In(column, _)
            | Filter::Contains(column, _)
            | Filter::ILike(column, _)
            | Filter::FullText(column, _) => format!("{column}.{}", self.operation(true)),
        }
    }

    /// `op.value`. Scalar values are only quoted inside logic trees, where
    /// commas and parentheses are syntax.
    fn operation(&self, nested: bool) -> String {
        let scalar = |value: &str| if nested { quote(value) } else { value.to_string() };
        match self {
            Filter::Eq(_, value) => format!("eq.{}", scalar(value)),
            Filter::IsNull(_) => "is.null".to_string(),
            Filter::In(_, values) => format!("in.({})", values.iter().map(|v| quote(v)).collect::<Vec<_>>().join(",")),
            Filter::Contains(_, values) => {
                format!("cs.{{{}}}", values.iter().map(|v| quote(v)).collect::<Vec<_>>().join(","))
            },
            Filter::ILike(_, pattern) => format!("ilike.{}", scalar(pattern)),
            Filter::FullText(_, query) => format!("wfts(english).{}", scalar(query)),
            Filter::Any(_) => String::new(),
        }
    }
}

fn join_nested(filters: &[Filter]) -> String {
    filters.iter().map(Filter::to_nested).collect::<Vec<_>>().join(",")
}

/// Double-quote a value if it contains characters PostgREST reserves in
/// lists and logic trees.
fn quote(value: &str) -> String {
    let reserved = value.is_empty()
        || value.chars().any(|c| matches!(c, ',' | '.' | ':' | '(' | ')' | '{' | '}' | '"' | '\\') || c.is_whitespace());
    if !reserved {
        return value.to_string();
    }
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// A query against one table.
///
/// ```
/// use docshelf_client::query::{Direction, Filter, Query};
///
/// let query = Query::table("documents")
///     .select("*,folders(name)")
///     .filter(Filter::is_null("folder_id"))
///     .order("created_at", Direction::Descending)
///     .limit(20);
/// assert_eq!(
///     query.to_params(),
///     [
///         ("select".to_string(), "*,folders(name)".to_string()),
///         ("folder_id".to_string(), "is.null".to_string()),
///         ("order".to_string(), "created_at.desc".to_string()),
///         ("limit".to_string(), "20".to_string()),
///     ]
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    table: String,
    select: Option<String>,
    filters: Vec<Filter>,
    order: Vec<(String, Direction)>,
    limit: Option<usize>,
}

impl Query {
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            select: None,
            filters: Vec::new(),
            order: Vec::new(),
            limit: None,
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// Column selection, including embedded foreign-key joins such as
    /// `*,folders(name)`.
    pub fn select(mut self, columns: impl Into<String>) -> Self {
        self.select = Some(columns.into());
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn eq(self, column: impl Into<String>, value: impl Display) -> Self {
        self.filter(Filter::eq(column, value))
    }

    pub fn order(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.order.push((column.into(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if let Some(select) = &self.select {
            params.push(("select".to_string(), select.clone()));
        }
        params.extend(self.filters.iter().map(Filter::to_param));
        if !self.order.is_empty() {
            let order = self
                .order
                .iter()
                .map(|(column, direction)| match direction {
                    Direction::Ascending => format!("{column}.asc"),
                    Direction::Descending => format!("{column}.desc"),
                })
                .collect::<Vec<_>>()
                .join(",");
            params.push(("order".to_string(), order));
        }
        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        params
    }
}
