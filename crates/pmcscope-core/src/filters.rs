//! Filter grammar for store queries.
//!
//! The vocabulary is closed: `title`, `authors`, `publication_date`,
//! `publisher`, `restricted`, `id`. Filters combine with logical AND; an
//! empty set imposes no constraint. Unrecognized keys are a caller mistake
//! and error out instead of being silently ignored.

use rusqlite::types::Value;

use crate::error::{CoreError, Result};

/// One field-level constraint.
#[derive(Debug, Clone)]
pub enum ArticleFilter {
    /// Case-insensitive substring over the title.
    Title(String),
    /// Substring over the serialized authors list.
    Authors(String),
    /// Substring over the stored date; `"2021"` matches the whole year.
    PublicationDate(String),
    /// Substring over the publisher name.
    Publisher(String),
    /// Exact boolean match.
    Restricted(bool),
    /// Exact identifier match, or membership in a set of identifiers.
    Id(IdFilter),
}

#[derive(Debug, Clone)]
pub enum IdFilter {
    One(String),
    AnyOf(Vec<String>),
}

#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    filters: Vec<ArticleFilter>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, filter: ArticleFilter) {
        self.filters.push(filter);
    }

    pub fn with(mut self, filter: ArticleFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Build a filter set from raw `key=value` pairs, e.g. as parsed from a
    /// command line. The `id` value may list several identifiers separated
    /// by commas.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut set = FilterSet::new();
        for (key, value) in pairs {
            let key = key.as_ref();
            let value = value.as_ref();
            let filter = match key {
                "title" => ArticleFilter::Title(value.to_string()),
                "authors" => ArticleFilter::Authors(value.to_string()),
                "publication_date" => ArticleFilter::PublicationDate(value.to_string()),
                "publisher" => ArticleFilter::Publisher(value.to_string()),
                "restricted" => ArticleFilter::Restricted(parse_bool(key, value)?),
                "id" => ArticleFilter::Id(parse_ids(key, value)?),
                other => return Err(CoreError::UnsupportedFilter(other.to_string())),
            };
            set.push(filter);
        }
        Ok(set)
    }

    /// Render the AND-combined WHERE clause (empty string when no filters)
    /// plus the positional parameter values, in order.
    pub fn to_sql(&self) -> (String, Vec<Value>) {
        let mut conditions = Vec::new();
        let mut values = Vec::new();

        for filter in &self.filters {
            match filter {
                ArticleFilter::Title(needle) => {
                    conditions.push("LOWER(title) LIKE ?".to_string());
                    values.push(Value::Text(format!("%{}%", needle.to_lowercase())));
                }
                ArticleFilter::Authors(needle) => {
                    conditions.push("authors LIKE ?".to_string());
                    values.push(Value::Text(format!("%{needle}%")));
                }
                ArticleFilter::PublicationDate(needle) => {
                    conditions.push("publication_date LIKE ?".to_string());
                    values.push(Value::Text(format!("%{needle}%")));
                }
                ArticleFilter::Publisher(needle) => {
                    conditions.push("publisher LIKE ?".to_string());
                    values.push(Value::Text(format!("%{needle}%")));
                }
                ArticleFilter::Restricted(flag) => {
                    conditions.push("restricted = ?".to_string());
                    values.push(Value::Integer(i64::from(*flag)));
                }
                ArticleFilter::Id(IdFilter::One(id)) => {
                    conditions.push("id = ?".to_string());
                    values.push(Value::Text(id.clone()));
                }
                ArticleFilter::Id(IdFilter::AnyOf(ids)) => {
                    let placeholders = vec!["?"; ids.len()].join(",");
                    conditions.push(format!("id IN ({placeholders})"));
                    values.extend(ids.iter().cloned().map(Value::Text));
                }
            }
        }

        let clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };
        (clause, values)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(CoreError::InvalidFilterValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

fn parse_ids(key: &str, value: &str) -> Result<IdFilter> {
    let mut ids: Vec<String> = value
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect();
    match ids.len() {
        0 => Err(CoreError::InvalidFilterValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
        1 => Ok(IdFilter::One(ids.remove(0))),
        _ => Ok(IdFilter::AnyOf(ids)),
    }
}
