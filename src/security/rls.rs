//! Row-level security filter injection.
//!
//! Textual splicing, not AST rewriting: the filter is inserted at the top
//! level of the query string and does not descend into subqueries. Runs
//! before limit injection in the generation pipeline; ordering matters.

use crate::context::UserId;
use once_cell::sync::Lazy;
use regex::Regex;

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern)
        .unwrap_or_else(|e| panic!("Internal error: invalid regex pattern '{}': {}", pattern, e))
}

static WHERE_KEYWORD: Lazy<Regex> = Lazy::new(|| compile(r"(?i)\bWHERE\b"));
static ORDER_BY_KEYWORD: Lazy<Regex> = Lazy::new(|| compile(r"(?i)\bORDER\s+BY\b"));
static LIMIT_KEYWORD: Lazy<Regex> = Lazy::new(|| compile(r"(?i)\bLIMIT\b"));

/// Splice an owner-id equality filter into the query.
///
/// Skips the rewrite when the query already mentions the owner column
/// anywhere after its WHERE keyword. That check is deliberately coarse
/// (it can under- or over-trigger around subqueries and columns sharing
/// a substring) and is preserved as-is.
///
/// The filter is inserted immediately before ORDER BY if present, else
/// immediately before LIMIT, else appended at the end.
pub fn inject_owner_filter(query: &str, owner_column: &str, user_id: &UserId) -> String {
    let existing_where = WHERE_KEYWORD.find(query);

    if let Some(m) = existing_where {
        let after_where = &query[m.end()..];
        if after_where
            .to_lowercase()
            .contains(&owner_column.to_lowercase())
        {
            return query.to_string();
        }
    }

    let connective = if existing_where.is_some() { "AND" } else { "WHERE" };
    let filter = format!(
        "{} {} = {}",
        connective,
        owner_column,
        user_id.to_sql_literal()
    );

    let insertion = ORDER_BY_KEYWORD
        .find(query)
        .or_else(|| LIMIT_KEYWORD.find(query));

    match insertion {
        Some(m) => {
            let head = query[..m.start()].trim_end();
            let tail = &query[m.start()..];
            format!("{} {} {}", head, filter, tail)
        }
        None => format!("{} {}", query.trim_end(), filter),
    }
}
