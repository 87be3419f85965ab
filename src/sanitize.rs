//! Sanitization of raw model output into a single query candidate.
//!
//! Everything here is pure string manipulation: code-fence extraction,
//! comment stripping, whitespace normalization, and a lexical syntax
//! check. No parsing, no AST.

use crate::error::GuardError;
use once_cell::sync::Lazy;
use regex::Regex;

/// Keywords a candidate query may begin with.
const QUERY_PREFIXES: [&str; 5] = ["SELECT", "INSERT", "UPDATE", "DELETE", "WITH"];

/// Compiled patterns used by the sanitizer.
///
/// These are hardcoded constants that have been verified to be valid regex.
fn compile(pattern: &str) -> Regex {
    Regex::new(pattern)
        .unwrap_or_else(|e| panic!("Internal error: invalid regex pattern '{}': {}", pattern, e))
}

/// Fenced code block tagged as SQL.
static SQL_FENCE: Lazy<Regex> = Lazy::new(|| compile(r"(?si)```sql\s+(.*?)```"));

/// Any fenced code block, with or without a language tag.
static ANY_FENCE: Lazy<Regex> = Lazy::new(|| compile(r"(?s)```(?:[a-zA-Z0-9]*\n)?(.*?)```"));

/// SQL line comment, `--` to end of line.
static LINE_COMMENT: Lazy<Regex> = Lazy::new(|| compile(r"--[^\n]*"));

/// SQL block comment, non-greedy, spanning newlines.
static BLOCK_COMMENT: Lazy<Regex> = Lazy::new(|| compile(r"(?s)/\*.*?\*/"));

/// Run of whitespace, including newlines.
static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| compile(r"\s+"));

/// Trailing statement terminators and whitespace.
static TRAILING_TERMINATORS: Lazy<Regex> = Lazy::new(|| compile(r"[\s;]+$"));

/// A LIMIT clause with a numeric argument.
static LIMIT_CLAUSE: Lazy<Regex> = Lazy::new(|| compile(r"(?i)\bLIMIT\s+\d+"));

/// Extract the query candidate from a completion that may wrap it in a
/// fenced code block.
///
/// Preference order: the first ```sql block, then the first fenced block of
/// any tag, then the text unchanged.
pub fn extract_from_code(text: &str) -> String {
    if let Some(caps) = SQL_FENCE.captures(text) {
        return caps[1].trim().to_string();
    }
    if let Some(caps) = ANY_FENCE.captures(text) {
        return caps[1].trim().to_string();
    }
    text.trim().to_string()
}

/// Normalize raw model output into one canonical query string.
///
/// Strips line and block comments, trailing statement terminators, and
/// embedded NUL characters; trims every line, drops blank lines, and
/// collapses whitespace runs into single spaces. Pure and total.
pub fn sanitize(text: &str) -> String {
    let without_nul = text.replace('\0', "");
    let no_line_comments = LINE_COMMENT.replace_all(without_nul.trim(), "");
    let no_comments = BLOCK_COMMENT.replace_all(&no_line_comments, "");

    let joined = no_comments
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    let collapsed = WHITESPACE_RUN.replace_all(&joined, " ");
    TRAILING_TERMINATORS
        .replace(&collapsed, "")
        .trim()
        .to_string()
}

/// Lexical syntax check over a sanitized candidate.
///
/// Accepts only queries beginning with SELECT / INSERT / UPDATE / DELETE /
/// WITH, with balanced parentheses and even quote counts. This is a
/// heuristic scan, not a grammar: it accepts many syntactically invalid
/// queries and rejects some valid edge cases (e.g. quotes inside escape
/// sequences). Known limitation, kept deliberately.
pub fn validate_syntax(query: &str) -> Result<(), GuardError> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(GuardError::invalid_syntax("query is empty"));
    }

    let upper = trimmed.to_uppercase();
    if !QUERY_PREFIXES.iter().any(|p| upper.starts_with(p)) {
        return Err(GuardError::invalid_syntax(format!(
            "query must begin with one of: {}",
            QUERY_PREFIXES.join(", ")
        )));
    }

    let mut paren_depth: i64 = 0;
    let mut single_quotes = 0usize;
    let mut double_quotes = 0usize;

    for ch in trimmed.chars() {
        match ch {
            '(' => paren_depth += 1,
            ')' => {
                paren_depth -= 1;
                if paren_depth < 0 {
                    return Err(GuardError::invalid_syntax(
                        "unbalanced parentheses: closing before opening",
                    ));
                }
            }
            '\'' => single_quotes += 1,
            '"' => double_quotes += 1,
            _ => {}
        }
    }

    if paren_depth != 0 {
        return Err(GuardError::invalid_syntax("unbalanced parentheses"));
    }
    if single_quotes % 2 != 0 {
        return Err(GuardError::invalid_syntax("unbalanced single quotes"));
    }
    if double_quotes % 2 != 0 {
        return Err(GuardError::invalid_syntax("unbalanced double quotes"));
    }

    Ok(())
}

/// Append `LIMIT max_rows` unless the query already carries a LIMIT clause.
///
/// Idempotent: applying it twice yields the same result as once.
pub fn add_limit_if_missing(query: &str, max_rows: usize) -> String {
    if LIMIT_CLAUSE.is_match(query) {
        query.to_string()
    } else {
        format!("{} LIMIT {}", query.trim_end(), max_rows)
    }
}

/// Escape a string value for inlining as a SQL literal by doubling
/// embedded single quotes.
///
/// Used only for the row-level security filter injection; not a general
/// injection defense.
pub fn escape_value(value: &str) -> String {
    value.replace('\'', "''")
}
