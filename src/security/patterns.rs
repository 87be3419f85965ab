//! Dangerous-pattern detection and table-name extraction.
//!
//! All detection here operates on the query text; patterns expecting
//! uppercase input are matched against the caller's uppercased copy.

use once_cell::sync::Lazy;
use regex::Regex;

/// Compile a hardcoded pattern, panicking with context on failure.
///
/// These should never fail since patterns are constants and tested.
fn compile(pattern: &str) -> Regex {
    Regex::new(pattern)
        .unwrap_or_else(|e| panic!("Internal error: invalid regex pattern '{}': {}", pattern, e))
}

/// Named dangerous patterns, matched against the uppercased query.
///
/// The list mixes statement-injection indicators with blanket DDL keyword
/// bans; the keyword ban is independent of the operation allow-list, so a
/// policy that allowed CREATE would still trip the scan. Known overlap,
/// kept to match the gate's established behavior.
static DANGEROUS_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        (compile(r"\bEXECUTE\b"), "EXECUTE keyword"),
        (compile(r"\bEXEC\b"), "EXEC keyword"),
        (compile(r"\bXP_CMDSHELL\b"), "xp_cmdshell procedure"),
        (compile(r"\bSP_EXECUTESQL\b"), "sp_executesql procedure"),
        (compile(r"\bUNION\b[\s\S]*\bSELECT\b"), "UNION SELECT"),
        (compile(r"--"), "line comment"),
        (compile(r"/\*"), "block comment"),
        (compile(r"\bDROP\b"), "DROP keyword"),
        (compile(r"\bTRUNCATE\b"), "TRUNCATE keyword"),
        (compile(r"\bALTER\b"), "ALTER keyword"),
        (compile(r"\bCREATE\b"), "CREATE keyword"),
        (compile(r"\bGRANT\b"), "GRANT keyword"),
        (compile(r"\bREVOKE\b"), "REVOKE keyword"),
    ]
});

/// Tokens following FROM / JOIN / INTO / UPDATE, taken as table candidates.
static TABLE_REFERENCE: Lazy<Regex> =
    Lazy::new(|| compile(r"(?i)\b(?:FROM|JOIN|INTO|UPDATE)\s+([A-Za-z_][A-Za-z0-9_.]*)"));

/// Check for a statement separator anywhere but the very end of the
/// trimmed query.
pub fn has_multiple_statements(query: &str) -> bool {
    let trimmed = query.trim();
    match trimmed.find(';') {
        Some(pos) => pos + 1 < trimmed.len(),
        None => false,
    }
}

/// Scan the query for dangerous patterns, returning the names of every
/// pattern that matched.
///
/// `query` is the original text; the keyword patterns run against an
/// uppercased copy.
pub fn scan_dangerous_patterns(query: &str) -> Vec<&'static str> {
    let upper = query.to_uppercase();
    let mut hits = Vec::new();

    if has_multiple_statements(query) {
        hits.push("multiple statements");
    }

    for (pattern, name) in DANGEROUS_PATTERNS.iter() {
        if pattern.is_match(&upper) {
            hits.push(*name);
        }
    }

    hits
}

/// Extract candidate table names referenced by the query.
///
/// Scans for tokens following FROM, JOIN, INTO, and UPDATE keywords,
/// deduplicated case-insensitively, preserving first-appearance order.
/// This is a string-level heuristic; subqueries and aliases are not
/// understood.
pub fn extract_table_names(query: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut tables = Vec::new();

    for caps in TABLE_REFERENCE.captures_iter(query) {
        let name = caps[1].trim_end_matches('.').to_string();
        if seen.insert(name.to_lowercase()) {
            tables.push(name);
        }
    }

    tables
}
