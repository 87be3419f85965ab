//! Centralized constants for queryguard.
//!
//! This module contains all magic numbers and default values used throughout
//! the codebase, making them easy to find, understand, and modify.

// =============================================================================
// Row Limit Constants
// =============================================================================

/// Default maximum number of rows a generated SELECT may return.
pub const DEFAULT_MAX_ROW_LIMIT: usize = 1000;

// =============================================================================
// Query Size Constants
// =============================================================================

/// Default maximum query length in bytes.
pub const DEFAULT_MAX_QUERY_LENGTH: usize = 1_000_000;

// =============================================================================
// Row-Level Security Constants
// =============================================================================

/// Default owner-id column used for row-level security filters.
pub const DEFAULT_RLS_OWNER_COLUMN: &str = "user_id";

// =============================================================================
// Generation Service Constants
// =============================================================================

/// Default model requested from the generation provider.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Maximum completion tokens requested per generation call.
pub const DEFAULT_MAX_COMPLETION_TOKENS: u32 = 1024;

/// Sampling temperature for query generation. Low: query generation wants
/// determinism, not creativity.
pub const DEFAULT_TEMPERATURE: f64 = 0.1;

// =============================================================================
// Logging Constants
// =============================================================================

/// Default truncation length for query logging.
pub const LOG_QUERY_TRUNCATE_LENGTH: usize = 200;

// =============================================================================
// Complexity Scoring Constants
// =============================================================================

/// Complexity score at or above which a query is classified as high.
pub const COMPLEXITY_HIGH_THRESHOLD: u32 = 3;

/// Complexity score at or above which a query is classified as medium.
pub const COMPLEXITY_MEDIUM_THRESHOLD: u32 = 1;

/// JOIN count above which the extra-join complexity bonus applies.
pub const COMPLEXITY_MANY_JOINS: usize = 2;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complexity_thresholds_ordered() {
        assert!(COMPLEXITY_MEDIUM_THRESHOLD < COMPLEXITY_HIGH_THRESHOLD);
    }

    #[test]
    fn test_row_limit_default() {
        assert!(DEFAULT_MAX_ROW_LIMIT > 0);
    }
}
