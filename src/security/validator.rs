//! Policy validation of generated queries.

use crate::config::SecurityConfig;
use crate::context::UserContext;
use crate::error::GuardError;
use crate::security::{patterns, rls};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::debug;

/// Query operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Select,
    Insert,
    Update,
    Delete,
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern)
        .unwrap_or_else(|e| panic!("Internal error: invalid regex pattern '{}': {}", pattern, e))
}

/// Regex patterns for operation detection.
///
/// Compiled once at first use; all patterns are hardcoded constants.
static OPERATION_PATTERNS: Lazy<Vec<(Regex, Operation)>> = Lazy::new(|| {
    vec![
        (compile(r"(?i)^\s*SELECT\b"), Operation::Select),
        (compile(r"(?i)^\s*INSERT\b"), Operation::Insert),
        (compile(r"(?i)^\s*UPDATE\b"), Operation::Update),
        (compile(r"(?i)^\s*DELETE\b"), Operation::Delete),
    ]
});

/// A LIMIT clause with its numeric argument.
static LIMIT_VALUE: Lazy<Regex> = Lazy::new(|| compile(r"(?i)\bLIMIT\s+(\d+)"));

impl Operation {
    /// Detect the operation from the query prefix.
    ///
    /// Returns `None` for any other leading keyword (DROP, ALTER, CREATE,
    /// EXEC, ...), which rejects those statements before any allow-list
    /// logic runs.
    pub fn detect(query: &str) -> Option<Operation> {
        OPERATION_PATTERNS
            .iter()
            .find(|(pattern, _)| pattern.is_match(query))
            .map(|(_, op)| *op)
    }

    /// Uppercase SQL keyword for this operation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Select => "SELECT",
            Operation::Insert => "INSERT",
            Operation::Update => "UPDATE",
            Operation::Delete => "DELETE",
        }
    }

    /// Whether row-level security applies to this operation.
    pub fn supports_row_filter(&self) -> bool {
        matches!(
            self,
            Operation::Select | Operation::Update | Operation::Delete
        )
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = GuardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "SELECT" => Ok(Operation::Select),
            "INSERT" => Ok(Operation::Insert),
            "UPDATE" => Ok(Operation::Update),
            "DELETE" => Ok(Operation::Delete),
            other => Err(GuardError::invalid_input(format!(
                "Unknown operation: {}",
                other
            ))),
        }
    }
}

/// Pluggable policy predicate, supplied by the embedding application.
///
/// Returning `Ok(false)` rejects the query; a returned error is captured
/// and reported as a validation error, never propagated as a fault.
#[async_trait]
pub trait CustomValidator: Send + Sync {
    async fn check(
        &self,
        query: &str,
        context: Option<&UserContext>,
    ) -> Result<bool, GuardError>;
}

/// Outcome of a validation pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Whether the query passed every check.
    pub valid: bool,
    /// Accumulated errors. Non-empty iff `valid` is false.
    pub errors: Vec<String>,
    /// Non-fatal findings; never affect validity.
    pub warnings: Vec<String>,
}

impl ValidationReport {
    fn failure(error: String) -> Self {
        Self {
            valid: false,
            errors: vec![error],
            warnings: Vec::new(),
        }
    }
}

/// The policy engine.
///
/// Stateless apart from its immutable configuration; one instance may
/// serve any number of concurrent validation calls.
#[derive(Clone)]
pub struct SecurityValidator {
    config: SecurityConfig,
}

impl SecurityValidator {
    /// Create a validator over the given policy.
    pub fn new(config: SecurityConfig) -> Self {
        Self { config }
    }

    /// The active policy.
    pub fn config(&self) -> &SecurityConfig {
        &self.config
    }

    /// Validate a query against the policy.
    ///
    /// The first two checks short-circuit; every later check accumulates
    /// into the report so the caller sees all failures at once. The query
    /// is valid iff no errors accumulated; warnings never affect validity.
    pub async fn validate(
        &self,
        query: &str,
        context: Option<&UserContext>,
    ) -> ValidationReport {
        if self.config.require_user_context && context.is_none() {
            return ValidationReport::failure(
                "User context is required by policy but none was supplied".to_string(),
            );
        }

        if query.len() > self.config.max_query_length {
            return ValidationReport::failure(format!(
                "Query exceeds maximum length of {} bytes",
                self.config.max_query_length
            ));
        }

        let operation = match Operation::detect(query) {
            Some(op) => op,
            None => {
                return ValidationReport::failure(
                    "Could not determine query operation; query must begin with \
                     SELECT, INSERT, UPDATE, or DELETE"
                        .to_string(),
                );
            }
        };

        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if !self.config.allowed_operations.contains(&operation) {
            errors.push(format!(
                "Operation {} is not permitted (allowed: {})",
                operation,
                self.config
                    .allowed_operations
                    .iter()
                    .map(Operation::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
        }

        let hits = patterns::scan_dangerous_patterns(query);
        if !hits.is_empty() {
            errors.push(format!(
                "Dangerous SQL patterns detected: {}",
                hits.join(", ")
            ));
        }

        let query_lower = query.to_lowercase();
        let offending: Vec<&str> = self
            .config
            .restricted_columns
            .iter()
            .filter(|col| query_lower.contains(&col.to_lowercase()))
            .map(String::as_str)
            .collect();
        if !offending.is_empty() {
            errors.push(format!(
                "Query references restricted columns: {}",
                offending.join(", ")
            ));
        }

        if !self.config.allowed_tables.is_empty() {
            let unauthorized: Vec<String> = patterns::extract_table_names(query)
                .into_iter()
                .filter(|t| {
                    !self
                        .config
                        .allowed_tables
                        .iter()
                        .any(|allowed| allowed.eq_ignore_ascii_case(t))
                })
                .collect();
            if !unauthorized.is_empty() {
                errors.push(format!(
                    "Query references unauthorized tables: {}",
                    unauthorized.join(", ")
                ));
            }
        }

        if operation == Operation::Select {
            match LIMIT_VALUE
                .captures(query)
                .and_then(|caps| caps[1].parse::<usize>().ok())
            {
                None => warnings.push(format!(
                    "No LIMIT clause; the configured maximum of {} rows will be enforced",
                    self.config.max_row_limit
                )),
                Some(limit) if limit > self.config.max_row_limit => errors.push(format!(
                    "LIMIT {} exceeds the configured maximum of {}",
                    limit, self.config.max_row_limit
                )),
                Some(_) => {}
            }
        }

        if let Some(custom) = &self.config.custom_validator {
            match custom.check(query, context).await {
                Ok(true) => {}
                Ok(false) => errors.push("Custom validator rejected the query".to_string()),
                Err(e) => errors.push(format!("Custom validator failure: {}", e)),
            }
        }

        debug!(
            operation = %operation,
            errors = errors.len(),
            warnings = warnings.len(),
            "query validated"
        );

        ValidationReport {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    /// Rewrite the query with a row-level security filter.
    ///
    /// Applies only when enabled by policy, a user context is present,
    /// and the operation supports row filtering; otherwise the query is
    /// returned unchanged. Must run before limit injection.
    pub fn apply_row_level_security(
        &self,
        query: &str,
        context: Option<&UserContext>,
    ) -> String {
        if !self.config.enable_row_level_security {
            return query.to_string();
        }
        let Some(ctx) = context else {
            return query.to_string();
        };
        match Operation::detect(query) {
            Some(op) if op.supports_row_filter() => {
                rls::inject_owner_filter(query, &self.config.rls_owner_column, &ctx.user_id)
            }
            _ => query.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::UserContext;
    use std::sync::Arc;

    fn validator(config: SecurityConfig) -> SecurityValidator {
        SecurityValidator::new(config)
    }

    fn select_only() -> SecurityConfig {
        SecurityConfig::default()
    }

    #[test]
    fn test_detect_operation() {
        assert_eq!(Operation::detect("SELECT 1"), Some(Operation::Select));
        assert_eq!(
            Operation::detect("  update users set x = 1"),
            Some(Operation::Update)
        );
        assert_eq!(Operation::detect("DROP TABLE users"), None);
        assert_eq!(Operation::detect("WITH cte AS (SELECT 1) SELECT 1"), None);
    }

    #[tokio::test]
    async fn test_valid_select() {
        let report = validator(select_only())
            .validate("SELECT * FROM users LIMIT 10", None)
            .await;
        assert!(report.valid, "errors: {:?}", report.errors);
    }

    #[tokio::test]
    async fn test_unknown_operation_short_circuits() {
        let report = validator(select_only())
            .validate("DROP TABLE users", None)
            .await;
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("Could not determine"));
    }

    #[tokio::test]
    async fn test_disallowed_operation() {
        let report = validator(select_only())
            .validate("DELETE FROM users WHERE id = 1", None)
            .await;
        assert!(!report.valid);
        assert!(report.errors.iter().any(|e| e.contains("DELETE")));
    }

    #[tokio::test]
    async fn test_multiple_statements_rejected() {
        let report = validator(select_only())
            .validate("SELECT * FROM users; DROP TABLE users", None)
            .await;
        assert!(!report.valid);
        assert!(report
            .errors
            .iter()
            .any(|e| e.contains("multiple statements")));
    }

    #[tokio::test]
    async fn test_restricted_columns() {
        let config = SecurityConfig {
            restricted_columns: vec!["password_hash".to_string(), "ssn".to_string()],
            ..SecurityConfig::default()
        };
        let report = validator(config)
            .validate("SELECT password_hash FROM users LIMIT 5", None)
            .await;
        assert!(!report.valid);
        assert!(report.errors.iter().any(|e| e.contains("password_hash")));
        assert!(!report.errors.iter().any(|e| e.contains("ssn,")));
    }

    #[tokio::test]
    async fn test_table_allow_list() {
        let config = SecurityConfig {
            allowed_tables: vec!["users".to_string(), "orders".to_string()],
            ..SecurityConfig::default()
        };
        let v = validator(config);

        let ok = v.validate("SELECT * FROM users LIMIT 5", None).await;
        assert!(ok.valid, "errors: {:?}", ok.errors);

        let bad = v.validate("SELECT * FROM admin_secrets LIMIT 5", None).await;
        assert!(!bad.valid);
        assert!(bad.errors.iter().any(|e| e.contains("admin_secrets")));
    }

    #[tokio::test]
    async fn test_row_limit_enforcement() {
        let config = SecurityConfig {
            max_row_limit: 100,
            ..SecurityConfig::default()
        };
        let v = validator(config);

        let over = v.validate("SELECT * FROM users LIMIT 500", None).await;
        assert!(!over.valid);
        assert!(over.errors.iter().any(|e| e.contains("500") && e.contains("100")));

        let under = v.validate("SELECT * FROM users LIMIT 50", None).await;
        assert!(under.valid);
        assert!(under.warnings.is_empty());

        let missing = v.validate("SELECT * FROM users", None).await;
        assert!(missing.valid);
        assert_eq!(missing.warnings.len(), 1);
        assert!(missing.warnings[0].contains("100"));
    }

    #[tokio::test]
    async fn test_require_user_context() {
        let config = SecurityConfig {
            require_user_context: true,
            ..SecurityConfig::default()
        };
        let v = validator(config);

        let rejected = v.validate("SELECT 1", None).await;
        assert!(!rejected.valid);
        assert_eq!(rejected.errors.len(), 1);

        let ctx = UserContext::new(1i64, "admin");
        let accepted = v.validate("SELECT * FROM users LIMIT 1", Some(&ctx)).await;
        assert!(accepted.valid);
    }

    #[tokio::test]
    async fn test_query_length_limit() {
        let config = SecurityConfig {
            max_query_length: 32,
            ..SecurityConfig::default()
        };
        let long = format!("SELECT {} FROM t", "x".repeat(64));
        let report = validator(config).validate(&long, None).await;
        assert!(!report.valid);
        assert!(report.errors[0].contains("maximum length"));
    }

    struct RejectAll;

    #[async_trait]
    impl CustomValidator for RejectAll {
        async fn check(
            &self,
            _query: &str,
            _context: Option<&UserContext>,
        ) -> Result<bool, GuardError> {
            Ok(false)
        }
    }

    struct AlwaysFails;

    #[async_trait]
    impl CustomValidator for AlwaysFails {
        async fn check(
            &self,
            _query: &str,
            _context: Option<&UserContext>,
        ) -> Result<bool, GuardError> {
            Err(GuardError::custom_validator("policy backend unreachable"))
        }
    }

    #[test]
    fn test_custom_validator_rejection() {
        let config = SecurityConfig {
            custom_validator: Some(Arc::new(RejectAll)),
            ..SecurityConfig::default()
        };
        let report = tokio_test::block_on(
            validator(config).validate("SELECT * FROM users LIMIT 1", None),
        );
        assert!(!report.valid);
        assert!(report.errors.iter().any(|e| e.contains("rejected")));
    }

    #[test]
    fn test_custom_validator_failure_is_captured() {
        let config = SecurityConfig {
            custom_validator: Some(Arc::new(AlwaysFails)),
            ..SecurityConfig::default()
        };
        let report = tokio_test::block_on(
            validator(config).validate("SELECT * FROM users LIMIT 1", None),
        );
        assert!(!report.valid);
        assert!(report
            .errors
            .iter()
            .any(|e| e.contains("policy backend unreachable")));
    }

    #[tokio::test]
    async fn test_errors_accumulate() {
        let config = SecurityConfig {
            allowed_tables: vec!["users".to_string()],
            restricted_columns: vec!["ssn".to_string()],
            max_row_limit: 10,
            ..SecurityConfig::default()
        };
        let report = validator(config)
            .validate("SELECT ssn FROM vault LIMIT 99", None)
            .await;
        assert!(!report.valid);
        assert!(report.errors.len() >= 3);
    }

    #[test]
    fn test_rls_disabled_is_noop() {
        let v = validator(select_only());
        let ctx = UserContext::new(1i64, "user");
        let query = "SELECT * FROM orders";
        assert_eq!(v.apply_row_level_security(query, Some(&ctx)), query);
    }

    #[test]
    fn test_rls_applies_to_select() {
        let config = SecurityConfig {
            enable_row_level_security: true,
            ..SecurityConfig::default()
        };
        let v = validator(config);
        let ctx = UserContext::new(123i64, "user");
        let out = v.apply_row_level_security("SELECT * FROM orders", Some(&ctx));
        assert!(out.contains("user_id = 123"));
    }

    #[test]
    fn test_rls_skips_insert() {
        let config = SecurityConfig {
            enable_row_level_security: true,
            ..SecurityConfig::default()
        };
        let v = validator(config);
        let ctx = UserContext::new(123i64, "user");
        let query = "INSERT INTO orders (id) VALUES (1)";
        assert_eq!(v.apply_row_level_security(query, Some(&ctx)), query);
    }

    #[test]
    fn test_rls_requires_context() {
        let config = SecurityConfig {
            enable_row_level_security: true,
            ..SecurityConfig::default()
        };
        let v = validator(config);
        let query = "SELECT * FROM orders";
        assert_eq!(v.apply_row_level_security(query, None), query);
    }
}
