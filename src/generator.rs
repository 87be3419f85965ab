//! Query generation orchestration.
//!
//! The generator wires the pipeline end to end: prompt construction,
//! one generation-service call, sanitization, row-level security
//! rewriting, limit injection, validation, and metadata derivation.
//! Every stage either fully succeeds or fails the whole call; a
//! partially-validated query must never reach execution.

use crate::config::SecurityConfig;
use crate::constants::{
    COMPLEXITY_HIGH_THRESHOLD, COMPLEXITY_MANY_JOINS, LOG_QUERY_TRUNCATE_LENGTH,
};
use crate::context::UserContext;
use crate::error::GuardError;
use crate::llm::GenerationService;
use crate::prompt;
use crate::sanitize;
use crate::schema::Schema;
use crate::security::{extract_table_names, Operation, SecurityValidator};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern)
        .unwrap_or_else(|e| panic!("Internal error: invalid regex pattern '{}': {}", pattern, e))
}

static JOIN_KEYWORD: Lazy<Regex> = Lazy::new(|| compile(r"(?i)\bJOIN\b"));
static NESTED_SELECT: Lazy<Regex> = Lazy::new(|| compile(r"(?i)\(\s*SELECT\b"));
static GROUP_BY_KEYWORD: Lazy<Regex> = Lazy::new(|| compile(r"(?i)\bGROUP\s+BY\b"));
static HAVING_KEYWORD: Lazy<Regex> = Lazy::new(|| compile(r"(?i)\bHAVING\b"));
static UNION_KEYWORD: Lazy<Regex> = Lazy::new(|| compile(r"(?i)\bUNION\b"));

/// Coarse classification of a query's structural heaviness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Low,
    Medium,
    High,
}

/// Metadata derived from the finalized query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryMetadata {
    /// Detected operation.
    pub operation: Operation,

    /// Referenced table names, deduplicated, in order of appearance.
    pub tables: Vec<String>,

    /// Complexity tier from keyword-presence heuristics.
    pub complexity: Complexity,
}

/// The finalized, validated query and its diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    /// The query string, after rewriting and validation.
    pub query: String,

    /// Bound parameters for execution. The pipeline inlines literals, so
    /// this is empty unless a caller adds parameters downstream.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<String>,

    /// Plain-language explanation, present after
    /// [`QueryGenerator::generate_with_explanation`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,

    /// Non-fatal findings from validation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,

    /// Derived metadata.
    pub metadata: QueryMetadata,
}

/// Natural-language to query generator.
///
/// Owns its validator and schema for its lifetime; holds no mutable
/// state, so one instance serves any number of concurrent calls.
pub struct QueryGenerator {
    service: Arc<dyn GenerationService>,
    schema: Schema,
    validator: SecurityValidator,
    default_context: Option<UserContext>,
}

impl QueryGenerator {
    /// Create a generator over the given service, schema, and policy.
    pub fn new(
        service: Arc<dyn GenerationService>,
        schema: Schema,
        security: SecurityConfig,
    ) -> Self {
        Self {
            service,
            schema,
            validator: SecurityValidator::new(security),
            default_context: None,
        }
    }

    /// Set a default user context applied when a call supplies none.
    pub fn with_default_context(mut self, context: UserContext) -> Self {
        self.default_context = Some(context);
        self
    }

    /// The schema this generator was built over.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The validator and its policy.
    pub fn validator(&self) -> &SecurityValidator {
        &self.validator
    }

    /// Generate, sanitize, rewrite, and validate a query for the request.
    ///
    /// The explicit `context` argument overrides the instance-level
    /// default. Fails with a typed error on the first unrecoverable
    /// stage; no retries.
    pub async fn generate(
        &self,
        user_input: &str,
        context: Option<&UserContext>,
    ) -> Result<QueryResult, GuardError> {
        let context = context.or(self.default_context.as_ref());

        info!(
            request = truncate_for_log(user_input, LOG_QUERY_TRUNCATE_LENGTH).as_str(),
            "generating query"
        );

        let prompt_text = prompt::build_generation_prompt(
            &self.schema,
            self.validator.config(),
            context,
            user_input,
        );

        let raw = self.service.complete(&prompt_text).await?;

        let candidate = sanitize::sanitize(&sanitize::extract_from_code(&raw));
        debug!(
            candidate = truncate_for_log(&candidate, LOG_QUERY_TRUNCATE_LENGTH).as_str(),
            "sanitized candidate"
        );

        sanitize::validate_syntax(&candidate)?;

        // RLS must run before limit injection: the filter is spliced ahead
        // of any LIMIT clause.
        let mut query = self.validator.apply_row_level_security(&candidate, context);

        let max_rows = self.validator.config().max_row_limit;
        if max_rows > 0 && Operation::detect(&query) == Some(Operation::Select) {
            query = sanitize::add_limit_if_missing(&query, max_rows);
        }

        let report = self.validator.validate(&query, context).await;
        if !report.valid {
            return Err(GuardError::validation_failed(report.errors, report.warnings));
        }

        let operation = Operation::detect(&query).ok_or_else(|| {
            GuardError::internal("operation undetectable after successful validation")
        })?;

        let metadata = QueryMetadata {
            operation,
            tables: extract_table_names(&query),
            complexity: estimate_complexity(&query),
        };

        debug!(
            query = truncate_for_log(&query, LOG_QUERY_TRUNCATE_LENGTH).as_str(),
            operation = %operation,
            "query finalized"
        );

        Ok(QueryResult {
            query,
            parameters: Vec::new(),
            explanation: None,
            warnings: report.warnings,
            metadata,
        })
    }

    /// Same pipeline as [`generate`], then one further service call for a
    /// plain-language explanation of the finalized query.
    ///
    /// The explanation is prose, so it only passes through code-block
    /// extraction, not query sanitization.
    ///
    /// [`generate`]: QueryGenerator::generate
    pub async fn generate_with_explanation(
        &self,
        user_input: &str,
        context: Option<&UserContext>,
    ) -> Result<QueryResult, GuardError> {
        let mut result = self.generate(user_input, context).await?;

        let explanation_raw = self
            .service
            .complete(&prompt::build_explanation_prompt(&result.query))
            .await?;

        result.explanation = Some(sanitize::extract_from_code(&explanation_raw));
        Ok(result)
    }
}

/// Estimate a query's complexity tier from keyword presence.
///
/// Additive score: +1 for any JOIN, +2 for a nested SELECT, +1 for
/// GROUP BY, +1 for HAVING, +2 for UNION, +2 more when more than two
/// JOINs are counted.
pub fn estimate_complexity(query: &str) -> Complexity {
    let mut score = 0u32;

    let join_count = JOIN_KEYWORD.find_iter(query).count();
    if join_count > 0 {
        score += 1;
    }
    if NESTED_SELECT.is_match(query) {
        score += 2;
    }
    if GROUP_BY_KEYWORD.is_match(query) {
        score += 1;
    }
    if HAVING_KEYWORD.is_match(query) {
        score += 1;
    }
    if UNION_KEYWORD.is_match(query) {
        score += 2;
    }
    if join_count > COMPLEXITY_MANY_JOINS {
        score += 2;
    }

    if score == 0 {
        Complexity::Low
    } else if score < COMPLEXITY_HIGH_THRESHOLD {
        Complexity::Medium
    } else {
        Complexity::High
    }
}

/// Truncate a string for logging purposes.
fn truncate_for_log(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        format!("{}...", &s[..max_len])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Column, ColumnType, Dialect, Table};
    use async_trait::async_trait;

    /// Service returning a fixed completion.
    struct FixedService(String);

    #[async_trait]
    impl GenerationService for FixedService {
        async fn complete(&self, _prompt: &str) -> Result<String, GuardError> {
            Ok(self.0.clone())
        }

        async fn validate_credentials(&self) -> bool {
            true
        }
    }

    fn users_schema() -> Schema {
        Schema::new(Dialect::Postgres).table(
            Table::new("users")
                .column(Column::new("id", ColumnType::Integer))
                .column(Column::new("email", ColumnType::Varchar))
                .column(Column::new("name", ColumnType::Varchar)),
        )
    }

    fn generator_for(completion: &str, security: SecurityConfig) -> QueryGenerator {
        QueryGenerator::new(
            Arc::new(FixedService(completion.to_string())),
            users_schema(),
            security,
        )
    }

    #[test]
    fn test_complexity_low() {
        assert_eq!(
            estimate_complexity("SELECT * FROM users"),
            Complexity::Low
        );
    }

    #[test]
    fn test_complexity_medium_join() {
        assert_eq!(
            estimate_complexity("SELECT * FROM a JOIN b ON a.id = b.id"),
            Complexity::Medium
        );
    }

    #[test]
    fn test_complexity_medium_nested_select() {
        assert_eq!(
            estimate_complexity("SELECT * FROM users WHERE id IN (SELECT user_id FROM orders)"),
            Complexity::Medium
        );
    }

    #[test]
    fn test_complexity_high_union_plus_join() {
        let query = "SELECT a FROM x JOIN y ON 1=1 UNION SELECT b FROM z";
        assert_eq!(estimate_complexity(query), Complexity::High);
    }

    #[test]
    fn test_complexity_many_joins() {
        let query = "SELECT * FROM a \
                     JOIN b ON 1=1 JOIN c ON 1=1 JOIN d ON 1=1";
        assert_eq!(estimate_complexity(query), Complexity::High);
    }

    #[test]
    fn test_truncate_for_log() {
        assert_eq!(truncate_for_log("short", 10), "short");
        assert_eq!(truncate_for_log("0123456789abc", 10), "0123456789...");
    }

    #[tokio::test]
    async fn test_generate_happy_path() {
        let gen = generator_for(
            "```sql\nSELECT id, email FROM users\n```",
            SecurityConfig {
                max_row_limit: 50,
                ..SecurityConfig::default()
            },
        );

        let result = gen.generate("Show all users", None).await.unwrap();
        assert_eq!(result.query, "SELECT id, email FROM users LIMIT 50");
        assert_eq!(result.metadata.operation, Operation::Select);
        assert_eq!(result.metadata.tables, vec!["users"]);
        assert_eq!(result.metadata.complexity, Complexity::Low);
        assert!(result.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_generate_rejects_bad_syntax() {
        let gen = generator_for("I cannot generate that query, sorry!", SecurityConfig::default());
        let err = gen.generate("Show all users", None).await.unwrap_err();
        assert!(matches!(err, GuardError::InvalidSyntax(_)));
    }

    #[tokio::test]
    async fn test_generate_rejects_disallowed_operation() {
        let gen = generator_for("DELETE FROM users", SecurityConfig::default());
        let err = gen.generate("Remove everyone", None).await.unwrap_err();
        assert!(matches!(err, GuardError::ValidationFailed { .. }));
    }

    #[tokio::test]
    async fn test_generate_applies_rls_before_limit() {
        let gen = QueryGenerator::new(
            Arc::new(FixedService("SELECT * FROM users".to_string())),
            users_schema(),
            SecurityConfig {
                enable_row_level_security: true,
                max_row_limit: 25,
                ..SecurityConfig::default()
            },
        );
        let ctx = UserContext::new(42i64, "member");

        let result = gen.generate("Show my rows", Some(&ctx)).await.unwrap();
        assert_eq!(
            result.query,
            "SELECT * FROM users WHERE user_id = 42 LIMIT 25"
        );
    }

    #[tokio::test]
    async fn test_default_context_is_used() {
        let gen = QueryGenerator::new(
            Arc::new(FixedService("SELECT * FROM users".to_string())),
            users_schema(),
            SecurityConfig {
                enable_row_level_security: true,
                ..SecurityConfig::default()
            },
        )
        .with_default_context(UserContext::new("abc-123", "member"));

        let result = gen.generate("Show my rows", None).await.unwrap();
        assert!(result.query.contains("user_id = 'abc-123'"));
    }
}
