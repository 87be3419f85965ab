//! Configuration management for queryguard.
//!
//! Configuration is loaded from environment variables following the
//! 12-factor app pattern, or built programmatically. All of it is fixed at
//! generator construction time and immutable afterward.

use crate::constants::{
    DEFAULT_MAX_QUERY_LENGTH, DEFAULT_MAX_ROW_LIMIT, DEFAULT_MODEL, DEFAULT_RLS_OWNER_COLUMN,
};
use crate::error::GuardError;
use crate::llm::Provider;
use crate::schema::Dialect;
use crate::security::{CustomValidator, Operation};
use std::str::FromStr;
use std::sync::Arc;

/// Top-level configuration for the binary adapter.
#[derive(Debug, Clone)]
pub struct Config {
    /// Generation provider configuration.
    pub provider: ProviderConfig,

    /// Target database dialect.
    pub dialect: Dialect,

    /// Security policy.
    pub security: SecurityConfig,
}

/// Generation provider configuration.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Which provider to talk to.
    pub provider: Provider,

    /// Model name requested from the provider.
    pub model: String,

    /// API key. May be empty for local providers.
    pub api_key: String,

    /// Base URL override; defaults to the provider's public endpoint.
    pub base_url: Option<String>,
}

/// Security policy consumed by the validator.
///
/// Immutable per generator instance.
#[derive(Clone)]
pub struct SecurityConfig {
    /// Operations the policy permits.
    pub allowed_operations: Vec<Operation>,

    /// Table allow-list. Empty means no table restriction.
    pub allowed_tables: Vec<String>,

    /// Column deny-list, matched as case-insensitive substrings.
    pub restricted_columns: Vec<String>,

    /// Maximum number of rows a SELECT may request.
    pub max_row_limit: usize,

    /// Reject queries validated without a user context.
    pub require_user_context: bool,

    /// Enable automatic row-level security rewriting.
    pub enable_row_level_security: bool,

    /// Owner-id column bound by row-level security filters.
    pub rls_owner_column: String,

    /// Maximum query length in bytes.
    pub max_query_length: usize,

    /// Pluggable policy predicate, invoked last in the validation pass.
    pub custom_validator: Option<Arc<dyn CustomValidator>>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            allowed_operations: vec![Operation::Select],
            allowed_tables: Vec::new(),
            restricted_columns: Vec::new(),
            max_row_limit: DEFAULT_MAX_ROW_LIMIT,
            require_user_context: false,
            enable_row_level_security: false,
            rls_owner_column: DEFAULT_RLS_OWNER_COLUMN.to_string(),
            max_query_length: DEFAULT_MAX_QUERY_LENGTH,
            custom_validator: None,
        }
    }
}

impl std::fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("allowed_operations", &self.allowed_operations)
            .field("allowed_tables", &self.allowed_tables)
            .field("restricted_columns", &self.restricted_columns)
            .field("max_row_limit", &self.max_row_limit)
            .field("require_user_context", &self.require_user_context)
            .field("enable_row_level_security", &self.enable_row_level_security)
            .field("rls_owner_column", &self.rls_owner_column)
            .field("max_query_length", &self.max_query_length)
            .field(
                "custom_validator",
                &self.custom_validator.as_ref().map(|_| "<dyn>"),
            )
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// ## Required
    /// - `QUERYGUARD_API_KEY`: provider API key (not required for ollama)
    ///
    /// ## Optional
    /// - `QUERYGUARD_PROVIDER`: generation provider (default: openai)
    /// - `QUERYGUARD_MODEL`: model name (default: gpt-4o-mini)
    /// - `QUERYGUARD_BASE_URL`: provider endpoint override
    /// - `QUERYGUARD_DIALECT`: target dialect (default: postgres)
    /// - `QUERYGUARD_ALLOWED_OPERATIONS`: comma-separated (default: select)
    /// - `QUERYGUARD_ALLOWED_TABLES`: comma-separated allow-list
    /// - `QUERYGUARD_RESTRICTED_COLUMNS`: comma-separated deny-list
    /// - `QUERYGUARD_MAX_ROW_LIMIT`: row ceiling (default: 1000)
    /// - `QUERYGUARD_REQUIRE_USER_CONTEXT`: true/false (default: false)
    /// - `QUERYGUARD_ENABLE_RLS`: true/false (default: false)
    /// - `QUERYGUARD_RLS_OWNER_COLUMN`: owner column (default: user_id)
    /// - `QUERYGUARD_MAX_QUERY_LENGTH`: byte ceiling (default: 1000000)
    pub fn from_env() -> Result<Self, GuardError> {
        let provider = std::env::var("QUERYGUARD_PROVIDER")
            .ok()
            .map(|s| Provider::from_str(&s))
            .transpose()?
            .unwrap_or(Provider::OpenAi);

        let api_key = match std::env::var("QUERYGUARD_API_KEY") {
            Ok(key) => key,
            Err(_) if !provider.requires_api_key() => String::new(),
            Err(_) => {
                return Err(GuardError::config(
                    "QUERYGUARD_API_KEY environment variable is required",
                ))
            }
        };

        let model =
            std::env::var("QUERYGUARD_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        let base_url = std::env::var("QUERYGUARD_BASE_URL").ok();

        let dialect = std::env::var("QUERYGUARD_DIALECT")
            .ok()
            .map(|s| Dialect::from_str(&s))
            .transpose()?
            .unwrap_or_default();

        let allowed_operations = match std::env::var("QUERYGUARD_ALLOWED_OPERATIONS") {
            Ok(raw) => parse_operations(&raw)?,
            Err(_) => vec![Operation::Select],
        };

        let allowed_tables = std::env::var("QUERYGUARD_ALLOWED_TABLES")
            .map(|raw| parse_list(&raw))
            .unwrap_or_default();

        let restricted_columns = std::env::var("QUERYGUARD_RESTRICTED_COLUMNS")
            .map(|raw| parse_list(&raw))
            .unwrap_or_default();

        let max_row_limit = std::env::var("QUERYGUARD_MAX_ROW_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_ROW_LIMIT);

        let require_user_context = std::env::var("QUERYGUARD_REQUIRE_USER_CONTEXT")
            .map(|v| v.to_lowercase() == "true" || v == "1")
            .unwrap_or(false);

        let enable_row_level_security = std::env::var("QUERYGUARD_ENABLE_RLS")
            .map(|v| v.to_lowercase() == "true" || v == "1")
            .unwrap_or(false);

        let rls_owner_column = std::env::var("QUERYGUARD_RLS_OWNER_COLUMN")
            .unwrap_or_else(|_| DEFAULT_RLS_OWNER_COLUMN.to_string());

        let max_query_length = std::env::var("QUERYGUARD_MAX_QUERY_LENGTH")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_QUERY_LENGTH);

        Ok(Config {
            provider: ProviderConfig {
                provider,
                model,
                api_key,
                base_url,
            },
            dialect,
            security: SecurityConfig {
                allowed_operations,
                allowed_tables,
                restricted_columns,
                max_row_limit,
                require_user_context,
                enable_row_level_security,
                rls_owner_column,
                max_query_length,
                custom_validator: None,
            },
        })
    }
}

/// Split a comma-separated list, trimming entries and dropping empties.
fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Parse a comma-separated operation list.
fn parse_operations(raw: &str) -> Result<Vec<Operation>, GuardError> {
    let ops = parse_list(raw)
        .iter()
        .map(|s| Operation::from_str(s))
        .collect::<Result<Vec<_>, _>>()?;
    if ops.is_empty() {
        return Err(GuardError::config(
            "QUERYGUARD_ALLOWED_OPERATIONS must name at least one operation",
        ));
    }
    Ok(ops)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_security_defaults() {
        let config = SecurityConfig::default();
        assert_eq!(config.allowed_operations, vec![Operation::Select]);
        assert!(config.allowed_tables.is_empty());
        assert_eq!(config.max_row_limit, DEFAULT_MAX_ROW_LIMIT);
        assert!(!config.enable_row_level_security);
        assert_eq!(config.rls_owner_column, "user_id");
    }

    #[test]
    fn test_parse_list() {
        assert_eq!(parse_list("a, b ,c,,"), vec!["a", "b", "c"]);
        assert!(parse_list("").is_empty());
    }

    #[test]
    fn test_parse_operations() {
        let ops = parse_operations("select, INSERT").unwrap();
        assert_eq!(ops, vec![Operation::Select, Operation::Insert]);

        assert!(parse_operations("select, grant").is_err());
        assert!(parse_operations("").is_err());
    }

    #[test]
    fn test_debug_hides_custom_validator() {
        let rendered = format!("{:?}", SecurityConfig::default());
        assert!(rendered.contains("custom_validator: None"));
    }
}
