//! Error types for queryguard.
//!
//! This module defines semantic error types for the generation and
//! validation pipeline. Every failure surfaced to a caller carries a
//! stable variant and, where useful, structured detail.

use thiserror::Error;

/// Domain-specific errors for the query generation pipeline.
#[derive(Debug, Error)]
pub enum GuardError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The sanitized candidate failed the lexical syntax check
    #[error("Invalid query syntax: {0}")]
    InvalidSyntax(String),

    /// The security validator rejected the query
    #[error("Security validation failed: {}", .errors.join("; "))]
    ValidationFailed {
        errors: Vec<String>,
        warnings: Vec<String>,
    },

    /// The external generation service failed or returned unusable output
    #[error("Generation service error: {message}")]
    Generation {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The requested generation provider is not supported
    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),

    /// The requested database dialect is not supported
    #[error("Unsupported dialect: {0}")]
    UnsupportedDialect(String),

    /// The pluggable custom validator raised a failure
    #[error("Custom validator failure: {0}")]
    CustomValidator(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GuardError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a syntax error.
    pub fn invalid_syntax(msg: impl Into<String>) -> Self {
        Self::InvalidSyntax(msg.into())
    }

    /// Create a validation failure carrying the full diagnostic lists.
    pub fn validation_failed(errors: Vec<String>, warnings: Vec<String>) -> Self {
        Self::ValidationFailed { errors, warnings }
    }

    /// Create a generation service error.
    pub fn generation(msg: impl Into<String>) -> Self {
        Self::Generation {
            message: msg.into(),
            source: None,
        }
    }

    /// Create a generation service error with an underlying source.
    pub fn generation_with_source(
        msg: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Generation {
            message: msg.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a custom validator failure.
    pub fn custom_validator(msg: impl Into<String>) -> Self {
        Self::CustomValidator(msg.into())
    }

    /// Create an invalid input error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Get a user-friendly suggestion for how to fix this error.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::Config(_) => Some("Check your environment variables and configuration"),
            Self::InvalidSyntax(_) => {
                Some("The model output was not a recognizable query; try rephrasing the request")
            }
            Self::ValidationFailed { .. } => {
                Some("Review the security policy against the rejected query")
            }
            Self::Generation { .. } => {
                Some("Check provider connectivity, API key, and model name")
            }
            Self::UnsupportedProvider(_) => {
                Some("Use one of the supported providers: openai, openrouter, ollama")
            }
            Self::UnsupportedDialect(_) => {
                Some("Use one of the supported dialects: postgres, mysql, sqlite, mongodb, mssql")
            }
            Self::CustomValidator(_) => Some("Check the custom validator implementation"),
            _ => None,
        }
    }

    /// Validation errors attached to this failure, if any.
    pub fn validation_errors(&self) -> &[String] {
        match self {
            Self::ValidationFailed { errors, .. } => errors,
            _ => &[],
        }
    }
}

impl From<reqwest::Error> for GuardError {
    fn from(e: reqwest::Error) -> Self {
        GuardError::generation_with_source(format!("HTTP request failed: {}", e), e)
    }
}

impl From<serde_json::Error> for GuardError {
    fn from(e: serde_json::Error) -> Self {
        GuardError::generation_with_source(format!("Malformed provider response: {}", e), e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_failed_display() {
        let err = GuardError::validation_failed(
            vec!["first problem".to_string(), "second problem".to_string()],
            vec![],
        );
        let rendered = err.to_string();
        assert!(rendered.contains("first problem"));
        assert!(rendered.contains("second problem"));
    }

    #[test]
    fn test_error_suggestions() {
        let err = GuardError::config("missing key");
        assert!(err.suggestion().is_some());

        let err = GuardError::internal("unknown");
        assert!(err.suggestion().is_none());
    }

    #[test]
    fn test_validation_errors_accessor() {
        let err = GuardError::validation_failed(vec!["e1".to_string()], vec!["w1".to_string()]);
        assert_eq!(err.validation_errors(), &["e1".to_string()]);

        let err = GuardError::config("x");
        assert!(err.validation_errors().is_empty());
    }
}
