//! Per-request user context.
//!
//! A [`UserContext`] identifies the requesting user for policy decisions
//! and row-level security. It is created by the calling application for
//! each request and never persisted by the core.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// User identifier, either numeric or string-valued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserId {
    Int(i64),
    Str(String),
}

impl UserId {
    /// Render the identifier as a SQL literal.
    ///
    /// Numeric ids are inlined verbatim; string ids are single-quoted with
    /// embedded quotes doubled.
    pub fn to_sql_literal(&self) -> String {
        match self {
            UserId::Int(n) => n.to_string(),
            UserId::Str(s) => format!("'{}'", crate::sanitize::escape_value(s)),
        }
    }
}

impl From<i64> for UserId {
    fn from(n: i64) -> Self {
        UserId::Int(n)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        UserId::Str(s.to_string())
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        UserId::Str(s)
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserId::Int(n) => write!(f, "{}", n),
            UserId::Str(s) => write!(f, "{}", s),
        }
    }
}

/// Identity and authorization context for a single request.
///
/// Lifetime is one validation/generation call; the core holds no reference
/// to it afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserContext {
    /// User identifier, injected into row-level security filters.
    pub user_id: UserId,

    /// Role name. Open-ended; policy interprets it.
    pub role: String,

    /// Optional permission strings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<String>>,

    /// Optional free-form metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

impl UserContext {
    /// Create a new context with the given id and role.
    pub fn new(user_id: impl Into<UserId>, role: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role: role.into(),
            permissions: None,
            metadata: None,
        }
    }

    /// Attach permission strings.
    pub fn with_permissions(mut self, permissions: Vec<String>) -> Self {
        self.permissions = Some(permissions);
        self
    }

    /// Attach metadata.
    pub fn with_metadata(mut self, metadata: HashMap<String, serde_json::Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }
}
