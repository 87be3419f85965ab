//! # queryguard
//!
//! Natural-language to database query generation, gated by a security
//! validation pipeline.
//!
//! This crate provides:
//! - **Sanitization**: reducing raw model output to one clean query candidate
//! - **Validation**: operation/table/column policy, dangerous-pattern
//!   detection, row limits, and pluggable custom policy
//! - **Rewriting**: automatic row-level security filters and limit injection
//! - **Orchestration**: a generator composing prompt construction, the
//!   generation service call, and the full gate
//!
//! ## Architecture
//!
//! Data flows one way: user request -> prompt -> generation service ->
//! sanitizer -> validator (rewrite, then check) -> final query plus
//! diagnostics. The validator works on the query as a string using
//! pattern recognition; it never builds a syntax tree. It is best-effort
//! defense-in-depth, not a provably sound sandbox, and the query it
//! approves is handed to the caller for execution elsewhere.

pub mod config;
pub mod constants;
pub mod context;
pub mod error;
pub mod generator;
pub mod llm;
pub mod prompt;
pub mod sanitize;
pub mod schema;
pub mod security;

pub use config::{Config, ProviderConfig, SecurityConfig};
pub use context::{UserContext, UserId};
pub use error::GuardError;
pub use generator::{Complexity, QueryGenerator, QueryMetadata, QueryResult};
pub use llm::{GenerationService, LlmClient, Provider};
pub use schema::{Column, ColumnType, Dialect, ForeignKey, Schema, Table};
pub use security::{CustomValidator, Operation, SecurityValidator, ValidationReport};
