//! Prompt construction for the generation service.
//!
//! Prompts carry the schema description, the active policy constraints,
//! and the user's request, followed by a fixed instruction block that
//! demands a single bare query with no prose.

use crate::config::SecurityConfig;
use crate::context::UserContext;
use crate::schema::Schema;
use crate::security::Operation;

/// Build the query-generation prompt.
pub fn build_generation_prompt(
    schema: &Schema,
    security: &SecurityConfig,
    context: Option<&UserContext>,
    user_request: &str,
) -> String {
    let mut prompt = format!(
        r#"Generate a single {dialect} query for the request below.

## Database Schema

{schema_desc}

## Dialect Notes

{dialect_hint}

## Constraints

- Allowed operations: {operations}
"#,
        dialect = schema.dialect.as_str(),
        schema_desc = schema.render_for_prompt(),
        dialect_hint = schema.dialect.prompt_hint(),
        operations = security
            .allowed_operations
            .iter()
            .map(Operation::as_str)
            .collect::<Vec<_>>()
            .join(", "),
    );

    if !security.allowed_tables.is_empty() {
        prompt.push_str(&format!(
            "- Only these tables may be referenced: {}\n",
            security.allowed_tables.join(", ")
        ));
    }

    if !security.restricted_columns.is_empty() {
        prompt.push_str(&format!(
            "- Never reference these columns: {}\n",
            security.restricted_columns.join(", ")
        ));
    }

    let sensitive = schema.sensitive_columns();
    if !sensitive.is_empty() {
        prompt.push_str(&format!(
            "- These columns hold sensitive data and must not appear in the query: {}\n",
            sensitive.join(", ")
        ));
    }

    prompt.push_str(&format!(
        "- SELECT queries must not request more than {} rows\n",
        security.max_row_limit
    ));

    if let Some(ctx) = context {
        prompt.push_str(&format!(
            "\n## User Context\n\n- User id: {}\n- Role: {}\n",
            ctx.user_id, ctx.role
        ));
        if let Some(permissions) = &ctx.permissions {
            prompt.push_str(&format!("- Permissions: {}\n", permissions.join(", ")));
        }
    }

    prompt.push_str(&format!(
        r#"
## Request

{user_request}

## Instructions

Respond with exactly one query and nothing else: no explanation, no
markdown fences, no comments, and no trailing semicolon. The query must
be a single statement.
"#
    ));

    prompt
}

/// Build the follow-up prompt asking for a plain-language explanation of
/// an already-finalized query.
pub fn build_explanation_prompt(query: &str) -> String {
    format!(
        r#"Explain in plain language what the following query does.

```sql
{query}
```

Describe what data it returns or changes and any filters it applies.
Keep the explanation to a short paragraph aimed at a non-technical
reader.
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Column, ColumnType, Dialect, Table};

    fn sample_schema() -> Schema {
        Schema::new(Dialect::Postgres).table(
            Table::new("users")
                .column(Column::new("id", ColumnType::Integer))
                .column(Column::new("email", ColumnType::Varchar))
                .column(Column::new("api_token", ColumnType::Varchar).sensitive()),
        )
    }

    #[test]
    fn test_prompt_contains_schema_and_request() {
        let prompt = build_generation_prompt(
            &sample_schema(),
            &SecurityConfig::default(),
            None,
            "Show all users",
        );
        assert!(prompt.contains("Table users"));
        assert!(prompt.contains("Show all users"));
        assert!(prompt.contains("Allowed operations: SELECT"));
    }

    #[test]
    fn test_prompt_excludes_sensitive_from_schema_block() {
        let prompt = build_generation_prompt(
            &sample_schema(),
            &SecurityConfig::default(),
            None,
            "Show all users",
        );
        // The schema block omits the column; the constraint block names it
        // as forbidden.
        assert!(!prompt.contains("api_token (varchar)"));
        assert!(prompt.contains("must not appear in the query: users.api_token"));
    }

    #[test]
    fn test_prompt_includes_user_context() {
        let ctx = UserContext::new(7i64, "analyst");
        let prompt = build_generation_prompt(
            &sample_schema(),
            &SecurityConfig::default(),
            Some(&ctx),
            "Show my orders",
        );
        assert!(prompt.contains("User id: 7"));
        assert!(prompt.contains("Role: analyst"));
    }

    #[test]
    fn test_prompt_lists_table_allow_list() {
        let security = SecurityConfig {
            allowed_tables: vec!["users".to_string(), "orders".to_string()],
            ..SecurityConfig::default()
        };
        let prompt =
            build_generation_prompt(&sample_schema(), &security, None, "Show all users");
        assert!(prompt.contains("Only these tables may be referenced: users, orders"));
    }

    #[test]
    fn test_explanation_prompt_embeds_query() {
        let prompt = build_explanation_prompt("SELECT * FROM users LIMIT 5");
        assert!(prompt.contains("SELECT * FROM users LIMIT 5"));
        assert!(prompt.contains("plain language"));
    }
}
