//! Schema registry: the authoritative table/column/relationship model.
//!
//! The registry is supplied by the caller (typically from ORM or database
//! introspection, which is outside this crate) and is read-only for the
//! lifetime of a generator. It renders itself into a textual description
//! for the generation prompt and answers table lookups for validation.

use crate::error::GuardError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Target database dialect.
///
/// Affects prompt hints only; validator behavior is dialect-independent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Postgres,
    Mysql,
    Sqlite,
    Mongodb,
    Mssql,
}

impl Dialect {
    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Postgres => "postgres",
            Dialect::Mysql => "mysql",
            Dialect::Sqlite => "sqlite",
            Dialect::Mongodb => "mongodb",
            Dialect::Mssql => "mssql",
        }
    }

    /// Dialect-specific guidance included in the generation prompt.
    pub fn prompt_hint(&self) -> &'static str {
        match self {
            Dialect::Postgres => {
                "Use PostgreSQL syntax. Prefer ILIKE for case-insensitive matching \
                 and LIMIT for row limits."
            }
            Dialect::Mysql => {
                "Use MySQL syntax. Use backticks only when an identifier requires \
                 them, and LIMIT for row limits."
            }
            Dialect::Sqlite => {
                "Use SQLite syntax. Avoid RIGHT JOIN and FULL OUTER JOIN; use LIMIT \
                 for row limits."
            }
            Dialect::Mongodb => {
                "Target the MongoDB SQL interface. Keep to simple SELECT projections \
                 and filters."
            }
            Dialect::Mssql => {
                "Use SQL Server syntax where it does not conflict with the required \
                 LIMIT clause; keep identifiers unbracketed."
            }
        }
    }
}

impl FromStr for Dialect {
    type Err = GuardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            "mysql" => Ok(Dialect::Mysql),
            "sqlite" => Ok(Dialect::Sqlite),
            "mongodb" | "mongo" => Ok(Dialect::Mongodb),
            "mssql" | "sqlserver" => Ok(Dialect::Mssql),
            other => Err(GuardError::UnsupportedDialect(other.to_string())),
        }
    }
}

/// Semantic column type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Integer,
    Varchar,
    Text,
    Boolean,
    Timestamp,
    Date,
    Decimal,
    Json,
    Blob,
}

impl ColumnType {
    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Integer => "integer",
            ColumnType::Varchar => "varchar",
            ColumnType::Text => "text",
            ColumnType::Boolean => "boolean",
            ColumnType::Timestamp => "timestamp",
            ColumnType::Date => "date",
            ColumnType::Decimal => "decimal",
            ColumnType::Json => "json",
            ColumnType::Blob => "blob",
        }
    }
}

/// A single table column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    pub name: String,

    pub column_type: ColumnType,

    /// Whether NULL values are permitted.
    #[serde(default)]
    pub nullable: bool,

    /// Optional human description, surfaced in the generation prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Sensitive data marker. Sensitive columns are omitted from generation
    /// prompts entirely.
    #[serde(default)]
    pub sensitive: bool,
}

impl Column {
    /// Create a non-nullable, non-sensitive column.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: false,
            description: None,
            sensitive: false,
        }
    }

    /// Mark the column nullable.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Mark the column sensitive.
    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    /// Attach a description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A foreign key relation from a local column to a referenced table/column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignKey {
    pub column: String,
    pub references_table: String,
    pub references_column: String,
}

/// A database table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    pub name: String,

    pub columns: Vec<Column>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub foreign_keys: Vec<ForeignKey>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Table {
    /// Create an empty table.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: None,
            foreign_keys: Vec::new(),
            description: None,
        }
    }

    /// Append a column.
    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    /// Set the primary key column.
    pub fn primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = Some(column.into());
        self
    }

    /// Add a foreign key relation.
    pub fn foreign_key(
        mut self,
        column: impl Into<String>,
        references_table: impl Into<String>,
        references_column: impl Into<String>,
    ) -> Self {
        self.foreign_keys.push(ForeignKey {
            column: column.into(),
            references_table: references_table.into(),
            references_column: references_column.into(),
        });
        self
    }

    /// Attach a description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// The full schema handed to a generator.
///
/// Table names are unique within a schema. A foreign key's referenced table
/// is assumed to exist among the schema's tables; this is not enforced
/// defensively.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema {
    pub dialect: Dialect,
    pub tables: Vec<Table>,
}

impl Schema {
    /// Create an empty schema for the given dialect.
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            tables: Vec::new(),
        }
    }

    /// Append a table.
    pub fn table(mut self, table: Table) -> Self {
        self.tables.push(table);
        self
    }

    /// Look up a table by name, case-insensitively.
    pub fn find_table(&self, name: &str) -> Option<&Table> {
        self.tables
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// All table names in declaration order.
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }

    /// Names of all columns flagged sensitive, qualified as `table.column`.
    pub fn sensitive_columns(&self) -> Vec<String> {
        self.tables
            .iter()
            .flat_map(|t| {
                t.columns
                    .iter()
                    .filter(|c| c.sensitive)
                    .map(move |c| format!("{}.{}", t.name, c.name))
            })
            .collect()
    }

    /// Render the schema as a textual description for the generation prompt.
    ///
    /// Sensitive columns are omitted so they never reach the model.
    pub fn render_for_prompt(&self) -> String {
        let mut out = String::new();

        for table in &self.tables {
            out.push_str(&format!("Table {}", table.name));
            if let Some(desc) = &table.description {
                out.push_str(&format!(": {}", desc));
            }
            out.push('\n');

            for col in table.columns.iter().filter(|c| !c.sensitive) {
                let mut line = format!(
                    "  - {} ({}{})",
                    col.name,
                    col.column_type.as_str(),
                    if col.nullable { ", nullable" } else { "" }
                );
                if table.primary_key.as_deref() == Some(col.name.as_str()) {
                    line.push_str(" [primary key]");
                }
                if let Some(desc) = &col.description {
                    line.push_str(&format!(" -- {}", desc));
                }
                out.push_str(&line);
                out.push('\n');
            }

            for fk in &table.foreign_keys {
                out.push_str(&format!(
                    "  - foreign key: {}.{} -> {}.{}\n",
                    table.name, fk.column, fk.references_table, fk.references_column
                ));
            }

            out.push('\n');
        }

        out.trim_end().to_string()
    }
}
