//! Schema metadata: column/table types and the providers that supply them.

mod postgres;
mod types;

pub use postgres::PgSchemaProvider;
pub use types::*;

use crate::error::{AppError, ConfigError};
use async_trait::async_trait;

/// Source of table metadata for the generator and handlers.
#[async_trait]
pub trait SchemaProvider: Send + Sync {
    async fn list_tables(&self) -> Result<Vec<String>, AppError>;

    async fn describe_table(&self, name: &str) -> Result<TableSchema, AppError>;

    async fn primary_key_of(&self, name: &str) -> Result<Option<String>, AppError> {
        Ok(self.describe_table(name).await?.primary_key)
    }
}

/// Fixed set of tables, e.g. loaded from a JSON file or built in tests.
#[derive(Clone, Debug, Default)]
pub struct StaticSchemaProvider {
    tables: Vec<TableSchema>,
}

impl StaticSchemaProvider {
    pub fn new(tables: Vec<TableSchema>) -> Self {
        StaticSchemaProvider { tables }
    }

    /// A JSON array of tables, e.g. `[{"table_name": "users", "primary_key": "id", "columns": [...]}]`.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let tables: Vec<TableSchema> =
            serde_json::from_str(json).map_err(|e| ConfigError::Load(format!("schema json: {}", e)))?;
        Ok(Self::new(tables))
    }
}

#[async_trait]
impl SchemaProvider for StaticSchemaProvider {
    async fn list_tables(&self) -> Result<Vec<String>, AppError> {
        Ok(self.tables.iter().map(|t| t.table_name.clone()).collect())
    }

    async fn describe_table(&self, name: &str) -> Result<TableSchema, AppError> {
        self.tables
            .iter()
            .find(|t| t.table_name == name)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("table '{}' not found", name)))
    }
}
