//! Schema introspection over `information_schema` for one PostgreSQL schema.

use super::{ColumnMeta, SchemaProvider, SqlType, TableSchema};
use crate::error::AppError;
use async_trait::async_trait;
use sqlx::PgPool;

/// Built-in types keep their bare `udt_name`. User-defined types (enums, domains) are
/// schema-qualified so casts resolve outside the search path.
fn native_type_name(data_type: &str, udt_schema: &str, udt_name: &str) -> String {
    if data_type == "USER-DEFINED" {
        format!("{}.{}", udt_schema, udt_name)
    } else {
        udt_name.to_string()
    }
}

#[derive(Clone)]
pub struct PgSchemaProvider {
    pool: PgPool,
    schema: String,
}

impl PgSchemaProvider {
    pub fn new(pool: PgPool, schema: impl Into<String>) -> Self {
        PgSchemaProvider {
            pool,
            schema: schema.into(),
        }
    }
}

#[async_trait]
impl SchemaProvider for PgSchemaProvider {
    async fn list_tables(&self) -> Result<Vec<String>, AppError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT table_name::text FROM information_schema.tables \
             WHERE table_schema = $1 AND table_type = 'BASE TABLE' ORDER BY table_name",
        )
        .bind(&self.schema)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    async fn describe_table(&self, name: &str) -> Result<TableSchema, AppError> {
        let rows: Vec<(String, String, String, String, String, Option<String>)> = sqlx::query_as(
            "SELECT column_name::text, data_type::text, udt_schema::text, udt_name::text, \
                    is_nullable::text, column_default::text \
             FROM information_schema.columns \
             WHERE table_schema = $1 AND table_name = $2 ORDER BY ordinal_position",
        )
        .bind(&self.schema)
        .bind(name)
        .fetch_all(&self.pool)
        .await?;
        if rows.is_empty() {
            return Err(AppError::NotFound(format!("table '{}' not found", name)));
        }
        let columns = rows
            .into_iter()
            .map(|(column, data_type, udt_schema, udt, is_nullable, default)| ColumnMeta {
                name: column,
                sql_type: SqlType::from_pg_udt(&udt),
                nullable: is_nullable == "YES",
                default,
                native_type: Some(native_type_name(&data_type, &udt_schema, &udt)),
            })
            .collect();
        Ok(TableSchema {
            table_name: name.to_string(),
            schema_name: Some(self.schema.clone()),
            columns,
            primary_key: self.primary_key_of(name).await?,
        })
    }

    /// First column of the primary key constraint. Composite keys expose only their leading column.
    async fn primary_key_of(&self, name: &str) -> Result<Option<String>, AppError> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT kcu.column_name::text \
             FROM information_schema.table_constraints tc \
             JOIN information_schema.key_column_usage kcu \
               ON tc.constraint_name = kcu.constraint_name \
              AND tc.table_schema = kcu.table_schema \
              AND tc.table_name = kcu.table_name \
             WHERE tc.constraint_type = 'PRIMARY KEY' AND tc.table_schema = $1 AND tc.table_name = $2 \
             ORDER BY kcu.ordinal_position LIMIT 1",
        )
        .bind(&self.schema)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(column,)| column))
    }
}
