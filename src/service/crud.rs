//! Generated CRUD operations for one table: list, get, create, update, delete.

use super::validation::{is_numeric, parse_datetime, FieldValidator};
use chrono::NaiveDate;
use crate::error::AppError;
use crate::response::ResponseEnvelope;
use crate::schema::{ColumnMeta, SqlType, TableSchema};
use crate::sql::{Connection, Direction, Operator, QueryBuilder};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Upper bound for `limit` on list requests.
pub const MAX_LIST_LIMIT: u64 = 1000;

const RESERVED_LIST_PARAMS: [&str; 4] = ["sort", "order", "limit", "offset"];

pub struct TableEndpoints {
    conn: Arc<dyn Connection>,
    schema: Arc<TableSchema>,
}

impl TableEndpoints {
    pub fn new(conn: Arc<dyn Connection>, schema: Arc<TableSchema>) -> Self {
        TableEndpoints { conn, schema }
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    fn builder(&self) -> QueryBuilder {
        QueryBuilder::for_table(self.conn.clone(), self.schema.clone())
    }

    fn primary_key(&self) -> Result<&ColumnMeta, AppError> {
        self.schema.primary_key_column().ok_or_else(|| {
            AppError::BadRequest(format!("Table '{}' has no primary key", self.schema.table_name))
        })
    }

    /// Coerce a path id by the primary-key column type.
    pub fn parse_id(&self, raw: &str) -> Result<Value, AppError> {
        let pk = self.primary_key()?;
        if pk.sql_type.is_integer() {
            let n: i64 = raw.parse().map_err(|_| AppError::BadRequest("Invalid id".into()))?;
            return Ok(Value::from(n));
        }
        if pk.native_type.as_deref() == Some("uuid") {
            let u = uuid::Uuid::parse_str(raw).map_err(|_| AppError::BadRequest("Invalid id".into()))?;
            return Ok(Value::String(u.to_string()));
        }
        Ok(Value::String(raw.to_string()))
    }

    /// Query-string filter value typed by its column. A value the column cannot hold is a 400.
    fn filter_value(column: &ColumnMeta, raw: &str) -> Result<Value, AppError> {
        let invalid = || AppError::BadRequest(format!("Invalid value for '{}'", column.name));
        let trimmed = raw.trim();
        match column.sql_type {
            t if t.is_integer() => trimmed.parse::<i64>().map(Value::from).map_err(|_| invalid()),
            SqlType::Decimal | SqlType::Float | SqlType::Double => {
                let value = Value::String(trimmed.to_string());
                if is_numeric(&value) {
                    Ok(value)
                } else {
                    Err(invalid())
                }
            }
            SqlType::Boolean => match trimmed.to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(Value::Bool(true)),
                "false" | "0" => Ok(Value::Bool(false)),
                _ => Err(invalid()),
            },
            t if t.is_datetime() => parse_datetime(trimmed)
                .map(|dt| Value::String(dt.format("%Y-%m-%d %H:%M:%S").to_string()))
                .ok_or_else(invalid),
            SqlType::Date => NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                .map(|d| Value::String(d.to_string()))
                .map_err(|_| invalid()),
            _ if column.native_type.as_deref() == Some("uuid") => uuid::Uuid::parse_str(trimmed)
                .map(|u| Value::String(u.to_string()))
                .map_err(|_| invalid()),
            _ => Ok(Value::String(raw.to_string())),
        }
    }

    /// Rows matching `column=value` query params on known columns, with optional
    /// `sort`/`order` and `limit`/`offset`. Unknown keys are ignored.
    pub async fn list(&self, query: &HashMap<String, String>) -> Result<ResponseEnvelope, AppError> {
        let mut builder = self.builder();

        let mut keys: Vec<&String> = query.keys().collect();
        keys.sort();
        for key in keys {
            if RESERVED_LIST_PARAMS.contains(&key.as_str()) {
                continue;
            }
            if let Some(column) = self.schema.get(key) {
                builder = builder.filter(key.as_str(), Operator::Eq, Self::filter_value(column, &query[key])?);
            }
        }

        if let Some(sort) = query.get("sort") {
            if !self.schema.has_column(sort) {
                return Err(AppError::BadRequest(format!("Unknown sort column '{}'", sort)));
            }
            let direction = match query.get("order") {
                Some(o) => o.parse::<Direction>()?,
                None => Direction::Asc,
            };
            builder = builder.order_by(sort.as_str(), direction);
        }

        let limit = parse_count(query.get("limit"), "limit")?;
        let offset = parse_count(query.get("offset"), "offset")?;
        match (limit, offset) {
            (Some(l), _) => builder = builder.limit(l.min(MAX_LIST_LIMIT)),
            (None, Some(_)) => builder = builder.limit(MAX_LIST_LIMIT),
            (None, None) => {}
        }
        if let Some(o) = offset {
            builder = builder.offset(o);
        }

        let rows = builder.select(&[]).await?;
        Ok(ResponseEnvelope::success(Value::Array(rows.into_iter().map(Value::Object).collect())))
    }

    pub async fn get(&self, raw_id: &str) -> Result<ResponseEnvelope, AppError> {
        let id = self.parse_id(raw_id)?;
        let pk = self.primary_key()?.name.clone();
        let rows = self.builder().filter(pk, Operator::Eq, id).limit(1).select(&[]).await?;
        match rows.into_iter().next() {
            Some(row) => Ok(ResponseEnvelope::success(Value::Object(row))),
            None => Err(AppError::NotFound("Record not found".into())),
        }
    }

    pub async fn create(&self, payload: &Map<String, Value>) -> Result<ResponseEnvelope, AppError> {
        FieldValidator::validate(payload, &self.schema, false)?;
        let clean = FieldValidator::sanitize(payload, &self.schema);
        let id = self.builder().insert(&clean).await?;
        tracing::info!(table = %self.schema.table_name, id = %id, "record created");
        Ok(ResponseEnvelope::success_message(
            "Record created successfully",
            Some(json!({ "id": id })),
        ))
    }

    pub async fn update(&self, raw_id: &str, payload: &Map<String, Value>) -> Result<ResponseEnvelope, AppError> {
        let id = self.parse_id(raw_id)?;
        let payload = FieldValidator::strip_primary_key(payload, &self.schema, &id)?;
        FieldValidator::validate(&payload, &self.schema, true)?;
        let clean = FieldValidator::sanitize(&payload, &self.schema);
        if clean.is_empty() {
            return Err(AppError::BadRequest("No updatable fields supplied".into()));
        }
        let pk = self.primary_key()?.name.clone();
        let affected = self.builder().filter(pk, Operator::Eq, id).update(&clean).await?;
        if affected == 0 {
            return Err(AppError::NotFound("Record not found".into()));
        }
        Ok(ResponseEnvelope::success_message("Record updated successfully", None))
    }

    pub async fn delete(&self, raw_id: &str) -> Result<ResponseEnvelope, AppError> {
        let id = self.parse_id(raw_id)?;
        let pk = self.primary_key()?.name.clone();
        let affected = self.builder().filter(pk, Operator::Eq, id).delete().await?;
        if affected == 0 {
            return Err(AppError::NotFound("Record not found".into()));
        }
        Ok(ResponseEnvelope::success_message("Record deleted successfully", None))
    }
}

fn parse_count(raw: Option<&String>, name: &str) -> Result<Option<u64>, AppError> {
    raw.map(|v| {
        v.trim()
            .parse::<u64>()
            .map_err(|_| AppError::BadRequest(format!("Invalid {}", name)))
    })
    .transpose()
}
