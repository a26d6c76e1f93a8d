//! Table and column metadata consumed by the builder, validator and generator.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlType {
    Int,
    BigInt,
    TinyInt,
    Decimal,
    Float,
    Double,
    Varchar,
    Text,
    DateTime,
    Timestamp,
    Date,
    Time,
    Boolean,
    Other,
}

impl SqlType {
    pub fn is_integer(self) -> bool {
        matches!(self, SqlType::Int | SqlType::BigInt | SqlType::TinyInt)
    }

    pub fn is_text(self) -> bool {
        matches!(self, SqlType::Varchar | SqlType::Text)
    }

    pub fn is_datetime(self) -> bool {
        matches!(self, SqlType::DateTime | SqlType::Timestamp)
    }

    /// Map a PostgreSQL `udt_name` (`int4`, `timestamptz`, ...) to the column kind.
    pub fn from_pg_udt(udt: &str) -> SqlType {
        match udt {
            "int4" => SqlType::Int,
            "int8" => SqlType::BigInt,
            "int2" => SqlType::TinyInt,
            "numeric" => SqlType::Decimal,
            "float4" => SqlType::Float,
            "float8" => SqlType::Double,
            "varchar" | "bpchar" | "citext" => SqlType::Varchar,
            "text" => SqlType::Text,
            "timestamp" => SqlType::DateTime,
            "timestamptz" => SqlType::Timestamp,
            "date" => SqlType::Date,
            "time" | "timetz" => SqlType::Time,
            "bool" => SqlType::Boolean,
            _ => SqlType::Other,
        }
    }
}

impl FromStr for SqlType {
    type Err = std::convert::Infallible;

    /// Accepts declared SQL type names with or without a length suffix (`varchar(255)`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let base = s
            .split('(')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        Ok(match base.as_str() {
            "int" | "integer" | "int4" | "mediumint" | "serial" => SqlType::Int,
            "bigint" | "int8" | "bigserial" => SqlType::BigInt,
            "tinyint" | "smallint" | "int2" => SqlType::TinyInt,
            "decimal" | "numeric" => SqlType::Decimal,
            "float" | "real" | "float4" => SqlType::Float,
            "double" | "double precision" | "float8" => SqlType::Double,
            "varchar" | "character varying" | "char" | "character" => SqlType::Varchar,
            "text" | "mediumtext" | "longtext" => SqlType::Text,
            "datetime" | "timestamp without time zone" => SqlType::DateTime,
            "timestamp" | "timestamptz" | "timestamp with time zone" => SqlType::Timestamp,
            "date" => SqlType::Date,
            "time" => SqlType::Time,
            "boolean" | "bool" => SqlType::Boolean,
            _ => SqlType::Other,
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ColumnMeta {
    pub name: String,
    pub sql_type: SqlType,
    #[serde(default = "default_true")]
    pub nullable: bool,
    #[serde(default)]
    pub default: Option<String>,
    /// Backend type name used to cast bound placeholders (e.g. "timestamptz").
    #[serde(default)]
    pub native_type: Option<String>,
}

fn default_true() -> bool {
    true
}

impl ColumnMeta {
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        ColumnMeta {
            name: name.into(),
            sql_type,
            nullable: true,
            default: None,
            native_type: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_native_type(mut self, native: impl Into<String>) -> Self {
        self.native_type = Some(native.into());
        self
    }

    /// Non-nullable with no default: must be supplied by the client.
    pub fn is_required(&self) -> bool {
        !self.nullable && self.default.is_none()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TableSchema {
    pub table_name: String,
    /// Qualifying schema (e.g. "public"). Unqualified when absent.
    #[serde(default)]
    pub schema_name: Option<String>,
    /// Columns in declaration order.
    pub columns: Vec<ColumnMeta>,
    #[serde(default)]
    pub primary_key: Option<String>,
}

impl TableSchema {
    pub fn new(table_name: impl Into<String>) -> Self {
        TableSchema {
            table_name: table_name.into(),
            schema_name: None,
            columns: Vec::new(),
            primary_key: None,
        }
    }

    pub fn column(mut self, column: ColumnMeta) -> Self {
        self.columns.push(column);
        self
    }

    pub fn with_primary_key(mut self, pk: impl Into<String>) -> Self {
        self.primary_key = Some(pk.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&ColumnMeta> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn is_primary_key(&self, name: &str) -> bool {
        self.primary_key.as_deref() == Some(name)
    }

    pub fn primary_key_column(&self) -> Option<&ColumnMeta> {
        self.primary_key.as_deref().and_then(|pk| self.get(pk))
    }
}
