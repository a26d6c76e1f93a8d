//! Schema-driven payload validation and sanitization for generated CRUD handlers.

use crate::error::AppError;
use crate::schema::{ColumnMeta, SqlType, TableSchema};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::{Map, Value};

/// First failing field and the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub reason: String,
}

impl From<FieldError> for AppError {
    fn from(e: FieldError) -> Self {
        AppError::field(e.field, e.reason)
    }
}

impl FieldError {
    fn new(field: &str, reason: impl Into<String>) -> Self {
        FieldError {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Null, the empty string and empty arrays count as absent. `0` and `false` are present.
pub fn is_blank(v: Option<&Value>) -> bool {
    match v {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(a)) => a.is_empty(),
        _ => false,
    }
}

/// Number, or a string that parses as one.
pub fn is_numeric(v: &Value) -> bool {
    match v {
        Value::Number(_) => true,
        Value::String(s) => s.trim().parse::<f64>().map(|f| f.is_finite()).unwrap_or(false),
        _ => false,
    }
}

pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    const FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y/%m/%d %H:%M:%S",
    ];
    for f in FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, f) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Escape `& < > " '` for safe HTML rendering.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}

/// Key values compare by their text form, so `"42"` matches `42` and uuids ignore case.
fn same_key(a: &Value, b: &Value) -> bool {
    let text = |v: &Value| match v {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    };
    match (text(a), text(b)) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(&b),
        _ => false,
    }
}

pub struct FieldValidator;

impl FieldValidator {
    /// Check required-ness then type conformance, column by column in schema order.
    /// The primary key is never required. On update a payload that still carries it is an edit
    /// and is rejected; run `strip_primary_key` first to accept a key that repeats the record id.
    pub fn validate(payload: &Map<String, Value>, schema: &TableSchema, is_update: bool) -> Result<(), FieldError> {
        if is_update {
            if let Some(pk) = schema.primary_key.as_deref() {
                if payload.contains_key(pk) {
                    return Err(FieldError::new(pk, format!("Primary key '{}' cannot be modified", pk)));
                }
            }
        }
        for column in &schema.columns {
            if schema.is_primary_key(&column.name) {
                continue;
            }
            let value = payload.get(&column.name);
            if is_blank(value) {
                if column.is_required() {
                    return Err(FieldError::new(
                        &column.name,
                        format!("Field '{}' is required", column.name),
                    ));
                }
                continue;
            }
            if let Some(v) = value {
                check_type(column, v)?;
            }
        }
        Ok(())
    }

    /// Drop a carried primary key equal to `id`. Any other value is an attempt to change the key.
    pub fn strip_primary_key(
        payload: &Map<String, Value>,
        schema: &TableSchema,
        id: &Value,
    ) -> Result<Map<String, Value>, FieldError> {
        let mut payload = payload.clone();
        if let Some(pk) = schema.primary_key.as_deref() {
            if let Some(carried) = payload.remove(pk) {
                if !same_key(&carried, id) {
                    return Err(FieldError::new(pk, format!("Primary key '{}' cannot be modified", pk)));
                }
            }
        }
        Ok(payload)
    }

    /// Copy only schema columns, coercing integers, escaping text and normalizing datetimes.
    pub fn sanitize(payload: &Map<String, Value>, schema: &TableSchema) -> Map<String, Value> {
        payload
            .iter()
            .filter_map(|(k, v)| schema.get(k).map(|c| (k.clone(), sanitize_value(v, c.sql_type))))
            .collect()
    }
}

fn check_type(column: &ColumnMeta, v: &Value) -> Result<(), FieldError> {
    let t = column.sql_type;
    if t.is_integer() && !is_numeric(v) {
        return Err(FieldError::new(&column.name, "Value must be numeric"));
    }
    if t.is_text() && !v.is_string() {
        return Err(FieldError::new(&column.name, "Value must be string"));
    }
    if t.is_datetime() && !v.as_str().map(|s| parse_datetime(s).is_some()).unwrap_or(false) {
        return Err(FieldError::new(&column.name, "Invalid date format"));
    }
    Ok(())
}

fn sanitize_value(v: &Value, t: SqlType) -> Value {
    if v.is_null() {
        return Value::Null;
    }
    if t.is_integer() {
        return Value::from(to_integer(v));
    }
    if t.is_text() {
        return match v {
            Value::String(s) => Value::String(escape_html(s)),
            other => other.clone(),
        };
    }
    if t.is_datetime() {
        if let Some(dt) = v.as_str().and_then(parse_datetime) {
            return Value::String(dt.format("%Y-%m-%d %H:%M:%S").to_string());
        }
    }
    v.clone()
}

/// Integer coercion: numbers truncate, numeric strings parse, everything else becomes 0.
fn to_integer(v: &Value) -> i64 {
    match v {
        Value::Number(n) => n.as_i64().unwrap_or_else(|| n.as_f64().map(|f| f as i64).unwrap_or(0)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
                .unwrap_or(0)
        }
        Value::Bool(b) => i64::from(*b),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn users() -> TableSchema {
        TableSchema::new("users")
            .with_primary_key("id")
            .column(ColumnMeta::new("id", SqlType::Int).not_null())
            .column(ColumnMeta::new("email", SqlType::Varchar).not_null())
            .column(ColumnMeta::new("age", SqlType::Int))
            .column(ColumnMeta::new("bio", SqlType::Text))
            .column(ColumnMeta::new("created_at", SqlType::DateTime))
            .column(ColumnMeta::new("status", SqlType::Varchar).not_null().with_default("'active'"))
    }

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn missing_required_field() {
        let err = FieldValidator::validate(&obj(json!({"age": 3})), &users(), false).unwrap_err();
        assert_eq!(err.field, "email");
        assert_eq!(err.reason, "Field 'email' is required");
    }

    #[test]
    fn empty_string_counts_as_missing() {
        let err = FieldValidator::validate(&obj(json!({"email": ""})), &users(), false).unwrap_err();
        assert_eq!(err.reason, "Field 'email' is required");
    }

    #[test]
    fn zero_counts_as_present() {
        assert!(FieldValidator::validate(&obj(json!({"email": "a@b.c", "age": 0})), &users(), false).is_ok());
    }

    #[test]
    fn varchar_rejects_numbers() {
        let err = FieldValidator::validate(&obj(json!({"email": 123})), &users(), false).unwrap_err();
        assert_eq!(err.field, "email");
        assert_eq!(err.reason, "Value must be string");
    }

    #[test]
    fn int_rejects_non_numeric_string() {
        let err = FieldValidator::validate(&obj(json!({"email": "a@b.c", "age": "ten"})), &users(), false)
            .unwrap_err();
        assert_eq!(err.field, "age");
        assert_eq!(err.reason, "Value must be numeric");
        assert!(FieldValidator::validate(&obj(json!({"email": "a@b.c", "age": "10"})), &users(), false).is_ok());
    }

    #[test]
    fn datetime_must_parse() {
        let err = FieldValidator::validate(
            &obj(json!({"email": "a@b.c", "created_at": "yesterday-ish"})),
            &users(),
            false,
        )
        .unwrap_err();
        assert_eq!(err.reason, "Invalid date format");
    }

    #[test]
    fn columns_with_default_are_optional() {
        assert!(FieldValidator::validate(&obj(json!({"email": "a@b.c"})), &users(), false).is_ok());
    }

    #[test]
    fn update_rejects_primary_key_edit() {
        let err = FieldValidator::validate(&obj(json!({"id": 5, "email": "a@b.c"})), &users(), true).unwrap_err();
        assert_eq!(err.field, "id");
    }

    #[test]
    fn strip_primary_key_accepts_the_same_id_only() {
        let same = FieldValidator::strip_primary_key(&obj(json!({"id": "5", "email": "a@b.c"})), &users(), &json!(5))
            .unwrap();
        assert!(!same.contains_key("id"));
        assert!(FieldValidator::validate(&same, &users(), true).is_ok());

        let err = FieldValidator::strip_primary_key(&obj(json!({"id": 6, "email": "a@b.c"})), &users(), &json!(5))
            .unwrap_err();
        assert_eq!(err.field, "id");
        assert_eq!(err.reason, "Primary key 'id' cannot be modified");

        let absent = FieldValidator::strip_primary_key(&obj(json!({"email": "a@b.c"})), &users(), &json!(5)).unwrap();
        assert_eq!(absent, obj(json!({"email": "a@b.c"})));
    }

    #[test]
    fn update_still_requires_non_nullable_columns() {
        let err = FieldValidator::validate(&obj(json!({"age": 4})), &users(), true).unwrap_err();
        assert_eq!(err.field, "email");
    }

    #[test]
    fn sanitize_coerces_escapes_and_drops_unknown() {
        let clean = FieldValidator::sanitize(
            &obj(json!({
                "email": "<b>x</b>@y.z",
                "age": "42",
                "bio": "Tom & \"Jerry\"",
                "created_at": "2024-03-01T10:20:30Z",
                "is_admin": true
            })),
            &users(),
        );
        assert_eq!(clean["email"], json!("&lt;b&gt;x&lt;/b&gt;@y.z"));
        assert_eq!(clean["age"], json!(42));
        assert_eq!(clean["bio"], json!("Tom &amp; &quot;Jerry&quot;"));
        assert_eq!(clean["created_at"], json!("2024-03-01 10:20:30"));
        assert!(!clean.contains_key("is_admin"));
        let keys: Vec<&str> = clean.keys().map(String::as_str).collect();
        assert_eq!(keys, ["email", "age", "bio", "created_at"]);
    }

    #[test]
    fn sanitize_keeps_nulls() {
        let clean = FieldValidator::sanitize(&obj(json!({"age": null})), &users());
        assert_eq!(clean["age"], Value::Null);
    }

    #[test]
    fn date_only_normalizes_to_midnight() {
        let dt = parse_datetime("2024-02-29").unwrap();
        assert_eq!(dt.format("%Y-%m-%d %H:%M:%S").to_string(), "2024-02-29 00:00:00");
    }
}
