//! Typed errors and HTTP mapping.

use crate::response::ResponseEnvelope;
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use std::collections::BTreeMap;
use thiserror::Error;

/// Per-field validation messages, serialized as `{"field": ["message", ...]}`.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("unknown handler '{0}'")]
    UnknownHandler(String),
    #[error("unknown middleware '{0}'")]
    UnknownMiddleware(String),
    #[error("duplicate registry key '{0}'")]
    DuplicateKey(String),
    #[error("invalid route pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
    #[error("invalid http method '{0}'")]
    InvalidMethod(String),
    #[error("invalid validation rule '{rule}' for field '{field}'")]
    InvalidRule { field: String, rule: String },
    #[error("missing required setting {0}")]
    MissingEnv(&'static str),
    #[error("invalid value for {key}: {value}")]
    InvalidEnv { key: &'static str, value: String },
    #[error("config load: {0}")]
    Load(String),
}

/// Backend failure while executing a statement. Carries the backend message verbatim.
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct QueryExecutionError {
    pub message: String,
}

impl From<sqlx::Error> for QueryExecutionError {
    fn from(e: sqlx::Error) -> Self {
        QueryExecutionError { message: e.to_string() }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("validation failed")]
    Validation(FieldErrors),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("too many requests")]
    RateLimited { retry_after: u64 },
    #[error("query execution failed: {0}")]
    Query(#[from] QueryExecutionError),
    #[error("{0}")]
    BadRequest(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Query(e.into())
    }
}

impl AppError {
    /// Single-field validation failure.
    pub fn field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.into(), vec![reason.into()]);
        AppError::Validation(errors)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Config(_) | AppError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Query(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Uniform error envelope. Configuration and I/O detail stays in the logs.
    pub fn into_envelope(self) -> ResponseEnvelope {
        let status = self.status();
        match self {
            AppError::Config(e) => {
                tracing::error!(error = %e, "configuration error");
                ResponseEnvelope::error(status, "Server configuration error")
            }
            AppError::Io(e) => {
                tracing::error!(error = %e, "io error");
                ResponseEnvelope::error(status, "Internal server error")
            }
            AppError::Query(e) => {
                tracing::error!(error = %e, "query execution failed");
                ResponseEnvelope::error(status, format!("Query execution failed: {}", e))
            }
            AppError::Validation(errors) => ResponseEnvelope::validation_error(&errors),
            AppError::RateLimited { retry_after } => {
                let mut env = ResponseEnvelope::error(status, "Too many requests");
                env.headers.insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
                env
            }
            AppError::NotFound(m)
            | AppError::Unauthorized(m)
            | AppError::BadRequest(m) => ResponseEnvelope::error(status, m),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.into_envelope().into_response()
    }
}
