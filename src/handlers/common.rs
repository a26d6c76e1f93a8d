//! Service routes (health, version, OpenAPI document) and the bare preflight responder.

use crate::error::AppError;
use crate::request::RequestEnvelope;
use crate::routing::{Handler, Reply};
use crate::response::ResponseEnvelope;
use async_trait::async_trait;
use axum::http::StatusCode;
use serde::Serialize;
use utoipa::openapi::OpenApi;

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
}

#[derive(Serialize)]
struct VersionBody {
    name: &'static str,
    version: &'static str,
}

pub struct HealthHandler;

#[async_trait]
impl Handler for HealthHandler {
    async fn call(&self, _request: &RequestEnvelope) -> Result<Reply, AppError> {
        Ok(ResponseEnvelope::json(StatusCode::OK, &HealthBody { status: "ok" }).into())
    }
}

pub struct VersionHandler;

#[async_trait]
impl Handler for VersionHandler {
    async fn call(&self, _request: &RequestEnvelope) -> Result<Reply, AppError> {
        let body = VersionBody {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
        };
        Ok(ResponseEnvelope::json(StatusCode::OK, &body).into())
    }
}

/// Serves an OpenAPI document built once at generation time.
pub struct OpenApiHandler {
    document: OpenApi,
}

impl OpenApiHandler {
    pub fn new(document: OpenApi) -> Self {
        OpenApiHandler { document }
    }
}

#[async_trait]
impl Handler for OpenApiHandler {
    async fn call(&self, _request: &RequestEnvelope) -> Result<Reply, AppError> {
        Ok(ResponseEnvelope::json(StatusCode::OK, &self.document).into())
    }
}

/// 204 for `OPTIONS` when no CORS middleware answered first.
pub struct PreflightHandler;

#[async_trait]
impl Handler for PreflightHandler {
    async fn call(&self, _request: &RequestEnvelope) -> Result<Reply, AppError> {
        Ok(ResponseEnvelope::no_content().into())
    }
}
