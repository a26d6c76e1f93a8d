//! API key check against a request header.

use super::{Flow, Middleware};
use crate::error::AppError;
use crate::request::RequestEnvelope;
use crate::response::ResponseEnvelope;
use async_trait::async_trait;
use axum::http::HeaderMap;

/// Default header carrying the key.
pub const API_KEY_HEADER: &str = "X-API-Key";

pub struct AuthMiddleware {
    api_key: String,
    header: String,
}

impl AuthMiddleware {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_header(api_key, API_KEY_HEADER)
    }

    pub fn with_header(api_key: impl Into<String>, header: impl Into<String>) -> Self {
        AuthMiddleware {
            api_key: api_key.into(),
            header: header.into(),
        }
    }
}

#[async_trait]
impl Middleware for AuthMiddleware {
    async fn handle(&self, request: &RequestEnvelope, _response_headers: &mut HeaderMap) -> Result<Flow, AppError> {
        match request.header(&self.header) {
            Some(key) if !key.is_empty() && key == self.api_key => Ok(Flow::Continue),
            _ => Ok(Flow::Respond(ResponseEnvelope::unauthorized("Invalid API key"))),
        }
    }
}
