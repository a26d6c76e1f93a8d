//! Request interceptors. Each either passes the request on or answers it.

mod auth;
mod cors;
mod rate_limit;
mod validation;

pub use auth::{AuthMiddleware, API_KEY_HEADER};
pub use cors::CorsMiddleware;
pub use rate_limit::{CounterStore, FileCounterStore, MemoryCounterStore, RateLimitMiddleware};
pub use validation::{FieldRules, Rule, ValidationMiddleware};

use crate::error::AppError;
use crate::request::RequestEnvelope;
use crate::response::ResponseEnvelope;
use async_trait::async_trait;
use axum::http::HeaderMap;

/// Outcome of one middleware step.
#[derive(Debug)]
pub enum Flow {
    Continue,
    /// Stop the chain and send this response.
    Respond(ResponseEnvelope),
}

#[async_trait]
pub trait Middleware: Send + Sync {
    /// `response_headers` are merged into whatever response is finally sent.
    async fn handle(&self, request: &RequestEnvelope, response_headers: &mut HeaderMap) -> Result<Flow, AppError>;
}

/// Adapter for synchronous closures returning an optional response.
pub struct FnMiddleware<F> {
    f: F,
}

impl<F> FnMiddleware<F>
where
    F: Fn(&RequestEnvelope) -> Option<ResponseEnvelope> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        FnMiddleware { f }
    }
}

#[async_trait]
impl<F> Middleware for FnMiddleware<F>
where
    F: Fn(&RequestEnvelope) -> Option<ResponseEnvelope> + Send + Sync,
{
    async fn handle(&self, request: &RequestEnvelope, _response_headers: &mut HeaderMap) -> Result<Flow, AppError> {
        Ok(match (self.f)(request) {
            Some(response) => Flow::Respond(response),
            None => Flow::Continue,
        })
    }
}
