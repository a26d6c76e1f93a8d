//! Route handlers and what they may return.

use crate::error::AppError;
use crate::request::RequestEnvelope;
use crate::response::ResponseEnvelope;
use async_trait::async_trait;
use serde_json::Value;

/// Handler result: a finished response, or a payload the dispatcher wraps in a 200 success envelope.
#[derive(Debug, Clone)]
pub enum Reply {
    Response(ResponseEnvelope),
    Payload(Value),
}

impl From<ResponseEnvelope> for Reply {
    fn from(r: ResponseEnvelope) -> Self {
        Reply::Response(r)
    }
}

impl From<Value> for Reply {
    fn from(v: Value) -> Self {
        Reply::Payload(v)
    }
}

impl Reply {
    pub fn into_envelope(self) -> ResponseEnvelope {
        match self {
            Reply::Response(r) => r,
            Reply::Payload(v) => ResponseEnvelope::success(v),
        }
    }
}

#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, request: &RequestEnvelope) -> Result<Reply, AppError>;
}

/// Adapter for synchronous closures.
pub struct FnHandler<F> {
    f: F,
}

impl<F> FnHandler<F>
where
    F: Fn(&RequestEnvelope) -> Result<Reply, AppError> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        FnHandler { f }
    }
}

#[async_trait]
impl<F> Handler for FnHandler<F>
where
    F: Fn(&RequestEnvelope) -> Result<Reply, AppError> + Send + Sync,
{
    async fn call(&self, request: &RequestEnvelope) -> Result<Reply, AppError> {
        (self.f)(request)
    }
}
