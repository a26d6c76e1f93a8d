//! CORS headers on every matched request; preflight answered with 204.

use super::{Flow, Middleware};
use crate::config::CorsConfig;
use crate::error::AppError;
use crate::request::RequestEnvelope;
use crate::response::ResponseEnvelope;
use async_trait::async_trait;
use axum::http::{header, HeaderMap, HeaderValue, Method};

pub struct CorsMiddleware {
    allowed_origins: Vec<String>,
    allow_methods: HeaderValue,
    allow_headers: HeaderValue,
    max_age: HeaderValue,
}

impl CorsMiddleware {
    pub fn new(config: &CorsConfig) -> Self {
        let join = |items: &[String]| {
            HeaderValue::from_str(&items.join(", ")).unwrap_or_else(|_| HeaderValue::from_static(""))
        };
        CorsMiddleware {
            allowed_origins: config.allowed_origins.clone(),
            allow_methods: join(&config.allowed_methods),
            allow_headers: join(&config.allowed_headers),
            max_age: HeaderValue::from(config.max_age_secs),
        }
    }

    fn origin_allowed(&self, origin: &str) -> bool {
        self.allowed_origins.iter().any(|o| o == "*" || o == origin)
    }
}

impl Default for CorsMiddleware {
    fn default() -> Self {
        Self::new(&CorsConfig::default())
    }
}

#[async_trait]
impl Middleware for CorsMiddleware {
    async fn handle(&self, request: &RequestEnvelope, response_headers: &mut HeaderMap) -> Result<Flow, AppError> {
        if let Some(origin) = request.header(header::ORIGIN.as_str()) {
            if self.origin_allowed(origin) {
                if let Ok(v) = HeaderValue::from_str(origin) {
                    response_headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, v);
                    response_headers.insert(header::VARY, HeaderValue::from_static("Origin"));
                }
            }
        }
        response_headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, self.allow_methods.clone());
        response_headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, self.allow_headers.clone());
        response_headers.insert(header::ACCESS_CONTROL_MAX_AGE, self.max_age.clone());

        if request.method == Method::OPTIONS {
            return Ok(Flow::Respond(ResponseEnvelope::no_content()));
        }
        Ok(Flow::Continue)
    }
}
