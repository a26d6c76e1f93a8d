//! Route table and dispatcher: match, global middleware, route middleware, handler.
//!
//! Routes are tried in registration order and the first match wins, so register
//! specific literal paths before placeholder paths that would also match them.

use super::route::Route;
use super::{Handler, Registry};
use crate::config::RouteBinding;
use crate::error::{AppError, ConfigError};
use crate::middleware::{Flow, Middleware};
use crate::request::RequestEnvelope;
use crate::response::ResponseEnvelope;
use axum::http::HeaderMap;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct Router {
    routes: Vec<Route>,
    global: Vec<Arc<dyn Middleware>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_route(&mut self, method: &str, path: &str, handler: Arc<dyn Handler>) -> Result<&mut Route, ConfigError> {
        self.routes.push(Route::new(method, path, handler)?);
        let idx = self.routes.len() - 1;
        Ok(&mut self.routes[idx])
    }

    pub fn get(&mut self, path: &str, handler: Arc<dyn Handler>) -> Result<&mut Route, ConfigError> {
        self.add_route("GET", path, handler)
    }

    pub fn post(&mut self, path: &str, handler: Arc<dyn Handler>) -> Result<&mut Route, ConfigError> {
        self.add_route("POST", path, handler)
    }

    pub fn put(&mut self, path: &str, handler: Arc<dyn Handler>) -> Result<&mut Route, ConfigError> {
        self.add_route("PUT", path, handler)
    }

    pub fn delete(&mut self, path: &str, handler: Arc<dyn Handler>) -> Result<&mut Route, ConfigError> {
        self.add_route("DELETE", path, handler)
    }

    pub fn add_global_middleware(&mut self, middleware: Arc<dyn Middleware>) -> &mut Self {
        self.global.push(middleware);
        self
    }

    /// Register a configured binding. Unknown handler or middleware keys fail here, not at dispatch.
    pub fn bind(&mut self, binding: &RouteBinding, registry: &Registry) -> Result<&mut Route, ConfigError> {
        let handler = registry.handler(&binding.handler)?;
        let middlewares = binding
            .middlewares
            .iter()
            .map(|key| registry.middleware(key))
            .collect::<Result<Vec<_>, _>>()?;
        let route = self.add_route(&binding.method, &binding.path, handler)?;
        for m in middlewares {
            route.add_middleware(m);
        }
        Ok(route)
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn find(&self, method: &str, path: &str) -> Option<&Route> {
        self.routes.iter().find(|r| r.matches(method, path))
    }

    pub async fn dispatch(&self, mut request: RequestEnvelope) -> ResponseEnvelope {
        let method = request.method.as_str().to_string();
        let Some(route) = self.find(&method, &request.path) else {
            tracing::debug!(method = %method, path = %request.path, "no route matched");
            return ResponseEnvelope::not_found("Route not found");
        };
        request.params = route.extract_params(&request.path);
        tracing::debug!(method = %method, path = %request.path, pattern = route.pattern.as_str(), "route matched");

        let mut headers = HeaderMap::new();
        let mut response = match self.run(route, &request, &mut headers).await {
            Ok(response) => response,
            Err(e) => e.into_envelope(),
        };
        response.merge_headers(&headers);
        response
    }

    async fn run(
        &self,
        route: &Route,
        request: &RequestEnvelope,
        headers: &mut HeaderMap,
    ) -> Result<ResponseEnvelope, AppError> {
        for middleware in self.global.iter().chain(route.middlewares.iter()) {
            if let Flow::Respond(response) = middleware.handle(request, headers).await? {
                if response.status.is_client_error() {
                    tracing::warn!(status = %response.status, path = %request.path, "request stopped by middleware");
                } else {
                    tracing::debug!(status = %response.status, path = %request.path, "request answered by middleware");
                }
                return Ok(response);
            }
        }
        Ok(route.handler.call(request).await?.into_envelope())
    }
}
