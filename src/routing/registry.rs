//! String-keyed handlers and middlewares, resolved when routes are registered.

use super::Handler;
use crate::error::ConfigError;
use crate::middleware::Middleware;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct Registry {
    handlers: HashMap<String, Arc<dyn Handler>>,
    middlewares: HashMap<String, Arc<dyn Middleware>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_handler(&mut self, key: impl Into<String>, handler: Arc<dyn Handler>) -> Result<(), ConfigError> {
        let key = key.into();
        if self.handlers.contains_key(&key) {
            return Err(ConfigError::DuplicateKey(key));
        }
        self.handlers.insert(key, handler);
        Ok(())
    }

    pub fn register_middleware(
        &mut self,
        key: impl Into<String>,
        middleware: Arc<dyn Middleware>,
    ) -> Result<(), ConfigError> {
        let key = key.into();
        if self.middlewares.contains_key(&key) {
            return Err(ConfigError::DuplicateKey(key));
        }
        self.middlewares.insert(key, middleware);
        Ok(())
    }

    pub fn handler(&self, key: &str) -> Result<Arc<dyn Handler>, ConfigError> {
        self.handlers
            .get(key)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownHandler(key.to_string()))
    }

    pub fn middleware(&self, key: &str) -> Result<Arc<dyn Middleware>, ConfigError> {
        self.middlewares
            .get(key)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownMiddleware(key.to_string()))
    }

    pub fn handler_keys(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }
}
