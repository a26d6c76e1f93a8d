//! Assemble the dispatcher from ServerConfig: generated routes, global middlewares, configured bindings.

use crate::config::{load_route_bindings, load_validation_rules, ServerConfig, ValidationRulesConfig};
use crate::error::AppError;
use crate::generator::ApiGenerator;
use crate::middleware::{
    AuthMiddleware, CorsMiddleware, CounterStore, FileCounterStore, MemoryCounterStore, Middleware,
    RateLimitMiddleware,
};
use crate::routing::{Registry, Router};
use crate::schema::SchemaProvider;
use crate::sql::Connection;
use std::sync::Arc;

/// Global middlewares, in execution order: CORS, rate limit, then auth when a key is configured.
/// Each is also entered into the registry (`cors`, `rate_limit`, `auth`) for configured routes.
pub fn global_middlewares(config: &ServerConfig, registry: &mut Registry) -> Result<Vec<Arc<dyn Middleware>>, AppError> {
    let store: Arc<dyn CounterStore> = match &config.rate_limit.dir {
        Some(dir) => Arc::new(FileCounterStore::new(dir.clone())),
        None => Arc::new(MemoryCounterStore::new()),
    };
    let mut chain: Vec<(&str, Arc<dyn Middleware>)> = vec![
        ("cors", Arc::new(CorsMiddleware::new(&config.cors)) as Arc<dyn Middleware>),
        ("rate_limit", Arc::new(RateLimitMiddleware::new(&config.rate_limit, store)) as Arc<dyn Middleware>),
    ];
    match &config.api_key {
        Some(key) => chain.push((
            "auth",
            Arc::new(AuthMiddleware::with_header(key.clone(), config.api_key_header.clone())) as Arc<dyn Middleware>,
        )),
        None => tracing::warn!("API_KEY not set; requests are not authenticated"),
    }
    let mut out = Vec::with_capacity(chain.len());
    for (key, mw) in chain {
        registry.register_middleware(key, mw.clone())?;
        out.push(mw);
    }
    Ok(out)
}

/// Build the full route table. Configured bindings are appended after generated routes,
/// so a binding on a path a generated route already serves is never reached.
pub async fn build_router(
    config: &ServerConfig,
    conn: Arc<dyn Connection>,
    provider: Arc<dyn SchemaProvider>,
) -> Result<(Router, Registry), AppError> {
    let rules = match &config.validation_rules_path {
        Some(path) => load_validation_rules(path)?,
        None => ValidationRulesConfig::new(),
    };

    let mut router = Router::new();
    let mut registry = Registry::new();
    for mw in global_middlewares(config, &mut registry)? {
        router.add_global_middleware(mw);
    }

    ApiGenerator::new(conn, provider, config.api_prefix.clone())
        .with_validation_rules(rules)
        .generate(&mut router, &mut registry)
        .await?;

    if let Some(path) = &config.routes_path {
        for binding in load_route_bindings(path)? {
            router.bind(&binding, &registry)?;
            tracing::info!(method = %binding.method, path = %binding.path, handler = %binding.handler, "bound configured route");
        }
    }
    Ok((router, registry))
}
