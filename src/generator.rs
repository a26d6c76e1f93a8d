//! Walks the schema provider and registers service routes, a CRUD route set per table
//! and the OpenAPI document describing them.

use crate::config::ValidationRulesConfig;
use crate::error::AppError;
use crate::docs::{self, DOCS_PATH};
use crate::handlers::{CrudHandler, CrudOperation, HealthHandler, OpenApiHandler, PreflightHandler, VersionHandler};
use crate::middleware::{Middleware, ValidationMiddleware};
use crate::routing::{Handler, Registry, Router};
use crate::schema::{SchemaProvider, TableSchema};
use crate::service::TableEndpoints;
use crate::sql::Connection;
use std::sync::Arc;

pub struct ApiGenerator {
    conn: Arc<dyn Connection>,
    provider: Arc<dyn SchemaProvider>,
    prefix: String,
    validation: ValidationRulesConfig,
}

impl ApiGenerator {
    pub fn new(conn: Arc<dyn Connection>, provider: Arc<dyn SchemaProvider>, prefix: impl Into<String>) -> Self {
        ApiGenerator {
            conn,
            provider,
            prefix: prefix.into().trim_end_matches('/').to_string(),
            validation: ValidationRulesConfig::new(),
        }
    }

    pub fn with_validation_rules(mut self, rules: ValidationRulesConfig) -> Self {
        self.validation = rules;
        self
    }

    /// `/health` and `/version`, registered as `health` and `version`.
    pub fn register_service_routes(router: &mut Router, registry: &mut Registry) -> Result<(), AppError> {
        let service = [
            ("health", "/health", Arc::new(HealthHandler) as Arc<dyn Handler>),
            ("version", "/version", Arc::new(VersionHandler) as Arc<dyn Handler>),
        ];
        for (key, path, handler) in service {
            registry.register_handler(key, handler.clone())?;
            router.get(path, handler)?;
        }
        Ok(())
    }

    /// Register service routes, every table's routes, then `GET /docs/openapi.json` (key `docs`).
    /// Returns the number of tables.
    pub async fn generate(&self, router: &mut Router, registry: &mut Registry) -> Result<usize, AppError> {
        Self::register_service_routes(router, registry)?;
        let tables = self.provider.list_tables().await?;
        let mut schemas = Vec::with_capacity(tables.len());
        for table in &tables {
            schemas.push(self.generate_table(table, router, registry).await?);
        }

        let handler: Arc<dyn Handler> = Arc::new(OpenApiHandler::new(docs::document(&schemas, &self.prefix)));
        registry.register_handler("docs", handler.clone())?;
        router.get(DOCS_PATH, handler)?;

        tracing::info!(tables = tables.len(), prefix = %self.prefix, "generated CRUD routes");
        Ok(tables.len())
    }

    async fn generate_table(
        &self,
        table: &str,
        router: &mut Router,
        registry: &mut Registry,
    ) -> Result<Arc<TableSchema>, AppError> {
        let schema = Arc::new(self.provider.describe_table(table).await?);
        let has_pk = schema.primary_key.is_some();
        let endpoints = Arc::new(TableEndpoints::new(self.conn.clone(), schema.clone()));

        let validation: Option<Arc<dyn Middleware>> = match self.validation.get(table) {
            Some(rules) => {
                let mw = ValidationMiddleware::from_pairs(rules.iter().map(|(f, s)| (f.as_str(), s.as_str())))?;
                let mw: Arc<dyn Middleware> = Arc::new(mw);
                registry.register_middleware(format!("{}.validation", table), mw.clone())?;
                Some(mw)
            }
            None => None,
        };

        let collection = format!("{}/{}", self.prefix, table);
        let item = format!("{}/{{id}}", collection);
        for op in CrudOperation::ALL {
            if op.needs_id() && !has_pk {
                continue;
            }
            let handler: Arc<dyn Handler> = Arc::new(CrudHandler::new(endpoints.clone(), op));
            registry.register_handler(format!("{}.{}", table, op), handler.clone())?;
            let path = if op.needs_id() { &item } else { &collection };
            let route = router.add_route(op.method(), path, handler)?;
            if let (Some(mw), CrudOperation::Create | CrudOperation::Update) = (&validation, op) {
                route.add_middleware(mw.clone());
            }
        }

        router.add_route("OPTIONS", &collection, Arc::new(PreflightHandler))?;
        if has_pk {
            router.add_route("OPTIONS", &item, Arc::new(PreflightHandler))?;
        } else {
            tracing::warn!(table, "no primary key; only list and create are generated");
        }
        tracing::debug!(table, "registered table routes");
        Ok(schema)
    }
}
