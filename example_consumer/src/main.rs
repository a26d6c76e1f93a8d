//! Example consumer: serves the generated CRUD API for every table in DB_SCHEMA.
//!
//! Run from repo root: `cargo run -p example-consumer`
//! Settings come from the environment or a `.env` file (see `ServerConfig`).

use crudgen::config::load_static_schema;
use crudgen::{build_router, into_axum, Connection, PgSchemaProvider, SchemaProvider, ServerConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("crudgen=info,example_consumer=info")),
        )
        .init();

    let config = ServerConfig::from_env()?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await?;

    let provider: Arc<dyn SchemaProvider> = match &config.schema_path {
        Some(path) => Arc::new(load_static_schema(path)?),
        None => Arc::new(PgSchemaProvider::new(pool.clone(), config.db_schema.clone())),
    };
    let conn: Arc<dyn Connection> = Arc::new(pool);
    let (router, _registry) = build_router(&config, conn, provider).await?;
    tracing::info!(routes = router.routes().len(), "route table ready");

    let app = into_axum(Arc::new(router), config.max_body_bytes);
    let listener = TcpListener::bind(config.bind_addr).await?;
    tracing::info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}
