//! crudgen: schema-driven REST CRUD generator with a middleware dispatcher over PostgreSQL.

pub mod app;
pub mod config;
pub mod docs;
pub mod error;
pub mod generator;
pub mod handlers;
pub mod middleware;
pub mod request;
pub mod response;
pub mod routing;
pub mod schema;
pub mod service;
pub mod sql;
pub mod state;
pub mod transport;

pub use app::build_router;
pub use config::{RouteBinding, ServerConfig};
pub use error::{AppError, ConfigError, QueryExecutionError};
pub use generator::ApiGenerator;
pub use request::RequestEnvelope;
pub use response::ResponseEnvelope;
pub use routing::{Handler, Registry, Reply, Router};
pub use schema::{PgSchemaProvider, SchemaProvider, StaticSchemaProvider, TableSchema};
pub use sql::{Connection, QueryBuilder};
pub use state::AppState;
pub use transport::into_axum;
