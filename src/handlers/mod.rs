//! Handlers bound into the route table.

pub mod common;
pub mod crud;
pub use common::{HealthHandler, OpenApiHandler, PreflightHandler, VersionHandler};
pub use crud::{CrudHandler, CrudOperation};
