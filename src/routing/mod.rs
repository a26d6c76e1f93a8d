//! Route table, matcher, registry and dispatcher.

mod handler;
mod registry;
mod route;
mod router;

pub use handler::{FnHandler, Handler, Reply};
pub use registry::Registry;
pub use route::{PathPattern, Route};
pub use router::Router;
