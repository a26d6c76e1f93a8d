//! Shared state for the axum adapter.

use crate::routing::Router;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub router: Arc<Router>,
    /// Upper bound when buffering a request body.
    pub max_body_bytes: usize,
}
