//! axum adapter: every request goes through one fallback into the dispatcher.

use crate::request::RequestEnvelope;
use crate::response::ResponseEnvelope;
use crate::routing::Router;
use crate::state::AppState;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;

pub const CLIENT_IP_HEADER: &str = "client-ip";
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Build the axum app. Serve with `into_make_service_with_connect_info::<SocketAddr>()`
/// so the socket address is available as the last client-IP fallback.
pub fn into_axum(router: Arc<Router>, max_body_bytes: usize) -> axum::Router {
    let state = AppState { router, max_body_bytes };
    axum::Router::new()
        .fallback(dispatch)
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
}

/// `Client-IP`, then the first `X-Forwarded-For` entry, then the peer address.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };
    if let Some(ip) = header(CLIENT_IP_HEADER) {
        return ip.to_string();
    }
    if let Some(first) = header(FORWARDED_FOR_HEADER).and_then(|v| v.split(',').next()) {
        let first = first.trim();
        if !first.is_empty() {
            return first.to_string();
        }
    }
    peer.map(|p| p.ip().to_string()).unwrap_or_default()
}

async fn dispatch(
    State(state): State<AppState>,
    connect: Option<ConnectInfo<SocketAddr>>,
    request: Request,
) -> Response {
    let (parts, body) = request.into_parts();
    let bytes = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(b) => b,
        Err(e) => {
            tracing::warn!(error = %e, path = %parts.uri.path(), "request body rejected");
            return ResponseEnvelope::error(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
        }
    };

    let ip = client_ip(&parts.headers, connect.map(|ConnectInfo(addr)| addr));
    let mut envelope = RequestEnvelope::new(parts.method, parts.uri.path())
        .with_query_string(parts.uri.query().unwrap_or(""))
        .with_client_ip(ip);
    envelope.headers = parts.headers;
    let envelope = envelope.with_body(bytes.to_vec());

    state.router.dispatch(envelope).await.into_response()
}
