//! Runtime configuration types: server settings, middleware settings and route bindings.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;

pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CorsConfig {
    #[serde(default = "default_origins")]
    pub allowed_origins: Vec<String>,
    #[serde(default = "default_methods")]
    pub allowed_methods: Vec<String>,
    #[serde(default = "default_headers")]
    pub allowed_headers: Vec<String>,
    #[serde(default = "default_max_age")]
    pub max_age_secs: u64,
}

fn default_origins() -> Vec<String> {
    vec!["*".into()]
}

fn default_methods() -> Vec<String> {
    ["GET", "POST", "PUT", "DELETE", "OPTIONS"].iter().map(|s| s.to_string()).collect()
}

fn default_headers() -> Vec<String> {
    vec!["Content-Type".into(), "X-API-Key".into()]
}

fn default_max_age() -> u64 {
    86400
}

impl Default for CorsConfig {
    fn default() -> Self {
        CorsConfig {
            allowed_origins: default_origins(),
            allowed_methods: default_methods(),
            allowed_headers: default_headers(),
            max_age_secs: default_max_age(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub max_requests: usize,
    pub window_secs: u64,
    /// File-backed counters live here when set; in-memory counters otherwise.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        RateLimitConfig {
            max_requests: 60,
            window_secs: 60,
            dir: None,
        }
    }
}

/// A configured route: handler and middlewares are Registry keys.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RouteBinding {
    pub method: String,
    pub path: String,
    pub handler: String,
    #[serde(default)]
    pub middlewares: Vec<String>,
}

/// `{table: {field: "required|email"}}`
pub type ValidationRulesConfig = BTreeMap<String, BTreeMap<String, String>>;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub database_url: String,
    pub db_schema: String,
    pub db_max_connections: u32,
    pub bind_addr: SocketAddr,
    pub api_prefix: String,
    pub api_key: Option<String>,
    pub api_key_header: String,
    pub cors: CorsConfig,
    pub rate_limit: RateLimitConfig,
    pub validation_rules_path: Option<PathBuf>,
    pub routes_path: Option<PathBuf>,
    /// JSON table list served instead of introspecting `db_schema`.
    pub schema_path: Option<PathBuf>,
    pub max_body_bytes: usize,
}
