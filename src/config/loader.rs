//! Load ServerConfig from environment variables and the optional JSON side files.

use crate::config::types::*;
use crate::error::ConfigError;
use crate::schema::StaticSchemaProvider;
use crate::middleware::API_KEY_HEADER;
use std::path::{Path, PathBuf};
use std::str::FromStr;

impl ServerConfig {
    /// Read from the process environment. The binary loads `.env` before calling this.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let database_url = get("DATABASE_URL").ok_or(ConfigError::MissingEnv("DATABASE_URL"))?;
        let cors = match get("CORS_ALLOWED_ORIGINS") {
            Some(origins) => CorsConfig {
                allowed_origins: split_list(&origins),
                ..CorsConfig::default()
            },
            None => CorsConfig::default(),
        };
        let defaults = RateLimitConfig::default();
        let rate_limit = RateLimitConfig {
            max_requests: parse_or(&get, "RATE_LIMIT_MAX", defaults.max_requests)?,
            window_secs: parse_or(&get, "RATE_LIMIT_WINDOW_SECS", defaults.window_secs)?,
            dir: get("RATE_LIMIT_DIR").map(PathBuf::from),
        };

        Ok(ServerConfig {
            database_url,
            db_schema: get("DB_SCHEMA").unwrap_or_else(|| "public".into()),
            db_max_connections: parse_or(&get, "DB_MAX_CONNECTIONS", 5)?,
            bind_addr: parse_or(&get, "BIND_ADDR", ([0, 0, 0, 0], 3000).into())?,
            api_prefix: normalize_prefix(&get("API_PREFIX").unwrap_or_else(|| "/api".into())),
            api_key: get("API_KEY"),
            api_key_header: get("API_KEY_HEADER").unwrap_or_else(|| API_KEY_HEADER.into()),
            cors,
            rate_limit,
            validation_rules_path: get("VALIDATION_RULES_PATH").map(PathBuf::from),
            routes_path: get("ROUTES_PATH").map(PathBuf::from),
            schema_path: get("SCHEMA_PATH").map(PathBuf::from),
            max_body_bytes: parse_or(&get, "MAX_BODY_BYTES", DEFAULT_MAX_BODY_BYTES)?,
        })
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidEnv { key, value: raw }),
        None => Ok(default),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Leading slash, no trailing slash; `/` becomes empty.
fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

fn read_json<T>(path: &Path) -> Result<T, ConfigError>
where
    T: for<'de> serde::Deserialize<'de>,
{
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    serde_json::from_str(&raw).map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))
}

pub fn load_validation_rules(path: &Path) -> Result<ValidationRulesConfig, ConfigError> {
    let rules: ValidationRulesConfig = read_json(path)?;
    tracing::debug!(path = %path.display(), tables = rules.len(), "loaded validation rules");
    Ok(rules)
}

pub fn load_route_bindings(path: &Path) -> Result<Vec<RouteBinding>, ConfigError> {
    let bindings: Vec<RouteBinding> = read_json(path)?;
    tracing::debug!(path = %path.display(), routes = bindings.len(), "loaded route bindings");
    Ok(bindings)
}

/// Fixed table metadata from `SCHEMA_PATH`.
pub fn load_static_schema(path: &Path) -> Result<StaticSchemaProvider, ConfigError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    let provider = StaticSchemaProvider::from_json(&raw)?;
    tracing::debug!(path = %path.display(), "loaded static schema");
    Ok(provider)
}
