//! Route patterns (`/api/users/{id}`) compiled once at registration.

use super::Handler;
use crate::error::ConfigError;
use crate::middleware::Middleware;
use axum::http::Method;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock};

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{([A-Za-z0-9_]+)\}").expect("static placeholder regex"))
}

/// Literal segments plus `{name}` placeholders, each matching one `[^/]+` segment.
#[derive(Clone, Debug)]
pub struct PathPattern {
    source: String,
    regex: Regex,
    names: Vec<String>,
}

impl PathPattern {
    pub fn compile(pattern: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidPattern {
            pattern: pattern.to_string(),
            reason,
        };
        let mut names = Vec::new();
        let mut seen = HashSet::new();
        let mut re = String::from("^");
        let mut last = 0;
        for caps in placeholder_re().captures_iter(pattern) {
            let whole = caps.get(0).ok_or_else(|| invalid("empty capture".into()))?;
            let name = &caps[1];
            if !seen.insert(name.to_string()) {
                return Err(invalid(format!("duplicate placeholder '{}'", name)));
            }
            re.push_str(&regex::escape(&pattern[last..whole.start()]));
            re.push_str(&format!("(?P<{}>[^/]+)", name));
            names.push(name.to_string());
            last = whole.end();
        }
        re.push_str(&regex::escape(&pattern[last..]));
        re.push('$');
        let regex = Regex::new(&re).map_err(|e| invalid(e.to_string()))?;
        Ok(PathPattern {
            source: pattern.to_string(),
            regex,
            names,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// Named captures, or `None` when the path does not match.
    pub fn extract(&self, path: &str) -> Option<HashMap<String, String>> {
        let caps = self.regex.captures(path)?;
        Some(
            self.names
                .iter()
                .filter_map(|n| caps.name(n).map(|m| (n.clone(), m.as_str().to_string())))
                .collect(),
        )
    }
}

#[derive(Clone)]
pub struct Route {
    pub method: Method,
    pub pattern: PathPattern,
    pub handler: Arc<dyn Handler>,
    pub middlewares: Vec<Arc<dyn Middleware>>,
}

impl Route {
    pub fn new(method: &str, path: &str, handler: Arc<dyn Handler>) -> Result<Self, ConfigError> {
        Ok(Route {
            method: parse_method(method)?,
            pattern: PathPattern::compile(path)?,
            handler,
            middlewares: Vec::new(),
        })
    }

    pub fn add_middleware(&mut self, middleware: Arc<dyn Middleware>) -> &mut Self {
        self.middlewares.push(middleware);
        self
    }

    /// Case-insensitive method comparison plus an anchored path match.
    pub fn matches(&self, method: &str, path: &str) -> bool {
        self.method.as_str().eq_ignore_ascii_case(method) && self.pattern.is_match(path)
    }

    pub fn extract_params(&self, path: &str) -> HashMap<String, String> {
        self.pattern.extract(path).unwrap_or_default()
    }
}

pub(crate) fn parse_method(method: &str) -> Result<Method, ConfigError> {
    Method::from_bytes(method.trim().to_ascii_uppercase().as_bytes())
        .map_err(|_| ConfigError::InvalidMethod(method.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::{FnHandler, Reply};
    use serde_json::json;

    fn noop() -> Arc<dyn Handler> {
        Arc::new(FnHandler::new(|_| Ok(Reply::Payload(json!(null)))))
    }

    #[test]
    fn matches_method_case_insensitively() {
        let route = Route::new("get", "/api/test/{id}", noop()).unwrap();
        assert!(route.matches("GET", "/api/test/1"));
        assert!(route.matches("get", "/api/test/1"));
        assert!(!route.matches("POST", "/api/test/1"));
    }

    #[test]
    fn anchored_full_path_match() {
        let route = Route::new("GET", "/api/test/{id}", noop()).unwrap();
        assert!(!route.matches("GET", "/api/test/1/extra"));
        assert!(!route.matches("GET", "/prefix/api/test/1"));
        assert!(!route.matches("GET", "/api/test/"));
        assert!(!route.matches("GET", "/api/test/1/"));
    }

    #[test]
    fn extract_round_trips_substituted_values() {
        let pattern = "/api/{table}/{id}/items/{item_id}";
        let route = Route::new("GET", pattern, noop()).unwrap();
        let values = [("table", "users"), ("id", "42"), ("item_id", "a-b_c.d")];
        let mut path = pattern.to_string();
        for (name, value) in values {
            path = path.replace(&format!("{{{}}}", name), value);
        }
        let params = route.extract_params(&path);
        assert_eq!(params.len(), values.len());
        for (name, value) in values {
            assert_eq!(params[name], value);
        }
    }

    #[test]
    fn literal_segments_are_escaped() {
        let route = Route::new("GET", "/api/v1.0/{id}", noop()).unwrap();
        assert!(route.matches("GET", "/api/v1.0/3"));
        assert!(!route.matches("GET", "/api/v1x0/3"));
    }

    #[test]
    fn duplicate_placeholder_is_rejected() {
        let err = PathPattern::compile("/a/{id}/b/{id}").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern { .. }));
    }
}
