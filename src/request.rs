//! Inbound request envelope handed to middlewares and handlers.

use crate::error::AppError;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method};
use serde_json::{Map, Value};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub enum ParsedBody {
    None,
    Json(Value),
    Form(Map<String, Value>),
}

#[derive(Debug, Clone)]
pub struct RequestEnvelope {
    pub method: Method,
    pub path: String,
    pub query: HashMap<String, String>,
    pub headers: HeaderMap,
    pub raw_body: Vec<u8>,
    pub body: ParsedBody,
    /// Named path captures. Set by the dispatcher after a route matches.
    pub params: HashMap<String, String>,
    pub client_ip: String,
}

impl RequestEnvelope {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        RequestEnvelope {
            method,
            path: path.into(),
            query: HashMap::new(),
            headers: HeaderMap::new(),
            raw_body: Vec::new(),
            body: ParsedBody::None,
            params: HashMap::new(),
            client_ip: String::new(),
        }
    }

    /// Parse `a=1&b=2` into the query map. Later duplicates win.
    pub fn with_query_string(mut self, query: &str) -> Self {
        self.query = url::form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect();
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: &str) -> Self {
        if let Ok(v) = HeaderValue::from_str(value) {
            self.headers.insert(name, v);
        }
        self
    }

    pub fn with_client_ip(mut self, ip: impl Into<String>) -> Self {
        self.client_ip = ip.into();
        self
    }

    pub fn with_json(mut self, value: Value) -> Self {
        self.raw_body = serde_json::to_vec(&value).unwrap_or_default();
        self.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        self.body = ParsedBody::Json(value);
        self
    }

    /// Store the raw body and parse it according to Content-Type. A JSON body that does
    /// not parse is kept raw with no parsed form.
    pub fn with_body(mut self, raw: Vec<u8>) -> Self {
        self.body = if raw.is_empty() {
            ParsedBody::None
        } else if self.is_json() {
            serde_json::from_slice(&raw)
                .map(ParsedBody::Json)
                .unwrap_or(ParsedBody::None)
        } else if self.is_form() {
            let map = url::form_urlencoded::parse(&raw)
                .into_owned()
                .map(|(k, v)| (k, Value::String(v)))
                .collect();
            ParsedBody::Form(map)
        } else {
            ParsedBody::None
        };
        self.raw_body = raw;
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    pub fn is_method(&self, method: &str) -> bool {
        self.method.as_str().eq_ignore_ascii_case(method)
    }

    pub fn is_json(&self) -> bool {
        self.header(header::CONTENT_TYPE.as_str())
            .map(|ct| ct.contains("application/json"))
            .unwrap_or(false)
    }

    fn is_form(&self) -> bool {
        self.header(header::CONTENT_TYPE.as_str())
            .map(|ct| ct.contains("application/x-www-form-urlencoded"))
            .unwrap_or(false)
    }

    /// Body fields as an object: the JSON object, or form fields as strings. Empty when absent.
    pub fn input(&self) -> Map<String, Value> {
        match &self.body {
            ParsedBody::Json(Value::Object(m)) => m.clone(),
            ParsedBody::Form(m) => m.clone(),
            _ => Map::new(),
        }
    }

    /// Like [`input`](Self::input) but rejects a present body that is not an object.
    pub fn object_body(&self) -> Result<Map<String, Value>, AppError> {
        match &self.body {
            ParsedBody::Json(Value::Object(m)) => Ok(m.clone()),
            ParsedBody::Form(m) => Ok(m.clone()),
            ParsedBody::None if self.raw_body.is_empty() => Ok(Map::new()),
            _ => Err(AppError::BadRequest("body must be a JSON object".into())),
        }
    }
}
