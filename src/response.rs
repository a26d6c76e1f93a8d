//! Standard response envelope: `{"status": "success"|"error", "message"?, "data"?}`.

use crate::error::FieldErrors;
use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::Value;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

/// JSON body shape shared by every generated endpoint.
#[derive(Serialize, Debug, Clone)]
pub struct Envelope {
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Empty,
    Json(Value),
}

#[derive(Debug, Clone)]
pub struct ResponseEnvelope {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: ResponseBody,
}

impl ResponseEnvelope {
    pub fn new(status: StatusCode, body: ResponseBody) -> Self {
        ResponseEnvelope {
            status,
            headers: HeaderMap::new(),
            body,
        }
    }

    pub fn json<T: Serialize>(status: StatusCode, body: &T) -> Self {
        let value = serde_json::to_value(body).unwrap_or(Value::Null);
        Self::new(status, ResponseBody::Json(value))
    }

    fn envelope(status: StatusCode, env: Envelope) -> Self {
        Self::json(status, &env)
    }

    /// 200 with `data` and no message.
    pub fn success(data: Value) -> Self {
        Self::envelope(
            StatusCode::OK,
            Envelope {
                status: Status::Success,
                message: None,
                data: Some(data),
            },
        )
    }

    /// 200 with a message and optional data.
    pub fn success_message(message: impl Into<String>, data: Option<Value>) -> Self {
        Self::envelope(
            StatusCode::OK,
            Envelope {
                status: Status::Success,
                message: Some(message.into()),
                data,
            },
        )
    }

    pub fn error(status: StatusCode, message: impl Into<String>) -> Self {
        Self::envelope(
            status,
            Envelope {
                status: Status::Error,
                message: Some(message.into()),
                data: None,
            },
        )
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::error(StatusCode::NOT_FOUND, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::error(StatusCode::UNAUTHORIZED, message)
    }

    pub fn validation_error(errors: &FieldErrors) -> Self {
        Self::envelope(
            StatusCode::UNPROCESSABLE_ENTITY,
            Envelope {
                status: Status::Error,
                message: Some("Validation Error".into()),
                data: serde_json::to_value(errors).ok(),
            },
        )
    }

    pub fn no_content() -> Self {
        Self::new(StatusCode::NO_CONTENT, ResponseBody::Empty)
    }

    pub fn with_header(mut self, name: header::HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn json_body(&self) -> Option<&Value> {
        match &self.body {
            ResponseBody::Json(v) => Some(v),
            _ => None,
        }
    }

    /// Adds headers the response does not already set.
    pub fn merge_headers(&mut self, extra: &HeaderMap) {
        for (name, value) in extra {
            if !self.headers.contains_key(name) {
                self.headers.insert(name.clone(), value.clone());
            }
        }
    }
}

impl IntoResponse for ResponseEnvelope {
    fn into_response(self) -> Response {
        let (content_type, body) = match self.body {
            ResponseBody::Empty => (None, Body::empty()),
            ResponseBody::Json(v) => (
                Some("application/json"),
                Body::from(serde_json::to_vec(&v).unwrap_or_default()),
            ),
        };
        let mut response = Response::new(body);
        *response.status_mut() = self.status;
        if let Some(ct) = content_type {
            response
                .headers_mut()
                .insert(header::CONTENT_TYPE, HeaderValue::from_static(ct));
        }
        response.headers_mut().extend(self.headers);
        response
    }
}
