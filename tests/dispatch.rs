//! End-to-end dispatch through the axum adapter with an in-memory connection.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use crudgen::config::{CorsConfig, RateLimitConfig, RouteBinding};
use crudgen::middleware::{
    AuthMiddleware, CorsMiddleware, FnMiddleware, MemoryCounterStore, Middleware, RateLimitMiddleware,
};
use crudgen::response::ResponseEnvelope;
use crudgen::routing::FnHandler;
use crudgen::schema::{ColumnMeta, SqlType};
use crudgen::sql::{QueryBuf, Row};
use crudgen::{
    into_axum, ApiGenerator, ConfigError, Connection, QueryExecutionError, Registry, Reply, RequestEnvelope,
    Router, StaticSchemaProvider, TableSchema,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

/// Canned results, every statement recorded.
#[derive(Default)]
struct Recording {
    rows: Vec<Row>,
    affected: u64,
    seen: Mutex<Vec<QueryBuf>>,
}

#[async_trait]
impl Connection for Recording {
    async fn fetch_all(&self, q: &QueryBuf) -> Result<Vec<Row>, QueryExecutionError> {
        self.seen.lock().unwrap().push(q.clone());
        Ok(self.rows.clone())
    }

    async fn execute(&self, q: &QueryBuf) -> Result<u64, QueryExecutionError> {
        self.seen.lock().unwrap().push(q.clone());
        Ok(self.affected)
    }
}

fn users() -> TableSchema {
    TableSchema::new("users")
        .with_primary_key("id")
        .column(
            ColumnMeta::new("id", SqlType::Int)
                .not_null()
                .with_default("nextval('users_id_seq')")
                .with_native_type("int4"),
        )
        .column(ColumnMeta::new("name", SqlType::Varchar).not_null().with_native_type("varchar"))
        .column(ColumnMeta::new("email", SqlType::Varchar).with_native_type("varchar"))
}

async fn generated(conn: Arc<Recording>) -> (Router, Registry) {
    let provider = Arc::new(StaticSchemaProvider::new(vec![users()]));
    let mut router = Router::new();
    let mut registry = Registry::new();
    ApiGenerator::new(conn, provider, "/api")
        .generate(&mut router, &mut registry)
        .await
        .unwrap();
    (router, registry)
}

async fn send(router: Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Value) {
    let app = into_axum(Arc::new(router), 1024 * 1024);
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, headers, body)
}

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn empty_request(method: Method, uri: &str) -> Request<Body> {
    Request::builder().method(method).uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn get_missing_record_is_404() {
    let (router, _) = generated(Arc::new(Recording::default())).await;
    let (status, _, body) = send(router, empty_request(Method::GET, "/api/users/42")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"status": "error", "message": "Record not found"}));
}

#[tokio::test]
async fn get_existing_record_wraps_row() {
    let conn = Arc::new(Recording {
        rows: vec![json!({"id": 42, "name": "Ada", "email": null}).as_object().cloned().unwrap()],
        ..Recording::default()
    });
    let (router, _) = generated(conn.clone()).await;
    let (status, _, body) = send(router, empty_request(Method::GET, "/api/users/42")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "success", "data": {"id": 42, "name": "Ada", "email": null}}));
    let seen = conn.seen.lock().unwrap();
    assert_eq!(
        seen[0].sql,
        "SELECT \"id\", \"name\", \"email\" FROM \"users\" WHERE \"id\" = $1::int4 LIMIT 1"
    );
}

#[tokio::test]
async fn put_with_blank_required_field_is_422() {
    let conn = Arc::new(Recording::default());
    let (router, _) = generated(conn.clone()).await;
    let (status, _, body) = send(router, json_request(Method::PUT, "/api/users/42", json!({"name": ""}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["message"], "Validation Error");
    assert!(body["data"].get("name").is_some());
    assert!(conn.seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn post_creates_and_returns_id() {
    let conn = Arc::new(Recording {
        rows: vec![json!({"id": 5}).as_object().cloned().unwrap()],
        ..Recording::default()
    });
    let (router, _) = generated(conn.clone()).await;
    let (status, _, body) = send(
        router,
        json_request(Method::POST, "/api/users", json!({"name": "Ada", "email": "ada@example.com"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"status": "success", "message": "Record created successfully", "data": {"id": 5}})
    );
    let seen = conn.seen.lock().unwrap();
    assert_eq!(
        seen[0].sql,
        "INSERT INTO \"users\" (\"name\", \"email\") VALUES ($1::varchar, $2::varchar) RETURNING \"id\""
    );
}

#[tokio::test]
async fn form_body_is_accepted() {
    let conn = Arc::new(Recording {
        rows: vec![json!({"id": 6}).as_object().cloned().unwrap()],
        ..Recording::default()
    });
    let (router, _) = generated(conn.clone()).await;
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/users")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("name=Grace&email=grace%40example.com"))
        .unwrap();
    let (status, _, body) = send(router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], 6);
    assert_eq!(conn.seen.lock().unwrap()[0].params, vec![json!("Grace"), json!("grace@example.com")]);
}

#[tokio::test]
async fn list_applies_query_filters() {
    let conn = Arc::new(Recording::default());
    let (router, _) = generated(conn.clone()).await;
    let (status, _, body) = send(router, empty_request(Method::GET, "/api/users?name=Ada&limit=2")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "success", "data": []}));
    let seen = conn.seen.lock().unwrap();
    assert!(seen[0].sql.ends_with("WHERE \"name\" = $1::varchar LIMIT 2"));
    assert_eq!(seen[0].params, vec![json!("Ada")]);
}

#[tokio::test]
async fn malformed_integer_filter_is_400() {
    let conn = Arc::new(Recording::default());
    let (router, _) = generated(conn.clone()).await;
    let (status, _, body) = send(router, empty_request(Method::GET, "/api/users?id=abc")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"status": "error", "message": "Invalid value for 'id'"}));
    assert!(conn.seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn put_echoing_its_own_id_updates() {
    let conn = Arc::new(Recording {
        affected: 1,
        ..Recording::default()
    });
    let (router, _) = generated(conn.clone()).await;
    let record = json!({"id": 42, "name": "Ada", "email": "ada@example.com"});
    let (status, _, body) = send(router, json_request(Method::PUT, "/api/users/42", record)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Record updated successfully");
    let seen = conn.seen.lock().unwrap();
    assert_eq!(
        seen[0].sql,
        "UPDATE \"users\" SET \"name\" = $1::varchar, \"email\" = $2::varchar WHERE \"id\" = $3::int4"
    );
}

#[tokio::test]
async fn openapi_document_is_served() {
    let (router, registry) = generated(Arc::new(Recording::default())).await;
    assert!(registry.handler("docs").is_ok());
    let (status, _, body) = send(router, empty_request(Method::GET, "/docs/openapi.json")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["openapi"].as_str().unwrap().starts_with("3."));
    assert_eq!(body["paths"]["/api/users/{id}"]["put"]["operationId"], "users_update");
}

#[tokio::test]
async fn unknown_route_is_404() {
    let (router, _) = generated(Arc::new(Recording::default())).await;
    let (status, _, body) = send(router, empty_request(Method::GET, "/api/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"status": "error", "message": "Route not found"}));
}

#[tokio::test]
async fn health_route_is_registered() {
    let (router, _) = generated(Arc::new(Recording::default())).await;
    let (status, _, body) = send(router, empty_request(Method::GET, "/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));
}

/// Records its name, then optionally answers with `answer`.
fn recording(log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str, answer: Option<StatusCode>) -> Arc<dyn Middleware> {
    let log = log.clone();
    Arc::new(FnMiddleware::new(move |_req: &RequestEnvelope| {
        log.lock().unwrap().push(name);
        answer.map(|s| ResponseEnvelope::error(s, "stopped"))
    }))
}

#[tokio::test]
async fn middlewares_run_global_then_route_then_handler() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let handler_log = log.clone();
    let mut router = Router::new();
    router.add_global_middleware(recording(&log, "global", None));
    router
        .get(
            "/things/{id}",
            Arc::new(FnHandler::new(move |req: &RequestEnvelope| {
                handler_log.lock().unwrap().push("handler");
                Ok(Reply::Payload(json!({"id": req.param("id")})))
            })),
        )
        .unwrap()
        .add_middleware(recording(&log, "route", None));

    let response = router.dispatch(RequestEnvelope::new(Method::GET, "/things/7")).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json_body().cloned().unwrap(), json!({"status": "success", "data": {"id": "7"}}));
    assert_eq!(*log.lock().unwrap(), vec!["global", "route", "handler"]);
}

#[tokio::test]
async fn short_circuit_skips_the_rest() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let handler_log = log.clone();
    let mut router = Router::new();
    router.add_global_middleware(recording(&log, "global", Some(StatusCode::FORBIDDEN)));
    router
        .get(
            "/things",
            Arc::new(FnHandler::new(move |_req: &RequestEnvelope| {
                handler_log.lock().unwrap().push("handler");
                Ok(Reply::Payload(Value::Null))
            })),
        )
        .unwrap()
        .add_middleware(recording(&log, "route", None));

    let response = router.dispatch(RequestEnvelope::new(Method::GET, "/things")).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(*log.lock().unwrap(), vec!["global"]);
}

#[tokio::test]
async fn cors_preflight_and_headers_on_short_circuits() {
    let (mut router, _) = generated(Arc::new(Recording::default())).await;
    router.add_global_middleware(Arc::new(CorsMiddleware::new(&CorsConfig::default())));
    router.add_global_middleware(Arc::new(AuthMiddleware::new("test-key")));

    let preflight = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/users")
        .header(header::ORIGIN, "http://localhost:8080")
        .body(Body::empty())
        .unwrap();
    let (status, headers, body) = send(router.clone(), preflight).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "http://localhost:8080");
    assert_eq!(headers[header::ACCESS_CONTROL_MAX_AGE], "86400");

    let (status, headers, body) = send(router, empty_request(Method::GET, "/api/users")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid API key");
    assert!(headers.get(header::ACCESS_CONTROL_ALLOW_METHODS).is_some());
}

#[tokio::test]
async fn rate_limit_keys_on_forwarded_ip() {
    let (mut router, _) = generated(Arc::new(Recording::default())).await;
    let config = RateLimitConfig {
        max_requests: 1,
        window_secs: 60,
        dir: None,
    };
    router.add_global_middleware(Arc::new(
        RateLimitMiddleware::new(&config, Arc::new(MemoryCounterStore::new())).with_clock(Arc::new(|| 1_700_000_000i64)),
    ));

    let from = |ip: &str| {
        Request::builder()
            .uri("/health")
            .header("x-forwarded-for", format!("{}, 10.0.0.1", ip))
            .body(Body::empty())
            .unwrap()
    };
    let (status, _, _) = send(router.clone(), from("203.0.113.1")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, headers, body) = send(router.clone(), from("203.0.113.1")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(headers[header::RETRY_AFTER], "60");
    assert_eq!(body["message"], "Too many requests");
    let (status, _, _) = send(router, from("203.0.113.2")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn configured_bindings_resolve_through_registry() {
    let (mut router, registry) = generated(Arc::new(Recording::default())).await;
    let alias = RouteBinding {
        method: "GET".into(),
        path: "/api/people".into(),
        handler: "users.list".into(),
        middlewares: vec![],
    };
    router.bind(&alias, &registry).unwrap();
    let (status, _, body) = send(router.clone(), empty_request(Method::GET, "/api/people")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!([]));

    let unknown = RouteBinding {
        handler: "users.archive".into(),
        ..alias.clone()
    };
    assert!(matches!(router.bind(&unknown, &registry), Err(ConfigError::UnknownHandler(_))));
    let bad_mw = RouteBinding {
        middlewares: vec!["throttle".into()],
        ..alias
    };
    assert!(matches!(router.bind(&bad_mw, &registry), Err(ConfigError::UnknownMiddleware(_))));
}
