//! Sliding-window rate limit per client IP, backed by a pluggable counter store.

use super::{Flow, Middleware};
use crate::config::RateLimitConfig;
use crate::error::AppError;
use crate::request::RequestEnvelope;
use async_trait::async_trait;
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Persisted per-key state: `{"requests": [unix-timestamps...]}`.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RateLimitRecord {
    #[serde(default)]
    pub requests: Vec<i64>,
}

impl RateLimitRecord {
    /// Drop timestamps at or before `window_start`, record `now`, return the window count.
    fn record(&mut self, now: i64, window_start: i64) -> usize {
        self.requests.retain(|&ts| ts > window_start);
        self.requests.push(now);
        self.requests.len()
    }
}

/// Counter store contract. The read/prune/append/write for one key is a single critical section.
#[async_trait]
pub trait CounterStore: Send + Sync {
    async fn increment_and_count(&self, key: &str, now: i64, window_start: i64) -> Result<usize, AppError>;
}

#[derive(Default)]
struct MemoryState {
    entries: HashMap<String, RateLimitRecord>,
    next_sweep: i64,
}

/// In-process counters. Keys whose window has fully expired are swept at most once per window.
#[derive(Default)]
pub struct MemoryCounterStore {
    state: Mutex<MemoryState>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn increment_and_count(&self, key: &str, now: i64, window_start: i64) -> Result<usize, AppError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if now >= state.next_sweep {
            state
                .entries
                .retain(|_, record| record.requests.iter().any(|&ts| ts > window_start));
            state.next_sweep = now + (now - window_start).max(1);
        }
        Ok(state.entries.entry(key.to_string()).or_default().record(now, window_start))
    }
}

/// One JSON file per key under `dir`. Writes go through a temp file and rename.
pub struct FileCounterStore {
    dir: PathBuf,
    lock: tokio::sync::Mutex<()>,
}

impl FileCounterStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileCounterStore {
            dir: dir.into(),
            lock: tokio::sync::Mutex::new(()),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("rate_limit_{}.json", key))
    }

    /// A missing or corrupt file starts a fresh window. Other read failures propagate.
    async fn read(&self, path: &Path) -> Result<RateLimitRecord, AppError> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "corrupt rate limit state; starting fresh");
                RateLimitRecord::default()
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(RateLimitRecord::default()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl CounterStore for FileCounterStore {
    async fn increment_and_count(&self, key: &str, now: i64, window_start: i64) -> Result<usize, AppError> {
        let _guard = self.lock.lock().await;
        let path = self.path_for(key);
        let mut record = self.read(&path).await?;
        let count = record.record(now, window_start);
        let bytes = serde_json::to_vec(&record).map_err(|e| AppError::Io(e.into()))?;
        tokio::fs::create_dir_all(&self.dir).await?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(count)
    }
}

pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

pub struct RateLimitMiddleware {
    max_requests: usize,
    window_secs: i64,
    store: Arc<dyn CounterStore>,
    clock: Clock,
}

impl RateLimitMiddleware {
    pub fn new(config: &RateLimitConfig, store: Arc<dyn CounterStore>) -> Self {
        RateLimitMiddleware {
            max_requests: config.max_requests,
            window_secs: config.window_secs as i64,
            store,
            clock: Arc::new(|| chrono::Utc::now().timestamp()),
        }
    }

    /// Replace the wall clock (unix seconds).
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    fn key_for(ip: &str) -> String {
        let ip = if ip.is_empty() { "unknown" } else { ip };
        hex::encode(Sha256::digest(ip.as_bytes()))
    }
}

#[async_trait]
impl Middleware for RateLimitMiddleware {
    async fn handle(&self, request: &RequestEnvelope, _response_headers: &mut HeaderMap) -> Result<Flow, AppError> {
        let now = (self.clock)();
        let key = Self::key_for(&request.client_ip);
        let count = self
            .store
            .increment_and_count(&key, now, now - self.window_secs)
            .await?;
        if count > self.max_requests {
            tracing::warn!(client_ip = %request.client_ip, count, "rate limit exceeded");
            let retry_after = self.window_secs.max(0) as u64;
            return Ok(Flow::Respond(AppError::RateLimited { retry_after }.into_envelope()));
        }
        Ok(Flow::Continue)
    }
}
