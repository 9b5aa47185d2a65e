//! Request idempotency cache and middleware.
//!
//! Every POST must carry an `Idempotency-Key` header.  The first response
//! produced for a key (success or error) is recorded, and any request
//! replaying the key within the retention window gets that response back
//! byte-for-byte without re-running business logic.  The cache never diffs
//! payloads: replaying a key with a different body still returns the first
//! recorded response.
//!
//! The cache is an explicitly owned, injectable store handed to the
//! middleware through router state, so workflow code never touches it and
//! it can be swapped for a distributed store without touching the routes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, HeaderValue, Method, Request, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::ApiError;

/// Header clients must send on every POST.
pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// A response recorded for an idempotency key.
#[derive(Debug, Clone)]
struct CachedResponse {
    status: StatusCode,
    body: Bytes,
    recorded_at: Instant,
}

impl CachedResponse {
    fn is_fresh(&self, retention: Duration) -> bool {
        self.recorded_at.elapsed() < retention
    }
}

/// Maps idempotency keys to previously produced responses.
#[derive(Clone)]
pub struct IdempotencyCache {
    entries: Arc<RwLock<HashMap<String, CachedResponse>>>,
    retention: Duration,
}

impl IdempotencyCache {
    /// Create a cache whose entries expire `retention` after recording.
    pub fn new(retention: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            retention,
        }
    }

    /// Return the recorded response for `key`, if one exists and is still
    /// inside the retention window.  Expired entries are dropped so the key
    /// becomes reusable.
    pub async fn check(&self, key: &str) -> Option<(StatusCode, Bytes)> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if entry.is_fresh(self.retention) => {
                    return Some((entry.status, entry.body.clone()));
                }
                Some(_) => {}
                None => return None,
            }
        }

        // The entry looked stale under the read lock.  Re-check under the
        // write lock so a fresh entry recorded in between is not lost.
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get(key) {
            if entry.is_fresh(self.retention) {
                return Some((entry.status, entry.body.clone()));
            }
            entries.remove(key);
        }
        None
    }

    /// Record the response produced for `key`.  The first recording wins;
    /// later calls for the same key are ignored.
    pub async fn record(&self, key: String, status: StatusCode, body: Bytes) {
        let mut entries = self.entries.write().await;
        entries.entry(key).or_insert(CachedResponse {
            status,
            body,
            recorded_at: Instant::now(),
        });
    }

    /// Evict entries older than the retention window.
    pub async fn purge_expired(&self) {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_fresh(self.retention));
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, "purged expired idempotency entries");
        }
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

/// Gate every mutating request through the cache.
///
/// Non-POST requests pass straight through.  A POST without a key is
/// rejected before any business logic runs; a POST with a recorded key is
/// answered from the cache; otherwise the downstream response is buffered,
/// recorded, and returned.
pub async fn idempotency_middleware(
    State(cache): State<IdempotencyCache>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    if req.method() != Method::POST {
        return Ok(next.run(req).await);
    }

    let key = match req
        .headers()
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
    {
        Some(key) if !key.is_empty() => key.to_string(),
        _ => {
            return Err(ApiError::validation_field(
                "MISSING_IDEMPOTENCY_KEY",
                "Idempotency-Key header is required for POST requests",
                "Idempotency-Key",
            ))
        }
    };

    if let Some((status, body)) = cache.check(&key).await {
        debug!(key = %key, status = %status, "replaying recorded response");
        return Ok(replay_response(status, body));
    }

    let response = next.run(req).await;

    let (parts, body) = response.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .map_err(|e| ApiError::Internal(format!("failed to buffer response body: {e}")))?;
    cache.record(key, parts.status, bytes.clone()).await;

    Ok(Response::from_parts(parts, Body::from(bytes)))
}

fn replay_response(status: StatusCode, body: Bytes) -> Response {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn check_returns_recorded_response() {
        let cache = IdempotencyCache::new(Duration::from_secs(60));
        assert!(cache.check("key-1").await.is_none());

        cache
            .record(
                "key-1".to_string(),
                StatusCode::CREATED,
                Bytes::from_static(b"{\"success\":true}"),
            )
            .await;

        let (status, body) = cache.check("key-1").await.expect("entry recorded");
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(&body[..], b"{\"success\":true}");
    }

    #[tokio::test]
    async fn first_recording_wins() {
        let cache = IdempotencyCache::new(Duration::from_secs(60));
        cache
            .record("key".to_string(), StatusCode::CREATED, Bytes::from_static(b"first"))
            .await;
        cache
            .record("key".to_string(), StatusCode::OK, Bytes::from_static(b"second"))
            .await;

        let (status, body) = cache.check("key").await.unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(&body[..], b"first");
    }

    #[tokio::test]
    async fn expired_keys_are_reusable() {
        let cache = IdempotencyCache::new(Duration::ZERO);
        cache
            .record("key".to_string(), StatusCode::OK, Bytes::from_static(b"old"))
            .await;

        assert!(cache.check("key").await.is_none());
        assert_eq!(cache.len().await, 0);

        // The key can be recorded again after expiry.
        cache
            .record("key".to_string(), StatusCode::OK, Bytes::from_static(b"new"))
            .await;
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn purge_removes_only_expired_entries() {
        let cache = IdempotencyCache::new(Duration::from_secs(60));
        cache
            .record("live".to_string(), StatusCode::OK, Bytes::new())
            .await;
        cache.purge_expired().await;
        assert_eq!(cache.len().await, 1);

        let zero = IdempotencyCache::new(Duration::ZERO);
        zero.record("dead".to_string(), StatusCode::OK, Bytes::new())
            .await;
        zero.purge_expired().await;
        assert_eq!(zero.len().await, 0);
    }
}
