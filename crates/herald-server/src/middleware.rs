//! Rate limiting and CORS middleware.

use axum::{
    body::Body,
    http::{header, HeaderValue, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::AppState;

/// Admissions per key per window.
pub const RATE_LIMIT: u32 = 10;
/// Rate limit window duration.
pub const RATE_WINDOW: Duration = Duration::from_secs(60);

/// The only origin the daemon answers to.
fn allowed_origin() -> HeaderValue {
    HeaderValue::from_static("http://localhost")
}

/// Per-key fixed-window bucket.
#[derive(Debug)]
struct Bucket {
    count: u32,
    window_start: Instant,
}

/// In-memory rate limiter. Buckets reset lazily when the first post-window
/// request for their key arrives.
#[derive(Clone, Debug, Default)]
pub struct RateLimiter {
    state: Arc<Mutex<HashMap<String, Bucket>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the request is admitted.
    pub fn check(&self, key: &str) -> bool {
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                // Refusing everything over a poisoned counter would be a
                // self-inflicted denial of service; a stale count is fine.
                tracing::error!("rate limiter lock poisoned, recovering with stale state");
                poisoned.into_inner()
            }
        };
        let now = Instant::now();

        // Keep the map from growing without bound under churning keys.
        if state.len() > 1024 {
            state.retain(|_, bucket| now.duration_since(bucket.window_start) <= RATE_WINDOW);
        }

        let bucket = state.entry(key.to_string()).or_insert(Bucket {
            count: 0,
            window_start: now,
        });

        if now.duration_since(bucket.window_start) > RATE_WINDOW {
            bucket.count = 0;
            bucket.window_start = now;
        }

        if bucket.count >= RATE_LIMIT {
            false
        } else {
            bucket.count += 1;
            true
        }
    }
}

/// Rate limiting middleware. Keyed by `X-Forwarded-For`, falling back to the
/// loopback literal for direct local callers. Health checks are exempt
/// because `/health` never fails.
pub async fn rate_limit_middleware(req: Request<Body>, next: Next) -> Response {
    if req.method() == Method::GET && req.uri().path() == "/health" {
        return next.run(req).await;
    }

    let Some(state) = req.extensions().get::<Arc<AppState>>().cloned() else {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };

    let key = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("127.0.0.1")
        .to_string();

    if !state.rate_limiter.check(&key) {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({"status": "error", "message": "Rate limit exceeded"})),
        )
            .into_response();
    }

    next.run(req).await
}

/// Loopback-only CORS. `OPTIONS` preflights short-circuit to 204; every
/// other response gets the allow-origin header stamped on.
pub async fn cors_middleware(req: Request<Body>, next: Next) -> Response {
    if req.method() == Method::OPTIONS {
        let mut response = StatusCode::NO_CONTENT.into_response();
        let headers = response.headers_mut();
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, allowed_origin());
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET, POST, OPTIONS"),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type"),
        );
        return response;
    }

    let mut response = next.run(req).await;
    response
        .headers_mut()
        .insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, allowed_origin());
    response
}
