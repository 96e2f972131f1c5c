//! Herald server library: application state and router assembly.

pub mod activity;
pub mod api;
pub mod config;
pub mod middleware;
pub mod notify;
pub mod queue;
pub mod sanitize;

use axum::{
    routing::{get, post},
    Extension, Router,
};
use herald_types::TtsEngine;
use std::sync::Arc;

/// Application state shared across all request handlers. Everything here is
/// read-only after initialisation except the rate-limit map (behind its own
/// lock) and the queue sender.
pub struct AppState {
    /// Immutable configuration snapshot.
    pub config: Arc<config::Config>,
    /// The engine cached at start-up; `None` when nothing probed as usable.
    pub engine: Option<TtsEngine>,
    /// Producer half of the serial audio queue.
    pub queue: queue::AudioQueue,
    /// Rate limiter state.
    pub rate_limiter: middleware::RateLimiter,
}

/// Builds the application router with all routes and middleware.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/notify", post(api::notify_handler))
        .route("/pai", post(api::pai_handler))
        .route("/health", get(api::health_handler))
        .layer(axum::middleware::from_fn(middleware::rate_limit_middleware))
        .layer(axum::middleware::from_fn(middleware::cors_middleware))
        .layer(Extension(Arc::new(state)))
}
