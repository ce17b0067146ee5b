pub mod auth;
mod availability;
mod bookings;
pub mod error;
pub mod metrics;
mod reviews;
pub mod validation;

use axum::{
    body::Bytes,
    http::{header, HeaderName, Method},
    middleware,
    routing::get,
    Router,
};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::AppState;
use error::ApiError;

const CORS_MAX_AGE_SECS: u64 = 86_400;

pub fn create_router(state: Arc<AppState>) -> Router {
    let timeout = Duration::from_secs(state.config.server.request_timeout_secs);

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics::metrics_endpoint))
        .route("/auth", get(auth::auth_get).post(auth::auth_post))
        .route(
            "/bookings",
            get(bookings::list_or_get)
                .post(bookings::create)
                .put(bookings::update)
                .delete(bookings::cancel),
        )
        .route("/availability", get(availability::check))
        .route("/reviews", get(reviews::list).post(reviews::create))
        .layer(middleware::from_fn(metrics::metrics_middleware))
        .layer(TimeoutLayer::new(timeout))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS headers go on every response; `OPTIONS` preflights get an empty 200
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(auth::AUTH_HEADER),
        ])
        .max_age(Duration::from_secs(CORS_MAX_AGE_SECS))
}

/// Decode a JSON body regardless of `Content-Type`; an empty body reads as `{}`
pub(crate) fn parse_json<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    let raw: &[u8] = if body.iter().all(u8::is_ascii_whitespace) {
        b"{}"
    } else {
        body
    };
    serde_json::from_slice(raw).map_err(|e| ApiError::bad_request(format!("Invalid JSON: {}", e)))
}

async fn health_check() -> &'static str {
    "OK"
}
