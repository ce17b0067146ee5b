//! Prometheus metrics endpoint and HTTP request tracking middleware.
//!
//! This module provides:
//! - A `/metrics` endpoint that returns Prometheus-formatted metrics
//! - Middleware for tracking HTTP request counts and durations
//! - Helper functions to record booking and auth events

use anyhow::Context;
use axum::{
    body::Body,
    extract::{MatchedPath, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use std::time::Instant;

use crate::AppState;

// Metric names as constants for consistency
pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";
pub const BOOKINGS_CREATED_TOTAL: &str = "bookings_created_total";
pub const BOOKINGS_CANCELED_TOTAL: &str = "bookings_canceled_total";
pub const BOOKING_CONFLICTS_TOTAL: &str = "booking_conflicts_total";
pub const AUTH_LOGINS_TOTAL: &str = "auth_logins_total";
pub const AUTH_RATE_LIMITED_TOTAL: &str = "auth_rate_limited_total";
pub const ACTIVE_BOOKINGS: &str = "active_bookings";
pub const USERS_TOTAL: &str = "users_total";

/// Initialize the Prometheus metrics recorder and return a handle for rendering metrics.
///
/// This should be called once during application startup.
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;

    describe_counter!(HTTP_REQUESTS_TOTAL, "Total number of HTTP requests received");
    describe_histogram!(HTTP_REQUEST_DURATION_SECONDS, "HTTP request duration in seconds");
    describe_counter!(BOOKINGS_CREATED_TOTAL, "Bookings created, by resource type");
    describe_counter!(BOOKINGS_CANCELED_TOTAL, "Bookings canceled");
    describe_counter!(BOOKING_CONFLICTS_TOTAL, "Booking attempts rejected for an occupied slot");
    describe_counter!(AUTH_LOGINS_TOTAL, "Login attempts by outcome (success/failed)");
    describe_counter!(AUTH_RATE_LIMITED_TOTAL, "Auth attempts rejected by the rate limiter");
    describe_gauge!(ACTIVE_BOOKINGS, "Pending and confirmed bookings");
    describe_gauge!(USERS_TOTAL, "Registered users");

    Ok(handle)
}

/// GET /metrics - Returns Prometheus-formatted metrics.
///
/// This endpoint is accessible without authentication.
pub async fn metrics_endpoint(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    update_gauge_metrics(&state).await;

    match state.metrics_handle.as_ref() {
        Some(h) => (StatusCode::OK, h.render()),
        None => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Metrics not initialized".to_string(),
        ),
    }
}

/// Refresh gauges from the database before rendering
async fn update_gauge_metrics(state: &AppState) {
    if let Ok(count) = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM bookings WHERE status IN ('pending', 'confirmed')",
    )
    .fetch_one(&state.db)
    .await
    {
        gauge!(ACTIVE_BOOKINGS).set(count as f64);
    }

    if let Ok(count) = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
        .fetch_one(&state.db)
        .await
    {
        gauge!(USERS_TOTAL).set(count as f64);
    }
}

/// Middleware to track HTTP request metrics.
///
/// Records:
/// - `http_requests_total` counter with method, path, and status labels
/// - `http_request_duration_seconds` histogram with method and path labels
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();

    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|mp| mp.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let method = request.method().to_string();

    let response = next.run(request).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    counter!(HTTP_REQUESTS_TOTAL, "method" => method.clone(), "path" => path.clone(), "status" => status).increment(1);
    histogram!(HTTP_REQUEST_DURATION_SECONDS, "method" => method, "path" => path).record(duration);

    response
}

pub fn record_booking_created(booking_type: &'static str) {
    counter!(BOOKINGS_CREATED_TOTAL, "type" => booking_type).increment(1);
}

pub fn record_booking_canceled() {
    counter!(BOOKINGS_CANCELED_TOTAL).increment(1);
}

pub fn record_booking_conflict() {
    counter!(BOOKING_CONFLICTS_TOTAL).increment(1);
}

pub fn record_login(success: bool) {
    let outcome = if success { "success" } else { "failed" };
    counter!(AUTH_LOGINS_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_rate_limited(action: &'static str) {
    counter!(AUTH_RATE_LIMITED_TOTAL, "action" => action).increment(1);
}
