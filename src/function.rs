//! Run a single serverless-style invocation event through the HTTP router.
//!
//! The event carries `{httpMethod, headers, queryStringParameters, body}`;
//! the answer is `{statusCode, headers, body}`. Each route group is exposed
//! as one function, so an event without a `path` is routed to `/<function>`.

use anyhow::{Context, Result};
use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Method, Request},
    Router,
};
use http_body_util::BodyExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tower::ServiceExt;
use tracing::{debug, warn};

/// Route groups that can be invoked as functions
pub const FUNCTIONS: &[&str] = &["auth", "bookings", "availability", "reviews"];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationEvent {
    #[serde(default)]
    pub http_method: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub query_string_parameters: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub request_context: Option<RequestContext>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestContext {
    #[serde(default)]
    pub identity: Option<Identity>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    #[serde(default)]
    pub source_ip: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl InvocationEvent {
    fn into_request(self, function: &str) -> Result<Request<Body>> {
        let method = match self.http_method.as_deref() {
            Some(m) => Method::from_bytes(m.trim().to_ascii_uppercase().as_bytes())
                .with_context(|| format!("Invalid httpMethod: {}", m))?,
            None => Method::GET,
        };

        let mut uri = self
            .path
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| format!("/{}", function.trim_matches('/')));
        if let Some(params) = self.query_string_parameters.filter(|p| !p.is_empty()) {
            let query =
                serde_urlencoded::to_string(&params).context("Failed to encode query string")?;
            uri.push('?');
            uri.push_str(&query);
        }

        let mut request = Request::builder()
            .method(method)
            .uri(&uri)
            .body(Body::from(self.body.unwrap_or_default()))
            .with_context(|| format!("Invalid request URI: {}", uri))?;

        let headers = request.headers_mut();
        for (name, value) in self.headers.unwrap_or_default() {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(&value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => warn!(header = %name, "Skipping invalid event header"),
            }
        }

        let source_ip = self
            .request_context
            .and_then(|ctx| ctx.identity)
            .and_then(|identity| identity.source_ip);
        if let Some(ip) = source_ip {
            if !headers.contains_key("x-real-ip") {
                if let Ok(value) = HeaderValue::from_str(&ip) {
                    headers.insert("x-real-ip", value);
                }
            }
        }

        Ok(request)
    }
}

/// Dispatch one event to `function` and collect the full response
pub async fn invoke(
    router: Router,
    function: &str,
    event: InvocationEvent,
) -> Result<InvocationResponse> {
    let request = event.into_request(function)?;
    debug!(method = %request.method(), uri = %request.uri(), "Invoking function");

    let response = router
        .oneshot(request)
        .await
        .context("Router failed to handle the event")?;

    let status_code = response.status().as_u16();
    let mut headers = BTreeMap::new();
    for (name, value) in response.headers() {
        let value = String::from_utf8_lossy(value.as_bytes()).to_string();
        headers
            .entry(name.as_str().to_string())
            .and_modify(|existing: &mut String| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }

    let bytes = response
        .into_body()
        .collect()
        .await
        .context("Failed to read response body")?
        .to_bytes();

    Ok(InvocationResponse {
        status_code,
        headers,
        body: String::from_utf8_lossy(&bytes).to_string(),
    })
}
