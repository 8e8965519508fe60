//! Header-stamping and logging policies installed by `PipelineBuilder`.

use std::time::Instant;

use super::pipeline::{Next, Policy};
use super::request::{redacted_url, Request};
use super::response::Response;
use crate::context::Context;
use crate::error::Result;

/// Storage REST API version sent with every request.
pub const API_VERSION: &str = "2021-12-02";

pub const HEADER_REQUEST_ID: &str = "x-ms-client-request-id";
pub const HEADER_DATE: &str = "x-ms-date";
pub const HEADER_VERSION: &str = "x-ms-version";

/// Sets `User-Agent` and `x-ms-version`.
pub struct TelemetryPolicy {
    user_agent: String,
}

impl TelemetryPolicy {
    pub fn new(application_id: Option<&str>) -> Self {
        let base = format!(
            "stratus/{} ({}; {})",
            env!("CARGO_PKG_VERSION"),
            std::env::consts::OS,
            std::env::consts::ARCH
        );
        let user_agent = match application_id {
            Some(id) if !id.trim().is_empty() => format!("{} {}", id.trim(), base),
            _ => base,
        };
        Self { user_agent }
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}

impl Policy for TelemetryPolicy {
    fn send(&self, ctx: &Context, request: &mut Request<'_>, next: Next<'_>) -> Result<Response> {
        let headers = request.headers_mut();
        headers.insert("User-Agent", self.user_agent.as_str());
        if !headers.contains(HEADER_VERSION) {
            headers.insert(HEADER_VERSION, API_VERSION);
        }
        next.send(ctx, request)
    }
}

/// Tags the logical operation with a client request id. Sits before the retry
/// policy, so every attempt of one send shares the id and the service logs can
/// be correlated across retries.
pub struct RequestIdPolicy;

impl Policy for RequestIdPolicy {
    fn send(&self, ctx: &Context, request: &mut Request<'_>, next: Next<'_>) -> Result<Response> {
        if !request.headers().contains(HEADER_REQUEST_ID) {
            request
                .headers_mut()
                .insert(HEADER_REQUEST_ID, uuid::Uuid::new_v4().to_string());
        }
        next.send(ctx, request)
    }
}

/// Stamps a fresh `x-ms-date` on every attempt.
pub struct PerRetryPolicy;

impl Policy for PerRetryPolicy {
    fn send(&self, ctx: &Context, request: &mut Request<'_>, next: Next<'_>) -> Result<Response> {
        request.headers_mut().insert(HEADER_DATE, rfc1123_now());
        next.send(ctx, request)
    }
}

fn rfc1123_now() -> String {
    chrono::Utc::now()
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}

/// Logs each attempt: method, redacted URL, status and latency.
pub struct LoggingPolicy;

impl Policy for LoggingPolicy {
    fn send(&self, ctx: &Context, request: &mut Request<'_>, next: Next<'_>) -> Result<Response> {
        let method = request.method();
        let url = redacted_url(request.url());
        let started = Instant::now();
        let result = next.send(ctx, request);
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(resp) => {
                tracing::debug!(%method, %url, status = resp.status(), elapsed_ms, "http attempt")
            }
            Err(e) => tracing::debug!(%method, %url, error = %e, elapsed_ms, "http attempt failed"),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_agent_prefix() {
        assert!(TelemetryPolicy::new(None).user_agent().starts_with("stratus/"));
        let p = TelemetryPolicy::new(Some(" backup-job "));
        assert!(p.user_agent().starts_with("backup-job stratus/"));
        assert!(TelemetryPolicy::new(Some("  ")).user_agent().starts_with("stratus/"));
    }

    #[test]
    fn date_is_rfc1123() {
        let d = rfc1123_now();
        assert!(d.ends_with(" GMT"));
        assert_eq!(d.len(), "Mon, 01 Jan 2024 00:00:00 GMT".len());
        chrono::NaiveDateTime::parse_from_str(&d, "%a, %d %b %Y %H:%M:%S GMT").unwrap();
    }
}
