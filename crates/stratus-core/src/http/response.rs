//! Response returned up the chain. The body is owned bytes, detached from the
//! connection that produced it.

use std::time::Duration;

use super::headers::Headers;
use crate::error::ServiceError;

/// Attempt bookkeeping stamped on a response by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptStats {
    pub attempts: u32,
    pub elapsed: Duration,
}

impl Default for AttemptStats {
    fn default() -> Self {
        Self {
            attempts: 1,
            elapsed: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Response {
    status: u16,
    reason: String,
    headers: Headers,
    body: Vec<u8>,
    stats: AttemptStats,
}

impl Response {
    pub fn new(status: u16, reason: impl Into<String>) -> Self {
        Self {
            status,
            reason: reason.into(),
            headers: Headers::new(),
            body: Vec::new(),
            stats: AttemptStats::default(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    pub fn stats(&self) -> AttemptStats {
        self.stats
    }

    pub fn set_stats(&mut self, stats: AttemptStats) {
        self.stats = stats;
    }

    /// Service error describing this (non-2xx) response.
    pub fn to_service_error(&self) -> ServiceError {
        ServiceError {
            status: self.status,
            reason: self.reason.clone(),
            code: self.headers.get("x-ms-error-code").map(str::to_string),
            request_id: self.headers.get("x-ms-request-id").map(str::to_string),
            attempts: self.stats.attempts,
            elapsed: self.stats.elapsed,
        }
    }

    /// `Ok(self)` for 2xx, otherwise the service error.
    pub fn error_for_status(self) -> Result<Self, ServiceError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(self.to_service_error())
        }
    }
}

/// Canonical reason phrase for status codes the engine cares about.
pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        206 => "Partial Content",
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not Found",
        408 => "Request Timeout",
        409 => "Conflict",
        412 => "Precondition Failed",
        416 => "Range Not Satisfiable",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "",
    }
}
