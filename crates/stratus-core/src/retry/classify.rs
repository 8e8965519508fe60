//! Classify one attempt's result into success, retryable or fatal.

use std::time::Duration;

use crate::error::Error;
use crate::http::{Headers, Response};
use crate::retry::policy::RetryOptions;

/// What went wrong on an attempt: an HTTP response with a failing status, or
/// an error that produced no response.
#[derive(Debug)]
pub enum Failure {
    Response(Response),
    Error(Error),
}

impl Failure {
    pub fn status(&self) -> Option<u16> {
        match self {
            Failure::Response(r) => Some(r.status()),
            Failure::Error(e) => e.status(),
        }
    }
}

/// Typed outcome of one attempt.
#[derive(Debug)]
pub enum Attempt {
    Success(Response),
    Retryable {
        failure: Failure,
        /// Delay requested by the server through a retry-after header.
        server_delay: Option<Duration>,
    },
    Fatal(Failure),
}

/// Classify the result of sending one attempt. `on_secondary` is true when the
/// attempt targeted the read replica: a 404 or 412 there may be replication lag
/// and is retryable (against the primary).
pub fn classify(result: crate::error::Result<Response>, on_secondary: bool, options: &RetryOptions) -> Attempt {
    match result {
        Ok(resp) => classify_response(resp, on_secondary, options),
        Err(e) => classify_error(e),
    }
}

fn classify_response(resp: Response, on_secondary: bool, options: &RetryOptions) -> Attempt {
    let status = resp.status();
    if status < 400 {
        return Attempt::Success(resp);
    }
    if on_secondary && is_replica_lag(status) {
        return Attempt::Retryable {
            failure: Failure::Response(resp),
            server_delay: None,
        };
    }
    if options.is_retryable_status(status) {
        let server_delay = retry_after(resp.headers());
        return Attempt::Retryable {
            failure: Failure::Response(resp),
            server_delay,
        };
    }
    Attempt::Fatal(Failure::Response(resp))
}

/// Statuses from the secondary that mean it has not caught up with the primary:
/// the object is missing there, or its ETag is older than the one in `If-Match`.
pub fn is_replica_lag(status: u16) -> bool {
    status == 404 || status == 412
}

/// Transport failures are always transient; everything else (cancellation,
/// storage I/O, caller mistakes) stops the loop.
pub fn classify_error(e: Error) -> Attempt {
    match e {
        Error::Transport(_) => Attempt::Retryable {
            failure: Failure::Error(e),
            server_delay: None,
        },
        other => Attempt::Fatal(Failure::Error(other)),
    }
}

/// Server-requested delay from `retry-after-ms`, `x-ms-retry-after-ms`
/// (milliseconds) or `retry-after` (whole seconds), checked in that order.
pub fn retry_after(headers: &Headers) -> Option<Duration> {
    for name in ["retry-after-ms", "x-ms-retry-after-ms"] {
        if let Some(ms) = headers.get(name).and_then(|v| v.trim().parse::<u64>().ok()) {
            return Some(Duration::from_millis(ms));
        }
    }
    headers
        .get("retry-after")
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}
