//! Retry loop: re-invoke the rest of the chain until success or the options say stop.

use std::time::{Duration, Instant};

use url::Url;

use super::classify::{classify, is_replica_lag, Attempt, Failure};
use super::policy::{RetryDecision, RetryOptions};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::http::{redacted_url, AttemptStats, Next, Policy, Request, Response};

/// Which replica an attempt targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Primary,
    Secondary,
}

/// Per-call bookkeeping; lives for one logical `send`.
#[derive(Debug)]
pub struct RetryState {
    attempts: u32,
    started: Instant,
    last_endpoint: Endpoint,
    secondary_available: bool,
}

impl RetryState {
    pub fn new(has_secondary: bool) -> Self {
        Self {
            attempts: 0,
            started: Instant::now(),
            last_endpoint: Endpoint::Primary,
            secondary_available: has_secondary,
        }
    }

    /// Count a new attempt and pick its endpoint: odd attempts go to the
    /// primary, even ones to the secondary while it is still usable.
    pub fn begin_attempt(&mut self) -> Endpoint {
        self.attempts += 1;
        self.last_endpoint = if self.secondary_available && self.attempts % 2 == 0 {
            Endpoint::Secondary
        } else {
            Endpoint::Primary
        };
        self.last_endpoint
    }

    /// Stop sending to the secondary for the rest of this call.
    pub fn abandon_secondary(&mut self) {
        self.secondary_available = false;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn last_endpoint(&self) -> Endpoint {
        self.last_endpoint
    }

    fn stats(&self) -> AttemptStats {
        AttemptStats {
            attempts: self.attempts,
            elapsed: self.elapsed(),
        }
    }
}

/// Pipeline stage that retries transient failures with backoff, optionally
/// failing reads over to a secondary replica.
///
/// A retryable response that is still failing when the budget runs out is
/// returned as `Ok` (stamped with attempt stats) so callers classify it by
/// status like any other response; a transport error becomes
/// `Error::Exhausted`.
pub struct RetryPolicy {
    options: RetryOptions,
}

impl RetryPolicy {
    pub fn new(options: RetryOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &RetryOptions {
        &self.options
    }

    fn run(
        &self,
        ctx: &Context,
        request: &mut Request<'_>,
        next: Next<'_>,
        primary: &Url,
        secondary: Option<&Url>,
    ) -> Result<Response> {
        let mut state = RetryState::new(secondary.is_some());
        loop {
            ctx.check()?;
            let endpoint = state.begin_attempt();
            *request.url_mut() = match (endpoint, secondary) {
                (Endpoint::Secondary, Some(url)) => url.clone(),
                _ => primary.clone(),
            };
            request.rewind_body()?;

            let on_secondary = endpoint == Endpoint::Secondary;
            match classify(next.send(ctx, request), on_secondary, &self.options) {
                Attempt::Success(mut resp) => {
                    resp.set_stats(state.stats());
                    return Ok(resp);
                }
                Attempt::Fatal(Failure::Response(mut resp)) => {
                    tracing::warn!(
                        method = %request.method(),
                        url = %redacted_url(request.url()),
                        status = resp.status(),
                        attempt = state.attempts(),
                        "non-retryable status"
                    );
                    resp.set_stats(state.stats());
                    return Ok(resp);
                }
                Attempt::Fatal(Failure::Error(e)) => return Err(e),
                Attempt::Retryable {
                    failure,
                    server_delay,
                } => {
                    if let Some(status) = failure
                        .status()
                        .filter(|s| on_secondary && is_replica_lag(*s))
                    {
                        tracing::debug!(status, "secondary is lagging, continuing on primary only");
                        state.abandon_secondary();
                    }
                    match self.options.decide(state.attempts(), server_delay) {
                        RetryDecision::NoRetry => return Self::give_up(failure, &state),
                        RetryDecision::RetryAfter(delay) => {
                            tracing::info!(
                                method = %request.method(),
                                url = %redacted_url(request.url()),
                                attempt = state.attempts(),
                                status = failure.status(),
                                delay_ms = delay.as_millis() as u64,
                                "retrying after transient failure"
                            );
                            ctx.sleep(delay)?;
                        }
                    }
                }
            }
        }
    }

    fn give_up(failure: Failure, state: &RetryState) -> Result<Response> {
        tracing::info!(
            attempts = state.attempts(),
            elapsed_ms = state.elapsed().as_millis() as u64,
            "retry budget exhausted"
        );
        match failure {
            Failure::Response(mut resp) => {
                resp.set_stats(state.stats());
                Ok(resp)
            }
            Failure::Error(e) if state.attempts() <= 1 => Err(e),
            Failure::Error(e) => Err(Error::Exhausted {
                attempts: state.attempts(),
                elapsed: state.elapsed(),
                source: Box::new(e),
            }),
        }
    }
}

impl Policy for RetryPolicy {
    fn send(&self, ctx: &Context, request: &mut Request<'_>, next: Next<'_>) -> Result<Response> {
        let primary = request.url().clone();
        let secondary = if request.method().is_read_only() {
            self.options.secondary_url(&primary)
        } else {
            None
        };
        let result = self.run(ctx, request, next, &primary, secondary.as_ref());
        *request.url_mut() = primary;
        result
    }
}
