//! Retry and backoff policy.
//!
//! Error classification (transport failures, throttling, 5xx) and exponential
//! backoff decisions, wired into the pipeline as `RetryPolicy`.

mod classify;
mod policy;
mod run;

pub use classify::{classify, classify_error, is_replica_lag, retry_after, Attempt, Failure};
pub use policy::{RetryDecision, RetryOptions, DEFAULT_RETRY_STATUS_CODES};
pub use run::{Endpoint, RetryPolicy, RetryState};
