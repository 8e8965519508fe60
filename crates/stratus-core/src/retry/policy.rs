use std::time::Duration;

use rand::Rng;
use url::Url;

/// Statuses retried by default.
pub const DEFAULT_RETRY_STATUS_CODES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// Jitter multiplier bounds applied to the computed backoff.
const JITTER_MIN: f64 = 0.8;
const JITTER_MAX: f64 = 1.3;

/// Decision returned by the retry options for a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Do not retry this error.
    NoRetry,
    /// Retry after the given delay.
    RetryAfter(Duration),
}

/// Exponential backoff with jitter and caps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryOptions {
    /// Retries after the first attempt; total attempts are `max_retries + 1`.
    pub max_retries: u32,
    /// Base delay for backoff.
    pub base_delay: Duration,
    /// Upper bound on backoff delay.
    pub max_delay: Duration,
    /// Read replica host (`host` or `host:port`) that even-numbered attempts of
    /// GET/HEAD requests are sent to.
    pub secondary_host_for_reads: Option<String>,
    /// Response statuses treated as transient.
    pub status_codes: Vec<u16>,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(800),
            max_delay: Duration::from_secs(60),
            secondary_host_for_reads: None,
            status_codes: DEFAULT_RETRY_STATUS_CODES.to_vec(),
        }
    }
}

impl RetryOptions {
    /// Options that retry without sleeping (tests, in-process transports).
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            ..Self::default()
        }
    }

    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.status_codes.contains(&status)
    }

    /// Decide what to do after the `attempt`-th attempt (1-based) failed
    /// retryably. A server-supplied delay replaces the computed backoff.
    pub fn decide(&self, attempt: u32, server_delay: Option<Duration>) -> RetryDecision {
        if attempt > self.max_retries {
            return RetryDecision::NoRetry;
        }
        RetryDecision::RetryAfter(server_delay.unwrap_or_else(|| self.backoff(attempt)))
    }

    /// Jittered backoff for the `attempt`-th failure.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let jitter = rand::rng().random_range(JITTER_MIN..=JITTER_MAX);
        self.backoff_with_jitter(attempt, jitter)
    }

    /// `min(max_delay, base_delay * 2^(attempt-1) * jitter)`.
    pub fn backoff_with_jitter(&self, attempt: u32, jitter: f64) -> Duration {
        let exp = 1u32 << attempt.saturating_sub(1).min(30);
        let raw = self.base_delay.saturating_mul(exp);
        if raw >= self.max_delay {
            return self.max_delay;
        }
        Duration::try_from_secs_f64(raw.as_secs_f64() * jitter)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }

    /// Smallest delay `backoff` can produce for the `attempt`-th failure.
    pub fn min_backoff(&self, attempt: u32) -> Duration {
        self.backoff_with_jitter(attempt, JITTER_MIN)
    }

    /// `primary` with its host (and port) swapped for the configured secondary.
    /// `None` when no secondary is configured or the host does not parse.
    pub fn secondary_url(&self, primary: &Url) -> Option<Url> {
        let host = self.secondary_host_for_reads.as_deref()?.trim();
        if host.is_empty() {
            return None;
        }
        let parsed = Url::parse(&format!("{}://{}", primary.scheme(), host)).ok()?;
        let mut url = primary.clone();
        url.set_host(parsed.host_str()).ok()?;
        url.set_port(parsed.port()).ok()?;
        Some(url)
    }
}
