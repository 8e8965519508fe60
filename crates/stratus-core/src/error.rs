//! Error taxonomy shared by the pipeline, the retry policy and the transfer engine.
//!
//! Four kinds reach callers: transport failures (network level), service errors
//! (non-2xx responses), logic errors (inconsistent caller input, raised before
//! any network call) and cancellation. Retry exhaustion wraps the last failure
//! with the attempt count and elapsed time.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`], matching how callers react to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    Service,
    Logic,
    Cancelled,
    Io,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("transport: {0}")]
    Transport(#[from] TransportError),

    #[error("{0}")]
    Service(ServiceError),

    /// Caller-supplied ranges or buffers are inconsistent. Never retried.
    #[error("invalid transfer request: {0}")]
    Logic(String),

    /// The service answered with a response the engine cannot use
    /// (missing Content-Range, short chunk body, ignored range).
    #[error("unexpected service response: {0}")]
    Protocol(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("storage: {0}")]
    Io(#[from] std::io::Error),

    /// The retry budget ran out; `source` is the failure of the final attempt.
    #[error("{source} (gave up after {attempts} attempts in {elapsed:?})")]
    Exhausted {
        attempts: u32,
        elapsed: Duration,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub fn logic(msg: impl Into<String>) -> Self {
        Error::Logic(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Error::Protocol(msg.into())
    }

    /// Kind of the underlying failure (looks through `Exhausted`).
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Transport(_) => ErrorKind::Transport,
            Error::Service(_) | Error::Protocol(_) => ErrorKind::Service,
            Error::Logic(_) => ErrorKind::Logic,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::Io(_) => ErrorKind::Io,
            Error::Exhausted { source, .. } => source.kind(),
        }
    }

    /// Number of attempts that went into this error (1 when no retry happened).
    pub fn attempts(&self) -> u32 {
        match self {
            Error::Exhausted { attempts, .. } => *attempts,
            Error::Service(e) => e.attempts,
            _ => 1,
        }
    }

    /// HTTP status when the error came from a service response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Service(e) => Some(e.status),
            Error::Exhausted { source, .. } => source.status(),
            _ => None,
        }
    }
}

/// Classified network-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Connect or transfer timed out.
    Timeout,
    /// Connection refused/reset, DNS or TLS failure, server sent nothing.
    Connection,
    Other,
}

/// A request that never produced an HTTP response.
#[derive(Debug, Error)]
#[error("{kind:?}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
    #[source]
    pub cause: Option<curl::Error>,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: None,
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Connection, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, message)
    }
}

impl From<curl::Error> for TransportError {
    fn from(e: curl::Error) -> Self {
        let kind = if e.is_operation_timedout() {
            TransportErrorKind::Timeout
        } else if e.is_couldnt_connect()
            || e.is_couldnt_resolve_host()
            || e.is_couldnt_resolve_proxy()
            || e.is_ssl_connect_error()
            || e.is_read_error()
            || e.is_recv_error()
            || e.is_send_error()
            || e.is_got_nothing()
            || e.is_partial_file()
        {
            TransportErrorKind::Connection
        } else {
            TransportErrorKind::Other
        };
        Self {
            kind,
            message: e.to_string(),
            cause: Some(e),
        }
    }
}

/// Non-2xx response surfaced to the caller.
#[derive(Debug, Clone)]
pub struct ServiceError {
    pub status: u16,
    pub reason: String,
    /// Service error code from `x-ms-error-code`, when present.
    pub code: Option<String>,
    pub request_id: Option<String>,
    pub attempts: u32,
    pub elapsed: Duration,
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {} {}", self.status, self.reason)?;
        if let Some(code) = &self.code {
            write!(f, " ({})", code)?;
        }
        if let Some(id) = &self.request_id {
            write!(f, " [request id {}]", id)?;
        }
        if self.attempts > 1 {
            write!(f, " after {} attempts in {:?}", self.attempts, self.elapsed)?;
        }
        Ok(())
    }
}

impl std::error::Error for ServiceError {}

impl From<ServiceError> for Error {
    fn from(e: ServiceError) -> Self {
        Error::Service(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausted_reports_inner_kind_and_attempts() {
        let e = Error::Exhausted {
            attempts: 4,
            elapsed: Duration::from_millis(30),
            source: Box::new(Error::Transport(TransportError::connection("reset"))),
        };
        assert_eq!(e.kind(), ErrorKind::Transport);
        assert_eq!(e.attempts(), 4);
        assert!(e.to_string().contains("4 attempts"));
    }

    #[test]
    fn service_error_display_includes_code() {
        let e = ServiceError {
            status: 412,
            reason: "Precondition Failed".into(),
            code: Some("ConditionNotMet".into()),
            request_id: None,
            attempts: 1,
            elapsed: Duration::ZERO,
        };
        assert_eq!(e.to_string(), "HTTP 412 Precondition Failed (ConditionNotMet)");
        assert_eq!(Error::from(e).status(), Some(412));
    }
}
