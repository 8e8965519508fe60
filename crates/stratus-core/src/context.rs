//! Cancellation and deadline carrier threaded through every `send`.
//!
//! One `Context` spans a whole logical transfer. Clones share the same abort
//! token, so cancelling any clone stops every worker: transports abort their
//! in-flight request at the next progress callback, the retry policy wakes from
//! its backoff sleep, and the chunk scheduler stops claiming new chunks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

#[derive(Default)]
struct AbortToken {
    aborted: AtomicBool,
    lock: Mutex<()>,
    wake: Condvar,
}

#[derive(Clone, Default)]
pub struct Context {
    token: Arc<AbortToken>,
    deadline: Option<Instant>,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("cancelled", &self.is_cancelled())
            .field("deadline", &self.deadline)
            .finish()
    }
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derived context sharing this one's abort token, expiring at `deadline`
    /// (or earlier if this context already has a sooner deadline).
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(d) => d.min(deadline),
            None => deadline,
        };
        Self {
            token: Arc::clone(&self.token),
            deadline: Some(deadline),
        }
    }

    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Request cancellation for this context and every clone of it.
    pub fn cancel(&self) {
        self.token.aborted.store(true, Ordering::Release);
        let _guard = self.token.lock.lock().unwrap_or_else(|e| e.into_inner());
        self.token.wake.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.aborted.load(Ordering::Acquire)
            || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// `Err(Cancelled)` once cancelled or past the deadline.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    /// Sleep for `duration`, returning early with `Err(Cancelled)` if the
    /// context is cancelled or its deadline falls inside the sleep.
    pub fn sleep(&self, duration: Duration) -> Result<()> {
        self.check()?;
        let wake_at = Instant::now() + duration;
        if self.deadline.is_some_and(|d| d < wake_at) {
            self.wait(self.deadline.unwrap_or(wake_at));
            return Err(Error::Cancelled);
        }
        self.wait(wake_at);
        self.check()
    }

    fn wait(&self, until: Instant) {
        let mut guard = self.token.lock.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if self.token.aborted.load(Ordering::Acquire) {
                return;
            }
            let now = Instant::now();
            if now >= until {
                return;
            }
            guard = match self.token.wake.wait_timeout(guard, until - now) {
                Ok((g, _)) => g,
                Err(e) => e.into_inner().0,
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_is_shared_by_clones() {
        let ctx = Context::new();
        let other = ctx.clone();
        assert!(ctx.check().is_ok());
        other.cancel();
        assert!(ctx.is_cancelled());
        assert!(matches!(ctx.check(), Err(Error::Cancelled)));
    }

    #[test]
    fn cancel_wakes_sleeper() {
        let ctx = Context::new();
        let canceller = ctx.clone();
        let start = Instant::now();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            canceller.cancel();
        });
        let res = ctx.sleep(Duration::from_secs(10));
        handle.join().unwrap();
        assert!(matches!(res, Err(Error::Cancelled)));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn deadline_cuts_sleep_short() {
        let ctx = Context::new().with_timeout(Duration::from_millis(20));
        let start = Instant::now();
        assert!(matches!(ctx.sleep(Duration::from_secs(10)), Err(Error::Cancelled)));
        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(ctx.is_cancelled());
    }

    #[test]
    fn plain_sleep_completes() {
        let ctx = Context::new();
        let start = Instant::now();
        ctx.sleep(Duration::from_millis(10)).unwrap();
        assert!(start.elapsed() >= Duration::from_millis(10));
    }
}
