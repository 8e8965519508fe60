use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::segmenter::{Chunk, ChunkPlan};

/// Worker count used when the caller does not pick one.
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

/// Shared scheduling state for one transfer.
struct Shared<'p> {
    plan: &'p ChunkPlan,
    next: AtomicUsize,
    failed: AtomicBool,
    first_error: Mutex<Option<Error>>,
}

impl Shared<'_> {
    fn record(&self, err: Error) {
        let mut slot = self.first_error.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_none() {
            *slot = Some(err);
        }
        self.failed.store(true, Ordering::Release);
    }

    /// Claim chunks until none remain, a chunk fails, or the context is cancelled.
    fn work<F>(&self, ctx: &Context, chunk_fn: &F)
    where
        F: Fn(Chunk) -> Result<()> + Sync,
    {
        loop {
            if self.failed.load(Ordering::Acquire) {
                return;
            }
            if ctx.is_cancelled() {
                self.record(Error::Cancelled);
                return;
            }
            let index = self.next.fetch_add(1, Ordering::AcqRel);
            let Some(chunk) = self.plan.chunk(index) else {
                return;
            };
            if let Err(e) = chunk_fn(chunk) {
                tracing::debug!(index, offset = chunk.offset, error = %e, "chunk failed");
                self.record(e);
                return;
            }
        }
    }
}

/// Partition `[offset, offset + length)` into `chunk_size` chunks and run
/// `chunk_fn` once per chunk on up to `concurrency` workers; the calling
/// thread is one of them.
///
/// Workers claim the next chunk index from a shared counter, so chunks start
/// in ascending order but may finish in any order. The first error sets a
/// failure flag: no worker claims a new chunk after it, in-flight chunks run
/// to completion, and that first error is returned once every worker is done.
/// On `Ok(())` every chunk ran exactly once.
pub fn concurrent_transfer<F>(
    ctx: &Context,
    offset: u64,
    length: u64,
    chunk_size: u64,
    concurrency: usize,
    chunk_fn: F,
) -> Result<()>
where
    F: Fn(Chunk) -> Result<()> + Sync,
{
    let plan = ChunkPlan::new(offset, length, chunk_size)?;
    if plan.is_empty() {
        return Ok(());
    }
    let workers = concurrency.max(1).min(plan.len());
    let shared = Shared {
        plan: &plan,
        next: AtomicUsize::new(0),
        failed: AtomicBool::new(false),
        first_error: Mutex::new(None),
    };
    tracing::debug!(
        offset,
        length,
        chunk_size,
        chunks = plan.len(),
        workers,
        "starting chunked transfer"
    );

    std::thread::scope(|s| {
        let handles: Vec<_> = (1..workers)
            .map(|_| s.spawn(|| shared.work(ctx, &chunk_fn)))
            .collect();
        shared.work(ctx, &chunk_fn);
        for h in handles {
            if h.join().is_err() {
                shared.record(Error::logic("chunk worker panicked"));
            }
        }
    });

    match shared.first_error.into_inner().unwrap_or_else(|e| e.into_inner()) {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;

    #[test]
    fn single_worker_runs_in_order() {
        let seen = Mutex::new(Vec::new());
        concurrent_transfer(&Context::new(), 10, 95, 10, 1, |c| {
            seen.lock().unwrap().push((c.index, c.offset, c.length, c.count));
            Ok(())
        })
        .unwrap();
        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.len(), 10);
        for (i, (index, offset, _, count)) in seen.iter().enumerate() {
            assert_eq!(*index, i);
            assert_eq!(*offset, 10 + 10 * i as u64);
            assert_eq!(*count, 10);
        }
        assert_eq!(seen[9].2, 5);
    }

    #[test]
    fn many_workers_cover_range() {
        let bytes = AtomicU64::new(0);
        let hits: Vec<AtomicUsize> = (0..37).map(|_| AtomicUsize::new(0)).collect();
        concurrent_transfer(&Context::new(), 0, 3_650, 100, 8, |c| {
            bytes.fetch_add(c.length, Ordering::Relaxed);
            hits[c.index].fetch_add(1, Ordering::Relaxed);
            Ok(())
        })
        .unwrap();
        assert_eq!(bytes.load(Ordering::Relaxed), 3_650);
        assert!(hits.iter().all(|h| h.load(Ordering::Relaxed) == 1));
    }

    #[test]
    fn first_error_stops_new_chunks() {
        let started = AtomicUsize::new(0);
        let err = concurrent_transfer(&Context::new(), 0, 100, 1, 1, |c| {
            started.fetch_add(1, Ordering::Relaxed);
            if c.index == 3 {
                return Err(Error::logic("boom at 3"));
            }
            Ok(())
        })
        .unwrap_err();
        assert!(err.to_string().contains("boom at 3"));
        assert_eq!(started.load(Ordering::Relaxed), 4);
    }

    #[test]
    fn empty_range_never_calls() {
        concurrent_transfer(&Context::new(), 5, 0, 0, 4, |_| -> Result<()> {
            panic!("no chunks expected")
        })
        .unwrap();
    }

    #[test]
    fn zero_chunk_size_is_logic_error() {
        let r = concurrent_transfer(&Context::new(), 0, 10, 0, 2, |_| Ok(()));
        assert!(matches!(r, Err(Error::Logic(_))));
    }

    #[test]
    fn cancelled_context_stops_claiming() {
        let ctx = Context::new();
        let calls = AtomicUsize::new(0);
        let r = concurrent_transfer(&ctx, 0, 10, 1, 1, |_| {
            if calls.fetch_add(1, Ordering::Relaxed) == 1 {
                ctx.cancel();
            }
            Ok(())
        });
        assert!(matches!(r, Err(Error::Cancelled)));
        assert_eq!(calls.load(Ordering::Relaxed), 2);
    }
}
