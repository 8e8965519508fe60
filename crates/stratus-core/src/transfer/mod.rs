//! Chunked fan-out over a byte range.
//!
//! Storage-agnostic: the caller supplies the per-chunk function and decides
//! what a chunk means (a ranged GET, a staged block, a file range write).

mod concurrent;

pub use concurrent::{concurrent_transfer, default_concurrency};
