//! Transfer options, defaults and chunk sizing.

use std::fmt;
use std::str::FromStr;

use tokio::sync::mpsc::Sender;

use crate::segmenter::round_up;

pub const KIB: u64 = 1024;
pub const MIB: u64 = 1024 * KIB;

/// Probe size for downloads when none is configured.
pub const DEFAULT_INITIAL_CHUNK_SIZE: u64 = 4 * MIB;
/// Upper bound for derived download chunk sizes.
pub const MAX_DOWNLOAD_CHUNK_SIZE: u64 = 4 * MIB;
/// Derived chunk sizes are rounded up to this grain.
pub const CHUNK_GRAIN: u64 = 4 * KIB;
pub const DEFAULT_BLOCK_SIZE: u64 = 8 * MIB;
/// Most blocks a single block blob may commit.
pub const MAX_BLOCK_COUNT: u64 = 50_000;
/// Largest range a single file range write may carry.
pub const MAX_FILE_RANGE_SIZE: u64 = 4 * MIB;

/// Upload protocol of the remote object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ObjectKind {
    /// Create, stage blocks, commit the block list.
    #[default]
    BlockBlob,
    /// Create at full size, then write ranges in place.
    File,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::BlockBlob => "block-blob",
            ObjectKind::File => "file",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "block-blob" | "blockblob" | "blob" => Ok(ObjectKind::BlockBlob),
            "file" => Ok(ObjectKind::File),
            other => Err(format!("unknown object kind: {}", other)),
        }
    }
}

/// `[offset, offset + length)`; open-ended when `length` is `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ByteRange {
    pub offset: u64,
    pub length: Option<u64>,
}

impl ByteRange {
    pub fn new(offset: u64, length: Option<u64>) -> Self {
        Self { offset, length }
    }
}

/// Reported after each finished chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    pub bytes_done: u64,
    pub total_bytes: u64,
}

/// Fan-out knobs shared by uploads and downloads.
#[derive(Debug, Clone, Default)]
pub struct TransferOptions {
    /// Fixed chunk size; derived from the object size when unset.
    pub chunk_size: Option<u64>,
    /// Worker count; `available_parallelism` when unset.
    pub concurrency: Option<usize>,
    /// Receives progress without blocking workers (`try_send`).
    pub progress: Option<Sender<TransferProgress>>,
}

#[derive(Debug, Clone, Default)]
pub struct DownloadOptions {
    pub range: Option<ByteRange>,
    /// Bytes fetched by the probe request.
    pub initial_chunk_size: Option<u64>,
    pub transfer: TransferOptions,
}

#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    pub content_type: Option<String>,
    pub transfer: TransferOptions,
}

/// Download chunk size for `remaining` bytes over `concurrency` workers:
/// an even split rounded up to the grain, capped at 4 MiB.
pub fn download_chunk_size(remaining: u64, concurrency: usize) -> u64 {
    let per_worker = remaining / concurrency.max(1) as u64;
    round_up(per_worker.max(1), CHUNK_GRAIN).min(MAX_DOWNLOAD_CHUNK_SIZE)
}

/// Block size for a `size`-byte upload: 8 MiB, raised so the block count stays
/// within the service limit, rounded up to the grain.
pub fn upload_block_size(size: u64) -> u64 {
    let min_block = size.div_ceil(MAX_BLOCK_COUNT);
    round_up(DEFAULT_BLOCK_SIZE.max(min_block), CHUNK_GRAIN)
}
