//! Remote object operations and the chunked upload/download orchestrators.
//!
//! An `ObjectClient` issues single requests (`create`, `stage_block`,
//! `download_range`, ...) through the shared pipeline. The orchestrators
//! (`download_to_*`, `upload_from_*`) size the chunks, run the probe or create
//! call, fan the rest out through `concurrent_transfer` and merge the results.

mod client;
mod download;
mod options;
mod progress;
mod upload;

pub use client::{block_id, block_index, ObjectClient, ObjectProperties};
pub use options::{
    download_chunk_size, upload_block_size, ByteRange, DownloadOptions, ObjectKind,
    TransferOptions, TransferProgress, UploadOptions, CHUNK_GRAIN, DEFAULT_BLOCK_SIZE,
    DEFAULT_INITIAL_CHUNK_SIZE, KIB, MAX_BLOCK_COUNT, MAX_DOWNLOAD_CHUNK_SIZE,
    MAX_FILE_RANGE_SIZE, MIB,
};

/// Merged result of a chunked transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome {
    /// Download: the probe's metadata. Upload: the final call's (commit for
    /// block blobs, create for files) with `size` set to the bytes uploaded.
    pub properties: ObjectProperties,
    pub bytes_transferred: u64,
    /// Successful requests issued, probe/create/commit included.
    pub requests: usize,
}
