//! Upload orchestration: create, write chunks concurrently, then commit.

use std::path::Path;

use super::client::{block_id, ObjectClient, ObjectProperties};
use super::options::{upload_block_size, ObjectKind, UploadOptions, MAX_FILE_RANGE_SIZE};
use super::progress::Progress;
use super::TransferOutcome;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::http::{BodyStream, FileBody, MemoryBody};
use crate::storage::FileReader;
use crate::transfer::{concurrent_transfer, default_concurrency};

/// Where upload bytes come from. Bodies are cut per chunk and must be
/// replayable, since the retry policy rewinds them between attempts.
trait UploadSource: Sync {
    fn len(&self) -> u64;
    fn body(&self, offset: u64, length: u64) -> Box<dyn BodyStream + '_>;
}

impl UploadSource for [u8] {
    fn len(&self) -> u64 {
        <[u8]>::len(self) as u64
    }

    fn body(&self, offset: u64, length: u64) -> Box<dyn BodyStream + '_> {
        let start = offset as usize;
        Box::new(MemoryBody::new(&self[start..start + length as usize]))
    }
}

impl UploadSource for FileReader {
    fn len(&self) -> u64 {
        FileReader::len(self)
    }

    fn body(&self, offset: u64, length: u64) -> Box<dyn BodyStream + '_> {
        Box::new(FileBody::new(self, offset, length))
    }
}

impl ObjectClient {
    pub fn upload_from_buffer(
        &self,
        ctx: &Context,
        data: &[u8],
        options: &UploadOptions,
    ) -> Result<TransferOutcome> {
        self.upload_source(ctx, data, options)
    }

    /// Upload a local file, streaming each chunk with positional reads.
    pub fn upload_from_file(
        &self,
        ctx: &Context,
        path: &Path,
        options: &UploadOptions,
    ) -> Result<TransferOutcome> {
        let reader = FileReader::open(path)?;
        let outcome = self.upload_source(ctx, &reader, options)?;
        tracing::info!(
            path = %path.display(),
            bytes = outcome.bytes_transferred,
            "upload complete"
        );
        Ok(outcome)
    }

    fn upload_source<S: UploadSource + ?Sized>(
        &self,
        ctx: &Context,
        source: &S,
        options: &UploadOptions,
    ) -> Result<TransferOutcome> {
        let size = source.len();
        let chunk_size = match (options.transfer.chunk_size, self.kind()) {
            (Some(0), _) => return Err(Error::logic("chunk size must be greater than zero")),
            (Some(n), ObjectKind::File) if n > MAX_FILE_RANGE_SIZE => {
                return Err(Error::logic(format!(
                    "file range writes are limited to {} bytes",
                    MAX_FILE_RANGE_SIZE
                )))
            }
            (Some(n), _) => n,
            (None, ObjectKind::BlockBlob) => upload_block_size(size),
            (None, ObjectKind::File) => MAX_FILE_RANGE_SIZE,
        };
        let concurrency = options.transfer.concurrency.unwrap_or_else(default_concurrency);
        let content_type = options.content_type.as_deref();
        let progress = Progress::new(options.transfer.progress.clone(), size);

        match self.kind() {
            ObjectKind::BlockBlob if size <= chunk_size => {
                let resp = self.put_blob(ctx, source.body(0, size), content_type)?;
                progress.advance(size);
                Ok(TransferOutcome {
                    properties: ObjectProperties {
                        size,
                        ..ObjectProperties::from_response(&resp)
                    },
                    bytes_transferred: size,
                    requests: 1,
                })
            }
            ObjectKind::BlockBlob => {
                self.create(ctx, 0, content_type)?;
                let chunks = size.div_ceil(chunk_size) as usize;
                concurrent_transfer(ctx, 0, size, chunk_size, concurrency, |chunk| {
                    let id = block_id(chunk.index);
                    self.stage_block(ctx, &id, source.body(chunk.offset, chunk.length))?;
                    progress.advance(chunk.length);
                    Ok(())
                })?;
                let ids: Vec<String> = (0..chunks).map(block_id).collect();
                let resp = self.commit_block_list(ctx, &ids, content_type)?;
                Ok(TransferOutcome {
                    properties: ObjectProperties {
                        size,
                        ..ObjectProperties::from_response(&resp)
                    },
                    bytes_transferred: size,
                    requests: chunks + 2,
                })
            }
            ObjectKind::File => {
                let created = self.create(ctx, size, content_type)?;
                let chunks = size.div_ceil(chunk_size) as usize;
                concurrent_transfer(ctx, 0, size, chunk_size, concurrency, |chunk| {
                    self.put_range(ctx, chunk.offset, source.body(chunk.offset, chunk.length))?;
                    progress.advance(chunk.length);
                    Ok(())
                })?;
                Ok(TransferOutcome {
                    properties: ObjectProperties {
                        size,
                        ..ObjectProperties::from_response(&created)
                    },
                    bytes_transferred: size,
                    requests: chunks + 1,
                })
            }
        }
    }
}
