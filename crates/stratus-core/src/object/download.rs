//! Download orchestration: probe, then fan the remaining range out over
//! ranged GETs that land directly at their offset in the destination.

use std::path::Path;
use std::sync::Mutex;

use super::client::{ObjectClient, ObjectProperties};
use super::options::{download_chunk_size, DownloadOptions, DEFAULT_INITIAL_CHUNK_SIZE};
use super::progress::Progress;
use super::TransferOutcome;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::segmenter::{parse_content_range, Chunk, ChunkPlan};
use crate::storage::StorageWriterBuilder;
use crate::transfer::{concurrent_transfer, default_concurrency};

/// Result of the first request: metadata plus the head of the range.
struct Probe {
    properties: ObjectProperties,
    /// Bytes of the requested range that exist on the service.
    range_size: u64,
    /// First `head.len()` bytes of the range.
    head: Vec<u8>,
}

impl ObjectClient {
    /// Download into `buffer`, which must hold the whole requested range.
    pub fn download_to_buffer(
        &self,
        ctx: &Context,
        buffer: &mut [u8],
        options: &DownloadOptions,
    ) -> Result<TransferOutcome> {
        if let Some(len) = options.range.and_then(|r| r.length) {
            if len > buffer.len() as u64 {
                return Err(buffer_too_small(buffer.len(), len));
            }
        }
        let probe = self.probe(ctx, options)?;
        if probe.range_size > buffer.len() as u64 {
            return Err(buffer_too_small(buffer.len(), probe.range_size));
        }
        let range_size = probe.range_size as usize;
        let (head, tail) = buffer[..range_size].split_at_mut(probe.head.len());
        head.copy_from_slice(&probe.head);

        let plan = self.remaining_plan(&probe, options)?;
        // One disjoint slice per chunk, taken by whichever worker claims it.
        let slots: Vec<Mutex<Option<&mut [u8]>>> = tail
            .chunks_mut(plan.chunk_size().max(1) as usize)
            .map(|s| Mutex::new(Some(s)))
            .collect();

        self.fetch_remaining(ctx, &probe, &plan, options, |chunk, data| {
            let mut slot = slots[chunk.index].lock().unwrap_or_else(|e| e.into_inner());
            let dst = slot
                .take()
                .ok_or_else(|| Error::logic(format!("chunk {} delivered twice", chunk.index)))?;
            dst.copy_from_slice(data);
            Ok(())
        })?;

        Ok(self.outcome(probe, &plan))
    }

    /// Download into a file at `path`, written through a `.part` temp file that
    /// is renamed into place on success and removed on failure.
    pub fn download_to_file(
        &self,
        ctx: &Context,
        path: &Path,
        options: &DownloadOptions,
    ) -> Result<TransferOutcome> {
        let probe = self.probe(ctx, options)?;
        let plan = self.remaining_plan(&probe, options)?;

        let mut builder = StorageWriterBuilder::for_destination(path)?;
        if let Err(e) = builder.preallocate(probe.range_size) {
            builder.build().discard();
            return Err(e);
        }
        let writer = builder.build();

        let written = writer.write_at(0, &probe.head).and_then(|()| {
            let base = range_offset(options);
            self.fetch_remaining(ctx, &probe, &plan, options, |chunk, data| {
                writer.write_at(chunk.offset - base, data)
            })
        });
        let synced = written.and_then(|()| writer.sync());
        if let Err(e) = synced {
            writer.discard();
            return Err(e);
        }
        let tmp = writer.temp_path().to_path_buf();
        if let Err(e) = writer.finalize(path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e);
        }
        tracing::info!(
            path = %path.display(),
            bytes = probe.range_size,
            "download complete"
        );
        Ok(self.outcome(probe, &plan))
    }

    /// First ranged GET: learns the object size and fetches the head of the range.
    fn probe(&self, ctx: &Context, options: &DownloadOptions) -> Result<Probe> {
        let offset = range_offset(options);
        let want = options.range.and_then(|r| r.length);
        if want == Some(0) {
            return Err(Error::logic("download range length must be greater than zero"));
        }
        let mut first_len = options.initial_chunk_size.unwrap_or(DEFAULT_INITIAL_CHUNK_SIZE);
        if first_len == 0 {
            return Err(Error::logic("initial chunk size must be greater than zero"));
        }
        if let Some(len) = want {
            first_len = first_len.min(len);
        }
        if offset.checked_add(want.unwrap_or(first_len)).is_none() {
            return Err(Error::logic(format!(
                "download range at offset {} extends past the largest addressable byte",
                offset
            )));
        }

        let resp = match self.download_range(ctx, offset, Some(first_len), None) {
            Err(e) if e.status() == Some(416) && offset == 0 => {
                // Nothing to range over: the object is empty.
                tracing::debug!("probe not satisfiable at offset 0, fetching without range");
                self.download_range(ctx, 0, None, None)?
            }
            other => other?,
        };

        let properties = ObjectProperties::from_response(&resp);
        let total = match resp.status() {
            206 => resp
                .headers()
                .get("content-range")
                .and_then(parse_content_range)
                .and_then(|cr| cr.total)
                .ok_or_else(|| Error::protocol("ranged response without a usable Content-Range"))?,
            _ if offset == 0 => resp.body().len() as u64,
            status => {
                return Err(Error::protocol(format!(
                    "status {} for a ranged read at offset {}",
                    status, offset
                )))
            }
        };

        let mut range_size = total.saturating_sub(offset);
        if let Some(len) = want {
            range_size = range_size.min(len);
        }
        // A 200 carries the whole object, so the probe already holds the range.
        let head_len = if resp.status() == 206 {
            first_len.min(range_size)
        } else {
            range_size
        };
        let mut head = resp.into_body();
        if (head.len() as u64) < head_len {
            return Err(Error::protocol(format!(
                "probe returned {} bytes, expected {}",
                head.len(),
                head_len
            )));
        }
        head.truncate(head_len as usize);
        tracing::debug!(total, offset, range_size, head = head_len, "probe complete");
        Ok(Probe {
            properties: ObjectProperties {
                size: total,
                ..properties
            },
            range_size,
            head,
        })
    }

    fn remaining_plan(&self, probe: &Probe, options: &DownloadOptions) -> Result<ChunkPlan> {
        let start = range_offset(options) + probe.head.len() as u64;
        let remaining = probe.range_size - probe.head.len() as u64;
        let concurrency = options.transfer.concurrency.unwrap_or_else(default_concurrency);
        let chunk_size = match options.transfer.chunk_size {
            Some(0) => return Err(Error::logic("chunk size must be greater than zero")),
            Some(size) => size,
            None => download_chunk_size(remaining, concurrency),
        };
        ChunkPlan::new(start, remaining, chunk_size)
    }

    /// Fetch every chunk of `plan` (If-Match the probe's ETag) and hand each
    /// verified body to `write`.
    fn fetch_remaining<W>(
        &self,
        ctx: &Context,
        probe: &Probe,
        plan: &ChunkPlan,
        options: &DownloadOptions,
        write: W,
    ) -> Result<()>
    where
        W: Fn(Chunk, &[u8]) -> Result<()> + Sync,
    {
        let progress = Progress::new(options.transfer.progress.clone(), probe.range_size);
        progress.advance(probe.head.len() as u64);
        let etag = probe.properties.etag.as_deref();
        let concurrency = options.transfer.concurrency.unwrap_or_else(default_concurrency);

        concurrent_transfer(
            ctx,
            plan.start(),
            plan.length(),
            plan.chunk_size(),
            concurrency,
            |chunk| {
                let resp = self.download_range(ctx, chunk.offset, Some(chunk.length), etag)?;
                let body = resp.body();
                if body.len() as u64 != chunk.length {
                    return Err(Error::protocol(format!(
                        "chunk {} at {} returned {} bytes, expected {}",
                        chunk.index,
                        chunk.offset,
                        body.len(),
                        chunk.length
                    )));
                }
                write(chunk, body)?;
                progress.advance(chunk.length);
                Ok(())
            },
        )
    }

    fn outcome(&self, probe: Probe, plan: &ChunkPlan) -> TransferOutcome {
        TransferOutcome {
            properties: probe.properties,
            bytes_transferred: probe.range_size,
            requests: 1 + plan.len(),
        }
    }
}

fn range_offset(options: &DownloadOptions) -> u64 {
    options.range.map_or(0, |r| r.offset)
}

fn buffer_too_small(have: usize, need: u64) -> Error {
    Error::logic(format!(
        "buffer is not big enough: {} bytes for a {} byte range",
        have, need
    ))
}
