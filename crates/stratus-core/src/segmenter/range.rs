//! Chunk type, chunk planning and HTTP range header math.

use crate::error::{Error, Result};

/// One chunk of a plan: byte range `[offset, offset + length)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    /// Absolute start offset (inclusive).
    pub offset: u64,
    pub length: u64,
    /// Position in the plan, 0-based.
    pub index: usize,
    /// Number of chunks in the plan.
    pub count: usize,
}

impl Chunk {
    /// End offset (exclusive).
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }

    /// HTTP Range header value (inclusive end): `bytes=start-(end-1)`.
    pub fn range_header_value(&self) -> String {
        range_header_value(self.offset, Some(self.length))
    }
}

/// Immutable partition of `[start, start + length)` into chunks of at most
/// `chunk_size` bytes. Chunks are consecutive and disjoint; only the last may
/// be shorter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    start: u64,
    length: u64,
    chunk_size: u64,
    count: usize,
}

impl ChunkPlan {
    /// Fails with a logic error when `chunk_size` is 0 for a non-empty range
    /// or the range overflows `u64`.
    pub fn new(start: u64, length: u64, chunk_size: u64) -> Result<Self> {
        if start.checked_add(length).is_none() {
            return Err(Error::logic(format!(
                "range [{}, +{}) overflows",
                start, length
            )));
        }
        if length > 0 && chunk_size == 0 {
            return Err(Error::logic("chunk size must be greater than zero"));
        }
        let count = if length == 0 {
            0
        } else {
            usize::try_from(length.div_ceil(chunk_size))
                .map_err(|_| Error::logic("too many chunks for this platform"))?
        };
        Ok(Self {
            start,
            length,
            chunk_size,
            count,
        })
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn length(&self) -> u64 {
        self.length
    }

    pub fn end(&self) -> u64 {
        self.start + self.length
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Number of chunks: `ceil(length / chunk_size)`.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn chunk(&self, index: usize) -> Option<Chunk> {
        if index >= self.count {
            return None;
        }
        let rel = index as u64 * self.chunk_size;
        Some(Chunk {
            offset: self.start + rel,
            length: self.chunk_size.min(self.length - rel),
            index,
            count: self.count,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = Chunk> + '_ {
        (0..self.count).filter_map(move |i| self.chunk(i))
    }
}

/// `bytes=offset-(offset+length-1)`, or the open-ended `bytes=offset-`.
pub fn range_header_value(offset: u64, length: Option<u64>) -> String {
    match length {
        Some(0) | None => format!("bytes={}-", offset),
        Some(len) => format!("bytes={}-{}", offset, offset.saturating_add(len - 1)),
    }
}

/// Parsed `Content-Range` response header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRange {
    /// `(first, last)` inclusive; `None` for `bytes */total`.
    pub range: Option<(u64, u64)>,
    /// Full resource size; `None` when the server sent `*`.
    pub total: Option<u64>,
}

impl ContentRange {
    /// Bytes carried by the response this header came from.
    pub fn len(&self) -> u64 {
        self.range.map_or(0, |(first, last)| last - first + 1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Parse `bytes 0-99/1000`, `bytes 0-99/*` or `bytes */1000`.
pub fn parse_content_range(value: &str) -> Option<ContentRange> {
    let rest = value.trim().strip_prefix("bytes")?.trim_start();
    let (range, total) = rest.split_once('/')?;
    let total = match total.trim() {
        "*" => None,
        t => Some(t.parse::<u64>().ok()?),
    };
    let range = match range.trim() {
        "*" => None,
        r => {
            let (first, last) = r.split_once('-')?;
            let first = first.trim().parse::<u64>().ok()?;
            let last = last.trim().parse::<u64>().ok()?;
            if last < first || total.is_some_and(|t| last >= t) {
                return None;
            }
            Some((first, last))
        }
    };
    Some(ContentRange { range, total })
}

/// Round `value` up to a multiple of `grain` (`grain` 0 leaves it unchanged).
pub fn round_up(value: u64, grain: u64) -> u64 {
    if grain == 0 {
        return value;
    }
    value.div_ceil(grain).saturating_mul(grain)
}
