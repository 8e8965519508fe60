//! Range math and chunk planning.
//!
//! Splits a byte range into fixed-size chunks and computes HTTP Range and
//! Content-Range header values.

mod range;

pub use range::{parse_content_range, range_header_value, round_up, Chunk, ChunkPlan, ContentRange};
