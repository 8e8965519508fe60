//! Chunked, retrying transfer engine for cloud blob and file objects.
//!
//! Requests flow through a [`http::Pipeline`] (telemetry, request id, retry
//! with secondary failover, transport); large objects are split into chunks
//! and moved concurrently by [`transfer::concurrent_transfer`] under the
//! orchestrators on [`object::ObjectClient`].

pub mod config;
pub mod context;
pub mod error;
pub mod http;
pub mod logging;
pub mod object;
pub mod retry;
pub mod segmenter;
pub mod storage;
pub mod transfer;

pub use context::Context;
pub use error::{Error, ErrorKind, Result, ServiceError, TransportError, TransportErrorKind};
pub use object::{
    ByteRange, DownloadOptions, ObjectClient, ObjectKind, ObjectProperties, TransferOptions,
    TransferOutcome, TransferProgress, UploadOptions,
};
