//! Disk I/O and file lifecycle.
//!
//! Preallocates temp files (fallocate on Linux when available, else set_len),
//! supports concurrent offset writes and reads (pwrite/pread), fsync, and
//! atomic finalize (rename from `.part` to final name).

mod builder;
mod reader;
mod writer;

pub use builder::StorageWriterBuilder;
pub use reader::FileReader;
pub use writer::StorageWriter;

use std::io;
use std::path::{Path, PathBuf};

/// Temporary file suffix used before atomic rename.
pub const TEMP_SUFFIX: &str = ".part";

/// Path for the temp file: appends `.part` to the final path (e.g. `file.iso` → `file.iso.part`).
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

/// Prefix an I/O error with what was being done and to which path.
pub(crate) fn annotate(e: io::Error, what: &str, path: &Path) -> io::Error {
    io::Error::new(e.kind(), format!("{} {}: {}", what, path.display(), e))
}
