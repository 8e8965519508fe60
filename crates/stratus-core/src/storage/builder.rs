//! Opens and sizes the `.part` file a download is written into.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use super::writer::StorageWriter;
use super::{annotate, temp_path};
use crate::error::Result;

/// Temp file for one download destination. `preallocate` it to the range size,
/// then `build` the `StorageWriter` that chunk workers share.
pub struct StorageWriterBuilder {
    file: File,
    temp_path: PathBuf,
}

impl StorageWriterBuilder {
    /// Open `<final_path>.part`, truncating leftovers from an earlier attempt.
    /// The destination directory must already exist.
    pub fn for_destination(final_path: &Path) -> Result<Self> {
        if let Some(dir) = final_path.parent().filter(|d| !d.as_os_str().is_empty()) {
            if !dir.is_dir() {
                return Err(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("destination directory {} does not exist", dir.display()),
                )
                .into());
            }
        }
        let temp_path = temp_path(final_path);
        let file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .map_err(|e| annotate(e, "failed to create temp file", &temp_path))?;
        tracing::debug!(path = %temp_path.display(), "opened temp file");
        Ok(Self { file, temp_path })
    }

    /// Reserve `size` bytes so chunk writes never extend the file.
    pub fn preallocate(&mut self, size: u64) -> Result<()> {
        if size == 0 || reserve_blocks(&self.file, size) {
            return Ok(());
        }
        self.file
            .set_len(size)
            .map_err(|e| annotate(e, "failed to preallocate", &self.temp_path))?;
        Ok(())
    }

    pub fn build(self) -> StorageWriter {
        StorageWriter::from_file_and_path(self.file, self.temp_path)
    }
}

/// Real block allocation via `posix_fallocate`; false when unsupported.
#[cfg(target_os = "linux")]
fn reserve_blocks(file: &File, size: u64) -> bool {
    use std::os::unix::io::AsRawFd;

    let Ok(len) = libc::off_t::try_from(size) else {
        return false;
    };
    // SAFETY: the descriptor belongs to `file`, which outlives the call.
    let r = unsafe { libc::posix_fallocate(file.as_raw_fd(), 0, len) };
    if r != 0 {
        tracing::debug!(errno = r, "posix_fallocate failed, falling back to set_len");
    }
    r == 0
}

#[cfg(not(target_os = "linux"))]
fn reserve_blocks(_file: &File, _size: u64) -> bool {
    false
}
