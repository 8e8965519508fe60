//! Concurrent offset writer for temp download files.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::annotate;
use crate::error::Result;
#[cfg(unix)]
use std::os::unix::fs::FileExt;
#[cfg(windows)]
use std::os::windows::fs::FileExt;

/// Writer for a temp download file. Safe to clone and use from multiple
/// workers; each `write_at` is independent (pwrite-style).
#[derive(Clone)]
pub struct StorageWriter {
    file: Arc<File>,
    temp_path: PathBuf,
}

impl StorageWriter {
    pub(crate) fn from_file_and_path(file: File, temp_path: PathBuf) -> Self {
        Self {
            file: Arc::new(file),
            temp_path,
        }
    }

    /// Write all of `data` at `offset` without moving a shared cursor.
    pub fn write_at(&self, offset: u64, data: &[u8]) -> Result<()> {
        let mut written = 0usize;
        while written < data.len() {
            let n = self.write_some(offset + written as u64, &data[written..])?;
            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    format!("short write: {} of {}", written, data.len()),
                )
                .into());
            }
            written += n;
        }
        Ok(())
    }

    #[cfg(unix)]
    fn write_some(&self, offset: u64, data: &[u8]) -> io::Result<usize> {
        self.file.write_at(data, offset)
    }

    #[cfg(windows)]
    fn write_some(&self, offset: u64, data: &[u8]) -> io::Result<usize> {
        self.file.seek_write(data, offset)
    }

    /// Sync file data to disk. Call before `finalize` for durability.
    pub fn sync(&self) -> Result<()> {
        self.file
            .sync_all()
            .map_err(|e| annotate(e, "failed to sync", &self.temp_path))?;
        Ok(())
    }

    /// Path to the current temp file.
    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    /// Atomically rename the temp file to the final path. Consumes the writer
    /// and closes the file. Fails if `final_path` is on a different filesystem.
    pub fn finalize(self, final_path: &Path) -> Result<()> {
        let temp_path = self.temp_path.clone();
        drop(self.file);

        std::fs::rename(&temp_path, final_path)
            .map_err(|e| annotate(e, "failed to rename temp file to", final_path))?;
        Ok(())
    }

    /// Close and delete the temp file after a failed transfer.
    pub fn discard(self) {
        let temp_path = self.temp_path.clone();
        drop(self.file);
        if let Err(e) = std::fs::remove_file(&temp_path) {
            tracing::warn!(path = %temp_path.display(), error = %e, "failed to remove temp file");
        }
    }
}
