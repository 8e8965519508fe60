//! Positional reader for upload sources.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use super::annotate;
use crate::error::Result;
#[cfg(unix)]
use std::os::unix::fs::FileExt;
#[cfg(windows)]
use std::os::windows::fs::FileExt;

/// Read-only file handle shared by chunk workers; reads carry their own
/// offset, so there is no cursor to contend on.
#[derive(Debug)]
pub struct FileReader {
    file: File,
    path: PathBuf,
    len: u64,
}

impl FileReader {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| annotate(e, "failed to open", path))?;
        let len = file
            .metadata()
            .map_err(|e| annotate(e, "failed to stat", path))?
            .len();
        Ok(Self {
            file,
            path: path.to_path_buf(),
            len,
        })
    }

    /// Size of the file when it was opened.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read up to `buf.len()` bytes at `offset`; 0 at end of file.
    #[cfg(unix)]
    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read_at(buf, offset)
    }

    #[cfg(windows)]
    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        self.file.seek_read(buf, offset)
    }

    /// Fill `buf` from `offset`, failing with `UnexpectedEof` if the file is shorter.
    pub fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        let mut filled = 0usize;
        while filled < buf.len() {
            let n = self.read_at(offset + filled as u64, &mut buf[filled..])?;
            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!(
                        "{} ended at {} (wanted {} bytes from {})",
                        self.path.display(),
                        offset + filled as u64,
                        buf.len(),
                        offset
                    ),
                ));
            }
            filled += n;
        }
        Ok(())
    }
}
