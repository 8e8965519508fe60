//! Seekable request bodies.
//!
//! A body may be read several times: once per attempt. The retry policy calls
//! `rewind` before every resend, so implementations must be able to replay
//! their bytes from the start.

use std::io;

use crate::storage::FileReader;

pub trait BodyStream: Send {
    /// Total bytes this body produces.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reset to the first byte.
    fn rewind(&mut self) -> io::Result<()>;

    /// Read up to `buf.len()` bytes; 0 means end of body.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

impl<B: BodyStream + ?Sized> BodyStream for Box<B> {
    fn len(&self) -> u64 {
        (**self).len()
    }

    fn rewind(&mut self) -> io::Result<()> {
        (**self).rewind()
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read(buf)
    }
}

/// Body backed by a borrowed byte slice.
pub struct MemoryBody<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> MemoryBody<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }
}

impl BodyStream for MemoryBody<'_> {
    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn rewind(&mut self) -> io::Result<()> {
        self.pos = 0;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let rest = &self.data[self.pos..];
        let n = rest.len().min(buf.len());
        buf[..n].copy_from_slice(&rest[..n]);
        self.pos += n;
        Ok(n)
    }
}

/// Body reading `[offset, offset+len)` of a shared file with positional reads,
/// so several chunk bodies can stream from one handle concurrently.
pub struct FileBody<'a> {
    reader: &'a FileReader,
    offset: u64,
    len: u64,
    pos: u64,
}

impl<'a> FileBody<'a> {
    pub fn new(reader: &'a FileReader, offset: u64, len: u64) -> Self {
        Self {
            reader,
            offset,
            len,
            pos: 0,
        }
    }
}

impl BodyStream for FileBody<'_> {
    fn len(&self) -> u64 {
        self.len
    }

    fn rewind(&mut self) -> io::Result<()> {
        self.pos = 0;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.len - self.pos;
        if remaining == 0 {
            return Ok(0);
        }
        let want = (buf.len() as u64).min(remaining) as usize;
        let n = self.reader.read_at(self.offset + self.pos, &mut buf[..want])?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "file ended at {} while reading body [{}, {})",
                    self.offset + self.pos,
                    self.offset,
                    self.offset + self.len
                ),
            ));
        }
        self.pos += n as u64;
        Ok(n)
    }
}

/// Drain a body into a vector (used by in-process transports and tests).
pub fn read_to_end(body: &mut dyn BodyStream) -> io::Result<Vec<u8>> {
    let mut out = Vec::with_capacity(body.len() as usize);
    let mut buf = [0u8; 16 * 1024];
    loop {
        let n = body.read(&mut buf)?;
        if n == 0 {
            return Ok(out);
        }
        out.extend_from_slice(&buf[..n]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_body_replays_after_rewind() {
        let mut body = MemoryBody::new(b"hello world");
        let mut buf = [0u8; 5];
        assert_eq!(body.read(&mut buf).unwrap(), 5);
        assert_eq!(&buf, b"hello");
        body.rewind().unwrap();
        assert_eq!(read_to_end(&mut body).unwrap(), b"hello world");
        assert_eq!(body.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn file_body_reads_only_its_window() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut f, b"0123456789").unwrap();
        let reader = FileReader::open(f.path()).unwrap();
        let mut body = FileBody::new(&reader, 3, 4);
        assert_eq!(body.len(), 4);
        assert_eq!(read_to_end(&mut body).unwrap(), b"3456");
        body.rewind().unwrap();
        assert_eq!(read_to_end(&mut body).unwrap(), b"3456");
    }
}
