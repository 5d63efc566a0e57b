//! Test utility stuff
use rand::{rngs::StdRng, SeedableRng};
use std::io::{self, prelude::*, Cursor, SeekFrom};

/// Seed for [`rng`]
const SEED: u64 = 0x4546_4920_5041_5254;

/// Result type. Note that this must be imported explicitly or else it's
/// ambiguous with std prelude
pub type Result<T = ()> = anyhow::Result<T>;

/// A `len` byte payload.
///
/// Never zero, and the same for the same `len`.
pub fn payload(len: usize) -> Cursor<Vec<u8>> {
    Cursor::new((0..len).map(|i| (i % 251 + 1) as u8).collect())
}

/// Deterministic RNG
pub fn rng() -> StdRng {
    StdRng::seed_from_u64(SEED)
}

/// Sink that stops accepting bytes after `limit` have been written.
pub struct FailingWriter {
    inner: Cursor<Vec<u8>>,
    limit: usize,
}

impl FailingWriter {
    pub fn new(limit: usize) -> Self {
        Self {
            inner: Cursor::new(Vec::new()),
            limit,
        }
    }
}

impl Write for FailingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let room = self.limit.min(buf.len());
        let written = self.inner.write(&buf[..room])?;
        self.limit -= written;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl Seek for FailingWriter {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}

/// Payload source that fails.
///
/// [`FailingPayload::unreadable`] can be sized but not read,
/// [`FailingPayload::unseekable`] can't even be sized.
pub struct FailingPayload {
    len: u64,
    seekable: bool,
}

impl FailingPayload {
    pub fn unreadable(len: u64) -> Self {
        Self {
            len,
            seekable: true,
        }
    }

    pub fn unseekable() -> Self {
        Self {
            len: 0,
            seekable: false,
        }
    }
}

impl Read for FailingPayload {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::Other, "read failed"))
    }
}

impl Seek for FailingPayload {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        if !self.seekable {
            return Err(io::Error::new(io::ErrorKind::Other, "seek failed"));
        }
        Ok(match pos {
            SeekFrom::Start(n) => n,
            SeekFrom::End(_) => self.len,
            SeekFrom::Current(_) => 0,
        })
    }
}
