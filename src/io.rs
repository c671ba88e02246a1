//! Byte sources and the adapter the decoder pulls bytes through
//!
//! The decoder never sees files or memory buffers. It asks an [`AvifIo`] for
//! `size` bytes at `offset`, and [`ContextIo`] satisfies that request from any
//! [`ByteProvider`] by seeking and reading into a scratch buffer it owns.

use crate::error::{CodecError, CodecResult};
use std::borrow::Cow;
use std::io::{self, Read, Seek, SeekFrom};

/// Seekable byte context supplied by the caller
///
/// Implemented here for memory buffers ([`MemoryContext`]) and for anything
/// `Read + Seek` ([`StreamContext`]); tests substitute their own.
pub trait ByteProvider {
    /// Move to absolute position `pos`. Returns `false` if the context
    /// cannot seek there.
    fn seek(&mut self, pos: u64) -> bool;

    /// Read up to `buf.len()` bytes, returning how many were read.
    ///
    /// Fewer bytes than requested means the end of the data was reached.
    fn read_into(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Release the context. Called exactly once, when the adapter wrapping
    /// it is dropped.
    fn close(&mut self) {}
}

impl<P: ByteProvider + ?Sized> ByteProvider for &mut P {
    fn seek(&mut self, pos: u64) -> bool {
        (**self).seek(pos)
    }

    fn read_into(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read_into(buf)
    }

    fn close(&mut self) {
        (**self).close()
    }
}

impl<P: ByteProvider + ?Sized> ByteProvider for Box<P> {
    fn seek(&mut self, pos: u64) -> bool {
        (**self).seek(pos)
    }

    fn read_into(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read_into(buf)
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// Memory-backed byte context
#[derive(Debug, Clone)]
pub struct MemoryContext<'a> {
    data: Cow<'a, [u8]>,
    pos: usize,
}

impl<'a> MemoryContext<'a> {
    /// Wrap a borrowed buffer without copying it
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data: Cow::Borrowed(data),
            pos: 0,
        }
    }

    /// Take ownership of a buffer
    pub fn from_vec(data: Vec<u8>) -> MemoryContext<'static> {
        MemoryContext {
            data: Cow::Owned(data),
            pos: 0,
        }
    }

    /// Current read position
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Total size of the buffer
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the buffer holds no bytes
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl ByteProvider for MemoryContext<'_> {
    fn seek(&mut self, pos: u64) -> bool {
        match usize::try_from(pos) {
            Ok(pos) if pos <= self.data.len() => {
                self.pos = pos;
                true
            }
            _ => false,
        }
    }

    fn read_into(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = &self.data[self.pos..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.pos += n;
        Ok(n)
    }
}

/// File- or stream-backed byte context
#[derive(Debug)]
pub struct StreamContext<R> {
    inner: R,
}

impl<R: Read + Seek> StreamContext<R> {
    /// Wrap a seekable reader
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Unwrap the reader
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read + Seek> ByteProvider for StreamContext<R> {
    fn seek(&mut self, pos: u64) -> bool {
        self.inner.seek(SeekFrom::Start(pos)).is_ok()
    }

    fn read_into(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        // Fill as much as the stream allows; only EOF may cut a read short.
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }
}

/// Pull-based, random-access read interface used by the decoder
pub trait AvifIo {
    /// Return up to `size` bytes starting at `offset`.
    ///
    /// A shorter slice is a successful read that hit the end of the data.
    fn read(&mut self, read_flags: u32, offset: u64, size: usize) -> CodecResult<&[u8]>;

    /// Total size of the source, if known
    fn size_hint(&self) -> Option<u64>;

    /// Whether slices returned by `read` stay valid after the next call.
    /// When false, the caller must copy what it wants to keep.
    fn persistent(&self) -> bool;
}

/// Adapter presenting a [`ByteProvider`] as an [`AvifIo`]
///
/// Reads land in a scratch buffer that is reused (and overwritten) by every
/// call, so returned slices are never persistent. Dropping the adapter closes
/// the wrapped context.
pub struct ContextIo<P: ByteProvider> {
    ctx: P,
    scratch: Vec<u8>,
}

impl<P: ByteProvider> ContextIo<P> {
    /// Wrap a byte context
    pub fn new(ctx: P) -> Self {
        Self {
            ctx,
            scratch: Vec::new(),
        }
    }
}

impl<P: ByteProvider> AvifIo for ContextIo<P> {
    // read_flags are ignored, as the stock file and memory readers do
    fn read(&mut self, _read_flags: u32, offset: u64, size: usize) -> CodecResult<&[u8]> {
        if i64::try_from(offset).is_err() {
            return Err(CodecError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("read offset {offset} out of range"),
            )));
        }

        if !self.ctx.seek(offset) {
            return Err(CodecError::Io(io::Error::other(format!(
                "seek to offset {offset} failed"
            ))));
        }

        self.scratch.clear();
        self.scratch
            .try_reserve_exact(size)
            .map_err(|_| CodecError::OutOfMemory)?;
        self.scratch.resize(size, 0);

        let n = self.ctx.read_into(&mut self.scratch).map_err(CodecError::Io)?;
        self.scratch.truncate(n.min(size));
        Ok(&self.scratch)
    }

    fn size_hint(&self) -> Option<u64> {
        None
    }

    fn persistent(&self) -> bool {
        false
    }
}

impl<P: ByteProvider> Drop for ContextIo<P> {
    fn drop(&mut self) {
        self.ctx.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn memory_context_reads_from_offset() {
        let data = [1u8, 2, 3, 4, 5];
        let mut io = ContextIo::new(MemoryContext::new(&data));
        assert_eq!(io.read(0, 2, 2).unwrap(), &[3, 4]);
        assert_eq!(io.read(0, 0, 1).unwrap(), &[1]);
    }

    #[test]
    fn short_read_is_success() {
        let data = [9u8; 10];
        let mut io = ContextIo::new(MemoryContext::new(&data));
        let got = io.read(0, 6, 100).unwrap();
        assert_eq!(got.len(), 4);
        assert_eq!(io.read(0, 10, 16).unwrap().len(), 0);
    }

    #[test]
    fn seek_past_end_of_memory_fails() {
        let data = [0u8; 4];
        let mut io = ContextIo::new(MemoryContext::new(&data));
        assert!(matches!(io.read(0, 5, 1), Err(CodecError::Io(_))));
    }

    #[test]
    fn offset_beyond_signed_range_fails() {
        let data = [0u8; 4];
        let mut io = ContextIo::new(MemoryContext::new(&data));
        assert!(matches!(io.read(0, u64::MAX, 1), Err(CodecError::Io(_))));
    }

    #[test]
    fn adapter_is_not_persistent_and_has_no_size_hint() {
        let io = ContextIo::new(MemoryContext::new(&[]));
        assert!(!io.persistent());
        assert_eq!(io.size_hint(), None);
    }

    #[test]
    fn stream_context_fills_buffer() {
        let mut ctx = StreamContext::new(Cursor::new(vec![7u8; 32]));
        assert!(ctx.seek(30));
        let mut buf = [0u8; 8];
        assert_eq!(ctx.read_into(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], &[7, 7]);
    }
}
