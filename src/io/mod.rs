//! Storage backends for archives.
//!
//! Everything the engine reads or writes goes through [`Storage`], a
//! positioned-I/O abstraction. Positioned reads carry their own offset, so
//! any number of entry streams can share one handle without fighting over a
//! file cursor.

mod http;
mod local;
mod memory;
mod seekable;

pub use http::HttpRangeReader;
pub use local::LocalFile;
pub use memory::MemoryStorage;
pub use seekable::SeekableStorage;

use std::io;

/// Random-access byte source, optionally writable.
pub trait Storage: Send + Sync {
    /// Read data at the specified offset into the buffer.
    ///
    /// Returns the number of bytes read; `0` means end of storage.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;

    /// Get the current total size of the data source.
    fn size(&self) -> io::Result<u64>;

    /// Fill `buf` completely or fail with [`io::ErrorKind::UnexpectedEof`].
    fn read_exact_at(&self, mut offset: u64, mut buf: &mut [u8]) -> io::Result<()> {
        while !buf.is_empty() {
            match self.read_at(offset, buf) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "storage ended before the requested range",
                    ));
                }
                Ok(n) => {
                    offset += n as u64;
                    buf = &mut buf[n..];
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Whether [`Storage::write_at`] and [`Storage::set_len`] can succeed.
    fn is_writable(&self) -> bool {
        false
    }

    /// Write data at the specified offset.
    fn write_at(&self, _offset: u64, _buf: &[u8]) -> io::Result<usize> {
        Err(read_only())
    }

    /// Truncate or extend the storage.
    fn set_len(&self, _len: u64) -> io::Result<()> {
        Err(read_only())
    }

    /// Release the underlying resource.
    ///
    /// Archives call this once when they are disposed, unless they were
    /// opened with `leave_open`.
    fn close(&self) -> io::Result<()> {
        Ok(())
    }
}

/// Write all of `buf` at `offset`.
pub(crate) fn write_all_at<S: Storage + ?Sized>(
    storage: &S,
    mut offset: u64,
    mut buf: &[u8],
) -> io::Result<()> {
    while !buf.is_empty() {
        match storage.write_at(offset, buf) {
            Ok(0) => return Err(io::Error::from(io::ErrorKind::WriteZero)),
            Ok(n) => {
                offset += n as u64;
                buf = &buf[n..];
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

fn read_only() -> io::Error {
    io::Error::new(io::ErrorKind::Unsupported, "storage is read-only")
}

fn closed() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "storage has been closed")
}
