//! Error types for archive operations.
//!
//! Every fallible library call returns [`Result<T>`]. The variants keep
//! "the archive is gone" ([`Error::Disposed`]) apart from "this operation is
//! illegal here" ([`Error::NotSupported`]) so callers can branch on either.
//!
//! Entry streams speak `std::io`, so library errors travelling through
//! [`std::io::Read`]/[`std::io::Write`]/[`std::io::Seek`] are wrapped in an
//! [`std::io::Error`]. Use [`Error::from_io`] to get the original back:
//!
//! ```no_run
//! use std::io::Read;
//! use razip::Error;
//!
//! fn drain(stream: &mut impl Read) -> razip::Result<Vec<u8>> {
//!     let mut out = Vec::new();
//!     match stream.read_to_end(&mut out) {
//!         Ok(_) => Ok(out),
//!         Err(e) if matches!(Error::from_io(&e), Some(Error::Disposed)) => Err(Error::Disposed),
//!         Err(e) => Err(e.into()),
//!     }
//! }
//! ```

use std::io;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// All failure modes of the archive engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Underlying storage failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The directory structures are missing or inconsistent with storage.
    #[error("corrupt archive: {0}")]
    CorruptArchive(String),

    /// The owning archive has already been disposed.
    #[error("archive has been disposed")]
    Disposed,

    /// The operation is not legal for the archive mode or stream capabilities.
    #[error("operation not supported: {0}")]
    NotSupported(String),

    /// The entry uses a compression method the engine cannot decode.
    #[error("unsupported compression method: {0}")]
    UnsupportedCompression(u16),

    /// The entry payload is encrypted and cannot be decoded.
    #[error("entry '{0}' is encrypted")]
    Encrypted(String),

    /// Decoded content does not match the CRC-32 stored in the directory.
    #[error("CRC-32 mismatch for '{name}': expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch {
        name: String,
        expected: u32,
        actual: u32,
    },

    /// Another stream view currently holds the entry open for writing.
    #[error("entry '{0}' is already open")]
    EntryInUse(String),

    /// The entry was removed from the archive.
    #[error("entry '{0}' has been deleted")]
    EntryDeleted(String),

    /// The entry name is not acceptable.
    #[error("invalid entry name: {0:?}")]
    InvalidName(String),

    /// HTTP transport failure while talking to a remote archive.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote server does not behave the way range reads require.
    #[error("remote storage: {0}")]
    Remote(String),
}

impl Error {
    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        Error::CorruptArchive(msg.into())
    }

    pub(crate) fn not_supported(msg: impl Into<String>) -> Self {
        Error::NotSupported(msg.into())
    }

    /// Recovers the library error wrapped inside an [`io::Error`], if any.
    pub fn from_io(err: &io::Error) -> Option<&Error> {
        err.get_ref().and_then(|inner| inner.downcast_ref::<Error>())
    }

    /// Returns true for [`Error::Disposed`], including when wrapped in an I/O error.
    pub fn is_disposed(&self) -> bool {
        match self {
            Error::Disposed => true,
            Error::Io(e) => matches!(Error::from_io(e), Some(Error::Disposed)),
            _ => false,
        }
    }

    /// Returns true for [`Error::NotSupported`], including when wrapped in an I/O error.
    pub fn is_not_supported(&self) -> bool {
        match self {
            Error::NotSupported(_) => true,
            Error::Io(e) => matches!(Error::from_io(e), Some(Error::NotSupported(_))),
            _ => false,
        }
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        let kind = match &err {
            Error::Io(e) => e.kind(),
            Error::NotSupported(_) => io::ErrorKind::Unsupported,
            Error::CorruptArchive(_) | Error::ChecksumMismatch { .. } => io::ErrorKind::InvalidData,
            Error::InvalidName(_) => io::ErrorKind::InvalidInput,
            _ => io::ErrorKind::Other,
        };
        // Unwrap plain I/O errors instead of nesting them.
        match err {
            Error::Io(e) => e,
            other => io::Error::new(kind, other),
        }
    }
}
