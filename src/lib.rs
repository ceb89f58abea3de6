//! # razip
//!
//! A random-access ZIP archive engine.
//!
//! The central directory is parsed once when an archive is opened; every
//! entry can then be opened as an independent stream over the shared
//! storage. Streams keep private cursors and use positioned reads, so any
//! number of them can be read in interleaved chunks.
//!
//! ## Features
//!
//! - Archives with prepended stubs or appended data
//! - ZIP64 archives (reading)
//! - STORED and DEFLATE payloads, CRC-32 checked while streaming
//! - Encryption classification (ZipCrypto, WinZip AES, PKWARE strong)
//! - Read, Create and Update modes with explicit, idempotent disposal
//! - Local files, in-memory buffers, any `Read + Seek`, forward-only
//!   streams and remote files over HTTP Range requests
//!
//! ## Example
//!
//! ```no_run
//! use std::io::Read;
//! use razip::{Archive, ArchiveOptions};
//!
//! let archive = Archive::open_path("archive.zip", ArchiveOptions::default())?;
//! if let Some(entry) = archive.entry("docs/readme.txt")? {
//!     let mut text = String::new();
//!     entry.open()?.read_to_string(&mut text)?;
//!     println!("{} ({} bytes)", entry.full_name()?, entry.length()?);
//! }
//! archive.dispose()?;
//! # Ok::<(), razip::Error>(())
//! ```

pub mod cli;
pub mod error;
pub mod io;
pub mod zip;

pub use cli::Cli;
pub use error::{Error, Result};
pub use io::{HttpRangeReader, LocalFile, MemoryStorage, SeekableStorage, Storage};
pub use zip::{
    AesStrength, Archive, ArchiveMode, ArchiveOptions, Capabilities, CompressionLevel,
    CompressionMethod, DosDateTime, EncryptionMethod, Entry, EntryStream,
};
