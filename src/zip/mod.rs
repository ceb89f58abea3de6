//! ZIP archive engine.
//!
//! ## Architecture
//!
//! - [`structures`]: fixed-layout records (EOCD, central directory, local headers)
//! - [`locator`]: finds the EOCD and the base offset of prepended data
//! - [`directory`]: streams central directory records through a bounded window
//! - [`local_header`]: locates payload bytes at stream-open time
//! - [`encryption`], [`timestamp`]: per-entry metadata decoding
//! - `stream`: independent per-entry views over shared storage
//! - `archive`, `entry`: lifecycle, mode enforcement, entry table
//! - `writer`: serializes Create/Update archives on dispose
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and compressed data for each file
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! Opening reads the EOCD first, then the Central Directory. Local headers
//! and payloads are only touched when an entry is opened.
//!
//! ## Limitations
//!
//! - Encrypted payloads are classified but not decrypted
//! - No multi-disk archive support
//! - STORED and DEFLATE only; ZIP64 is read but not written

mod archive;
mod codec;
pub mod directory;
pub mod encryption;
mod entry;
pub mod local_header;
pub mod locator;
mod options;
mod stream;
pub mod structures;
pub mod timestamp;
mod writer;

pub use archive::Archive;
pub use encryption::{AesStrength, EncryptionMethod};
pub use entry::Entry;
pub use options::{ArchiveMode, ArchiveOptions, CompressionLevel};
pub use stream::{Capabilities, EntryStream};
pub use structures::CompressionMethod;
pub use timestamp::DosDateTime;
