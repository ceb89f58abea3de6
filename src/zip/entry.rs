//! Archive entries.
//!
//! An [`Entry`] is a cheap handle: the metadata lives in a shared
//! `EntryState` owned by the archive's entry table, and the handle only
//! holds a weak link back to the archive. Once the archive is disposed (or
//! dropped) every operation on the handle fails with [`Error::Disposed`].

use chrono::NaiveDateTime;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::error::{Error, Result};
use crate::io::Storage;

use super::archive::ArchiveCore;
use super::codec::Compressed;
use super::directory::DirectoryRecord;
use super::encryption::EncryptionMethod;
use super::locator::DirectoryLocation;
use super::options::{ArchiveMode, CompressionLevel};
use super::stream::{EntryReader, EntryStream, ReadPlan};
use super::structures::{
    AES_EXTRA_ID, CompressionMethod, FLAG_DATA_DESCRIPTOR, FLAG_ENCRYPTED, FLAG_STRONG_ENCRYPTION,
    FLAG_UTF8, LocalFileHeader, STRONG_ENCRYPTION_EXTRA_ID, VERSION_DEFAULT, VERSION_MADE_BY,
    strip_extra_field,
};
use super::timestamp::DosDateTime;

/// Where an entry's raw (compressed) bytes come from.
#[derive(Debug, Clone)]
pub(crate) enum Payload {
    /// In storage, behind the local header at this absolute offset.
    Storage { local_header_offset: u64 },
    /// Committed by a write stream, not yet written to storage.
    Pending(Arc<[u8]>),
    /// Created and never written.
    Empty,
}

#[derive(Debug)]
pub(crate) struct EntryMeta {
    pub version_made_by: u16,
    pub version_needed: u16,
    pub flags: u16,
    pub method: CompressionMethod,
    pub crc32: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub modified: DosDateTime,
    pub encryption: EncryptionMethod,
    pub extra: Vec<u8>,
    pub comment: Vec<u8>,
    pub internal_attrs: u16,
    pub external_attrs: u32,
    pub payload: Payload,
    pub level: CompressionLevel,
    pub open_for_write: bool,
    pub written: bool,
    pub deleted: bool,
}

impl EntryMeta {
    /// Method the payload is compressed with, looking through AES wrapping.
    pub fn effective_method(&self) -> CompressionMethod {
        match self.encryption {
            EncryptionMethod::Aes { actual_method, .. } => actual_method,
            _ => self.method,
        }
    }

    /// Replace the payload with freshly committed content.
    pub fn apply_content(&mut self, compressed: Compressed, uncompressed_size: u64) {
        self.method = compressed.method;
        self.crc32 = compressed.crc32;
        self.compressed_size = compressed.data.len() as u64;
        self.uncompressed_size = uncompressed_size;
        self.payload = Payload::Pending(Arc::from(compressed.data));
        self.flags &= !(FLAG_ENCRYPTED | FLAG_STRONG_ENCRYPTION | FLAG_DATA_DESCRIPTOR);
        self.encryption = EncryptionMethod::None;
        self.extra = strip_extra_field(&self.extra, AES_EXTRA_ID);
        self.extra = strip_extra_field(&self.extra, STRONG_ENCRYPTION_EXTRA_ID);
        self.version_needed = VERSION_DEFAULT;
        self.written = true;
    }
}

#[derive(Debug)]
pub(crate) struct EntryState {
    pub name: String,
    pub name_bytes: Vec<u8>,
    meta: Mutex<EntryMeta>,
}

impl EntryState {
    pub fn from_record(
        record: DirectoryRecord,
        location: &DirectoryLocation,
        storage_size: u64,
    ) -> Result<Self> {
        let name = record.decoded_name();
        let sizes = record.resolve_sizes()?;

        let local_header_offset = location
            .resolve(sizes.local_header_offset)
            .filter(|offset| {
                offset
                    .checked_add(LocalFileHeader::SIZE as u64)
                    .is_some_and(|end| end <= storage_size)
            })
            .ok_or_else(|| {
                Error::corrupt(format!(
                    "local header of '{}' recorded at {} lies outside storage",
                    name, sizes.local_header_offset
                ))
            })?;

        let header = &record.header;
        let meta = EntryMeta {
            version_made_by: header.version_made_by,
            version_needed: header.version_needed,
            flags: header.flags,
            method: CompressionMethod::from_u16(header.compression_method),
            crc32: header.crc32,
            compressed_size: sizes.compressed_size,
            uncompressed_size: sizes.uncompressed_size,
            modified: DosDateTime::new(header.last_mod_date, header.last_mod_time),
            encryption: EncryptionMethod::classify(header.flags, &record.extra),
            internal_attrs: header.internal_attrs,
            external_attrs: header.external_attrs,
            payload: Payload::Storage {
                local_header_offset,
            },
            level: CompressionLevel::default(),
            open_for_write: false,
            written: true,
            deleted: false,
            extra: record.extra,
            comment: record.comment,
        };

        Ok(Self {
            name,
            name_bytes: record.name,
            meta: Mutex::new(meta),
        })
    }

    pub fn created(name: &str, level: CompressionLevel, modified: NaiveDateTime) -> Self {
        let flags = if name.is_ascii() { 0 } else { FLAG_UTF8 };
        let meta = EntryMeta {
            version_made_by: VERSION_MADE_BY,
            version_needed: VERSION_DEFAULT,
            flags,
            method: CompressionMethod::Stored,
            crc32: 0,
            compressed_size: 0,
            uncompressed_size: 0,
            modified: DosDateTime::from_datetime(modified),
            encryption: EncryptionMethod::None,
            extra: Vec::new(),
            comment: Vec::new(),
            internal_attrs: 0,
            external_attrs: 0,
            payload: Payload::Empty,
            level,
            open_for_write: false,
            written: false,
            deleted: false,
        };
        Self {
            name: name.to_string(),
            name_bytes: name.as_bytes().to_vec(),
            meta: Mutex::new(meta),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, EntryMeta> {
        self.meta.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A file or directory inside an [`Archive`](super::Archive).
pub struct Entry<S: Storage> {
    state: Arc<EntryState>,
    archive: Weak<ArchiveCore<S>>,
}

impl<S: Storage> Clone for Entry<S> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            archive: Weak::clone(&self.archive),
        }
    }
}

impl<S: Storage> std::fmt::Debug for Entry<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entry").field("name", &self.state.name).finish()
    }
}

impl<S: Storage> Entry<S> {
    pub(crate) fn new(state: Arc<EntryState>, archive: Weak<ArchiveCore<S>>) -> Self {
        Self { state, archive }
    }

    fn core(&self) -> Result<Arc<ArchiveCore<S>>> {
        let core = self.archive.upgrade().ok_or(Error::Disposed)?;
        core.ensure_live()?;
        Ok(core)
    }

    /// Lock the metadata of a live, undeleted entry.
    fn meta(&self) -> Result<MutexGuard<'_, EntryMeta>> {
        self.core()?;
        let meta = self.state.lock();
        if meta.deleted {
            return Err(Error::EntryDeleted(self.state.name.clone()));
        }
        Ok(meta)
    }

    /// Core of an archive whose mode allows modifications.
    fn mutable_core(&self, what: &str) -> Result<Arc<ArchiveCore<S>>> {
        let core = self.core()?;
        if core.mode == ArchiveMode::Read {
            return Err(Error::not_supported(format!("{} in read mode", what)));
        }
        Ok(core)
    }

    /// Full path of the entry inside the archive.
    pub fn full_name(&self) -> Result<&str> {
        self.core()?;
        Ok(&self.state.name)
    }

    /// Last path component.
    pub fn name(&self) -> Result<&str> {
        let trimmed = self.full_name()?.trim_end_matches('/');
        Ok(trimmed.rsplit('/').next().unwrap_or(trimmed))
    }

    /// Directory entries end with '/'.
    pub fn is_directory(&self) -> Result<bool> {
        Ok(self.full_name()?.ends_with('/'))
    }

    /// Uncompressed size in bytes.
    pub fn length(&self) -> Result<u64> {
        Ok(self.meta()?.uncompressed_size)
    }

    /// Size of the stored (compressed, possibly encrypted) payload.
    pub fn compressed_length(&self) -> Result<u64> {
        Ok(self.meta()?.compressed_size)
    }

    pub fn crc32(&self) -> Result<u32> {
        Ok(self.meta()?.crc32)
    }

    pub fn compression_method(&self) -> Result<CompressionMethod> {
        Ok(self.meta()?.effective_method())
    }

    pub fn last_modified(&self) -> Result<NaiveDateTime> {
        Ok(self.meta()?.modified.to_datetime())
    }

    /// Raw packed date/time as stored in the directory.
    pub fn dos_timestamp(&self) -> Result<DosDateTime> {
        Ok(self.meta()?.modified)
    }

    /// Change the modification time. Not available in read mode.
    pub fn set_last_modified(&self, modified: NaiveDateTime) -> Result<()> {
        self.mutable_core("changing timestamps")?;
        self.meta()?.modified = DosDateTime::from_datetime(modified);
        Ok(())
    }

    pub fn is_encrypted(&self) -> Result<bool> {
        Ok(self.meta()?.encryption.is_encrypted())
    }

    pub fn encryption(&self) -> Result<EncryptionMethod> {
        Ok(self.meta()?.encryption)
    }

    pub fn comment(&self) -> Result<String> {
        let meta = self.meta()?;
        if meta.flags & FLAG_UTF8 != 0 {
            if let Ok(text) = std::str::from_utf8(&meta.comment) {
                return Ok(text.to_string());
            }
        }
        Ok(String::from_utf8_lossy(&meta.comment).into_owned())
    }

    pub fn external_attributes(&self) -> Result<u32> {
        Ok(self.meta()?.external_attrs)
    }

    /// Open a stream over the entry's content.
    ///
    /// - Read mode: read-only, forward-only view of the decompressed bytes.
    ///   Any number of views may be open at once, each with its own cursor.
    /// - Create mode: write-only view; each entry can be written once.
    /// - Update mode: readable, writable and seekable view over the
    ///   decompressed content; one view per entry at a time.
    ///
    /// # Errors
    ///
    /// [`Error::Disposed`] once the archive is gone, [`Error::Encrypted`] for
    /// encrypted payloads, [`Error::UnsupportedCompression`] for methods other
    /// than stored and deflate, [`Error::EntryInUse`] for a second writer.
    pub fn open(&self) -> Result<EntryStream<S>> {
        let core = self.core()?;

        match core.mode {
            ArchiveMode::Read => {
                let meta = self.meta()?;
                let plan = ReadPlan::new(&self.state.name, &meta)?;
                drop(meta);
                let reader = EntryReader::open(&core.storage, plan)?;
                Ok(EntryStream::reader(core, Arc::clone(&self.state), reader))
            }
            ArchiveMode::Create => {
                let mut meta = self.meta()?;
                if meta.open_for_write || meta.written {
                    return Err(Error::EntryInUse(self.state.name.clone()));
                }
                meta.open_for_write = true;
                drop(meta);
                Ok(EntryStream::buffer(core, Arc::clone(&self.state), Vec::new()))
            }
            ArchiveMode::Update => {
                let plan = {
                    let meta = self.meta()?;
                    if meta.open_for_write {
                        return Err(Error::EntryInUse(self.state.name.clone()));
                    }
                    ReadPlan::new(&self.state.name, &meta)?
                };

                let mut content = Vec::with_capacity(plan.uncompressed_size.min(1 << 24) as usize);
                EntryReader::open(&core.storage, plan)?.read_all(&mut content)?;

                let mut meta = self.meta()?;
                if meta.open_for_write {
                    return Err(Error::EntryInUse(self.state.name.clone()));
                }
                meta.open_for_write = true;
                drop(meta);
                Ok(EntryStream::buffer(core, Arc::clone(&self.state), content))
            }
        }
    }

    /// Remove the entry from the archive. Not available in read mode.
    pub fn delete(&self) -> Result<()> {
        let core = self.mutable_core("deleting entries")?;
        let mut meta = self.meta()?;
        if meta.open_for_write {
            return Err(Error::EntryInUse(self.state.name.clone()));
        }
        meta.deleted = true;
        drop(meta);
        core.remove_entry(&self.state);
        log::debug!("deleted entry '{}'", self.state.name);
        Ok(())
    }
}
