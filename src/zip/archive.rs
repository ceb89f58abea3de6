//! The archive object: storage ownership, entry table and lifecycle.
//!
//! An archive is Open in one [`ArchiveMode`] until it is disposed, which
//! happens exactly once. Disposing writes pending changes back (Create and
//! Update modes) and closes the storage unless `leave_open` was requested.
//! Repeated dispose calls do nothing.

use chrono::Local;
use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{Error, Result};
use crate::io::{LocalFile, MemoryStorage, Storage};

use super::directory::CentralDirectoryReader;
use super::entry::{Entry, EntryState};
use super::locator;
use super::options::{ArchiveMode, ArchiveOptions, CompressionLevel};
use super::writer;

/// State shared by the archive, its entries and open streams.
pub(crate) struct ArchiveCore<S: Storage> {
    pub storage: Arc<S>,
    pub mode: ArchiveMode,
    pub options: ArchiveOptions,
    /// Where the archive starts within storage.
    pub base_offset: u64,
    pub comment: Vec<u8>,
    entries: Mutex<Vec<Arc<EntryState>>>,
    disposed: AtomicBool,
}

impl<S: Storage> ArchiveCore<S> {
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    pub fn ensure_live(&self) -> Result<()> {
        if self.is_disposed() {
            return Err(Error::Disposed);
        }
        Ok(())
    }

    fn table(&self) -> MutexGuard<'_, Vec<Arc<EntryState>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the entry table, in directory order.
    pub fn entry_states(&self) -> Vec<Arc<EntryState>> {
        self.table().clone()
    }

    pub fn remove_entry(&self, state: &Arc<EntryState>) {
        self.table().retain(|e| !Arc::ptr_eq(e, state));
    }
}

/// A ZIP archive over a [`Storage`].
///
/// ```no_run
/// use std::io::Read;
/// use std::sync::Arc;
/// use razip::{Archive, ArchiveOptions, LocalFile};
///
/// let storage = Arc::new(LocalFile::open("archive.zip".as_ref())?);
/// let archive = Archive::open(storage, ArchiveOptions::default())?;
/// for entry in archive.entries()? {
///     let mut content = Vec::new();
///     entry.open()?.read_to_end(&mut content)?;
///     println!("{}: {} bytes", entry.full_name()?, content.len());
/// }
/// archive.dispose()?;
/// # Ok::<(), razip::Error>(())
/// ```
pub struct Archive<S: Storage> {
    core: Arc<ArchiveCore<S>>,
}

impl<S: Storage> Archive<S> {
    /// Open for reading, closing the storage on dispose.
    pub fn new(storage: Arc<S>) -> Result<Self> {
        Self::open(storage, ArchiveOptions::default())
    }

    /// Open an archive over `storage`.
    ///
    /// Read and Update parse the central directory immediately; any
    /// corruption fails here rather than on first use. Update over empty
    /// storage starts a new archive. Create never reads the storage.
    ///
    /// # Errors
    ///
    /// [`Error::CorruptArchive`] for unparseable directories,
    /// [`Error::NotSupported`] when Create/Update is asked of read-only
    /// storage.
    pub fn open(storage: Arc<S>, options: ArchiveOptions) -> Result<Self> {
        if options.mode != ArchiveMode::Read && !storage.is_writable() {
            return Err(Error::not_supported(format!(
                "{:?} mode needs writable storage",
                options.mode
            )));
        }

        let size = storage.size()?;
        let (entries, base_offset, comment) = match options.mode {
            ArchiveMode::Create => (Vec::new(), 0, Vec::new()),
            ArchiveMode::Update if size == 0 => (Vec::new(), 0, Vec::new()),
            ArchiveMode::Read | ArchiveMode::Update => read_directory(&*storage, size, &options)?,
        };

        log::debug!(
            "opened archive in {:?} mode with {} entries",
            options.mode,
            entries.len()
        );

        Ok(Self {
            core: Arc::new(ArchiveCore {
                storage,
                mode: options.mode,
                base_offset,
                comment,
                entries: Mutex::new(entries),
                disposed: AtomicBool::new(false),
                options,
            }),
        })
    }

    pub fn mode(&self) -> ArchiveMode {
        self.core.mode
    }

    pub fn is_disposed(&self) -> bool {
        self.core.is_disposed()
    }

    /// The underlying storage.
    pub fn storage(&self) -> &Arc<S> {
        &self.core.storage
    }

    fn handle(&self, state: Arc<EntryState>) -> Entry<S> {
        Entry::new(state, Arc::downgrade(&self.core))
    }

    /// All entries in central directory order.
    pub fn entries(&self) -> Result<Vec<Entry<S>>> {
        self.core.ensure_live()?;
        Ok(self
            .core
            .entry_states()
            .into_iter()
            .map(|state| self.handle(state))
            .collect())
    }

    pub fn len(&self) -> Result<usize> {
        self.core.ensure_live()?;
        Ok(self.core.table().len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// First entry with exactly this full name.
    pub fn entry(&self, name: &str) -> Result<Option<Entry<S>>> {
        self.core.ensure_live()?;
        let found = self
            .core
            .table()
            .iter()
            .find(|state| state.name == name)
            .cloned();
        Ok(found.map(|state| self.handle(state)))
    }

    /// Archive comment from the end of central directory record.
    pub fn comment(&self) -> Result<String> {
        self.core.ensure_live()?;
        Ok(String::from_utf8_lossy(&self.core.comment).into_owned())
    }

    /// Add an entry compressed at the archive's default level.
    pub fn create_entry(&self, name: &str) -> Result<Entry<S>> {
        self.create_entry_with_level(name, self.core.options.compression)
    }

    /// Add an empty entry. Not available in read mode.
    ///
    /// The entry's timestamp is the current local time.
    pub fn create_entry_with_level(&self, name: &str, level: CompressionLevel) -> Result<Entry<S>> {
        self.core.ensure_live()?;
        if self.core.mode == ArchiveMode::Read {
            return Err(Error::not_supported("creating entries in read mode"));
        }
        if name.is_empty() || name.len() > u16::MAX as usize {
            return Err(Error::InvalidName(name.to_string()));
        }

        let state = Arc::new(EntryState::created(name, level, Local::now().naive_local()));
        self.core.table().push(Arc::clone(&state));
        log::debug!("created entry '{}'", name);
        Ok(self.handle(state))
    }

    /// Dispose the archive.
    ///
    /// The first call writes pending changes (Create/Update), then closes
    /// the storage unless `leave_open` was set. Later calls return `Ok(())`.
    /// Afterwards every archive, entry and stream operation fails with
    /// [`Error::Disposed`].
    pub fn dispose(&self) -> Result<()> {
        if self.core.disposed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let written = match self.core.mode {
            ArchiveMode::Read => Ok(()),
            ArchiveMode::Create | ArchiveMode::Update => writer::write_archive(&self.core),
        };

        let closed = if self.core.options.leave_open {
            Ok(())
        } else {
            self.core.storage.close().map_err(Error::from)
        };

        log::debug!("disposed archive ({:?} mode)", self.core.mode);
        written.and(closed)
    }
}

impl<S: Storage> Drop for Archive<S> {
    fn drop(&mut self) {
        if let Err(e) = self.dispose() {
            log::warn!("failed to dispose archive: {}", e);
        }
    }
}

impl Archive<LocalFile> {
    /// Open a file on disk with the access the mode needs.
    pub fn open_path(path: impl AsRef<Path>, options: ArchiveOptions) -> Result<Self> {
        let path = path.as_ref();
        let file = match options.mode {
            ArchiveMode::Read => LocalFile::open(path)?,
            ArchiveMode::Update => LocalFile::open_rw(path)?,
            ArchiveMode::Create => LocalFile::create(path)?,
        };
        Self::open(Arc::new(file), options)
    }
}

impl Archive<MemoryStorage> {
    /// Read an archive from a forward-only source.
    ///
    /// The source is drained into memory and dropped before parsing, so it
    /// is fully consumed by the time this returns. Only read mode is
    /// possible.
    pub fn from_stream<R: Read>(mut stream: R, options: ArchiveOptions) -> Result<Self> {
        if options.mode != ArchiveMode::Read {
            return Err(Error::not_supported(
                "forward-only sources can only be opened for reading",
            ));
        }
        let mut data = Vec::new();
        stream.read_to_end(&mut data)?;
        drop(stream);
        log::trace!("buffered {} bytes from a forward-only source", data.len());
        Self::open(Arc::new(MemoryStorage::new(data)), options)
    }
}

type ParsedDirectory = (Vec<Arc<EntryState>>, u64, Vec<u8>);

fn read_directory<S: Storage + ?Sized>(
    storage: &S,
    size: u64,
    options: &ArchiveOptions,
) -> Result<ParsedDirectory> {
    let location = locator::locate(storage, size)?;
    let mut reader = CentralDirectoryReader::new(storage, &location, options.directory_buffer_size);
    let records = reader.read_records(location.entry_count)?;
    log::trace!(
        "read {} directory records with {} window fills",
        records.len(),
        reader.refills()
    );

    let entries = records
        .into_iter()
        .map(|record| EntryState::from_record(record, &location, size).map(Arc::new))
        .collect::<Result<Vec<_>>>()?;

    Ok((entries, location.base_offset, location.comment))
}
