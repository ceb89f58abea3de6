//! Per-entry stream views.
//!
//! A view owns nothing but its cursor and codec state. Raw bytes come from
//! positioned reads on the shared storage, so interleaving reads across any
//! number of views never moves another view's position.
//!
//! What a view may do is fixed when it is created, from the archive mode
//! (see [`Capabilities`]); every operation checks the capability first and
//! fails with [`io::ErrorKind::Unsupported`] instead of doing nothing.

use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::mem;
use std::sync::Arc;

use flate2::Crc;

use crate::error::{Error, Result};
use crate::io::Storage;

use super::archive::ArchiveCore;
use super::codec::{self, Decoder};
use super::entry::{EntryMeta, EntryState, Payload};
use super::local_header;
use super::options::ArchiveMode;
use super::structures::CompressionMethod;

/// What a stream view is allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub readable: bool,
    pub writable: bool,
    pub seekable: bool,
}

impl Capabilities {
    pub fn for_mode(mode: ArchiveMode) -> Self {
        match mode {
            ArchiveMode::Read => Self {
                readable: true,
                writable: false,
                seekable: false,
            },
            ArchiveMode::Create => Self {
                readable: false,
                writable: true,
                seekable: false,
            },
            ArchiveMode::Update => Self {
                readable: true,
                writable: true,
                seekable: true,
            },
        }
    }
}

/// Everything needed to decode an entry, copied out of its metadata so no
/// lock is held while reading.
#[derive(Debug, Clone)]
pub(crate) struct ReadPlan {
    pub name: String,
    pub method: CompressionMethod,
    pub payload: Payload,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub crc32: u32,
}

impl ReadPlan {
    pub fn new(name: &str, meta: &EntryMeta) -> Result<Self> {
        if meta.encryption.is_encrypted() {
            return Err(Error::Encrypted(name.to_string()));
        }
        Ok(Self {
            name: name.to_string(),
            method: meta.effective_method(),
            payload: meta.payload.clone(),
            compressed_size: meta.compressed_size,
            uncompressed_size: meta.uncompressed_size,
            crc32: meta.crc32,
        })
    }
}

/// A byte range of storage with a private cursor.
pub(crate) struct RangeReader<S: Storage> {
    storage: Arc<S>,
    pos: u64,
    end: u64,
}

impl<S: Storage> Read for RangeReader<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.end.saturating_sub(self.pos);
        let n = (buf.len() as u64).min(remaining) as usize;
        if n == 0 {
            return Ok(0);
        }
        let read = self.storage.read_at(self.pos, &mut buf[..n])?;
        self.pos += read as u64;
        Ok(read)
    }
}

/// Raw payload bytes, from storage or from a committed buffer.
pub(crate) enum RawSource<S: Storage> {
    Range(RangeReader<S>),
    Memory(Cursor<Arc<[u8]>>),
}

impl<S: Storage> Read for RawSource<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            RawSource::Range(range) => range.read(buf),
            RawSource::Memory(cursor) => cursor.read(buf),
        }
    }
}

/// Decompressed, length-bounded, CRC-checked entry content.
pub(crate) struct EntryReader<S: Storage> {
    decoder: Decoder<RawSource<S>>,
    name: String,
    remaining: u64,
    crc: Crc,
    expected_crc: u32,
}

impl<S: Storage> EntryReader<S> {
    pub fn open(storage: &Arc<S>, plan: ReadPlan) -> Result<Self> {
        let raw = match plan.payload {
            Payload::Storage {
                local_header_offset,
            } => {
                let start = local_header::payload_offset(&**storage, local_header_offset)?;
                RawSource::Range(RangeReader {
                    storage: Arc::clone(storage),
                    pos: start,
                    end: start.saturating_add(plan.compressed_size),
                })
            }
            Payload::Pending(bytes) => RawSource::Memory(Cursor::new(bytes)),
            Payload::Empty => RawSource::Memory(Cursor::new(Arc::from(Vec::new()))),
        };

        Ok(Self {
            decoder: Decoder::new(plan.method, raw)?,
            name: plan.name,
            remaining: plan.uncompressed_size,
            crc: Crc::new(),
            expected_crc: plan.crc32,
        })
    }

    /// Read the whole entry, unwrapping library errors from the I/O layer.
    pub fn read_all(mut self, out: &mut Vec<u8>) -> Result<()> {
        self.read_to_end(out).map(|_| ()).map_err(unwrap_io)
    }
}

impl<S: Storage> Read for EntryReader<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }

        let max = (buf.len() as u64).min(self.remaining) as usize;
        let n = self.decoder.read(&mut buf[..max])?;
        if n == 0 {
            // Payload shorter than declared: end of data, nothing invented.
            log::debug!(
                "'{}' ended {} bytes before its declared length",
                self.name,
                self.remaining
            );
            self.remaining = 0;
            return Ok(0);
        }

        self.crc.update(&buf[..n]);
        self.remaining -= n as u64;
        if self.remaining == 0 && self.crc.sum() != self.expected_crc {
            return Err(Error::ChecksumMismatch {
                name: self.name.clone(),
                expected: self.expected_crc,
                actual: self.crc.sum(),
            }
            .into());
        }
        Ok(n)
    }
}

/// Convert an I/O error back into the library error it carries, if any.
pub(crate) fn unwrap_io(err: io::Error) -> Error {
    if Error::from_io(&err).is_none() {
        return Error::Io(err);
    }
    let kind = err.kind();
    match err.into_inner().map(|inner| inner.downcast::<Error>()) {
        Some(Ok(lib)) => *lib,
        Some(Err(other)) => Error::Io(io::Error::new(kind, other)),
        None => Error::Io(io::Error::from(kind)),
    }
}

enum Body<S: Storage> {
    Reader(EntryReader<S>),
    Buffer { data: Cursor<Vec<u8>>, dirty: bool },
}

/// An open view over one entry. See [`Entry::open`](super::Entry::open).
///
/// Writable views commit their content when closed with
/// [`EntryStream::close`] or when dropped.
pub struct EntryStream<S: Storage> {
    core: Arc<ArchiveCore<S>>,
    entry: Arc<EntryState>,
    caps: Capabilities,
    body: Body<S>,
    finished: bool,
}

impl<S: Storage> EntryStream<S> {
    pub(crate) fn reader(
        core: Arc<ArchiveCore<S>>,
        entry: Arc<EntryState>,
        reader: EntryReader<S>,
    ) -> Self {
        let caps = Capabilities::for_mode(core.mode);
        Self {
            core,
            entry,
            caps,
            body: Body::Reader(reader),
            finished: false,
        }
    }

    pub(crate) fn buffer(core: Arc<ArchiveCore<S>>, entry: Arc<EntryState>, content: Vec<u8>) -> Self {
        let caps = Capabilities::for_mode(core.mode);
        // A created entry is committed even if nothing is written to it.
        let dirty = core.mode == ArchiveMode::Create;
        Self {
            core,
            entry,
            caps,
            body: Body::Buffer {
                data: Cursor::new(content),
                dirty,
            },
            finished: false,
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        self.caps
    }

    pub fn can_read(&self) -> bool {
        self.caps.readable
    }

    pub fn can_write(&self) -> bool {
        self.caps.writable
    }

    pub fn can_seek(&self) -> bool {
        self.caps.seekable
    }

    /// Name of the entry this view belongs to.
    pub fn entry_name(&self) -> &str {
        &self.entry.name
    }

    fn check(&self, allowed: bool, what: &str) -> io::Result<()> {
        if !allowed {
            return Err(Error::not_supported(format!("{} on this entry stream", what)).into());
        }
        if self.finished {
            return Err(Error::not_supported(format!("{} on a closed entry stream", what)).into());
        }
        self.core.ensure_live()?;
        Ok(())
    }

    /// Current content length. Seekable views only.
    pub fn len(&self) -> io::Result<u64> {
        self.check(self.caps.seekable, "length")?;
        match &self.body {
            Body::Buffer { data, .. } => Ok(data.get_ref().len() as u64),
            Body::Reader(_) => Err(Error::not_supported("length").into()),
        }
    }

    pub fn is_empty(&self) -> io::Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Truncate or zero-extend the content. Writable, seekable views only.
    pub fn set_len(&mut self, len: u64) -> io::Result<()> {
        self.check(self.caps.writable && self.caps.seekable, "set_len")?;
        let len = usize::try_from(len)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "length too large"))?;
        match &mut self.body {
            Body::Buffer { data, dirty } => {
                data.get_mut().resize(len, 0);
                *dirty = true;
                Ok(())
            }
            Body::Reader(_) => Err(Error::not_supported("set_len").into()),
        }
    }

    /// Finish the view, committing written content to the entry.
    pub fn close(mut self) -> Result<()> {
        self.commit()
    }

    fn commit(&mut self) -> Result<()> {
        if mem::replace(&mut self.finished, true) {
            return Ok(());
        }
        let Body::Buffer { data, dirty } = &mut self.body else {
            return Ok(());
        };

        let mut meta = self.entry.lock();
        meta.open_for_write = false;
        if !*dirty {
            return Ok(());
        }
        if self.core.is_disposed() {
            return Err(Error::Disposed);
        }

        let content = mem::take(data.get_mut());
        let compressed = codec::compress(&content, meta.level)?;
        log::trace!(
            "committed '{}': {} bytes, {} compressed",
            self.entry.name,
            content.len(),
            compressed.data.len()
        );
        meta.apply_content(compressed, content.len() as u64);
        Ok(())
    }
}

impl<S: Storage> Read for EntryStream<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.check(self.caps.readable, "read")?;
        match &mut self.body {
            Body::Reader(reader) => reader.read(buf),
            Body::Buffer { data, .. } => data.read(buf),
        }
    }
}

impl<S: Storage> Write for EntryStream<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.check(self.caps.writable, "write")?;
        match &mut self.body {
            Body::Buffer { data, dirty } => {
                *dirty = true;
                data.write(buf)
            }
            Body::Reader(_) => Err(Error::not_supported("write").into()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.check(self.caps.writable, "flush")
    }
}

impl<S: Storage> Seek for EntryStream<S> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.check(self.caps.seekable, "seek")?;
        match &mut self.body {
            Body::Buffer { data, .. } => data.seek(pos),
            Body::Reader(_) => Err(Error::not_supported("seek").into()),
        }
    }
}

impl<S: Storage> Drop for EntryStream<S> {
    fn drop(&mut self) {
        if let Err(e) = self.commit() {
            log::warn!("discarding writes to '{}': {}", self.entry.name, e);
        }
    }
}
