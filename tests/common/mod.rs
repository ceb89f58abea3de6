//! Shared test utilities for integration tests.
//!
//! Archives are assembled byte by byte here rather than with the crate's own
//! writer, so reading tests do not depend on the code they check.
//!
//! Note: `#![allow(dead_code)]` is required because each integration test file
//! compiles as a separate crate and may only use a subset of these helpers.

#![allow(dead_code)]

use std::io::{self, Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use flate2::Compression;
use flate2::write::DeflateEncoder;

use razip::{Archive, ArchiveOptions, MemoryStorage, Storage};

pub const STORED: u16 = 0;
pub const DEFLATE: u16 = 8;

/// 2021-06-15 13:45:30 packed as (date, time).
pub const JUNE_2021: (u16, u16) = (((2021 - 1980) << 9) | (6 << 5) | 15, (13 << 11) | (45 << 5) | 15);

pub fn crc32(data: &[u8]) -> u32 {
    let mut crc = flate2::Crc::new();
    crc.update(data);
    crc.sum()
}

pub fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).expect("deflate into Vec");
    encoder.finish().expect("deflate into Vec")
}

/// One entry as it will be laid out by [`ZipBuilder`].
#[derive(Debug, Clone)]
pub struct TestEntry {
    pub name: String,
    pub content: Vec<u8>,
    pub method: u16,
    pub flags: u16,
    pub extra: Vec<u8>,
    pub date: u16,
    pub time: u16,
    pub comment: Vec<u8>,
    /// Overrides the computed CRC-32.
    pub crc: Option<u32>,
    /// Raw payload bytes to store instead of encoding `content`.
    pub raw: Option<Vec<u8>>,
}

impl TestEntry {
    pub fn new(name: &str, content: &[u8]) -> Self {
        Self {
            name: name.to_string(),
            content: content.to_vec(),
            method: DEFLATE,
            flags: 0,
            extra: Vec::new(),
            date: JUNE_2021.0,
            time: JUNE_2021.1,
            comment: Vec::new(),
            crc: None,
            raw: None,
        }
    }

    pub fn stored(name: &str, content: &[u8]) -> Self {
        Self::new(name, content).method(STORED)
    }

    pub fn method(mut self, method: u16) -> Self {
        self.method = method;
        self
    }

    pub fn flags(mut self, flags: u16) -> Self {
        self.flags = flags;
        self
    }

    pub fn extra(mut self, extra: Vec<u8>) -> Self {
        self.extra = extra;
        self
    }

    pub fn timestamp(mut self, date: u16, time: u16) -> Self {
        self.date = date;
        self.time = time;
        self
    }

    pub fn comment(mut self, comment: &str) -> Self {
        self.comment = comment.as_bytes().to_vec();
        self
    }

    pub fn crc(mut self, crc: u32) -> Self {
        self.crc = Some(crc);
        self
    }

    pub fn raw(mut self, raw: Vec<u8>) -> Self {
        self.raw = Some(raw);
        self
    }

    fn payload(&self) -> Vec<u8> {
        if let Some(raw) = &self.raw {
            return raw.clone();
        }
        match self.method {
            DEFLATE => deflate(&self.content),
            _ => self.content.clone(),
        }
    }
}

/// Builds ZIP images, optionally wrapped in unrelated leading/trailing bytes.
#[derive(Debug, Default)]
pub struct ZipBuilder {
    prefix: Vec<u8>,
    suffix: Vec<u8>,
    comment: Vec<u8>,
    entries: Vec<TestEntry>,
}

impl ZipBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(mut self, entry: TestEntry) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn prefix(mut self, prefix: &[u8]) -> Self {
        self.prefix = prefix.to_vec();
        self
    }

    pub fn suffix(mut self, suffix: &[u8]) -> Self {
        self.suffix = suffix.to_vec();
        self
    }

    pub fn comment(mut self, comment: &str) -> Self {
        self.comment = comment.as_bytes().to_vec();
        self
    }

    pub fn build(&self) -> Vec<u8> {
        // Offsets are recorded relative to the start of the archive proper,
        // as a self-extractor stub would leave them.
        let mut body = Vec::new();
        let mut central = Vec::new();

        for entry in &self.entries {
            let payload = entry.payload();
            let crc = entry.crc.unwrap_or_else(|| crc32(&entry.content));
            let offset = body.len() as u32;

            body.extend_from_slice(&0x0403_4b50u32.to_le_bytes());
            body.extend_from_slice(&20u16.to_le_bytes());
            body.extend_from_slice(&entry.flags.to_le_bytes());
            body.extend_from_slice(&entry.method.to_le_bytes());
            body.extend_from_slice(&entry.time.to_le_bytes());
            body.extend_from_slice(&entry.date.to_le_bytes());
            body.extend_from_slice(&crc.to_le_bytes());
            body.extend_from_slice(&(payload.len() as u32).to_le_bytes());
            body.extend_from_slice(&(entry.content.len() as u32).to_le_bytes());
            body.extend_from_slice(&(entry.name.len() as u16).to_le_bytes());
            body.extend_from_slice(&(entry.extra.len() as u16).to_le_bytes());
            body.extend_from_slice(entry.name.as_bytes());
            body.extend_from_slice(&entry.extra);
            body.extend_from_slice(&payload);

            central.extend_from_slice(&0x0201_4b50u32.to_le_bytes());
            central.extend_from_slice(&20u16.to_le_bytes());
            central.extend_from_slice(&20u16.to_le_bytes());
            central.extend_from_slice(&entry.flags.to_le_bytes());
            central.extend_from_slice(&entry.method.to_le_bytes());
            central.extend_from_slice(&entry.time.to_le_bytes());
            central.extend_from_slice(&entry.date.to_le_bytes());
            central.extend_from_slice(&crc.to_le_bytes());
            central.extend_from_slice(&(payload.len() as u32).to_le_bytes());
            central.extend_from_slice(&(entry.content.len() as u32).to_le_bytes());
            central.extend_from_slice(&(entry.name.len() as u16).to_le_bytes());
            central.extend_from_slice(&(entry.extra.len() as u16).to_le_bytes());
            central.extend_from_slice(&(entry.comment.len() as u16).to_le_bytes());
            central.extend_from_slice(&0u16.to_le_bytes()); // disk number start
            central.extend_from_slice(&0u16.to_le_bytes()); // internal attributes
            central.extend_from_slice(&0u32.to_le_bytes()); // external attributes
            central.extend_from_slice(&offset.to_le_bytes());
            central.extend_from_slice(entry.name.as_bytes());
            central.extend_from_slice(&entry.extra);
            central.extend_from_slice(&entry.comment);
        }

        let cd_offset = body.len() as u32;
        let count = self.entries.len() as u16;
        body.extend_from_slice(&central);

        body.extend_from_slice(&0x0605_4b50u32.to_le_bytes());
        body.extend_from_slice(&0u16.to_le_bytes());
        body.extend_from_slice(&0u16.to_le_bytes());
        body.extend_from_slice(&count.to_le_bytes());
        body.extend_from_slice(&count.to_le_bytes());
        body.extend_from_slice(&(central.len() as u32).to_le_bytes());
        body.extend_from_slice(&cd_offset.to_le_bytes());
        body.extend_from_slice(&(self.comment.len() as u16).to_le_bytes());
        body.extend_from_slice(&self.comment);

        let mut out = self.prefix.clone();
        out.extend_from_slice(&body);
        out.extend_from_slice(&self.suffix);
        out
    }
}

/// WinZip AES extra field (0x9901).
pub fn aes_extra(strength: u8, actual_method: u16) -> Vec<u8> {
    let mut extra = Vec::new();
    extra.extend_from_slice(&0x9901u16.to_le_bytes());
    extra.extend_from_slice(&7u16.to_le_bytes());
    extra.extend_from_slice(&2u16.to_le_bytes());
    extra.extend_from_slice(b"AE");
    extra.push(strength);
    extra.extend_from_slice(&actual_method.to_le_bytes());
    extra
}

/// PKWARE strong encryption header (0x0017).
pub fn strong_extra(algorithm: u16, bits: u16) -> Vec<u8> {
    let mut extra = Vec::new();
    extra.extend_from_slice(&0x0017u16.to_le_bytes());
    extra.extend_from_slice(&8u16.to_le_bytes());
    extra.extend_from_slice(&2u16.to_le_bytes());
    extra.extend_from_slice(&algorithm.to_le_bytes());
    extra.extend_from_slice(&bits.to_le_bytes());
    extra.extend_from_slice(&0u16.to_le_bytes());
    extra
}

/// Text that deflates well but is not trivially repetitive.
pub fn sample_text(seed: usize, len: usize) -> Vec<u8> {
    (0..len)
        .map(|i| b"abcdefghij klmnop\n"[(i * 7 + seed * 13 + i / 31) % 18])
        .collect()
}

pub fn open_bytes(bytes: Vec<u8>) -> Archive<MemoryStorage> {
    Archive::open(Arc::new(MemoryStorage::new(bytes)), ArchiveOptions::default())
        .expect("open test archive")
}

/// Storage wrapper counting positioned reads and close calls.
pub struct CountingStorage<S> {
    inner: S,
    pub closes: AtomicUsize,
    pub reads: AtomicUsize,
}

impl<S: Storage> CountingStorage<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            closes: AtomicUsize::new(0),
            reads: AtomicUsize::new(0),
        }
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: Storage> Storage for CountingStorage<S> {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.read_at(offset, buf)
    }

    fn size(&self) -> io::Result<u64> {
        self.inner.size()
    }

    fn is_writable(&self) -> bool {
        self.inner.is_writable()
    }

    fn write_at(&self, offset: u64, buf: &[u8]) -> io::Result<usize> {
        self.inner.write_at(offset, buf)
    }

    fn set_len(&self, len: u64) -> io::Result<()> {
        self.inner.set_len(len)
    }

    fn close(&self) -> io::Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.inner.close()
    }
}

/// Forward-only reader that records whether it has been dropped.
pub struct TrackedReader {
    data: io::Cursor<Vec<u8>>,
    pub dropped: Arc<AtomicUsize>,
}

impl TrackedReader {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data: io::Cursor::new(data),
            dropped: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl Read for TrackedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.data.read(buf)
    }
}

impl Drop for TrackedReader {
    fn drop(&mut self) {
        self.dropped.fetch_add(1, Ordering::SeqCst);
    }
}

/// Read an entry to the end through its stream.
pub fn read_entry<S: Storage>(archive: &Archive<S>, name: &str) -> Vec<u8> {
    let entry = archive
        .entry(name)
        .expect("archive is live")
        .unwrap_or_else(|| panic!("missing entry {}", name));
    let mut out = Vec::new();
    entry
        .open()
        .expect("open entry")
        .read_to_end(&mut out)
        .expect("read entry");
    out
}
