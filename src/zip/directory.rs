//! Streaming the central directory through a bounded window.
//!
//! The directory is never loaded whole. Records are pulled from a
//! fixed-capacity buffer that is refilled on demand; when a record straddles
//! the end of the window the unread tail is moved to the front and the rest
//! is read behind it, so parsing code always sees contiguous bytes.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

use crate::error::{Error, Result};
use crate::io::Storage;

use super::locator::DirectoryLocation;
use super::structures::{CentralDirectoryHeader, ExtraFields, FLAG_UTF8, ZIP64_EXTRA_ID};

/// Default window size.
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// One central directory record with its variable-length blocks.
#[derive(Debug, Clone)]
pub struct DirectoryRecord {
    pub header: CentralDirectoryHeader,
    pub name: Vec<u8>,
    pub extra: Vec<u8>,
    pub comment: Vec<u8>,
}

/// Sizes and offset after applying the ZIP64 extended information field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedSizes {
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub local_header_offset: u64,
}

impl DirectoryRecord {
    /// Entry name, UTF-8 when flag bit 11 says so, lossy otherwise.
    pub fn decoded_name(&self) -> String {
        decode_text(&self.name, self.header.flags)
    }

    pub fn decoded_comment(&self) -> String {
        decode_text(&self.comment, self.header.flags)
    }

    /// Replace saturated 32-bit fields with their ZIP64 values.
    ///
    /// Fields are present in the 0x0001 extra only when the corresponding
    /// header field is 0xFFFFFFFF, in the order uncompressed, compressed,
    /// local header offset.
    pub fn resolve_sizes(&self) -> Result<ResolvedSizes> {
        let h = &self.header;
        let mut sizes = ResolvedSizes {
            compressed_size: h.compressed_size as u64,
            uncompressed_size: h.uncompressed_size as u64,
            local_header_offset: h.local_header_offset as u64,
        };

        let needs_zip64 = h.uncompressed_size == u32::MAX
            || h.compressed_size == u32::MAX
            || h.local_header_offset == u32::MAX;
        if !needs_zip64 {
            return Ok(sizes);
        }
        let Some(body) = ExtraFields::find(&self.extra, ZIP64_EXTRA_ID) else {
            return Ok(sizes);
        };

        let mut cursor = Cursor::new(body);
        let mut next = |what: &str| {
            cursor.read_u64::<LittleEndian>().map_err(|_| {
                Error::corrupt(format!(
                    "zip64 extra field of '{}' lacks {}",
                    self.decoded_name(),
                    what
                ))
            })
        };
        if h.uncompressed_size == u32::MAX {
            sizes.uncompressed_size = next("uncompressed size")?;
        }
        if h.compressed_size == u32::MAX {
            sizes.compressed_size = next("compressed size")?;
        }
        if h.local_header_offset == u32::MAX {
            sizes.local_header_offset = next("local header offset")?;
        }
        Ok(sizes)
    }
}

fn decode_text(bytes: &[u8], flags: u16) -> String {
    if flags & FLAG_UTF8 != 0 {
        if let Ok(text) = std::str::from_utf8(bytes) {
            return text.to_string();
        }
    }
    String::from_utf8_lossy(bytes).into_owned()
}

/// Sequential reader of central directory records.
pub struct CentralDirectoryReader<'a, S: Storage + ?Sized> {
    storage: &'a S,
    next_offset: u64,
    end: u64,
    buf: Vec<u8>,
    pos: usize,
    filled: usize,
    refills: usize,
}

impl<'a, S: Storage + ?Sized> CentralDirectoryReader<'a, S> {
    /// `capacity` is raised to at least one fixed record.
    pub fn new(storage: &'a S, location: &DirectoryLocation, capacity: usize) -> Self {
        let capacity = capacity.max(CentralDirectoryHeader::SIZE);
        Self {
            storage,
            next_offset: location.directory_offset,
            end: location.directory_offset + location.directory_size,
            buf: vec![0u8; capacity],
            pos: 0,
            filled: 0,
            refills: 0,
        }
    }

    /// How many times the window was (re)filled from storage.
    pub fn refills(&self) -> usize {
        self.refills
    }

    /// Read `count` records in directory order.
    pub fn read_records(&mut self, count: u64) -> Result<Vec<DirectoryRecord>> {
        // The count comes from the archive; cap the up-front allocation.
        let mut records = Vec::with_capacity(count.min(1 << 16) as usize);
        for _ in 0..count {
            records.push(self.next_record()?);
        }
        Ok(records)
    }

    /// Parse the next record.
    pub fn next_record(&mut self) -> Result<DirectoryRecord> {
        let header = CentralDirectoryHeader::from_bytes(self.take(CentralDirectoryHeader::SIZE)?)?;

        let name_len = header.file_name_length as usize;
        let extra_len = header.extra_field_length as usize;
        let variable = self.take(header.variable_len())?;

        let name = variable[..name_len].to_vec();
        let extra = variable[name_len..name_len + extra_len].to_vec();
        let comment = variable[name_len + extra_len..].to_vec();

        Ok(DirectoryRecord {
            header,
            name,
            extra,
            comment,
        })
    }

    /// Consume exactly `n` contiguous bytes.
    fn take(&mut self, n: usize) -> Result<&[u8]> {
        self.fill(n)?;
        let start = self.pos;
        self.pos += n;
        Ok(&self.buf[start..start + n])
    }

    /// Make sure `n` unread bytes sit contiguously in the window.
    fn fill(&mut self, n: usize) -> Result<()> {
        if self.filled - self.pos >= n {
            return Ok(());
        }

        // Keep the partially consumed tail.
        self.buf.copy_within(self.pos..self.filled, 0);
        self.filled -= self.pos;
        self.pos = 0;
        if n > self.buf.len() {
            self.buf.resize(n, 0);
        }

        while self.filled < n {
            let room = (self.buf.len() - self.filled) as u64;
            let want = room.min(self.end - self.next_offset) as usize;
            if want == 0 {
                return Err(Error::corrupt("central directory ends inside a record"));
            }
            let read = self
                .storage
                .read_at(self.next_offset, &mut self.buf[self.filled..self.filled + want])?;
            if read == 0 {
                return Err(Error::corrupt("storage ends inside the central directory"));
            }
            self.filled += read;
            self.next_offset += read as u64;
            self.refills += 1;
            log::trace!(
                "directory window refilled with {} bytes ({} buffered)",
                read,
                self.filled
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryStorage;

    fn record_bytes(name: &str, extra: &[u8], comment: &[u8]) -> Vec<u8> {
        let header = CentralDirectoryHeader {
            file_name_length: name.len() as u16,
            extra_field_length: extra.len() as u16,
            file_comment_length: comment.len() as u16,
            flags: FLAG_UTF8,
            ..Default::default()
        };
        let mut out = Vec::new();
        header.write_to(&mut out).unwrap();
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(extra);
        out.extend_from_slice(comment);
        out
    }

    fn location(len: usize, count: u64) -> DirectoryLocation {
        DirectoryLocation {
            entry_count: count,
            directory_offset: 0,
            directory_size: len as u64,
            base_offset: 0,
            end_record_offset: len as u64,
            comment: Vec::new(),
        }
    }

    #[test]
    fn records_spanning_refills_parse_in_order() {
        let mut directory = Vec::new();
        for i in 0..20 {
            let name = format!("dir/entry-{:02}.txt", i);
            directory.extend(record_bytes(&name, &[0u8; 13], b"c"));
        }
        let storage = MemoryStorage::new(directory.clone());
        let loc = location(directory.len(), 20);

        // Smaller than one record plus its name: every record straddles.
        let mut reader = CentralDirectoryReader::new(&storage, &loc, 50);
        let records = reader.read_records(20).unwrap();
        assert!(reader.refills() > 20);
        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.decoded_name(), format!("dir/entry-{:02}.txt", i));
            assert_eq!(record.extra.len(), 13);
            assert_eq!(record.comment, b"c");
        }
    }

    #[test]
    fn variable_block_larger_than_window_grows_it() {
        let long_name = "n".repeat(300);
        let directory = record_bytes(&long_name, &[], &[]);
        let storage = MemoryStorage::new(directory.clone());
        let loc = location(directory.len(), 1);
        let mut reader = CentralDirectoryReader::new(&storage, &loc, 64);
        assert_eq!(reader.next_record().unwrap().decoded_name(), long_name);
    }

    #[test]
    fn short_directory_is_corrupt() {
        let directory = record_bytes("a.txt", &[], &[]);
        let storage = MemoryStorage::new(directory.clone());
        let loc = location(directory.len() - 2, 1);
        let mut reader = CentralDirectoryReader::new(&storage, &loc, 4096);
        assert!(matches!(reader.next_record(), Err(Error::CorruptArchive(_))));
    }

    #[test]
    fn zip64_extra_replaces_saturated_fields() {
        let mut extra = vec![0x01, 0x00, 0x10, 0x00];
        extra.extend_from_slice(&5_000_000_000u64.to_le_bytes());
        extra.extend_from_slice(&4_900_000_000u64.to_le_bytes());
        let record = DirectoryRecord {
            header: CentralDirectoryHeader {
                uncompressed_size: u32::MAX,
                compressed_size: u32::MAX,
                local_header_offset: 12,
                ..Default::default()
            },
            name: b"big.bin".to_vec(),
            extra,
            comment: Vec::new(),
        };
        let sizes = record.resolve_sizes().unwrap();
        assert_eq!(sizes.uncompressed_size, 5_000_000_000);
        assert_eq!(sizes.compressed_size, 4_900_000_000);
        assert_eq!(sizes.local_header_offset, 12);
    }

    #[test]
    fn non_utf8_names_decode_lossily() {
        let record = DirectoryRecord {
            header: CentralDirectoryHeader::default(),
            name: vec![b'a', 0xFF, b'b'],
            extra: Vec::new(),
            comment: Vec::new(),
        };
        assert_eq!(record.decoded_name(), "a\u{FFFD}b");
    }
}
