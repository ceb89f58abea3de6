//! Locating the central directory from the tail of the archive.
//!
//! ZIP files are designed to be read from the end:
//! 1. Find the End of Central Directory (EOCD) near the end of storage
//! 2. If ZIP64, follow the locator to the ZIP64 EOCD
//! 3. Work out where the directory really starts, which also yields the
//!    base offset: the number of bytes prepended before the archive
//!    (self-extracting stubs, concatenation). Every offset read from the
//!    directory or a local header is shifted by it.

use crate::error::{Error, Result};
use crate::io::Storage;

use super::structures::{CentralDirectoryHeader, EndOfCentralDirectory, Zip64Eocd, Zip64EocdLocator};

/// Maximum ZIP comment size allowed by the format (65535 bytes).
///
/// This bounds the tail window searched for the EOCD signature, and with it
/// the amount of appended data the engine tolerates.
pub const MAX_COMMENT_SIZE: u64 = 65535;

/// Where the central directory lives, in absolute storage offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryLocation {
    pub entry_count: u64,
    pub directory_offset: u64,
    pub directory_size: u64,
    /// Start of the archive within storage; add to recorded offsets.
    pub base_offset: u64,
    pub end_record_offset: u64,
    pub comment: Vec<u8>,
}

impl DirectoryLocation {
    /// Translate an offset recorded in the archive into a storage offset.
    pub fn resolve(&self, recorded: u64) -> Option<u64> {
        recorded.checked_add(self.base_offset)
    }
}

/// Find the EOCD record and the central directory it describes.
///
/// # Errors
///
/// [`Error::CorruptArchive`] when no plausible EOCD exists in the tail
/// window or the directory does not fit in front of it.
pub fn locate<S: Storage + ?Sized>(storage: &S, size: u64) -> Result<DirectoryLocation> {
    let (eocd, eocd_offset, comment) = find_eocd(storage, size)?;

    if eocd.disk_number != eocd.disk_with_cd || eocd.disk_entries != eocd.total_entries {
        return Err(Error::not_supported("split (multi-disk) archives"));
    }

    let zip64 = if eocd.is_zip64() {
        read_zip64_eocd(storage, eocd_offset)?
    } else {
        None
    };

    let (entry_count, directory_size, recorded_offset, directory_end) = match zip64 {
        Some((record, record_offset)) => (
            record.total_entries,
            record.cd_size,
            record.cd_offset,
            record_offset,
        ),
        None => (
            eocd.total_entries as u64,
            eocd.cd_size as u64,
            eocd.cd_offset as u64,
            eocd_offset,
        ),
    };

    let directory_offset = directory_end.checked_sub(directory_size).ok_or_else(|| {
        Error::corrupt(format!(
            "central directory size {} exceeds its end offset {}",
            directory_size, directory_end
        ))
    })?;

    let base_offset = directory_offset.checked_sub(recorded_offset).ok_or_else(|| {
        Error::corrupt(format!(
            "central directory recorded at {} but ends at {}",
            recorded_offset, directory_end
        ))
    })?;

    if entry_count.saturating_mul(CentralDirectoryHeader::SIZE as u64) > directory_size {
        return Err(Error::corrupt(format!(
            "{} entries cannot fit in a {} byte central directory",
            entry_count, directory_size
        )));
    }

    if base_offset > 0 {
        log::debug!("archive starts {} bytes into storage", base_offset);
    }
    log::trace!(
        "central directory: {} entries, {} bytes at {}",
        entry_count,
        directory_size,
        directory_offset
    );

    Ok(DirectoryLocation {
        entry_count,
        directory_offset,
        directory_size,
        base_offset,
        end_record_offset: eocd_offset,
        comment,
    })
}

/// Scan the tail window backwards for the EOCD signature.
///
/// A candidate whose comment length exactly reaches the end of storage is
/// preferred. Failing that, the last candidate whose comment fits is taken,
/// which is what archives with appended data look like.
fn find_eocd<S: Storage + ?Sized>(
    storage: &S,
    size: u64,
) -> Result<(EndOfCentralDirectory, u64, Vec<u8>)> {
    if size < EndOfCentralDirectory::SIZE as u64 {
        return Err(Error::corrupt("too small to be a ZIP archive"));
    }

    // Common case: no comment, nothing appended.
    let tail = size - EndOfCentralDirectory::SIZE as u64;
    let mut buf = vec![0u8; EndOfCentralDirectory::SIZE];
    storage.read_exact_at(tail, &mut buf)?;
    if &buf[0..4] == EndOfCentralDirectory::SIGNATURE && buf[20..22] == [0, 0] {
        let eocd = EndOfCentralDirectory::from_bytes(&buf)?;
        return Ok((eocd, tail, Vec::new()));
    }

    let search_size = (MAX_COMMENT_SIZE + EndOfCentralDirectory::SIZE as u64).min(size);
    let search_start = size - search_size;
    let mut buf = vec![0u8; search_size as usize];
    storage.read_exact_at(search_start, &mut buf)?;

    let mut fallback = None;
    for i in (0..=buf.len() - EndOfCentralDirectory::SIZE).rev() {
        if &buf[i..i + 4] != EndOfCentralDirectory::SIGNATURE {
            continue;
        }
        let comment_len = u16::from_le_bytes([buf[i + 20], buf[i + 21]]) as usize;
        let record_end = i + EndOfCentralDirectory::SIZE;
        if record_end + comment_len > buf.len() {
            continue;
        }

        let eocd = EndOfCentralDirectory::from_bytes(&buf[i..record_end])?;
        let offset = search_start + i as u64;
        if !eocd.is_zip64() && eocd.cd_size as u64 > offset {
            continue;
        }

        let comment = buf[record_end..record_end + comment_len].to_vec();
        if record_end + comment_len == buf.len() {
            return Ok((eocd, offset, comment));
        }
        if fallback.is_none() {
            fallback = Some((eocd, offset, comment));
        }
    }

    match fallback {
        Some(found) => {
            log::debug!(
                "{} bytes follow the end of central directory",
                size - found.1 - EndOfCentralDirectory::SIZE as u64 - found.2.len() as u64
            );
            Ok(found)
        }
        None => Err(Error::corrupt("end of central directory record not found")),
    }
}

/// Read the ZIP64 EOCD, returning it with its actual storage offset.
///
/// The locator records the ZIP64 EOCD offset relative to the archive start,
/// which is unknown while prepended data has not been measured. The
/// recorded position is tried first, then the position directly in front
/// of the locator.
fn read_zip64_eocd<S: Storage + ?Sized>(
    storage: &S,
    eocd_offset: u64,
) -> Result<Option<(Zip64Eocd, u64)>> {
    let Some(locator_offset) = eocd_offset.checked_sub(Zip64EocdLocator::SIZE as u64) else {
        return Ok(None);
    };
    let mut locator_buf = vec![0u8; Zip64EocdLocator::SIZE];
    storage.read_exact_at(locator_offset, &mut locator_buf)?;

    let Some(locator) = Zip64EocdLocator::from_bytes(&locator_buf)? else {
        // Saturated fields without a locator: a plain archive that happens
        // to hit the 16/32-bit limits.
        return Ok(None);
    };

    let adjacent = locator_offset.checked_sub(Zip64Eocd::MIN_SIZE as u64);
    let candidates = [Some(locator.eocd64_offset), adjacent];

    let mut record_buf = vec![0u8; Zip64Eocd::MIN_SIZE];
    for offset in candidates.into_iter().flatten() {
        let record_end = offset.checked_add(Zip64Eocd::MIN_SIZE as u64);
        if record_end.is_none_or(|end| end > locator_offset) {
            continue;
        }
        storage.read_exact_at(offset, &mut record_buf)?;
        if Zip64Eocd::has_signature(&record_buf) {
            let record = Zip64Eocd::from_bytes(&record_buf)?;
            if record.disk_number != record.disk_with_cd
                || record.disk_entries != record.total_entries
            {
                return Err(Error::not_supported("split (multi-disk) archives"));
            }
            return Ok(Some((record, offset)));
        }
    }

    Err(Error::corrupt("zip64 end of central directory not found"))
}
