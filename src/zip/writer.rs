//! Serializing Create/Update archives back to storage on dispose.
//!
//! The new image is assembled in memory first. Unchanged entries have their
//! raw payload copied from storage during assembly, before anything is
//! written, so rewriting in place never reads bytes it already overwrote.

use std::borrow::Cow;

use crate::error::{Error, Result};
use crate::io::{Storage, write_all_at};

use super::archive::ArchiveCore;
use super::entry::{EntryMeta, Payload};
use super::local_header;
use super::structures::{
    CentralDirectoryHeader, EndOfCentralDirectory, FLAG_DATA_DESCRIPTOR, LocalFileHeader,
    ZIP64_EXTRA_ID, strip_extra_field, write_data_descriptor,
};

fn fits_u32(value: u64, what: &str) -> Result<u32> {
    u32::try_from(value)
        .ok()
        .filter(|v| *v != u32::MAX)
        .ok_or_else(|| Error::not_supported(format!("{} needs ZIP64, which is not written", what)))
}

fn fits_u16(value: usize, what: &str) -> Result<u16> {
    u16::try_from(value).map_err(|_| Error::not_supported(format!("{} is too long", what)))
}

/// Raw payload bytes of an entry as they will appear in the new archive.
fn raw_payload<'a, S: Storage>(
    core: &ArchiveCore<S>,
    name: &str,
    meta: &'a EntryMeta,
) -> Result<Cow<'a, [u8]>> {
    match &meta.payload {
        Payload::Storage {
            local_header_offset,
        } => {
            let start = local_header::payload_offset(&*core.storage, *local_header_offset)?;
            let len = usize::try_from(meta.compressed_size)
                .map_err(|_| Error::not_supported(format!("'{}' is too large to copy", name)))?;
            let mut raw = vec![0u8; len];
            core.storage.read_exact_at(start, &mut raw).map_err(|e| {
                Error::corrupt(format!("payload of '{}' is truncated: {}", name, e))
            })?;
            Ok(Cow::Owned(raw))
        }
        Payload::Pending(bytes) => Ok(Cow::Borrowed(&bytes[..])),
        Payload::Empty => Ok(Cow::Borrowed(&[])),
    }
}

/// Build the complete archive image for the current entry table.
pub(crate) fn build_image<S: Storage>(core: &ArchiveCore<S>) -> Result<Vec<u8>> {
    let entries = core.entry_states();
    let entry_count = fits_u16(entries.len(), "entry count")
        .map_err(|_| Error::not_supported("more than 65535 entries needs ZIP64, which is not written"))?;

    let mut out = Vec::new();
    let mut central = Vec::new();

    for state in &entries {
        let meta = state.lock();
        if meta.open_for_write {
            log::warn!("'{}' is still open for writing; uncommitted data is lost", state.name);
        }

        let raw = raw_payload(core, &state.name, &meta)?;
        let offset = fits_u32(out.len() as u64, "entry offset")?;
        let compressed_size = fits_u32(raw.len() as u64, "compressed size")?;
        let uncompressed_size = fits_u32(meta.uncompressed_size, "uncompressed size")?;
        let name_len = fits_u16(state.name_bytes.len(), "entry name")?;

        // Sizes are written in 32-bit fields now; drop any ZIP64 record.
        let extra = strip_extra_field(&meta.extra, ZIP64_EXTRA_ID);
        let extra_len = fits_u16(extra.len(), "extra field")?;
        let comment_len = fits_u16(meta.comment.len(), "entry comment")?;

        LocalFileHeader {
            version_needed: meta.version_needed,
            flags: meta.flags,
            compression_method: meta.method.as_u16(),
            last_mod_time: meta.modified.time,
            last_mod_date: meta.modified.date,
            crc32: meta.crc32,
            compressed_size,
            uncompressed_size,
            file_name_length: name_len,
            extra_field_length: extra_len,
        }
        .write_to(&mut out)?;
        out.extend_from_slice(&state.name_bytes);
        out.extend_from_slice(&extra);
        out.extend_from_slice(&raw);
        if meta.flags & FLAG_DATA_DESCRIPTOR != 0 {
            write_data_descriptor(&mut out, meta.crc32, compressed_size, uncompressed_size)?;
        }

        CentralDirectoryHeader {
            version_made_by: meta.version_made_by,
            version_needed: meta.version_needed,
            flags: meta.flags,
            compression_method: meta.method.as_u16(),
            last_mod_time: meta.modified.time,
            last_mod_date: meta.modified.date,
            crc32: meta.crc32,
            compressed_size,
            uncompressed_size,
            file_name_length: name_len,
            extra_field_length: extra_len,
            file_comment_length: comment_len,
            disk_number_start: 0,
            internal_attrs: meta.internal_attrs,
            external_attrs: meta.external_attrs,
            local_header_offset: offset,
        }
        .write_to(&mut central)?;
        central.extend_from_slice(&state.name_bytes);
        central.extend_from_slice(&extra);
        central.extend_from_slice(&meta.comment);
    }

    let cd_offset = fits_u32(out.len() as u64, "central directory offset")?;
    let cd_size = fits_u32(central.len() as u64, "central directory size")?;
    out.extend_from_slice(&central);

    EndOfCentralDirectory {
        disk_number: 0,
        disk_with_cd: 0,
        disk_entries: entry_count,
        total_entries: entry_count,
        cd_size,
        cd_offset,
        comment_len: fits_u16(core.comment.len(), "archive comment")?,
    }
    .write_to(&mut out)?;
    out.extend_from_slice(&core.comment);

    Ok(out)
}

/// Write the archive image at the archive's start offset and trim storage.
pub(crate) fn write_archive<S: Storage>(core: &ArchiveCore<S>) -> Result<()> {
    let image = build_image(core)?;
    write_all_at(&*core.storage, core.base_offset, &image)?;
    core.storage.set_len(core.base_offset + image.len() as u64)?;
    log::debug!(
        "wrote {} byte archive at offset {}",
        image.len(),
        core.base_offset
    );
    Ok(())
}
