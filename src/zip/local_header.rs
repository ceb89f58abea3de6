//! Locating entry payloads through their local file headers.
//!
//! Only consulted when a payload is actually needed (stream open, archive
//! rewrite), so listing an archive never touches the local headers.

use std::io;

use crate::error::{Error, Result};
use crate::io::Storage;

use super::structures::LocalFileHeader;

/// Read the fixed portion of the local header at `offset`.
pub fn read_local_header<S: Storage + ?Sized>(storage: &S, offset: u64) -> Result<LocalFileHeader> {
    let mut buf = [0u8; LocalFileHeader::SIZE];
    storage.read_exact_at(offset, &mut buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Error::corrupt(format!("local file header at {} is past end of storage", offset))
        } else {
            Error::Io(e)
        }
    })?;
    LocalFileHeader::from_bytes(&buf)
}

/// Storage offset of the first payload byte for the entry whose local
/// header starts at `offset`.
///
/// The header's own name and extra-field lengths decide where the payload
/// begins; they may differ from the central directory's.
pub fn payload_offset<S: Storage + ?Sized>(storage: &S, offset: u64) -> Result<u64> {
    let header = read_local_header(storage, offset)?;
    Ok(offset + header.total_len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryStorage;

    #[test]
    fn payload_follows_name_and_extra() {
        let header = LocalFileHeader {
            file_name_length: 5,
            extra_field_length: 4,
            ..Default::default()
        };
        let mut bytes = vec![0xEE; 7];
        header.write_to(&mut bytes).unwrap();
        bytes.extend_from_slice(b"a.txt");
        bytes.extend_from_slice(&[0; 4]);
        bytes.extend_from_slice(b"payload");

        let storage = MemoryStorage::new(bytes);
        assert_eq!(payload_offset(&storage, 7).unwrap(), 7 + 30 + 9);
    }

    #[test]
    fn wrong_signature_is_corrupt() {
        let storage = MemoryStorage::new(vec![0u8; 64]);
        assert!(matches!(payload_offset(&storage, 0), Err(Error::CorruptArchive(_))));
    }

    #[test]
    fn header_past_end_is_corrupt() {
        let storage = MemoryStorage::new(vec![0u8; 10]);
        assert!(matches!(payload_offset(&storage, 4), Err(Error::CorruptArchive(_))));
    }
}
