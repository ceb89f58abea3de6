//! Per-entry encryption classification.
//!
//! Bit 0 of the general-purpose flags is the only thing that makes an entry
//! encrypted. Extra fields refine which scheme is in use but never turn an
//! unflagged entry into an encrypted one.

use super::structures::{
    AES_EXTRA_ID, CompressionMethod, ExtraFields, FLAG_ENCRYPTED, FLAG_STRONG_ENCRYPTION,
    STRONG_ENCRYPTION_EXTRA_ID,
};

/// Key size of a WinZip AES entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AesStrength {
    Aes128,
    Aes192,
    Aes256,
}

impl AesStrength {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(AesStrength::Aes128),
            2 => Some(AesStrength::Aes192),
            3 => Some(AesStrength::Aes256),
            _ => None,
        }
    }

    pub fn key_bits(&self) -> u16 {
        match self {
            AesStrength::Aes128 => 128,
            AesStrength::Aes192 => 192,
            AesStrength::Aes256 => 256,
        }
    }
}

/// How an entry's payload is encrypted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionMethod {
    None,
    /// Legacy PKWARE stream cipher, signalled by flag bit 0 alone.
    ZipCrypto,
    /// WinZip AES (0x9901 extra field).
    Aes {
        strength: Option<AesStrength>,
        /// Compression method applied before encryption.
        actual_method: CompressionMethod,
    },
    /// PKWARE strong encryption (0x0017 extra field or flag bit 6).
    Strong { algorithm: Option<u16> },
}

impl EncryptionMethod {
    /// Classify an entry from its general-purpose flags and extra-field block.
    pub fn classify(flags: u16, extra: &[u8]) -> Self {
        if flags & FLAG_ENCRYPTED == 0 {
            return EncryptionMethod::None;
        }

        for (id, body) in ExtraFields::new(extra) {
            match id {
                AES_EXTRA_ID => {
                    // version(2) vendor "AE"(2) strength(1) method(2)
                    let strength = body.get(4).copied().and_then(AesStrength::from_u8);
                    let actual_method = match body.get(5..7) {
                        Some(m) => CompressionMethod::from_u16(u16::from_le_bytes([m[0], m[1]])),
                        None => CompressionMethod::Unknown(0),
                    };
                    return EncryptionMethod::Aes {
                        strength,
                        actual_method,
                    };
                }
                STRONG_ENCRYPTION_EXTRA_ID => {
                    // format(2) algorithm id(2) bit length(2) flags(2)
                    let algorithm = body.get(2..4).map(|a| u16::from_le_bytes([a[0], a[1]]));
                    return EncryptionMethod::Strong { algorithm };
                }
                _ => {}
            }
        }

        if flags & FLAG_STRONG_ENCRYPTION != 0 {
            return EncryptionMethod::Strong { algorithm: None };
        }
        EncryptionMethod::ZipCrypto
    }

    pub fn is_encrypted(&self) -> bool {
        !matches!(self, EncryptionMethod::None)
    }

    /// True for the modern schemes (AES, PKWARE strong encryption).
    pub fn is_strong(&self) -> bool {
        matches!(
            self,
            EncryptionMethod::Aes { .. } | EncryptionMethod::Strong { .. }
        )
    }
}
