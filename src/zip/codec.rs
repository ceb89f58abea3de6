//! Compression codecs, delegated to flate2.

use flate2::Crc;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use std::io::{self, Read, Write};

use crate::error::{Error, Result};

use super::options::CompressionLevel;
use super::structures::CompressionMethod;

/// Decompressing view over a raw payload.
pub enum Decoder<R: Read> {
    Stored(R),
    Deflate(DeflateDecoder<R>),
}

impl<R: Read> Decoder<R> {
    pub fn new(method: CompressionMethod, raw: R) -> Result<Self> {
        match method {
            CompressionMethod::Stored => Ok(Decoder::Stored(raw)),
            CompressionMethod::Deflate => Ok(Decoder::Deflate(DeflateDecoder::new(raw))),
            other => Err(Error::UnsupportedCompression(other.as_u16())),
        }
    }
}

impl<R: Read> Read for Decoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Decoder::Stored(raw) => raw.read(buf),
            Decoder::Deflate(inflater) => inflater.read(buf),
        }
    }
}

/// A payload ready to be placed in an archive.
#[derive(Debug, Clone)]
pub struct Compressed {
    pub method: CompressionMethod,
    pub data: Vec<u8>,
    pub crc32: u32,
}

/// Compress `data` at `level`. Empty content is always stored.
pub fn compress(data: &[u8], level: CompressionLevel) -> Result<Compressed> {
    let crc32 = crc32(data);
    let deflate = level.deflate_level().filter(|_| !data.is_empty());

    let (method, data) = match deflate {
        Some(level) => {
            let mut encoder = DeflateEncoder::new(Vec::with_capacity(data.len() / 2), level);
            encoder.write_all(data)?;
            (CompressionMethod::Deflate, encoder.finish()?)
        }
        None => (CompressionMethod::Stored, data.to_vec()),
    };

    Ok(Compressed {
        method,
        data,
        crc32,
    })
}

pub fn crc32(data: &[u8]) -> u32 {
    let mut crc = Crc::new();
    crc.update(data);
    crc.sum()
}
