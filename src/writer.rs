//! Binary writer and reader for content files
//!
//! All integers are little-endian. The per-level header is a `binrw` struct so
//! the on-disk layout is declared in one place.

use binrw::prelude::*;
use binrw::BinResult;
use std::io::{Read, Seek, Write};

/// Default JPEG quality for lossy bitmap levels
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Header preceding every serialized mip level
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct LevelHeader {
    pub width: i32,
    pub height: i32,
    pub format_code: i32,
    pub payload_len: i32,
}

/// Primitive writes used by content serializers
pub struct ContentWriter<W> {
    inner: W,
    jpeg_quality: u8,
}

impl<W: Write + Seek> ContentWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }

    /// Set the quality used when a level is written as JPEG (clamped to 1-100)
    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    pub fn jpeg_quality(&self) -> u8 {
        self.jpeg_quality
    }

    pub fn write_i32(&mut self, value: i32) -> BinResult<()> {
        value.write_le(&mut self.inner)
    }

    pub fn write_u32(&mut self, value: u32) -> BinResult<()> {
        value.write_le(&mut self.inner)
    }

    pub fn write_u8(&mut self, value: u8) -> BinResult<()> {
        value.write_le(&mut self.inner)
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> BinResult<()> {
        self.inner.write_all(bytes).map_err(binrw::Error::Io)
    }

    /// Copy everything remaining in `reader`, returning the number of bytes copied
    pub fn copy_from<R: Read>(&mut self, reader: &mut R) -> BinResult<u64> {
        std::io::copy(reader, &mut self.inner).map_err(binrw::Error::Io)
    }

    pub fn write_level_header(&mut self, header: &LevelHeader) -> BinResult<()> {
        header.write(&mut self.inner)
    }

    /// Underlying stream, for `binrw` structs defined elsewhere
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    pub fn position(&mut self) -> BinResult<u64> {
        self.inner.stream_position().map_err(binrw::Error::Io)
    }

    pub fn flush(&mut self) -> BinResult<()> {
        self.inner.flush().map_err(binrw::Error::Io)
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// Primitive reads mirroring [`ContentWriter`]
pub struct ContentReader<R> {
    inner: R,
}

impl<R: Read + Seek> ContentReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn read_i32(&mut self) -> BinResult<i32> {
        i32::read_le(&mut self.inner)
    }

    pub fn read_u32(&mut self) -> BinResult<u32> {
        u32::read_le(&mut self.inner)
    }

    pub fn read_u8(&mut self) -> BinResult<u8> {
        u8::read_le(&mut self.inner)
    }

    /// Read exactly `len` bytes; storage grows with the data actually present
    pub fn read_bytes(&mut self, len: usize) -> BinResult<Vec<u8>> {
        let mut buf = Vec::new();
        (&mut self.inner)
            .take(len as u64)
            .read_to_end(&mut buf)
            .map_err(binrw::Error::Io)?;
        if buf.len() != len {
            return Err(binrw::Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("expected {} bytes, found {}", len, buf.len()),
            )));
        }
        Ok(buf)
    }

    pub fn read_level_header(&mut self) -> BinResult<LevelHeader> {
        LevelHeader::read(&mut self.inner)
    }

    /// Underlying stream, for `binrw` structs defined elsewhere
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    pub fn position(&mut self) -> BinResult<u64> {
        self.inner.stream_position().map_err(binrw::Error::Io)
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}
