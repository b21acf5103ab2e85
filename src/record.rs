//! Per-level capture of a built texture

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, RgbaImage};
use std::io::{Cursor, Read, Seek, Write};

use crate::error::BuildError;
use crate::format::PixelFormatKind;
use crate::writer::{ContentReader, ContentWriter, LevelHeader};

/// Level contents: decoded pixels or opaque compressed blocks, never both
#[derive(Debug, Clone, PartialEq)]
pub enum MipPayload {
    Bitmap(RgbaImage),
    Compressed(Vec<u8>),
}

/// One mip level of a built texture
#[derive(Debug, Clone, PartialEq)]
pub struct MipLevelRecord {
    width: u32,
    height: u32,
    format: PixelFormatKind,
    payload: MipPayload,
}

impl MipLevelRecord {
    pub fn compressed(width: u32, height: u32, format: PixelFormatKind, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            format,
            payload: MipPayload::Compressed(data),
        }
    }

    pub fn bitmap(format: PixelFormatKind, image: RgbaImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            format,
            payload: MipPayload::Bitmap(image),
        }
    }

    /// Build a record from optional payload parts
    ///
    /// Exactly one of `bitmap` and `data` must be present, and a bitmap must
    /// match the stated dimensions.
    pub fn from_parts(
        width: u32,
        height: u32,
        format: PixelFormatKind,
        bitmap: Option<RgbaImage>,
        data: Option<Vec<u8>>,
    ) -> Result<Self, BuildError> {
        match (bitmap, data) {
            (Some(image), None) => {
                if image.dimensions() != (width, height) {
                    return Err(BuildError::InternalInvariantViolation(
                        "bitmap dimensions differ from level dimensions",
                    ));
                }
                Ok(Self::bitmap(format, image))
            }
            (None, Some(data)) => Ok(Self::compressed(width, height, format, data)),
            (Some(_), Some(_)) => Err(BuildError::InternalInvariantViolation(
                "level has both a bitmap and a compressed payload",
            )),
            (None, None) => Err(BuildError::InternalInvariantViolation(
                "level has no payload",
            )),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormatKind {
        self.format
    }

    pub fn payload(&self) -> &MipPayload {
        &self.payload
    }

    /// Write this level: width, height, format code, payload length, payload
    pub fn serialize<W: Write + Seek>(
        &self,
        writer: &mut ContentWriter<W>,
    ) -> Result<(), BuildError> {
        let encoded;
        let payload: &[u8] = match &self.payload {
            MipPayload::Bitmap(image) => {
                encoded = encode_bitmap(image, self.format, writer.jpeg_quality())?;
                &encoded
            }
            MipPayload::Compressed(data) => data,
        };

        let header = LevelHeader {
            width: to_i32(self.width, "width")?,
            height: to_i32(self.height, "height")?,
            format_code: self.format.code(),
            payload_len: to_i32(payload.len() as u64, "payload length")?,
        };
        writer.write_level_header(&header)?;
        writer.write_bytes(payload)?;
        Ok(())
    }

    /// Read one level written by [`MipLevelRecord::serialize`]
    ///
    /// Container formats are decoded back into bitmaps; every other format is
    /// returned as its raw payload bytes.
    pub fn read<R: Read + Seek>(reader: &mut ContentReader<R>) -> Result<Self, BuildError> {
        let header = reader.read_level_header()?;
        let format = PixelFormatKind::from_code(header.format_code)
            .ok_or(BuildError::UnknownFormat(header.format_code))?;

        let (width, height) = match (u32::try_from(header.width), u32::try_from(header.height)) {
            (Ok(w), Ok(h)) => (w, h),
            _ => {
                return Err(BuildError::Malformed(format!(
                    "negative level size {}x{}",
                    header.width, header.height
                )))
            }
        };
        let len = usize::try_from(header.payload_len).map_err(|_| {
            BuildError::Malformed(format!("negative payload length {}", header.payload_len))
        })?;
        let bytes = reader.read_bytes(len)?;

        let image_format = match format {
            PixelFormatKind::Png => ImageFormat::Png,
            PixelFormatKind::Jpeg => ImageFormat::Jpeg,
            _ => return Ok(Self::compressed(width, height, format, bytes)),
        };

        let image = image::load_from_memory_with_format(&bytes, image_format)?.into_rgba8();
        if image.dimensions() != (width, height) {
            return Err(BuildError::Malformed(format!(
                "level header says {}x{} but image is {}x{}",
                width,
                height,
                image.width(),
                image.height()
            )));
        }
        Ok(Self::bitmap(format, image))
    }
}

fn encode_bitmap(
    image: &RgbaImage,
    format: PixelFormatKind,
    jpeg_quality: u8,
) -> Result<Vec<u8>, BuildError> {
    let mut out = Cursor::new(Vec::new());
    match format {
        PixelFormatKind::Png => image.write_to(&mut out, ImageFormat::Png)?,
        PixelFormatKind::Jpeg => {
            // JPEG has no alpha channel
            let rgb = DynamicImage::ImageRgba8(image.clone()).into_rgb8();
            JpegEncoder::new_with_quality(&mut out, jpeg_quality).encode_image(&rgb)?;
        }
        other => return Err(BuildError::UnsupportedEncoding(other)),
    }
    Ok(out.into_inner())
}

fn to_i32(value: impl TryInto<i32>, what: &str) -> Result<i32, BuildError> {
    value
        .try_into()
        .map_err(|_| BuildError::Malformed(format!("{} does not fit in an int32", what)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn gradient(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x * 40) as u8, (y * 60) as u8, 128, 200 + x as u8])
        })
    }

    fn serialize(record: &MipLevelRecord) -> Vec<u8> {
        let mut writer = ContentWriter::new(Cursor::new(Vec::new()));
        record.serialize(&mut writer).unwrap();
        writer.into_inner().into_inner()
    }

    fn read(bytes: Vec<u8>) -> MipLevelRecord {
        MipLevelRecord::read(&mut ContentReader::new(Cursor::new(bytes))).unwrap()
    }

    #[test]
    fn test_compressed_layout_is_exact() {
        let record = MipLevelRecord::compressed(4, 4, PixelFormatKind::Dxt1, vec![9u8; 8]);
        let bytes = serialize(&record);

        let mut expected = Vec::new();
        expected.extend_from_slice(&4i32.to_le_bytes());
        expected.extend_from_slice(&4i32.to_le_bytes());
        expected.extend_from_slice(&0x83F1i32.to_le_bytes());
        expected.extend_from_slice(&8i32.to_le_bytes());
        expected.extend_from_slice(&[9u8; 8]);
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_compressed_round_trip_is_byte_identical() {
        let data: Vec<u8> = (0..=255).collect();
        let record = MipLevelRecord::compressed(16, 16, PixelFormatKind::Dxt5, data.clone());
        let back = read(serialize(&record));
        assert_eq!(back.payload(), &MipPayload::Compressed(data));
        assert_eq!(back, record);
    }

    #[test]
    fn test_png_round_trip_is_pixel_identical() {
        let image = gradient(5, 3);
        let record = MipLevelRecord::bitmap(PixelFormatKind::Png, image.clone());
        let bytes = serialize(&record);

        let payload_len = i32::from_le_bytes(bytes[12..16].try_into().unwrap());
        assert_eq!(payload_len as usize, bytes.len() - 16);
        assert_eq!(&bytes[16..24], b"\x89PNG\r\n\x1a\n");

        let back = read(bytes);
        assert_eq!(back.payload(), &MipPayload::Bitmap(image));
        assert_eq!((back.width(), back.height()), (5, 3));
    }

    #[test]
    fn test_jpeg_is_written_and_decodes_to_same_size() {
        let record = MipLevelRecord::bitmap(PixelFormatKind::Jpeg, gradient(8, 8));
        let bytes = serialize(&record);
        assert_eq!(&bytes[16..18], &[0xFF, 0xD8]);

        let back = read(bytes);
        assert_eq!(back.format(), PixelFormatKind::Jpeg);
        assert_eq!((back.width(), back.height()), (8, 8));
    }

    #[test]
    fn test_bitmap_with_non_container_format_fails_fast() {
        let record = MipLevelRecord::bitmap(PixelFormatKind::Bgra8, gradient(2, 2));
        let mut writer = ContentWriter::new(Cursor::new(Vec::new()));
        let err = record.serialize(&mut writer).unwrap_err();
        assert!(matches!(err, BuildError::UnsupportedEncoding(PixelFormatKind::Bgra8)));
        // Nothing is written before the payload is encoded
        assert!(writer.into_inner().into_inner().is_empty());
    }

    #[test]
    fn test_from_parts_requires_exactly_one_payload() {
        let both = MipLevelRecord::from_parts(
            2,
            2,
            PixelFormatKind::Png,
            Some(gradient(2, 2)),
            Some(vec![0u8; 4]),
        );
        assert!(matches!(both, Err(BuildError::InternalInvariantViolation(_))));

        let neither = MipLevelRecord::from_parts(2, 2, PixelFormatKind::Png, None, None);
        assert!(matches!(neither, Err(BuildError::InternalInvariantViolation(_))));

        let mismatched =
            MipLevelRecord::from_parts(4, 2, PixelFormatKind::Png, Some(gradient(2, 2)), None);
        assert!(matches!(mismatched, Err(BuildError::InternalInvariantViolation(_))));

        let ok = MipLevelRecord::from_parts(1, 1, PixelFormatKind::Dxt1, None, Some(vec![0; 8]));
        assert!(ok.is_ok());
    }

    #[test]
    fn test_read_rejects_bad_headers() {
        let mut bytes = Vec::new();
        for v in [1i32, 1, 77, 0] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        let err = MipLevelRecord::read(&mut ContentReader::new(Cursor::new(bytes))).unwrap_err();
        assert!(matches!(err, BuildError::UnknownFormat(77)));

        let mut bytes = Vec::new();
        for v in [1i32, 1, 0x83F1, -5] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        let err = MipLevelRecord::read(&mut ContentReader::new(Cursor::new(bytes))).unwrap_err();
        assert!(matches!(err, BuildError::Malformed(_)));
    }

    #[test]
    fn test_read_truncated_payload() {
        let mut bytes = serialize(&MipLevelRecord::compressed(
            4,
            4,
            PixelFormatKind::Dxt3,
            vec![1u8; 16],
        ));
        bytes.truncate(bytes.len() - 1);
        let err = MipLevelRecord::read(&mut ContentReader::new(Cursor::new(bytes))).unwrap_err();
        assert!(matches!(err, BuildError::Binary(_)));
    }
}
