//! Turning encoded image assets into [`Bitmap`]s.

use std::fs;
use std::path::{Path, PathBuf};

use image::{ColorType, DynamicImage};

use crate::error::DecodeError;
use crate::texture::pixels::Bitmap;

/// Decodes the asset named by a cache key.
///
/// Called from decode worker threads, so implementations must be
/// thread-safe and must not touch GPU state.
pub trait Decoder: Send + Sync {
    /// Decode the asset named by `key`.
    ///
    /// # Errors
    ///
    /// Any [`DecodeError`]; the caller treats it as "never became bindable".
    fn decode(&self, key: &str) -> Result<Bitmap, DecodeError>;
}

/// Reads files and decodes them with the `image` crate (PNG and JPEG).
#[derive(Debug, Clone, Default)]
pub struct ImageDecoder {
    root: Option<PathBuf>,
}

impl ImageDecoder {
    /// Resolve relative keys against `root` instead of the working
    /// directory.
    #[must_use]
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, key: &str) -> PathBuf {
        let path = Path::new(key);
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl Decoder for ImageDecoder {
    fn decode(&self, key: &str) -> Result<Bitmap, DecodeError> {
        let path = self.resolve(key);
        let bytes = fs::read(&path)?;
        log::debug!("decoding {} ({} bytes)", path.display(), bytes.len());
        decode_bytes(&bytes)
    }
}

/// Decode an in-memory PNG or JPEG stream.
///
/// 8-bit sources keep their channel count (1-4); 16-bit sources are
/// narrowed to 8 bits; 32-bit float sources become RGBA floats.
///
/// # Errors
///
/// [`DecodeError::Malformed`] for unrecognised or corrupt data.
pub fn decode_bytes(bytes: &[u8]) -> Result<Bitmap, DecodeError> {
    let image = image::load_from_memory(bytes)
        .map_err(|e| DecodeError::Malformed(e.to_string()))?;
    Ok(into_bitmap(image))
}

fn into_bitmap(image: DynamicImage) -> Bitmap {
    match image.color() {
        ColorType::L8 => {
            let buf = image.into_luma8();
            Bitmap::from_bytes(buf.width(), buf.height(), 1, buf.into_raw())
        }
        ColorType::La8 => {
            let buf = image.into_luma_alpha8();
            Bitmap::from_bytes(buf.width(), buf.height(), 2, buf.into_raw())
        }
        ColorType::Rgb32F | ColorType::Rgba32F => {
            let buf = image.into_rgba32f();
            Bitmap::from_floats(buf.width(), buf.height(), buf.into_raw())
        }
        color if color.has_alpha() => {
            let buf = image.into_rgba8();
            Bitmap::from_bytes(buf.width(), buf.height(), 4, buf.into_raw())
        }
        _ => {
            let buf = image.into_rgb8();
            Bitmap::from_bytes(buf.width(), buf.height(), 3, buf.into_raw())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::texture::pixels::PixelBuffer;
    use image::{GrayImage, Luma, Rgba, RgbaImage};

    #[test]
    fn decodes_png_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("red.png");
        RgbaImage::from_pixel(2, 3, Rgba([255, 0, 0, 128]))
            .save(&path)
            .unwrap();

        let bitmap = ImageDecoder::with_root(dir.path())
            .decode("red.png")
            .unwrap();
        assert_eq!((bitmap.width, bitmap.height), (2, 3));
        assert_eq!(bitmap.components, 4);
        assert!(bitmap.is_consistent());
        let PixelBuffer::Bytes(data) = &bitmap.pixels else {
            panic!("byte pixels expected");
        };
        assert_eq!(&data[..4], &[255, 0, 0, 128]);
    }

    #[test]
    fn grey_png_keeps_single_channel() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grey.png");
        GrayImage::from_pixel(4, 1, Luma([9])).save(&path).unwrap();

        let bitmap = ImageDecoder::default()
            .decode(path.to_str().unwrap())
            .unwrap();
        assert_eq!(bitmap.components, 1);
        assert_eq!(bitmap.pixels, PixelBuffer::Bytes(vec![9; 4]));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ImageDecoder::with_root(dir.path())
            .decode("nope.png")
            .unwrap_err();
        assert!(matches!(err, DecodeError::Io(_)));
    }

    #[test]
    fn garbage_is_malformed() {
        let err = decode_bytes(b"definitely not an image").unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_)));
    }
}
