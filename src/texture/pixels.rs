//! CPU-side pixel buffers: row flipping, channel expansion and mip chains.

use crate::error::DecodeError;
use crate::gpu::device::Dimensionality;

/// Raw pixel storage, row-major, tightly packed.
#[derive(Debug, Clone, PartialEq)]
pub enum PixelBuffer {
    /// 8 bits per channel.
    Bytes(Vec<u8>),
    /// 32-bit float channels, always RGBA.
    Floats(Vec<f32>),
}

impl PixelBuffer {
    /// Number of channel values.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Bytes(v) => v.len(),
            Self::Floats(v) => v.len(),
        }
    }

    /// Whether the buffer holds no channel values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether channels are floats.
    #[must_use]
    pub fn is_float(&self) -> bool {
        matches!(self, Self::Floats(_))
    }

    /// Row-reversed copy: row `i` of the result is row `rows - 1 - i` of
    /// `self`. `row_len` counts channel values, not pixels.
    #[must_use]
    pub fn flipped(&self, row_len: usize, rows: usize) -> Self {
        match self {
            Self::Bytes(v) => Self::Bytes(flip_rows(v, row_len, rows)),
            Self::Floats(v) => Self::Floats(flip_rows(v, row_len, rows)),
        }
    }
}

/// Reverse the row order of a packed image.
///
/// Trailing values beyond `row_len * rows` are dropped.
#[must_use]
pub fn flip_rows<T: Copy>(data: &[T], row_len: usize, rows: usize) -> Vec<T> {
    if row_len == 0 {
        return Vec::new();
    }
    data[..(row_len * rows).min(data.len())]
        .chunks_exact(row_len)
        .rev()
        .flatten()
        .copied()
        .collect()
}

/// A bitmap in CPU memory: the decoder's output and the uploader's input.
#[derive(Debug, Clone, PartialEq)]
pub struct Bitmap {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels (1 for 1D data).
    pub height: u32,
    /// Channels per pixel (1-4 for bytes, 4 for floats).
    pub components: u8,
    /// Packed pixel data.
    pub pixels: PixelBuffer,
}

impl Bitmap {
    /// 8-bit bitmap.
    #[must_use]
    pub fn from_bytes(
        width: u32,
        height: u32,
        components: u8,
        pixels: Vec<u8>,
    ) -> Self {
        Self {
            width,
            height,
            components,
            pixels: PixelBuffer::Bytes(pixels),
        }
    }

    /// RGBA float bitmap.
    #[must_use]
    pub fn from_floats(width: u32, height: u32, pixels: Vec<f32>) -> Self {
        Self {
            width,
            height,
            components: 4,
            pixels: PixelBuffer::Floats(pixels),
        }
    }

    /// Channel values per row.
    #[must_use]
    pub fn row_len(&self) -> usize {
        self.width as usize * self.components as usize
    }

    /// Whether the buffer length matches `width * height * components`.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let expected = self.row_len() * self.height as usize;
        let components_ok = match self.pixels {
            PixelBuffer::Bytes(_) => (1..=4).contains(&self.components),
            PixelBuffer::Floats(_) => self.components == 4,
        };
        components_ok && expected > 0 && self.pixels.len() == expected
    }

    /// Expand grey and grey-alpha data to RGB and RGBA so that uploads only
    /// see three or four channels.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::UnsupportedComponents`] for channel counts
    /// outside 1-4.
    pub fn normalized(self) -> Result<Self, DecodeError> {
        let Self {
            width,
            height,
            components,
            pixels,
        } = self;
        let (pixels, components) = match (pixels, components) {
            (pixels, 3 | 4) => (pixels, components),
            (PixelBuffer::Bytes(data), 1) => (
                PixelBuffer::Bytes(
                    data.iter().flat_map(|&l| [l, l, l]).collect(),
                ),
                3,
            ),
            (PixelBuffer::Bytes(data), 2) => (
                PixelBuffer::Bytes(
                    data.chunks_exact(2)
                        .flat_map(|la| [la[0], la[0], la[0], la[1]])
                        .collect(),
                ),
                4,
            ),
            (_, n) => return Err(DecodeError::UnsupportedComponents(n)),
        };
        Ok(Self {
            width,
            height,
            components,
            pixels,
        })
    }

    /// The pixels to hand to the device, flipped when asked. The temporary
    /// flipped copy replaces the original buffer.
    #[must_use]
    pub fn into_oriented(self, flip_vertically: bool) -> PixelBuffer {
        if flip_vertically {
            self.pixels.flipped(self.row_len(), self.height as usize)
        } else {
            self.pixels
        }
    }
}

/// One level of a mip pyramid.
#[derive(Debug, Clone, PartialEq)]
pub struct MipLevel {
    /// Level width.
    pub width: u32,
    /// Level height.
    pub height: u32,
    /// Level pixels.
    pub pixels: PixelBuffer,
}

/// Number of levels in a full pyramid down to 1x1.
#[must_use]
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    u32::BITS - width.max(height).max(1).leading_zeros()
}

/// Build the full mip pyramid with a 2x2 box filter.
///
/// 1D data only shrinks along its width. Odd edges reuse the last texel.
#[must_use]
pub fn mip_chain(
    base: MipLevel,
    components: u8,
    dimensionality: Dimensionality,
) -> Vec<MipLevel> {
    let count = match dimensionality {
        Dimensionality::D1 => mip_level_count(base.width, 1),
        Dimensionality::D2 => mip_level_count(base.width, base.height),
    };
    let mut levels = Vec::with_capacity(count as usize);
    levels.push(base);
    for _ in 1..count {
        let Some(prev) = levels.last() else { break };
        let next = downsample(prev, components as usize);
        levels.push(next);
    }
    levels
}

fn downsample(level: &MipLevel, components: usize) -> MipLevel {
    let width = (level.width / 2).max(1);
    let height = (level.height / 2).max(1);
    let pixels = match &level.pixels {
        PixelBuffer::Bytes(src) => PixelBuffer::Bytes(box_filter(
            src,
            (level.width, level.height),
            (width, height),
            components,
            |v| v.round().clamp(0.0, 255.0) as u8,
        )),
        PixelBuffer::Floats(src) => PixelBuffer::Floats(box_filter(
            src,
            (level.width, level.height),
            (width, height),
            components,
            |v| v,
        )),
    };
    MipLevel {
        width,
        height,
        pixels,
    }
}

fn box_filter<T: Copy + Into<f32>>(
    src: &[T],
    (src_w, src_h): (u32, u32),
    (dst_w, dst_h): (u32, u32),
    components: usize,
    from_f32: impl Fn(f32) -> T,
) -> Vec<T> {
    let src_w = src_w as usize;
    let src_h = src_h as usize;
    let mut out = Vec::with_capacity(dst_w as usize * dst_h as usize * components);
    for y in 0..dst_h as usize {
        let rows = [(2 * y).min(src_h - 1), (2 * y + 1).min(src_h - 1)];
        for x in 0..dst_w as usize {
            let cols = [(2 * x).min(src_w - 1), (2 * x + 1).min(src_w - 1)];
            for c in 0..components {
                let mut sum = 0.0f32;
                for row in rows {
                    for col in cols {
                        sum += src[(row * src_w + col) * components + c].into();
                    }
                }
                out.push(from_f32(sum / 4.0));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flip_reverses_byte_rows() {
        // 2x3 RGB, row i filled with value i
        let data: Vec<u8> =
            (0..3u8).flat_map(|row| std::iter::repeat_n(row, 6)).collect();
        let flipped = flip_rows(&data, 6, 3);
        for (i, row) in flipped.chunks_exact(6).enumerate() {
            assert!(row.iter().all(|&v| v as usize == 2 - i));
        }
    }

    #[test]
    fn flip_reverses_float_rows() {
        let bitmap = Bitmap::from_floats(
            1,
            4,
            (0..4).flat_map(|r| [r as f32; 4]).collect(),
        );
        let PixelBuffer::Floats(out) = bitmap.into_oriented(true) else {
            panic!("float buffer expected");
        };
        assert_eq!(&out[..4], &[3.0; 4]);
        assert_eq!(&out[12..], &[0.0; 4]);
    }

    #[test]
    fn unflipped_pixels_pass_through() {
        let bitmap = Bitmap::from_bytes(1, 2, 3, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(
            bitmap.into_oriented(false),
            PixelBuffer::Bytes(vec![1, 2, 3, 4, 5, 6])
        );
    }

    #[test]
    fn grey_expands_to_rgb() {
        let bitmap = Bitmap::from_bytes(2, 1, 1, vec![10, 20]);
        let rgb = bitmap.normalized().unwrap();
        assert_eq!(rgb.components, 3);
        assert_eq!(rgb.pixels, PixelBuffer::Bytes(vec![10, 10, 10, 20, 20, 20]));
    }

    #[test]
    fn grey_alpha_expands_to_rgba() {
        let bitmap = Bitmap::from_bytes(1, 1, 2, vec![7, 128]);
        let rgba = bitmap.normalized().unwrap();
        assert_eq!(rgba.components, 4);
        assert_eq!(rgba.pixels, PixelBuffer::Bytes(vec![7, 7, 7, 128]));
    }

    #[test]
    fn consistency_check() {
        assert!(Bitmap::from_bytes(2, 2, 3, vec![0; 12]).is_consistent());
        assert!(!Bitmap::from_bytes(2, 2, 3, vec![0; 11]).is_consistent());
        assert!(!Bitmap::from_floats(1, 1, vec![0.0; 3]).is_consistent());
        assert!(!Bitmap::from_bytes(0, 0, 3, Vec::new()).is_consistent());
    }

    #[test]
    fn mip_count_matches_largest_axis() {
        assert_eq!(mip_level_count(1, 1), 1);
        assert_eq!(mip_level_count(256, 256), 9);
        assert_eq!(mip_level_count(300, 20), 9);
    }

    #[test]
    fn mip_chain_averages_quads() {
        let base = MipLevel {
            width: 2,
            height: 2,
            pixels: PixelBuffer::Bytes(vec![0, 100, 100, 200]),
        };
        let chain = mip_chain(base, 1, Dimensionality::D2);
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[1].width, 1);
        assert_eq!(chain[1].pixels, PixelBuffer::Bytes(vec![100]));
    }

    #[test]
    fn mip_chain_1d_keeps_height() {
        let base = MipLevel {
            width: 8,
            height: 1,
            pixels: PixelBuffer::Floats(vec![1.0; 32]),
        };
        let chain = mip_chain(base, 4, Dimensionality::D1);
        assert_eq!(chain.len(), 4);
        assert!(chain.iter().all(|l| l.height == 1));
        assert_eq!(chain[3].width, 1);
        assert_eq!(chain[3].pixels, PixelBuffer::Floats(vec![1.0; 4]));
    }
}
