//! Grayscale heightmap loading (PGM -> signed samples)

use image::{DynamicImage, ImageFormat};

use crate::error::{DdxmlError, Result};

/// Raw sample value that maps to height zero
pub const HEIGHT_BIAS: i16 = 128;

/// A `width × height` grid of bias-centred samples, row-major.
#[derive(Debug, Clone)]
pub struct Heightmap {
    width: u32,
    height: u32,
    samples: Vec<i16>,
}

impl Heightmap {
    /// Build a heightmap from raw 8-bit samples (row-major).
    pub fn from_raw(width: u32, height: u32, raw: &[u8]) -> Result<Self> {
        if width < 2 || height < 2 {
            return Err(DdxmlError::format(format!(
                "heightmap must be at least 2x2, got {}x{}",
                width, height
            )));
        }
        let count = (width as usize)
            .checked_mul(height as usize)
            .filter(|&n| u32::try_from(n).is_ok())
            .ok_or_else(|| {
                DdxmlError::format(format!("heightmap {}x{} is too large", width, height))
            })?;
        if raw.len() != count {
            return Err(DdxmlError::format(format!(
                "expected {} samples for {}x{}, got {}",
                count,
                width,
                height,
                raw.len()
            )));
        }

        Ok(Self {
            width,
            height,
            samples: raw.iter().map(|&s| i16::from(s) - HEIGHT_BIAS).collect(),
        })
    }

    /// Decode an ASCII (`P2`) or binary (`P5`) graymap.
    pub fn from_pgm(data: &[u8]) -> Result<Self> {
        match data.get(..2) {
            Some(b"P2") | Some(b"P5") => {}
            _ => return Err(DdxmlError::format("no PGM graymap header (expected P2 or P5)")),
        }

        let image = image::load_from_memory_with_format(data, ImageFormat::Pnm)
            .map_err(|e| DdxmlError::format(format!("bad PGM data: {}", e)))?;

        Self::from_image(&image)
    }

    /// Wrap a decoded image. Only 8-bit single channel images are accepted.
    pub fn from_image(image: &DynamicImage) -> Result<Self> {
        match image {
            DynamicImage::ImageLuma8(gray) => {
                Self::from_raw(gray.width(), gray.height(), gray.as_raw())
            }
            other => Err(DdxmlError::format(format!(
                "heightmap must be 8-bit grayscale, got {:?}",
                other.color()
            ))),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bias-centred sample at `(x, y)`. Panics when out of bounds.
    pub fn sample(&self, x: u32, y: u32) -> i16 {
        self.samples[(y * self.width + x) as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_pgm_with_comment() {
        let pgm = b"P2\n# CREATOR: GIMP PNM Filter Version 1.1\n2 2\n255\n120\n130\n140\n150\n";
        let map = Heightmap::from_pgm(pgm).unwrap();
        assert_eq!((map.width(), map.height()), (2, 2));
        assert_eq!(map.sample(0, 0), -8);
        assert_eq!(map.sample(1, 0), 2);
        assert_eq!(map.sample(0, 1), 12);
        assert_eq!(map.sample(1, 1), 22);
    }

    #[test]
    fn test_binary_pgm() {
        let mut pgm = b"P5\n3 2\n255\n".to_vec();
        pgm.extend_from_slice(&[0, 128, 255, 1, 2, 3]);
        let map = Heightmap::from_pgm(&pgm).unwrap();
        assert_eq!((map.width(), map.height()), (3, 2));
        assert_eq!(map.sample(0, 0), -128);
        assert_eq!(map.sample(2, 0), 127);
        assert_eq!(map.sample(2, 1), -125);
    }

    #[test]
    fn test_rejects_missing_magic() {
        let err = Heightmap::from_pgm(b"2 2\n255\n1 2 3 4\n").unwrap_err();
        assert!(matches!(err, DdxmlError::FormatError(_)));
    }

    #[test]
    fn test_rejects_color_pnm() {
        let err = Heightmap::from_pgm(b"P3\n1 1\n255\n1 2 3\n").unwrap_err();
        assert!(matches!(err, DdxmlError::FormatError(_)));
    }

    #[test]
    fn test_rejects_degenerate_size() {
        assert!(Heightmap::from_raw(1, 4, &[0; 4]).is_err());
        assert!(Heightmap::from_raw(2, 2, &[0; 3]).is_err());
    }

    #[test]
    fn test_rejects_oversized_dimensions() {
        // 65536 * 65536 wraps to 0 in u32
        let err = Heightmap::from_raw(65536, 65536, &[]).unwrap_err();
        assert!(matches!(err, DdxmlError::FormatError(_)));
    }
}
