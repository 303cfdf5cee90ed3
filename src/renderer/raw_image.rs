//! Owned CPU-side images
//!
//! Pixels are tightly packed 8-bit channels, rows top to bottom.

use crate::error::{RendererError, RendererResult};
use image::{ColorType, DynamicImage, ImageFormat};
use std::path::Path;

/// Width, height, channel count and pixel bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImage {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub pixels: Vec<u8>,
}

impl RawImage {
    /// Wrap a pixel buffer, checking that it matches the dimensions
    pub fn new(width: u32, height: u32, channels: u8, pixels: Vec<u8>) -> RendererResult<Self> {
        let image = Self {
            width,
            height,
            channels,
            pixels,
        };
        image.validate()?;
        Ok(image)
    }

    /// Image filled with one pixel value. `value` must hold `channels` bytes.
    pub fn filled(width: u32, height: u32, value: &[u8]) -> RendererResult<Self> {
        let channels = u8::try_from(value.len())
            .map_err(|_| RendererError::InvalidImage(format!("{} channels", value.len())))?;
        let pixels = value.repeat(width as usize * height as usize);
        Self::new(width, height, channels, pixels)
    }

    /// Expected buffer length for the dimensions
    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * self.channels as usize
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn validate(&self) -> RendererResult<()> {
        if !matches!(self.channels, 1 | 3 | 4) {
            return Err(RendererError::InvalidImage(format!(
                "unsupported channel count {}",
                self.channels
            )));
        }
        if self.pixels.len() != self.byte_len() {
            return Err(RendererError::InvalidImage(format!(
                "{}x{}x{} image has {} bytes, expected {}",
                self.width,
                self.height,
                self.channels,
                self.pixels.len(),
                self.byte_len()
            )));
        }
        Ok(())
    }

    /// Bytes of the pixel at (x, y)
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let channels = self.channels as usize;
        let start = (y as usize * self.width as usize + x as usize) * channels;
        &self.pixels[start..start + channels]
    }

    /// Decode an image file. Luma-alpha and 16-bit images are converted to RGBA8.
    pub fn load(path: impl AsRef<Path>, flip_vertically: bool) -> RendererResult<Self> {
        let path = path.as_ref();
        let mut decoded = image::open(path)?;
        if flip_vertically {
            decoded = decoded.flipv();
        }
        let image = Self::from_dynamic(decoded);
        log::debug!(
            "[RawImage::load] {} ({}x{}, {} channels)",
            path.display(),
            image.width,
            image.height,
            image.channels
        );
        Ok(image)
    }

    /// Convert a decoded image into 1, 3 or 4 channels
    pub fn from_dynamic(decoded: DynamicImage) -> Self {
        let (width, height) = (decoded.width(), decoded.height());
        let (channels, pixels) = match decoded {
            DynamicImage::ImageLuma8(buffer) => (1, buffer.into_raw()),
            DynamicImage::ImageRgb8(buffer) => (3, buffer.into_raw()),
            DynamicImage::ImageRgba8(buffer) => (4, buffer.into_raw()),
            other => (4, other.to_rgba8().into_raw()),
        };
        Self {
            width,
            height,
            channels,
            pixels,
        }
    }

    /// Write the image as PNG
    pub fn save_png(&self, path: impl AsRef<Path>) -> RendererResult<()> {
        self.validate()?;
        let color = match self.channels {
            1 => ColorType::L8,
            3 => ColorType::Rgb8,
            _ => ColorType::Rgba8,
        };
        image::save_buffer_with_format(
            path.as_ref(),
            &self.pixels,
            self.width,
            self.height,
            color,
            ImageFormat::Png,
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayAlphaImage, LumaA, Rgb, RgbImage};

    #[test]
    fn test_validation() {
        assert!(RawImage::new(2, 2, 4, vec![0; 16]).is_ok());
        assert!(matches!(
            RawImage::new(2, 2, 4, vec![0; 15]),
            Err(RendererError::InvalidImage(_))
        ));
        assert!(matches!(
            RawImage::new(1, 1, 0, vec![]),
            Err(RendererError::InvalidImage(_))
        ));
        assert!(RawImage::new(1, 1, 2, vec![0, 0]).is_err());
    }

    #[test]
    fn test_filled() {
        let image = RawImage::filled(3, 2, &[1, 2, 3]).unwrap();
        assert_eq!(image.channels, 3);
        assert_eq!(image.pixel(2, 1), &[1, 2, 3]);
        assert_eq!(image.area(), 6);
    }

    #[test]
    fn test_png_round_trip_with_flip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gradient.png");

        let mut buffer = RgbImage::new(2, 3);
        for (x, y, pixel) in buffer.enumerate_pixels_mut() {
            *pixel = Rgb([x as u8 * 100, y as u8 * 50, 7]);
        }
        let original = RawImage::from_dynamic(DynamicImage::ImageRgb8(buffer));
        original.save_png(&path).unwrap();

        let loaded = RawImage::load(&path, false).unwrap();
        assert_eq!(loaded, original);

        let flipped = RawImage::load(&path, true).unwrap();
        assert_eq!(flipped.pixel(1, 0), original.pixel(1, 2));
        assert_eq!(flipped.pixel(0, 2), original.pixel(0, 0));
    }

    #[test]
    fn test_luma_alpha_becomes_rgba() {
        let buffer = GrayAlphaImage::from_pixel(1, 1, LumaA([80, 200]));
        let image = RawImage::from_dynamic(DynamicImage::ImageLumaA8(buffer));
        assert_eq!(image.channels, 4);
        assert_eq!(image.pixels, vec![80, 80, 80, 200]);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = RawImage::load(dir.path().join("missing.png"), false);
        assert!(matches!(result, Err(RendererError::Image(_))));
    }
}
