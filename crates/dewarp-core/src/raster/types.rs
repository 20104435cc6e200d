//! Core raster types.

use image::{DynamicImage, ImageBuffer, Luma, LumaA, Rgb, Rgba};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Bit depth of a raster's samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BitDepth {
    /// 8 bits per channel.
    Eight,
    /// 16 bits per channel.
    Sixteen,
}

/// Interleaved, row-major sample storage.
#[derive(Debug, Clone, PartialEq)]
pub enum Samples {
    U8(Vec<u8>),
    U16(Vec<u16>),
}

impl Samples {
    /// Number of samples in the buffer.
    pub fn len(&self) -> usize {
        match self {
            Samples::U8(v) => v.len(),
            Samples::U16(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn bit_depth(&self) -> BitDepth {
        match self {
            Samples::U8(_) => BitDepth::Eight,
            Samples::U16(_) => BitDepth::Sixteen,
        }
    }
}

/// A single channel value that the resampler can interpolate.
pub(crate) trait Sample: Copy + Default + Send + Sync + 'static {
    /// Largest representable value.
    const MAX: f64;

    fn to_f64(self) -> f64;

    /// Round to nearest and clamp into range.
    fn from_f64(value: f64) -> Self;
}

impl Sample for u8 {
    const MAX: f64 = u8::MAX as f64;

    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }

    #[inline]
    fn from_f64(value: f64) -> Self {
        value.clamp(0.0, <Self as Sample>::MAX).round() as u8
    }
}

impl Sample for u16 {
    const MAX: f64 = u16::MAX as f64;

    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }

    #[inline]
    fn from_f64(value: f64) -> Self {
        value.clamp(0.0, <Self as Sample>::MAX).round() as u16
    }
}

/// A decoded pixel buffer supplied by the image-loading collaborator.
///
/// Channel count is 1 (gray), 2 (gray + alpha), 3 (RGB) or 4 (RGBA).
/// Every operation in this crate preserves both the channel count and the
/// bit depth of its input.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    width: u32,
    height: u32,
    channels: u8,
    samples: Samples,
}

impl Raster {
    /// Create a raster, validating the buffer against the declared layout.
    pub fn new(width: u32, height: u32, channels: u8, samples: Samples) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(CoreError::InvalidRaster(format!(
                "zero-sized raster {}x{}",
                width, height
            )));
        }
        if !(1..=4).contains(&channels) {
            return Err(CoreError::InvalidRaster(format!(
                "unsupported channel count {}",
                channels
            )));
        }
        let expected = width as usize * height as usize * channels as usize;
        if samples.len() != expected {
            return Err(CoreError::InvalidRaster(format!(
                "expected {} samples for {}x{}x{}, got {}",
                expected,
                width,
                height,
                channels,
                samples.len()
            )));
        }
        Ok(Self {
            width,
            height,
            channels,
            samples,
        })
    }

    /// Create an 8-bit raster.
    pub fn from_u8(width: u32, height: u32, channels: u8, samples: Vec<u8>) -> Result<Self> {
        Self::new(width, height, channels, Samples::U8(samples))
    }

    /// Create a 16-bit raster.
    pub fn from_u16(width: u32, height: u32, channels: u8, samples: Vec<u16>) -> Result<Self> {
        Self::new(width, height, channels, Samples::U16(samples))
    }

    /// Construct without validation. Callers guarantee the layout.
    pub(crate) fn from_parts(width: u32, height: u32, channels: u8, samples: Samples) -> Self {
        debug_assert_eq!(
            samples.len(),
            width as usize * height as usize * channels as usize,
            "Sample buffer size mismatch"
        );
        Self {
            width,
            height,
            channels,
            samples,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// `(width, height)` in pixels.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn bit_depth(&self) -> BitDepth {
        self.samples.bit_depth()
    }

    pub fn samples(&self) -> &Samples {
        &self.samples
    }

    pub fn into_samples(self) -> Samples {
        self.samples
    }

    /// Get the total number of pixels.
    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Read one channel of one pixel, widened to `u16`.
    pub fn sample(&self, x: u32, y: u32, channel: u8) -> Option<u16> {
        if x >= self.width || y >= self.height || channel >= self.channels {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * self.channels as usize
            + channel as usize;
        match &self.samples {
            Samples::U8(v) => v.get(idx).map(|&s| s as u16),
            Samples::U16(v) => v.get(idx).copied(),
        }
    }

    /// Convert to an `image::DynamicImage` for the saving collaborator.
    pub fn to_dynamic(&self) -> Result<DynamicImage> {
        let (w, h) = (self.width, self.height);
        let image = match (&self.samples, self.channels) {
            (Samples::U8(v), 1) => {
                ImageBuffer::<Luma<u8>, _>::from_raw(w, h, v.clone()).map(DynamicImage::ImageLuma8)
            }
            (Samples::U8(v), 2) => ImageBuffer::<LumaA<u8>, _>::from_raw(w, h, v.clone())
                .map(DynamicImage::ImageLumaA8),
            (Samples::U8(v), 3) => {
                ImageBuffer::<Rgb<u8>, _>::from_raw(w, h, v.clone()).map(DynamicImage::ImageRgb8)
            }
            (Samples::U8(v), 4) => {
                ImageBuffer::<Rgba<u8>, _>::from_raw(w, h, v.clone()).map(DynamicImage::ImageRgba8)
            }
            (Samples::U16(v), 1) => ImageBuffer::<Luma<u16>, _>::from_raw(w, h, v.clone())
                .map(DynamicImage::ImageLuma16),
            (Samples::U16(v), 2) => ImageBuffer::<LumaA<u16>, _>::from_raw(w, h, v.clone())
                .map(DynamicImage::ImageLumaA16),
            (Samples::U16(v), 3) => ImageBuffer::<Rgb<u16>, _>::from_raw(w, h, v.clone())
                .map(DynamicImage::ImageRgb16),
            (Samples::U16(v), 4) => ImageBuffer::<Rgba<u16>, _>::from_raw(w, h, v.clone())
                .map(DynamicImage::ImageRgba16),
            _ => None,
        };
        image.ok_or_else(|| {
            CoreError::InvalidRaster(format!(
                "cannot build image buffer for {}x{}x{}",
                w, h, self.channels
            ))
        })
    }
}

impl TryFrom<DynamicImage> for Raster {
    type Error = CoreError;

    /// Integer layouts are kept as they are; floating-point images are
    /// converted to 16-bit RGBA.
    fn try_from(image: DynamicImage) -> Result<Self> {
        let (w, h) = (image.width(), image.height());
        let (channels, samples) = match image {
            DynamicImage::ImageLuma8(b) => (1, Samples::U8(b.into_raw())),
            DynamicImage::ImageLumaA8(b) => (2, Samples::U8(b.into_raw())),
            DynamicImage::ImageRgb8(b) => (3, Samples::U8(b.into_raw())),
            DynamicImage::ImageRgba8(b) => (4, Samples::U8(b.into_raw())),
            DynamicImage::ImageLuma16(b) => (1, Samples::U16(b.into_raw())),
            DynamicImage::ImageLumaA16(b) => (2, Samples::U16(b.into_raw())),
            DynamicImage::ImageRgb16(b) => (3, Samples::U16(b.into_raw())),
            DynamicImage::ImageRgba16(b) => (4, Samples::U16(b.into_raw())),
            other => (4, Samples::U16(other.to_rgba16().into_raw())),
        };
        Self::new(w, h, channels, samples)
    }
}
