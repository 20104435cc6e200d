//! WASM-compatible wrapper types for raster data and enum parameters.
//!
//! Enums cross the boundary as their short string names (`"mm"`, `"crop"`,
//! `"result"`), the same names the JSON configuration uses.

use dewarp_core::{BitDepth, ImageTarget, Raster, Samples, TransformMode, Unit};
use wasm_bindgen::prelude::*;

/// A raster wrapper for JavaScript.
///
/// Pixels are interleaved and row-major, 1 to 4 channels at 8 or 16 bits.
/// `pixels()` always returns 8-bit data; 16-bit rasters are reduced on the
/// way out. Use `pixels16()` for the full depth.
#[wasm_bindgen]
#[derive(Debug, Clone)]
pub struct JsRaster {
    inner: Raster,
}

#[wasm_bindgen]
impl JsRaster {
    /// Create an 8-bit raster. Canvas `ImageData` is `channels = 4`.
    #[wasm_bindgen(constructor)]
    pub fn new(width: u32, height: u32, channels: u8, pixels: Vec<u8>) -> Result<JsRaster, JsValue> {
        Raster::from_u8(width, height, channels, pixels)
            .map(JsRaster::from_raster)
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Create a 16-bit raster.
    pub fn from_u16(
        width: u32,
        height: u32,
        channels: u8,
        pixels: Vec<u16>,
    ) -> Result<JsRaster, JsValue> {
        Raster::from_u16(width, height, channels, pixels)
            .map(JsRaster::from_raster)
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    #[wasm_bindgen(getter)]
    pub fn width(&self) -> u32 {
        self.inner.width()
    }

    #[wasm_bindgen(getter)]
    pub fn height(&self) -> u32 {
        self.inner.height()
    }

    #[wasm_bindgen(getter)]
    pub fn channels(&self) -> u8 {
        self.inner.channels()
    }

    /// 8 or 16.
    #[wasm_bindgen(getter)]
    pub fn bit_depth(&self) -> u8 {
        match self.inner.bit_depth() {
            BitDepth::Eight => 8,
            BitDepth::Sixteen => 16,
        }
    }

    /// Number of samples (not bytes for 16-bit data).
    #[wasm_bindgen(getter)]
    pub fn sample_count(&self) -> usize {
        self.inner.samples().len()
    }

    /// 8-bit pixel data as `Uint8Array`. This is a copy.
    pub fn pixels(&self) -> Vec<u8> {
        match self.inner.samples() {
            Samples::U8(v) => v.clone(),
            Samples::U16(v) => v.iter().map(|&s| (s >> 8) as u8).collect(),
        }
    }

    /// 16-bit pixel data as `Uint16Array`. 8-bit samples are widened by 257.
    pub fn pixels16(&self) -> Vec<u16> {
        match self.inner.samples() {
            Samples::U8(v) => v.iter().map(|&s| s as u16 * 257).collect(),
            Samples::U16(v) => v.clone(),
        }
    }
}

impl JsRaster {
    pub(crate) fn from_raster(inner: Raster) -> Self {
        Self { inner }
    }

    pub(crate) fn raster(&self) -> &Raster {
        &self.inner
    }
}

pub(crate) fn unit_from_str(value: &str) -> Result<Unit, String> {
    match value {
        "mm" => Ok(Unit::Millimeter),
        "in" => Ok(Unit::Inch),
        "px" => Ok(Unit::Pixel),
        other => Err(format!("unknown unit '{}' (expected mm, in or px)", other)),
    }
}

pub(crate) fn mode_from_str(value: &str) -> Result<TransformMode, String> {
    match value {
        "full_image" => Ok(TransformMode::FullImage),
        "crop" => Ok(TransformMode::Crop),
        other => Err(format!("unknown mode '{}' (expected full_image or crop)", other)),
    }
}

pub(crate) fn target_from_str(value: &str) -> Result<ImageTarget, String> {
    match value {
        "original" => Ok(ImageTarget::Original),
        "result" => Ok(ImageTarget::Result),
        other => Err(format!("unknown image '{}' (expected original or result)", other)),
    }
}
