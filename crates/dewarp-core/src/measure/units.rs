//! Length units and DPI-based conversion.
//!
//! # Rounding
//!
//! Conversion to an output pixel count uses `f64::round` (nearest, half away
//! from zero) and never returns less than one pixel:
//!
//! ```text
//! 210 mm @ 300 DPI = 210 / 25.4 * 300 = 2480.31 -> 2480 px
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Millimetres per inch.
pub const MM_PER_INCH: f64 = 25.4;

/// Unit used for output dimensions and measurements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Unit {
    #[default]
    #[serde(rename = "mm")]
    Millimeter,
    #[serde(rename = "in")]
    Inch,
    #[serde(rename = "px")]
    Pixel,
}

impl Unit {
    /// Short display label.
    pub fn label(self) -> &'static str {
        match self {
            Unit::Millimeter => "mm",
            Unit::Inch => "in",
            Unit::Pixel => "px",
        }
    }

    /// Recommended increment for numeric input fields.
    pub fn step(self) -> f64 {
        match self {
            Unit::Millimeter => 0.5,
            Unit::Inch => 0.1,
            Unit::Pixel => 1.0,
        }
    }

    /// Convert a length in this unit to millimetres.
    pub fn to_millimeters(self, value: f64, dpi: f64) -> f64 {
        match self {
            Unit::Millimeter => value,
            Unit::Inch => value * MM_PER_INCH,
            Unit::Pixel => value / dpi * MM_PER_INCH,
        }
    }

    /// Convert a length in millimetres to this unit.
    pub fn from_millimeters(self, mm: f64, dpi: f64) -> f64 {
        match self {
            Unit::Millimeter => mm,
            Unit::Inch => mm / MM_PER_INCH,
            Unit::Pixel => mm / MM_PER_INCH * dpi,
        }
    }

    /// Convert `value` from one unit to another at the given DPI.
    pub fn convert(value: f64, from: Unit, to: Unit, dpi: f64) -> f64 {
        if from == to {
            return value;
        }
        to.from_millimeters(from.to_millimeters(value, dpi), dpi)
    }

    /// Convert a pixel length measured with DPI to this unit.
    pub fn from_pixels(self, pixels: f64, dpi: f64) -> f64 {
        Unit::convert(pixels, Unit::Pixel, self, dpi)
    }

    /// Output pixel count for a length in this unit, rounded to nearest.
    pub fn to_pixels(self, value: f64, dpi: f64) -> u32 {
        let px = match self {
            Unit::Millimeter => value / MM_PER_INCH * dpi,
            Unit::Inch => value * dpi,
            Unit::Pixel => value,
        };
        px.round().clamp(1.0, u32::MAX as f64) as u32
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Reject a DPI that cannot be used as a divisor.
pub(crate) fn check_dpi(dpi: f64) -> Result<()> {
    if dpi.is_finite() && dpi > 0.0 {
        Ok(())
    } else {
        Err(CoreError::InvalidDpi(dpi))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_a4_width_at_300_dpi_rounds_down() {
        assert_eq!(Unit::Millimeter.to_pixels(210.0, 300.0), 2480);
    }

    #[test]
    fn test_a4_height_at_300_dpi() {
        // 297 / 25.4 * 300 = 3507.87
        assert_eq!(Unit::Millimeter.to_pixels(297.0, 300.0), 3508);
    }

    #[test]
    fn test_inch_and_pixel_to_pixels() {
        assert_eq!(Unit::Inch.to_pixels(8.5, 300.0), 2550);
        assert_eq!(Unit::Pixel.to_pixels(99.5, 300.0), 100);
    }

    #[test]
    fn test_to_pixels_never_zero() {
        assert_eq!(Unit::Millimeter.to_pixels(0.01, 72.0), 1);
        assert_eq!(Unit::Pixel.to_pixels(0.0, 300.0), 1);
    }

    #[test]
    fn test_convert_between_units() {
        assert!((Unit::convert(25.4, Unit::Millimeter, Unit::Inch, 300.0) - 1.0).abs() < 1e-12);
        assert!((Unit::convert(1.0, Unit::Inch, Unit::Pixel, 300.0) - 300.0).abs() < 1e-9);
        assert!((Unit::convert(600.0, Unit::Pixel, Unit::Millimeter, 300.0) - 50.8).abs() < 1e-9);
        assert_eq!(Unit::convert(7.0, Unit::Pixel, Unit::Pixel, 1.0), 7.0);
    }

    #[test]
    fn test_from_pixels() {
        assert!((Unit::Millimeter.from_pixels(300.0, 300.0) - 25.4).abs() < 1e-12);
    }

    #[test]
    fn test_labels_and_steps() {
        assert_eq!(Unit::Millimeter.label(), "mm");
        assert_eq!(Unit::Inch.to_string(), "in");
        assert_eq!(Unit::Pixel.step(), 1.0);
        assert_eq!(Unit::Millimeter.step(), 0.5);
    }

    #[test]
    fn test_check_dpi() {
        assert!(check_dpi(300.0).is_ok());
        assert!(check_dpi(0.0).is_err());
        assert!(check_dpi(f64::NAN).is_err());
        assert!(check_dpi(-72.0).is_err());
    }

    #[test]
    fn test_unit_serde_names() {
        let json = serde_json::to_string(&Unit::Inch).unwrap();
        assert_eq!(json, "\"in\"");
        let unit: Unit = serde_json::from_str("\"px\"").unwrap();
        assert_eq!(unit, Unit::Pixel);
    }
}
