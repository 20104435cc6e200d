//! Output dimension estimation and the manual-override lock.
//!
//! # Algorithm
//!
//! Pixel width is the mean of the top and bottom edge lengths, pixel height
//! the mean of the left and right edge lengths. These are converted to the
//! requested unit either through a scale calibration or through DPI.
//!
//! # Locking
//!
//! Estimation runs after every point change but is discarded while the
//! dimensions are locked. Any manual edit locks, even when the value equals the estimate;
//! only an explicit unlock re-enables estimation.

use serde::{Deserialize, Serialize};

use super::calibration::ScaleCalibration;
use super::units::Unit;
use crate::error::{CoreError, Result};
use crate::geometry::OrderedQuad;

/// Requested output size of the reference rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DimensionSpec {
    pub width: f64,
    pub height: f64,
    pub unit: Unit,
    /// `false` while width and height are derived from the points.
    pub locked: bool,
}

impl DimensionSpec {
    /// No dimensions yet, estimation enabled.
    pub fn unset(unit: Unit) -> Self {
        Self {
            width: 0.0,
            height: 0.0,
            unit,
            locked: false,
        }
    }

    /// True once both width and height hold usable values.
    pub fn is_set(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }

    /// Manually set the width. Locks the dimensions.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidDimension`] if `value` is not a positive number;
    /// the dimensions are left untouched and not locked.
    pub fn set_width(&mut self, value: f64) -> Result<()> {
        check_dimension(value)?;
        self.width = value;
        self.locked = true;
        Ok(())
    }

    /// Manually set the height. Locks the dimensions.
    pub fn set_height(&mut self, value: f64) -> Result<()> {
        check_dimension(value)?;
        self.height = value;
        self.locked = true;
        Ok(())
    }

    /// Re-enable estimation.
    pub fn unlock(&mut self) {
        self.locked = false;
    }

    /// Recompute from `quad` unless locked. Returns whether values changed.
    pub fn refresh(
        &mut self,
        quad: &OrderedQuad,
        dpi: f64,
        calibration: Option<&ScaleCalibration>,
    ) -> bool {
        if self.locked {
            return false;
        }
        let (width, height) = estimate_dimensions(quad, self.unit, dpi, calibration);
        let changed = width != self.width || height != self.height;
        self.width = width;
        self.height = height;
        changed
    }

    /// Switch unit, carrying the current values over at `dpi`.
    pub fn convert_to(&mut self, unit: Unit, dpi: f64) {
        self.width = Unit::convert(self.width, self.unit, unit, dpi);
        self.height = Unit::convert(self.height, self.unit, unit, dpi);
        self.unit = unit;
    }

    /// Output size in pixels, `(width, height)`.
    pub fn to_pixels(&self, dpi: f64) -> (u32, u32) {
        (
            self.unit.to_pixels(self.width, dpi),
            self.unit.to_pixels(self.height, dpi),
        )
    }

    /// Forget the values and unlock.
    pub(crate) fn clear(&mut self) {
        *self = Self::unset(self.unit);
    }
}

fn check_dimension(value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(CoreError::InvalidDimension(value))
    }
}

/// Mean opposing edge lengths in pixels, `(width, height)`.
pub fn pixel_extent(quad: &OrderedQuad) -> (f64, f64) {
    let [top, right, bottom, left] = quad.edge_lengths();
    ((top + bottom) / 2.0, (left + right) / 2.0)
}

/// Estimate the real-world size of `quad` in `unit`.
///
/// With a calibration the pixel extent is scaled by its factor (and converted
/// from the calibration's unit if needed); otherwise DPI is used.
pub fn estimate_dimensions(
    quad: &OrderedQuad,
    unit: Unit,
    dpi: f64,
    calibration: Option<&ScaleCalibration>,
) -> (f64, f64) {
    let (px_w, px_h) = pixel_extent(quad);
    match calibration {
        Some(cal) => (
            cal.measure_pixels(px_w, unit, dpi),
            cal.measure_pixels(px_h, unit, dpi),
        ),
        None => (unit.from_pixels(px_w, dpi), unit.from_pixels(px_h, dpi)),
    }
}
