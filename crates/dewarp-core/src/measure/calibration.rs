//! Scale calibration from a known real-world distance.
//!
//! The user marks two points on something of known length (a ruler, a grid
//! line) and enters that length. The resulting factor replaces DPI for every
//! measurement on the image the points were placed on.
//!
//! Both points stay draggable: the pixel distance, and therefore the factor,
//! is always derived from their current positions while the real-world length
//! stays fixed.

use serde::{Deserialize, Serialize};

use super::units::Unit;
use crate::error::{CoreError, Result};
use crate::geometry::Point2D;

/// A pixel-distance to real-distance ratio for one image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleCalibration {
    points: [Point2D; 2],
    real_distance: f64,
    unit: Unit,
}

/// Derive a calibration from two points and the real length between them.
///
/// # Errors
///
/// - [`CoreError::ZeroDistance`] if `p1` and `p2` coincide
/// - [`CoreError::InvalidDimension`] if `real_distance` is not a positive number
pub fn calibrate(
    p1: Point2D,
    p2: Point2D,
    real_distance: f64,
    unit: Unit,
) -> Result<ScaleCalibration> {
    if !(real_distance.is_finite() && real_distance > 0.0) {
        return Err(CoreError::InvalidDimension(real_distance));
    }
    check_separation(&p1, &p2)?;
    Ok(ScaleCalibration {
        points: [p1, p2],
        real_distance,
        unit,
    })
}

fn check_separation(p1: &Point2D, p2: &Point2D) -> Result<()> {
    let d = p1.distance(p2);
    if d.is_finite() && d > 0.0 {
        Ok(())
    } else {
        Err(CoreError::ZeroDistance)
    }
}

impl ScaleCalibration {
    pub fn points(&self) -> [Point2D; 2] {
        self.points
    }

    pub fn real_distance(&self) -> f64 {
        self.real_distance
    }

    /// Unit of [`Self::real_distance`] and of [`Self::scale_factor`].
    pub fn unit(&self) -> Unit {
        self.unit
    }

    /// Current distance between the two points, in pixels.
    pub fn pixel_distance(&self) -> f64 {
        self.points[0].distance(&self.points[1])
    }

    /// Units per pixel.
    pub fn scale_factor(&self) -> f64 {
        self.real_distance / self.pixel_distance()
    }

    /// Move one of the two points. A move onto the other point is rejected
    /// and leaves the calibration unchanged.
    pub fn move_point(&mut self, index: usize, to: Point2D) -> Result<()> {
        let other = match index {
            0 => self.points[1],
            1 => self.points[0],
            _ => return Err(CoreError::PointIndexOutOfRange { index, len: 2 }),
        };
        check_separation(&to, &other)?;
        self.points[index] = to;
        Ok(())
    }

    /// Convert a pixel length on the calibrated image to `unit`.
    ///
    /// The calibrated length is in the calibration's own unit; a different
    /// target unit goes through `dpi`.
    pub fn measure_pixels(&self, pixels: f64, unit: Unit, dpi: f64) -> f64 {
        Unit::convert(pixels * self.scale_factor(), self.unit, unit, dpi)
    }

    /// Short human-readable status line.
    pub fn describe(&self) -> String {
        format!(
            "scale calibrated: {:.1} {} over {:.1} px",
            self.real_distance,
            self.unit,
            self.pixel_distance()
        )
    }
}
