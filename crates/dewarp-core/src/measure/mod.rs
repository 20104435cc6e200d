//! Real-world measurement: units, output dimensions and scale calibration.
//!
//! Pixel lengths become physical lengths either through DPI or through a
//! [`ScaleCalibration`]; a calibration, when present, takes precedence for the
//! image it was placed on.

mod calibration;
mod dimensions;
mod units;

pub use calibration::{calibrate, ScaleCalibration};
pub use dimensions::{estimate_dimensions, pixel_extent, DimensionSpec};
pub(crate) use units::check_dpi;
pub use units::{Unit, MM_PER_INCH};
