//! Pixel buffers exchanged with the image loading and saving collaborators.
//!
//! This module provides:
//! - [`Raster`], a decoded buffer of 1 to 4 interleaved channels at 8 or 16 bits
//! - Conversion to and from `image::DynamicImage`
//! - Quarter-turn rotation and flips
//!
//! File formats are not handled here; the caller decodes and encodes.

mod orient;
mod types;

pub use orient::{FlipAxis, Rotation};
pub(crate) use types::Sample;
pub use types::{BitDepth, Raster, Samples};
