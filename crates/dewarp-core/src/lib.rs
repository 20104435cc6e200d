//! Dewarp Core - perspective correction engine
//!
//! This crate turns four user-picked corner points into a rectified image:
//! it orders the points, estimates real-world output dimensions (from DPI or
//! a scale calibration), solves the quad-to-rectangle homography and
//! resamples the source through it.
//!
//! File formats, windowing and input handling are left to the caller. Images
//! cross the boundary as [`Raster`] buffers.
//!
//! # Example
//!
//! ```ignore
//! use dewarp_core::{Point2D, Raster, Session, SessionConfig};
//!
//! let mut session = Session::with_image(raster, SessionConfig::default())?;
//! for (x, y) in [(40.0, 52.0), (610.0, 38.0), (655.0, 880.0), (22.0, 860.0)] {
//!     session.add_point(Point2D::new(x, y))?;
//! }
//! let corrected = session.apply_transform()?;
//! ```

pub mod config;
pub mod error;
pub mod geometry;
pub mod measure;
pub mod raster;
pub mod session;
pub mod transform;

pub use config::SessionConfig;
pub use error::{CoreError, CoreErrorKind, Result};
pub use geometry::{nearest_point, order_points, OrderedQuad, Point2D};
pub use measure::{calibrate, estimate_dimensions, DimensionSpec, ScaleCalibration, Unit};
pub use raster::{BitDepth, FlipAxis, Raster, Rotation, Samples};
pub use session::{ImageTarget, Session, SessionState, TransformJob, TransformOutcome};
pub use transform::{solve, warp, Background, Homography, TransformMode, TransformPlan};
