//! Point geometry: pixel-space points and canonical corner ordering.
//!
//! # Coordinate System
//!
//! - Coordinates are source-image pixels as `f64`
//! - Origin is the top-left corner, y grows downward
//! - "Clockwise" always means clockwise as seen on screen

mod order;
mod point;

pub use order::{order_points, OrderedQuad};
pub(crate) use point::cross;
pub use point::{nearest_point, Point2D};
