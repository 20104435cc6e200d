//! 2D points in source-image pixel space.

use serde::{Deserialize, Serialize};

/// A point in pixel coordinates. Origin is the top-left corner, y grows downward.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    #[inline]
    pub fn distance(&self, other: &Point2D) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Clamp into the pixel grid of a `width` x `height` image.
    pub fn clamp_to(&self, width: u32, height: u32) -> Point2D {
        let max_x = width.saturating_sub(1) as f64;
        let max_y = height.saturating_sub(1) as f64;
        Point2D::new(self.x.clamp(0.0, max_x), self.y.clamp(0.0, max_y))
    }
}

impl From<(f64, f64)> for Point2D {
    fn from((x, y): (f64, f64)) -> Self {
        Self::new(x, y)
    }
}

/// Z component of the cross product `(b - a) x (c - a)`.
///
/// Positive when `a -> b -> c` turns clockwise on screen (y down).
#[inline]
pub(crate) fn cross(a: &Point2D, b: &Point2D, c: &Point2D) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

/// Index of the point closest to `target`, if it lies within `threshold` pixels.
///
/// Used by the UI collaborator to decide which corner or calibration point
/// a press lands on.
pub fn nearest_point(points: &[Point2D], target: Point2D, threshold: f64) -> Option<usize> {
    points
        .iter()
        .enumerate()
        .map(|(i, p)| (i, p.distance(&target)))
        .filter(|&(_, d)| d <= threshold)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(i, _)| i)
}
