//! Canonical ordering of four corner points.
//!
//! # Algorithm
//!
//! Points are sorted by their angle around the centroid. With y pointing
//! down, increasing angle walks clockwise on screen, which is exactly the
//! top-left → top-right → bottom-right → bottom-left cycle. The cycle is then
//! rotated to start at the point with the smallest `x + y` (ties broken by the
//! smallest `y - x`).
//!
//! Because the result depends only on the point set, reordering after every
//! drag keeps the outline a simple polygon: labels only change when a point
//! genuinely crosses past a neighbour.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::point::{cross, Point2D};
use crate::error::{CoreError, Result};

/// Area below this fraction of the squared extent collapses the quad to a line.
const MIN_RELATIVE_AREA: f64 = 1e-6;

/// Corner turn below this fraction of the squared extent counts as collinear.
const MIN_RELATIVE_TURN: f64 = 1e-9;

/// Four corners in canonical order: top-left, top-right, bottom-right, bottom-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderedQuad {
    corners: [Point2D; 4],
}

impl OrderedQuad {
    /// Wrap corners that are already in canonical order.
    ///
    /// No validation happens here; [`order_points`] is the checked path and
    /// the transform solver applies its own conditioning checks.
    pub fn from_corners(corners: [Point2D; 4]) -> Self {
        Self { corners }
    }

    /// Axis-aligned rectangle with its top-left corner at `(x, y)`.
    pub fn rectangle(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::from_corners([
            Point2D::new(x, y),
            Point2D::new(x + width, y),
            Point2D::new(x + width, y + height),
            Point2D::new(x, y + height),
        ])
    }

    pub fn top_left(&self) -> Point2D {
        self.corners[0]
    }

    pub fn top_right(&self) -> Point2D {
        self.corners[1]
    }

    pub fn bottom_right(&self) -> Point2D {
        self.corners[2]
    }

    pub fn bottom_left(&self) -> Point2D {
        self.corners[3]
    }

    pub fn corners(&self) -> [Point2D; 4] {
        self.corners
    }

    /// Edge lengths in pixels as `[top, right, bottom, left]`.
    pub fn edge_lengths(&self) -> [f64; 4] {
        let [tl, tr, br, bl] = self.corners;
        [
            tl.distance(&tr),
            tr.distance(&br),
            bl.distance(&br),
            tl.distance(&bl),
        ]
    }

    /// Shoelace area, positive for a clockwise-on-screen outline.
    pub fn signed_area(&self) -> f64 {
        let c = &self.corners;
        (0..4)
            .map(|i| {
                let (a, b) = (c[i], c[(i + 1) % 4]);
                a.x * b.y - b.x * a.y
            })
            .sum::<f64>()
            / 2.0
    }

    pub fn area(&self) -> f64 {
        self.signed_area().abs()
    }

    /// True when every corner turns clockwise.
    pub fn is_convex(&self) -> bool {
        let c = &self.corners;
        (0..4).all(|i| cross(&c[i], &c[(i + 1) % 4], &c[(i + 2) % 4]) > 0.0)
    }

    /// Area divided by the longer diagonal: roughly the narrowest width of
    /// the quad in pixels.
    pub fn thickness(&self) -> f64 {
        let [tl, tr, br, bl] = self.corners;
        let diagonal = tl.distance(&br).max(tr.distance(&bl));
        if diagonal <= 0.0 {
            return 0.0;
        }
        self.area() / diagonal
    }
}

/// Order four points as (top-left, top-right, bottom-right, bottom-left).
///
/// The result does not depend on the input order, and ordering an already
/// ordered set returns it unchanged.
///
/// # Errors
///
/// [`CoreError::DegenerateQuad`] if a coordinate is not finite, points
/// coincide, three points are collinear, the outline self-intersects, or the
/// area is negligible.
#[instrument(level = "debug")]
pub fn order_points(points: &[Point2D; 4]) -> Result<OrderedQuad> {
    if points.iter().any(|p| !p.is_finite()) {
        return Err(CoreError::DegenerateQuad(
            "coordinates must be finite".to_string(),
        ));
    }

    // Canonicalise the input first so the centroid, and therefore every
    // angle, is bit-identical for every permutation.
    let mut pts = *points;
    pts.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));

    let extent = max_pairwise_distance(&pts);
    if extent <= f64::EPSILON {
        return Err(CoreError::DegenerateQuad("all points coincide".to_string()));
    }

    let cx = pts.iter().map(|p| p.x).sum::<f64>() / 4.0;
    let cy = pts.iter().map(|p| p.y).sum::<f64>() / 4.0;

    pts.sort_by(|a, b| {
        let angle_a = (a.y - cy).atan2(a.x - cx);
        let angle_b = (b.y - cy).atan2(b.x - cx);
        angle_a.total_cmp(&angle_b).then_with(|| {
            let da = (a.x - cx).hypot(a.y - cy);
            let db = (b.x - cx).hypot(b.y - cy);
            da.total_cmp(&db)
        })
    });

    let start = (0..4)
        .min_by(|&i, &j| {
            let (a, b) = (pts[i], pts[j]);
            (a.x + a.y)
                .total_cmp(&(b.x + b.y))
                .then((a.y - a.x).total_cmp(&(b.y - b.x)))
        })
        .unwrap_or(0);
    pts.rotate_left(start);

    let quad = OrderedQuad::from_corners(pts);
    validate(&quad, extent)?;

    debug!(
        top_left = ?quad.top_left(),
        top_right = ?quad.top_right(),
        bottom_right = ?quad.bottom_right(),
        bottom_left = ?quad.bottom_left(),
        "points ordered"
    );
    Ok(quad)
}

fn validate(quad: &OrderedQuad, extent: f64) -> Result<()> {
    let c = quad.corners();
    let scale = extent * extent;

    for i in 0..4 {
        for j in (i + 1)..4 {
            if c[i].distance(&c[j]) <= extent * 1e-9 {
                return Err(CoreError::DegenerateQuad("two points coincide".to_string()));
            }
        }
    }

    for i in 0..4 {
        let turn = cross(&c[(i + 3) % 4], &c[i], &c[(i + 1) % 4]);
        if turn.abs() <= MIN_RELATIVE_TURN * scale {
            return Err(CoreError::DegenerateQuad(
                "three points are collinear".to_string(),
            ));
        }
    }

    if segments_intersect(&c[0], &c[1], &c[2], &c[3]) || segments_intersect(&c[1], &c[2], &c[3], &c[0])
    {
        return Err(CoreError::DegenerateQuad(
            "outline intersects itself".to_string(),
        ));
    }

    if quad.area() <= MIN_RELATIVE_AREA * scale {
        return Err(CoreError::DegenerateQuad(
            "points collapse to a line".to_string(),
        ));
    }

    Ok(())
}

fn max_pairwise_distance(pts: &[Point2D; 4]) -> f64 {
    let mut max = 0.0f64;
    for i in 0..4 {
        for j in (i + 1)..4 {
            max = max.max(pts[i].distance(&pts[j]));
        }
    }
    max
}

/// True if segment `p1-p2` touches segment `q1-q2`.
fn segments_intersect(p1: &Point2D, p2: &Point2D, q1: &Point2D, q2: &Point2D) -> bool {
    let d1 = cross(q1, q2, p1);
    let d2 = cross(q1, q2, p2);
    let d3 = cross(p1, p2, q1);
    let d4 = cross(p1, p2, q2);

    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }

    (d1 == 0.0 && on_segment(q1, q2, p1))
        || (d2 == 0.0 && on_segment(q1, q2, p2))
        || (d3 == 0.0 && on_segment(p1, p2, q1))
        || (d4 == 0.0 && on_segment(p1, p2, q2))
}

/// `p` is known to be collinear with `a-b`; check it lies within the box.
fn on_segment(a: &Point2D, b: &Point2D, p: &Point2D) -> bool {
    p.x >= a.x.min(b.x) && p.x <= a.x.max(b.x) && p.y >= a.y.min(b.y) && p.y <= a.y.max(b.y)
}


// ============================================================================
// Property-Based Tests
// ============================================================================
