//! Homography solver for quad-to-rectangle rectification.
//!
//! # Algorithm
//!
//! Four correspondences give eight equations in the eight unknowns of a
//! homography with `h22 = 1`:
//!
//! ```text
//! u = (h00 x + h01 y + h02) / (h20 x + h21 y + 1)
//! v = (h10 x + h11 y + h12) / (h20 x + h21 y + 1)
//! ```
//!
//! Both point sets are Hartley-normalised (centroid at the origin, mean
//! distance √2) before the 8×8 system is built, so the condition number of the
//! system reflects the geometry rather than the pixel scale. The system is
//! rejected when its reciprocal condition number falls below
//! [`MIN_RECIPROCAL_CONDITION`], then solved by LU decomposition and
//! denormalised.
//!
//! # Modes
//!
//! - [`TransformMode::Crop`]: the quad maps onto `(0,0) (W,0) (W,H) (0,H)` and
//!   the canvas is exactly `W×H`.
//! - [`TransformMode::FullImage`]: the same mapping is extended to the whole
//!   source. The four source corners are projected, and a translation moves
//!   their bounding box to the origin. The canvas is that box, rounded up.

use nalgebra::{DMatrix, DVector, Matrix3};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::{CoreError, Result};
use crate::geometry::{OrderedQuad, Point2D};

/// Systems with σmin/σmax below this are treated as singular.
pub const MIN_RECIPROCAL_CONDITION: f64 = 1e-10;

/// Narrowest quad, in pixels, that still defines a usable plane.
pub const MIN_QUAD_THICKNESS: f64 = 1.0;

/// Below this the homogeneous coordinate is treated as zero.
const W_EPSILON: f64 = 1e-12;

/// How the corrected output is framed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformMode {
    /// Rectify the whole source, using the quad as the size reference.
    #[default]
    FullImage,
    /// Output only the rectified quad.
    Crop,
}

/// A 3×3 projective transform, normalised so `m[2][2] = 1` when possible.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography {
    m: Matrix3<f64>,
}

impl Homography {
    pub fn identity() -> Self {
        Self {
            m: Matrix3::identity(),
        }
    }

    /// Wrap a matrix, rescaling it so the bottom-right entry is one.
    pub fn from_matrix(m: Matrix3<f64>) -> Self {
        let scale = m[(2, 2)];
        if scale.abs() > W_EPSILON {
            Self { m: m / scale }
        } else {
            Self { m }
        }
    }

    /// Build from row-major entries.
    pub fn from_array(rows: [[f64; 3]; 3]) -> Self {
        Self::from_matrix(Matrix3::new(
            rows[0][0], rows[0][1], rows[0][2], rows[1][0], rows[1][1], rows[1][2], rows[2][0],
            rows[2][1], rows[2][2],
        ))
    }

    /// Pure translation by `(dx, dy)`.
    pub fn translation(dx: f64, dy: f64) -> Self {
        Self {
            m: Matrix3::new(1.0, 0.0, dx, 0.0, 1.0, dy, 0.0, 0.0, 1.0),
        }
    }

    /// Row-major entries.
    pub fn as_array(&self) -> [[f64; 3]; 3] {
        let m = &self.m;
        [
            [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
            [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
            [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
        ]
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.m
    }

    /// Map a point. `None` when it lands on the line at infinity.
    pub fn apply(&self, p: Point2D) -> Option<Point2D> {
        let (x, y, w) = self.project(p);
        if w.abs() < W_EPSILON {
            return None;
        }
        Some(Point2D::new(x / w, y / w))
    }

    /// Homogeneous image of `p` before the perspective divide.
    pub(crate) fn project(&self, p: Point2D) -> (f64, f64, f64) {
        let m = &self.m;
        (
            m[(0, 0)] * p.x + m[(0, 1)] * p.y + m[(0, 2)],
            m[(1, 0)] * p.x + m[(1, 1)] * p.y + m[(1, 2)],
            m[(2, 0)] * p.x + m[(2, 1)] * p.y + m[(2, 2)],
        )
    }

    /// The inverse mapping.
    ///
    /// # Errors
    ///
    /// [`CoreError::IllConditionedTransform`] if the matrix is singular.
    pub fn inverse(&self) -> Result<Homography> {
        self.m
            .try_inverse()
            .map(Homography::from_matrix)
            .filter(Homography::is_finite)
            .ok_or_else(|| CoreError::IllConditionedTransform("matrix is singular".into()))
    }

    /// `self ∘ other`: apply `other` first, then `self`.
    pub fn compose(&self, other: &Homography) -> Homography {
        Homography::from_matrix(self.m * other.m)
    }

    pub fn is_finite(&self) -> bool {
        self.m.iter().all(|v| v.is_finite())
    }
}

impl Default for Homography {
    fn default() -> Self {
        Self::identity()
    }
}

/// Everything the resampler needs for one transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformPlan {
    /// Source to output mapping.
    pub matrix: Homography,
    pub canvas_width: u32,
    pub canvas_height: u32,
    /// Where the quad's corners land on the canvas.
    pub reference: [Point2D; 4],
}

/// Solve the transform for `quad` with a `W×H` reference rectangle.
///
/// `source_size` is the source raster's `(width, height)`; full-image mode
/// sizes the canvas from it. Canvases with a side above `max_canvas` are
/// rejected.
///
/// # Errors
///
/// - [`CoreError::InvalidDimension`] if `W` or `H` is zero or above `max_canvas`
/// - [`CoreError::IllConditionedTransform`] if the quad is not convex, is
///   thinner than [`MIN_QUAD_THICKNESS`], the linear system is near-singular,
///   or (full image) the source crosses the vanishing line or the canvas is
///   too large
#[instrument(skip(quad))]
pub fn solve(
    quad: &OrderedQuad,
    output: (u32, u32),
    mode: TransformMode,
    source_size: (u32, u32),
    max_canvas: u32,
) -> Result<TransformPlan> {
    let (width, height) = output;
    for side in [width, height] {
        if side == 0 || side > max_canvas {
            return Err(CoreError::InvalidDimension(side as f64));
        }
    }

    let h = quad_to_rect(quad, width as f64, height as f64)?;
    let target = OrderedQuad::rectangle(0.0, 0.0, width as f64, height as f64).corners();

    match mode {
        TransformMode::Crop => Ok(TransformPlan {
            matrix: h,
            canvas_width: width,
            canvas_height: height,
            reference: target,
        }),
        TransformMode::FullImage => extend_to_source(&h, quad, target, source_size, max_canvas),
    }
}

/// Homography taking the quad's corners onto `(0,0) (W,0) (W,H) (0,H)`.
///
/// # Errors
///
/// [`CoreError::IllConditionedTransform`], see [`solve`].
pub fn quad_to_rect(quad: &OrderedQuad, width: f64, height: f64) -> Result<Homography> {
    if !quad.is_convex() {
        return Err(CoreError::IllConditionedTransform(
            "quad is not convex".into(),
        ));
    }
    let thickness = quad.thickness();
    if thickness < MIN_QUAD_THICKNESS {
        return Err(CoreError::IllConditionedTransform(format!(
            "quad is only {thickness:.3} px thick"
        )));
    }

    let src = quad.corners();
    let dst = OrderedQuad::rectangle(0.0, 0.0, width, height).corners();
    let (t_src, _, src_n) = normalize_points(&src);
    let (_, t_dst_inv, dst_n) = normalize_points(&dst);

    let mut a = DMatrix::<f64>::zeros(8, 8);
    let mut b = DVector::<f64>::zeros(8);
    for i in 0..4 {
        let (x, y) = (src_n[i].x, src_n[i].y);
        let (u, v) = (dst_n[i].x, dst_n[i].y);

        let r = 2 * i;
        a[(r, 0)] = x;
        a[(r, 1)] = y;
        a[(r, 2)] = 1.0;
        a[(r, 6)] = -x * u;
        a[(r, 7)] = -y * u;
        b[r] = u;

        a[(r + 1, 3)] = x;
        a[(r + 1, 4)] = y;
        a[(r + 1, 5)] = 1.0;
        a[(r + 1, 6)] = -x * v;
        a[(r + 1, 7)] = -y * v;
        b[r + 1] = v;
    }

    let singular_values = a.clone().svd(false, false).singular_values;
    let rcond = singular_values.min() / singular_values.max();
    debug!(rcond, thickness, "homography system conditioning");
    if rcond.is_nan() || rcond <= MIN_RECIPROCAL_CONDITION {
        return Err(CoreError::IllConditionedTransform(format!(
            "reciprocal condition number {rcond:.3e}"
        )));
    }

    let s = a.lu().solve(&b).ok_or_else(|| {
        CoreError::IllConditionedTransform("linear system has no unique solution".into())
    })?;
    let h_norm = Matrix3::new(s[0], s[1], s[2], s[3], s[4], s[5], s[6], s[7], 1.0);

    let h = Homography::from_matrix(t_dst_inv * h_norm * t_src);
    if !h.is_finite() {
        return Err(CoreError::IllConditionedTransform(
            "matrix has non-finite entries".into(),
        ));
    }
    Ok(h)
}

fn extend_to_source(
    h: &Homography,
    quad: &OrderedQuad,
    target: [Point2D; 4],
    source_size: (u32, u32),
    max_canvas: u32,
) -> Result<TransformPlan> {
    let (sw, sh) = (source_size.0 as f64, source_size.1 as f64);
    let source = OrderedQuad::rectangle(0.0, 0.0, sw, sh).corners();

    // Points on the quad's side of the vanishing line share the sign of w.
    let (_, _, w_ref) = h.project(quad.top_left());
    let mut min = Point2D::new(f64::INFINITY, f64::INFINITY);
    let mut max = Point2D::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
    for corner in source {
        let (x, y, w) = h.project(corner);
        if w * w_ref.signum() <= W_EPSILON * w_ref.abs() {
            return Err(CoreError::IllConditionedTransform(
                "source image crosses the vanishing line".into(),
            ));
        }
        let (x, y) = (x / w, y / w);
        min = Point2D::new(min.x.min(x), min.y.min(y));
        max = Point2D::new(max.x.max(x), max.y.max(y));
    }

    // Absorb float noise so an exact integer extent does not round up.
    let canvas_w = (max.x - min.x - 1e-9).ceil().max(1.0);
    let canvas_h = (max.y - min.y - 1e-9).ceil().max(1.0);
    let limit = max_canvas as f64;
    if canvas_w.is_nan() || canvas_h.is_nan() || canvas_w > limit || canvas_h > limit {
        return Err(CoreError::IllConditionedTransform(format!(
            "full-image canvas {canvas_w}x{canvas_h} exceeds {max_canvas}"
        )));
    }

    let matrix = Homography::translation(-min.x, -min.y).compose(h);
    let reference = target.map(|p| Point2D::new(p.x - min.x, p.y - min.y));
    debug!(canvas_w, canvas_h, offset_x = -min.x, offset_y = -min.y, "full-image canvas");

    Ok(TransformPlan {
        matrix,
        canvas_width: canvas_w as u32,
        canvas_height: canvas_h as u32,
        reference,
    })
}

/// Hartley normalisation. Returns the normalising matrix, its inverse, and
/// the normalised points.
fn normalize_points(points: &[Point2D; 4]) -> (Matrix3<f64>, Matrix3<f64>, [Point2D; 4]) {
    let cx = points.iter().map(|p| p.x).sum::<f64>() / 4.0;
    let cy = points.iter().map(|p| p.y).sum::<f64>() / 4.0;
    let mean_dist = points
        .iter()
        .map(|p| Point2D::new(cx, cy).distance(p))
        .sum::<f64>()
        / 4.0;
    let s = if mean_dist > 1e-15 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };

    let t = Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0);
    let t_inv = Matrix3::new(1.0 / s, 0.0, cx, 0.0, 1.0 / s, cy, 0.0, 0.0, 1.0);
    let normalized = points.map(|p| Point2D::new(s * (p.x - cx), s * (p.y - cy)));
    (t, t_inv, normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreErrorKind;
    use crate::geometry::order_points;

    const LIMIT: u32 = 32768;

    fn p(x: f64, y: f64) -> Point2D {
        Point2D::new(x, y)
    }

    fn assert_close(a: Point2D, b: Point2D, tol: f64) {
        assert!(
            (a.x - b.x).abs() < tol && (a.y - b.y).abs() < tol,
            "{:?} != {:?}",
            a,
            b
        );
    }

    fn skewed_quad() -> OrderedQuad {
        order_points(&[p(120.0, 80.0), p(900.0, 140.0), p(860.0, 1200.0), p(60.0, 1100.0)])
            .unwrap()
    }

    #[test]
    fn test_identity_for_matching_rectangle() {
        let quad = OrderedQuad::rectangle(0.0, 0.0, 640.0, 480.0);
        let plan = solve(&quad, (640, 480), TransformMode::Crop, (640, 480), LIMIT).unwrap();

        let m = plan.matrix.as_array();
        let id = Homography::identity().as_array();
        for r in 0..3 {
            for c in 0..3 {
                assert!((m[r][c] - id[r][c]).abs() < 1e-9, "entry ({r},{c}) = {}", m[r][c]);
            }
        }
    }

    #[test]
    fn test_crop_maps_corners_onto_rectangle() {
        let quad = skewed_quad();
        let plan = solve(&quad, (800, 1000), TransformMode::Crop, (1000, 1300), LIMIT).unwrap();

        assert_eq!((plan.canvas_width, plan.canvas_height), (800, 1000));
        let expected = [p(0.0, 0.0), p(800.0, 0.0), p(800.0, 1000.0), p(0.0, 1000.0)];
        for (corner, want) in quad.corners().into_iter().zip(expected) {
            assert_close(plan.matrix.apply(corner).unwrap(), want, 1e-6);
        }
        assert_eq!(plan.reference, expected);
    }

    #[test]
    fn test_bottom_right_entry_normalised() {
        let plan = solve(&skewed_quad(), (100, 100), TransformMode::Crop, (1000, 1300), LIMIT)
            .unwrap();
        assert_eq!(plan.matrix.as_array()[2][2], 1.0);
    }

    #[test]
    fn test_inverse_round_trip() {
        let h = quad_to_rect(&skewed_quad(), 400.0, 500.0).unwrap();
        let back = h.inverse().unwrap().compose(&h);
        let pt = p(333.0, 444.0);
        assert_close(back.apply(pt).unwrap(), pt, 1e-7);
    }

    #[test]
    fn test_translation_and_compose() {
        let t = Homography::translation(5.0, -2.0);
        let tt = t.compose(&t);
        assert_close(tt.apply(p(1.0, 1.0)).unwrap(), p(11.0, -3.0), 1e-12);
    }

    #[test]
    fn test_apply_at_infinity_is_none() {
        let h = Homography::from_array([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 0.0, 0.0]]);
        assert!(h.apply(p(0.0, 5.0)).is_none());
    }

    #[test]
    fn test_singular_matrix_inverse_fails() {
        let h = Homography::from_array([[1.0, 2.0, 3.0], [2.0, 4.0, 6.0], [0.0, 0.0, 1.0]]);
        assert_eq!(
            h.inverse().unwrap_err().kind(),
            CoreErrorKind::IllConditionedTransform
        );
    }

    #[test]
    fn test_nearly_collinear_points_are_ill_conditioned() {
        let points = [p(0.0, 0.0), p(100.0, 1.0), p(200.0, 0.0), p(300.0, 1.0)];

        // Ordered, they form a sliver less than a pixel thick.
        let quad = order_points(&points).unwrap();
        let err = solve(&quad, (300, 10), TransformMode::Crop, (400, 400), LIMIT).unwrap_err();
        assert_eq!(err.kind(), CoreErrorKind::IllConditionedTransform);

        // Taken in the given order the outline zigzags.
        let raw = OrderedQuad::from_corners(points);
        let err = solve(&raw, (300, 10), TransformMode::Crop, (400, 400), LIMIT).unwrap_err();
        assert_eq!(err.kind(), CoreErrorKind::IllConditionedTransform);
    }

    #[test]
    fn test_non_convex_quad_rejected() {
        let dart = OrderedQuad::from_corners([p(0.0, 0.0), p(100.0, 0.0), p(20.0, 20.0), p(0.0, 100.0)]);
        assert!(matches!(
            quad_to_rect(&dart, 100.0, 100.0),
            Err(CoreError::IllConditionedTransform(_))
        ));
    }

    #[test]
    fn test_zero_output_dimension_rejected() {
        let quad = OrderedQuad::rectangle(0.0, 0.0, 10.0, 10.0);
        let err = solve(&quad, (0, 10), TransformMode::Crop, (10, 10), LIMIT).unwrap_err();
        assert_eq!(err, CoreError::InvalidDimension(0.0));
        assert!(solve(&quad, (10, LIMIT + 1), TransformMode::Crop, (10, 10), LIMIT).is_err());
    }

    #[test]
    fn test_full_image_scales_and_translates() {
        let quad = OrderedQuad::rectangle(10.0, 10.0, 100.0, 50.0);
        let plan = solve(&quad, (200, 100), TransformMode::FullImage, (200, 100), LIMIT).unwrap();

        assert_eq!((plan.canvas_width, plan.canvas_height), (400, 200));
        assert_close(plan.reference[0], p(20.0, 20.0), 1e-9);
        assert_close(plan.reference[2], p(220.0, 120.0), 1e-9);
        assert_close(plan.matrix.apply(p(0.0, 0.0)).unwrap(), p(0.0, 0.0), 1e-9);
    }

    #[test]
    fn test_full_image_whole_frame_is_identity_sized() {
        let quad = OrderedQuad::rectangle(0.0, 0.0, 300.0, 200.0);
        let plan = solve(&quad, (300, 200), TransformMode::FullImage, (300, 200), LIMIT).unwrap();
        assert_eq!((plan.canvas_width, plan.canvas_height), (300, 200));
    }

    #[test]
    fn test_full_image_canvas_contains_source_corners() {
        let quad = skewed_quad();
        let source = (1000, 1300);
        let plan = solve(&quad, (780, 1040), TransformMode::FullImage, source, LIMIT).unwrap();

        let (w, h) = (plan.canvas_width as f64, plan.canvas_height as f64);
        for corner in OrderedQuad::rectangle(0.0, 0.0, 1000.0, 1300.0).corners() {
            let mapped = plan.matrix.apply(corner).unwrap();
            assert!(mapped.x >= -1e-6 && mapped.x <= w + 1e-6, "x {} outside {}", mapped.x, w);
            assert!(mapped.y >= -1e-6 && mapped.y <= h + 1e-6, "y {} outside {}", mapped.y, h);
        }
        for (corner, reference) in quad.corners().into_iter().zip(plan.reference) {
            assert_close(plan.matrix.apply(corner).unwrap(), reference, 1e-6);
        }
    }

    #[test]
    fn test_full_image_canvas_limit() {
        let quad = skewed_quad();
        let err = solve(&quad, (700, 900), TransformMode::FullImage, (1000, 1300), 950)
            .unwrap_err();
        assert_eq!(err.kind(), CoreErrorKind::IllConditionedTransform);
    }

    #[test]
    fn test_full_image_beyond_vanishing_line() {
        // The side edges converge at y ~ 486, so the top of the frame lies
        // beyond the vanishing line.
        let quad = order_points(&[p(450.0, 500.0), p(550.0, 500.0), p(900.0, 600.0), p(100.0, 600.0)])
            .unwrap();
        let err = solve(&quad, (800, 800), TransformMode::FullImage, (1000, 1000), LIMIT)
            .unwrap_err();
        assert_eq!(err.kind(), CoreErrorKind::IllConditionedTransform);
    }

    #[test]
    fn test_mode_serde_names() {
        assert_eq!(
            serde_json::to_string(&TransformMode::FullImage).unwrap(),
            "\"full_image\""
        );
        let mode: TransformMode = serde_json::from_str("\"crop\"").unwrap();
        assert_eq!(mode, TransformMode::Crop);
    }
}

// =============================================================================
// Property-Based Tests
// =============================================================================
