//! Session bindings.
//!
//! `JsSession` owns a core session; the UI calls into it on every click,
//! drag and setting change. Coordinates are source-image pixels.
//!
//! # Example
//!
//! ```typescript
//! const session = JsSession.with_config({ dpi: 300, unit: "mm", mode: "crop" });
//! session.load_image(new JsRaster(img.width, img.height, 4, img.data));
//! for (const [x, y] of clicks) session.add_point(x, y);
//! session.set_width(210);
//! session.set_height(297);
//! const corrected = session.apply_transform();
//! ```

use dewarp_core::{
    Background, CoreError, FlipAxis, Point2D, Rotation, Session, SessionConfig, SessionState,
};
use wasm_bindgen::prelude::*;

use crate::types::{mode_from_str, target_from_str, unit_from_str, JsRaster};

fn core_err(e: CoreError) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn arg_err(message: String) -> JsValue {
    JsValue::from_str(&message)
}

/// A perspective correction session for JavaScript.
#[wasm_bindgen]
pub struct JsSession {
    inner: Session,
}

impl Default for JsSession {
    fn default() -> Self {
        Self::new()
    }
}

#[wasm_bindgen]
impl JsSession {
    /// Create a session with the default configuration.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self {
            inner: Session::default(),
        }
    }

    /// Create a session from a (partial) configuration object.
    pub fn with_config(config: JsValue) -> Result<JsSession, JsValue> {
        let config: SessionConfig = serde_wasm_bindgen::from_value(config)
            .map_err(|e| JsValue::from_str(&format!("Invalid config: {}", e)))?;
        Session::new(config)
            .map(|inner| JsSession { inner })
            .map_err(core_err)
    }

    /// Current configuration as a plain object.
    pub fn config(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(self.inner.config())
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    pub fn load_image(&mut self, image: &JsRaster) {
        self.inner.load_image(image.raster().clone());
    }

    /// `"empty"`, `"point_selecting"`, `"ready"` or `"transformed"`.
    #[wasm_bindgen(getter)]
    pub fn state(&self) -> String {
        match self.inner.state() {
            SessionState::Empty => "empty",
            SessionState::PointSelecting => "point_selecting",
            SessionState::Ready => "ready",
            SessionState::Transformed => "transformed",
        }
        .to_string()
    }

    // =========================================================================
    // Points
    // =========================================================================

    /// Place a corner. Returns its index after ordering.
    pub fn add_point(&mut self, x: f64, y: f64) -> Result<usize, JsValue> {
        self.inner.add_point(Point2D::new(x, y)).map_err(core_err)
    }

    /// Drag a corner. Returns its index after re-ordering.
    pub fn move_point(&mut self, index: usize, x: f64, y: f64) -> Result<usize, JsValue> {
        self.inner
            .move_point(index, Point2D::new(x, y))
            .map_err(core_err)
    }

    pub fn remove_point(&mut self, index: usize) -> Result<(), JsValue> {
        self.inner.remove_point(index).map(|_| ()).map_err(core_err)
    }

    pub fn reset_points(&mut self) {
        self.inner.reset_points();
    }

    /// Placed points as a flat `[x0, y0, x1, y1, ...]` array, in
    /// top-left, top-right, bottom-right, bottom-left order once complete.
    pub fn points(&self) -> Vec<f64> {
        self.inner.points().iter().flat_map(|p| [p.x, p.y]).collect()
    }

    /// Index of the corner under `(x, y)`, if any lies within `threshold`.
    pub fn hit_test(&self, x: f64, y: f64, threshold: f64) -> Option<usize> {
        self.inner.hit_test(Point2D::new(x, y), threshold)
    }

    // =========================================================================
    // Dimensions and settings
    // =========================================================================

    #[wasm_bindgen(getter)]
    pub fn width(&self) -> f64 {
        self.inner.dimensions().width
    }

    #[wasm_bindgen(getter)]
    pub fn height(&self) -> f64 {
        self.inner.dimensions().height
    }

    /// True once width or height was set by hand.
    #[wasm_bindgen(getter)]
    pub fn locked(&self) -> bool {
        self.inner.dimensions().locked
    }

    #[wasm_bindgen(getter)]
    pub fn unit(&self) -> String {
        self.inner.config().unit.label().to_string()
    }

    /// Recommended input step for the current unit.
    #[wasm_bindgen(getter)]
    pub fn unit_step(&self) -> f64 {
        self.inner.config().unit.step()
    }

    /// Output size in pixels as `[width, height]`.
    pub fn output_pixels(&self) -> Vec<u32> {
        let (w, h) = self.inner.output_pixels();
        vec![w, h]
    }

    pub fn set_width(&mut self, value: f64) -> Result<(), JsValue> {
        self.inner.set_width(value).map_err(core_err)
    }

    pub fn set_height(&mut self, value: f64) -> Result<(), JsValue> {
        self.inner.set_height(value).map_err(core_err)
    }

    pub fn unlock_dimensions(&mut self) {
        self.inner.unlock_dimensions();
    }

    /// `"mm"`, `"in"` or `"px"`.
    pub fn set_unit(&mut self, unit: &str) -> Result<(), JsValue> {
        self.inner.set_unit(unit_from_str(unit).map_err(arg_err)?);
        Ok(())
    }

    pub fn set_dpi(&mut self, dpi: f64) -> Result<(), JsValue> {
        self.inner.set_dpi(dpi).map_err(core_err)
    }

    /// `"full_image"` or `"crop"`.
    pub fn set_mode(&mut self, mode: &str) -> Result<(), JsValue> {
        self.inner.set_mode(mode_from_str(mode).map_err(arg_err)?);
        Ok(())
    }

    /// Solid background, components in `0.0..=1.0`.
    pub fn set_background(&mut self, r: f32, g: f32, b: f32, a: f32) {
        self.inner.set_background(Background::Solid([r, g, b, a]));
    }

    pub fn set_transparent_background(&mut self) {
        self.inner.set_background(Background::Transparent);
    }

    // =========================================================================
    // Scale calibration
    // =========================================================================

    /// Calibrate `"original"` or `"result"` from two points `real_distance`
    /// apart in `unit`.
    #[allow(clippy::too_many_arguments)]
    pub fn calibrate(
        &mut self,
        target: &str,
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        real_distance: f64,
        unit: &str,
    ) -> Result<(), JsValue> {
        let target = target_from_str(target).map_err(arg_err)?;
        let unit = unit_from_str(unit).map_err(arg_err)?;
        self.inner
            .calibrate(
                target,
                Point2D::new(x1, y1),
                Point2D::new(x2, y2),
                real_distance,
                unit,
            )
            .map_err(core_err)
    }

    pub fn move_calibration_point(
        &mut self,
        target: &str,
        index: usize,
        x: f64,
        y: f64,
    ) -> Result<(), JsValue> {
        let target = target_from_str(target).map_err(arg_err)?;
        self.inner
            .move_calibration_point(target, index, Point2D::new(x, y))
            .map_err(core_err)
    }

    pub fn clear_calibration(&mut self, target: &str) -> Result<(), JsValue> {
        let target = target_from_str(target).map_err(arg_err)?;
        self.inner.clear_calibration(target);
        Ok(())
    }

    /// Calibration points as `[x1, y1, x2, y2]`, empty when uncalibrated.
    pub fn calibration_points(&self, target: &str) -> Result<Vec<f64>, JsValue> {
        let target = target_from_str(target).map_err(arg_err)?;
        Ok(self
            .inner
            .calibration(target)
            .map(|cal| cal.points().iter().flat_map(|p| [p.x, p.y]).collect())
            .unwrap_or_default())
    }

    /// Status line for the calibration, if any.
    pub fn calibration_status(&self, target: &str) -> Result<Option<String>, JsValue> {
        let target = target_from_str(target).map_err(arg_err)?;
        Ok(self.inner.calibration(target).map(|cal| cal.describe()))
    }

    /// Distance between two points in the session unit.
    pub fn measure(&self, target: &str, x1: f64, y1: f64, x2: f64, y2: f64) -> Result<f64, JsValue> {
        let target = target_from_str(target).map_err(arg_err)?;
        self.inner
            .measure(target, Point2D::new(x1, y1), Point2D::new(x2, y2))
            .map_err(core_err)
    }

    // =========================================================================
    // Transform
    // =========================================================================

    /// Run the transform and return a copy of the result.
    pub fn apply_transform(&mut self) -> Result<JsRaster, JsValue> {
        self.inner
            .apply_transform()
            .map(|raster| JsRaster::from_raster(raster.clone()))
            .map_err(core_err)
    }

    pub fn source(&self) -> Option<JsRaster> {
        self.inner.source().cloned().map(JsRaster::from_raster)
    }

    pub fn result(&self) -> Option<JsRaster> {
        self.inner.result().cloned().map(JsRaster::from_raster)
    }

    /// Row-major 3x3 matrix of the current result.
    pub fn result_matrix(&self) -> Option<Vec<f64>> {
        self.inner
            .result_plan()
            .map(|plan| plan.matrix.as_array().concat())
    }

    /// Reference corners on the result canvas as `[x0, y0, ..., x3, y3]`.
    pub fn result_reference(&self) -> Option<Vec<f64>> {
        self.inner
            .result_plan()
            .map(|plan| plan.reference.iter().flat_map(|p| [p.x, p.y]).collect())
    }

    /// Continue with the result as the new original.
    pub fn promote_result(&mut self) -> Result<(), JsValue> {
        self.inner.promote_result().map_err(core_err)
    }

    // =========================================================================
    // Geometric edits
    // =========================================================================

    pub fn rotate(&mut self, target: &str, clockwise: bool) -> Result<(), JsValue> {
        let target = target_from_str(target).map_err(arg_err)?;
        let rotation = if clockwise {
            Rotation::Clockwise
        } else {
            Rotation::CounterClockwise
        };
        self.inner.rotate(target, rotation).map_err(core_err)
    }

    pub fn flip(&mut self, target: &str, horizontal: bool) -> Result<(), JsValue> {
        let target = target_from_str(target).map_err(arg_err)?;
        let axis = if horizontal {
            FlipAxis::Horizontal
        } else {
            FlipAxis::Vertical
        };
        self.inner.flip(target, axis).map_err(core_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loaded_session() -> JsSession {
        let mut session = JsSession::new();
        session.set_unit("px").unwrap();
        let image = JsRaster::new(40, 30, 1, (0..1200).map(|i| (i % 251) as u8).collect()).unwrap();
        session.load_image(&image);
        session
    }

    #[test]
    fn test_defaults() {
        let session = JsSession::new();
        assert_eq!(session.state(), "empty");
        assert_eq!(session.unit(), "mm");
        assert_eq!(session.unit_step(), 0.5);
        assert!(!session.locked());
    }

    #[test]
    fn test_points_flow() {
        let mut session = loaded_session();
        assert_eq!(session.state(), "point_selecting");

        session.add_point(30.0, 25.0).unwrap();
        session.add_point(5.0, 5.0).unwrap();
        session.add_point(30.0, 5.0).unwrap();
        assert_eq!(session.add_point(5.0, 25.0).unwrap(), 3);

        assert_eq!(session.state(), "ready");
        assert_eq!(
            session.points(),
            vec![5.0, 5.0, 30.0, 5.0, 30.0, 25.0, 5.0, 25.0]
        );
        assert_eq!(session.hit_test(29.0, 24.0, 3.0), Some(2));
        assert_eq!(session.output_pixels(), vec![25, 20]);
    }

    #[test]
    fn test_crop_transform() {
        let mut session = loaded_session();
        for (x, y) in [(5.0, 5.0), (30.0, 5.0), (30.0, 25.0), (5.0, 25.0)] {
            session.add_point(x, y).unwrap();
        }
        session.set_mode("crop").unwrap();
        session.set_width(10.0).unwrap();
        assert!(session.locked());

        let result = session.apply_transform().unwrap();
        assert_eq!((result.width(), result.height()), (10, 20));
        assert_eq!(session.state(), "transformed");
        assert_eq!(session.result_matrix().map(|m| m.len()), Some(9));
        assert_eq!(session.result_reference().map(|r| r.len()), Some(8));

        session.promote_result().unwrap();
        let source = session.source().unwrap();
        assert_eq!((source.width(), source.height()), (10, 20));
        assert!(session.result().is_none());
    }

    #[test]
    fn test_calibration_and_measure() {
        let mut session = loaded_session();
        session
            .calibrate("original", 0.0, 0.0, 10.0, 0.0, 10.0, "px")
            .unwrap();
        assert_eq!(
            session.calibration_points("original").unwrap(),
            vec![0.0, 0.0, 10.0, 0.0]
        );
        assert_eq!(
            session.calibration_status("original").unwrap().as_deref(),
            Some("scale calibrated: 10.0 px over 10.0 px")
        );
        assert!((session.measure("original", 0.0, 0.0, 20.0, 0.0).unwrap() - 20.0).abs() < 1e-9);

        session.clear_calibration("original").unwrap();
        assert!(session.calibration_status("original").unwrap().is_none());
    }

    #[test]
    fn test_rotate_original() {
        let mut session = loaded_session();
        session.add_point(1.0, 1.0).unwrap();
        session.rotate("original", true).unwrap();

        let source = session.source().unwrap();
        assert_eq!((source.width(), source.height()), (30, 40));
        assert!(session.points().is_empty());

        session.flip("original", false).unwrap();
        assert_eq!(session.source().unwrap().width(), 30);
    }
}

/// WASM-specific tests that need a JavaScript host for `JsValue`.
///
/// Run with `wasm-pack test`.
#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use serde::Serialize;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[derive(Serialize)]
    struct PartialConfig {
        dpi: f64,
        unit: &'static str,
        mode: &'static str,
    }

    #[wasm_bindgen_test]
    fn test_with_partial_config() {
        let config = serde_wasm_bindgen::to_value(&PartialConfig {
            dpi: 150.0,
            unit: "in",
            mode: "crop",
        })
        .unwrap();
        let session = JsSession::with_config(config).unwrap();
        assert_eq!(session.unit(), "in");

        let round_trip: SessionConfig =
            serde_wasm_bindgen::from_value(session.config().unwrap()).unwrap();
        assert_eq!(round_trip.dpi, 150.0);
    }

    #[wasm_bindgen_test]
    fn test_invalid_config_rejected() {
        let config = serde_wasm_bindgen::to_value(&"not a config").unwrap();
        assert!(JsSession::with_config(config).is_err());
    }

    #[wasm_bindgen_test]
    fn test_errors_carry_message() {
        let mut session = JsSession::new();
        let err = session.add_point(1.0, 1.0).unwrap_err();
        assert_eq!(err.as_string().as_deref(), Some("no image loaded"));

        let err = session.set_unit("cm").unwrap_err();
        assert!(err.as_string().unwrap().contains("unknown unit"));
    }

    #[wasm_bindgen_test]
    fn test_degenerate_quad_reported() {
        let mut session = JsSession::new();
        let image = JsRaster::new(10, 10, 1, vec![0; 100]).unwrap();
        session.load_image(&image);
        session.add_point(1.0, 1.0).unwrap();
        session.add_point(2.0, 2.0).unwrap();
        session.add_point(3.0, 3.0).unwrap();
        let err = session.add_point(4.0, 4.0).unwrap_err();
        assert!(err.as_string().unwrap().starts_with("cannot order points"));
    }
}
