//! The owned session: one source image, its corner points, dimensions,
//! calibrations and the latest transform result.
//!
//! # States
//!
//! ```text
//! Empty -> PointSelecting (0-3 points) -> Ready (4 points) -> Transformed
//! ```
//!
//! The state is derived from the data, never stored. A failing operation
//! returns an error and leaves the session exactly as it was.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::job::{TransformJob, TransformOutcome};
use crate::config::SessionConfig;
use crate::error::{CoreError, Result};
use crate::geometry::{nearest_point, order_points, OrderedQuad, Point2D};
use crate::measure::{calibrate, check_dpi, DimensionSpec, ScaleCalibration, Unit};
use crate::raster::{FlipAxis, Raster, Rotation};
use crate::transform::{solve, Background, TransformMode, TransformPlan};

/// Where a session is in the correction workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No image loaded.
    Empty,
    /// Fewer than four points placed.
    PointSelecting,
    /// Four points form a valid quad.
    Ready,
    /// A transform result exists.
    Transformed,
}

/// Which of the session's two images an edit applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageTarget {
    #[default]
    Original,
    Result,
}

#[derive(Debug, Clone)]
struct TransformResult {
    raster: Raster,
    plan: TransformPlan,
    calibration: Option<ScaleCalibration>,
}

/// A perspective correction session.
#[derive(Debug, Clone)]
pub struct Session {
    config: SessionConfig,
    source: Option<Arc<Raster>>,
    /// Canonical order once all four are placed, placement order before.
    points: Vec<Point2D>,
    dimensions: DimensionSpec,
    calibration: Option<ScaleCalibration>,
    result: Option<TransformResult>,
    /// Generation of the newest issued job; older outcomes are stale.
    generation: u64,
}

impl Default for Session {
    fn default() -> Self {
        Self::empty(SessionConfig::default())
    }
}

impl Session {
    /// A session with no image.
    pub fn new(config: SessionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::empty(config))
    }

    /// A session working on `raster`.
    pub fn with_image(raster: Raster, config: SessionConfig) -> Result<Self> {
        let mut session = Self::new(config)?;
        session.load_image(raster);
        Ok(session)
    }

    fn empty(config: SessionConfig) -> Self {
        Self {
            config,
            source: None,
            points: Vec::with_capacity(4),
            dimensions: DimensionSpec::unset(config.unit),
            calibration: None,
            result: None,
            generation: 0,
        }
    }

    /// Replace the source image. Points, calibrations, dimensions and any
    /// result are discarded; in-flight jobs become stale.
    pub fn load_image(&mut self, raster: Raster) {
        info!(
            width = raster.width(),
            height = raster.height(),
            channels = raster.channels(),
            "image loaded"
        );
        self.source = Some(Arc::new(raster));
        self.points.clear();
        self.dimensions.clear();
        self.calibration = None;
        self.result = None;
        self.generation += 1;
    }

    // ---------------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------------

    pub fn state(&self) -> SessionState {
        if self.source.is_none() {
            SessionState::Empty
        } else if self.result.is_some() {
            SessionState::Transformed
        } else if self.points.len() == 4 {
            SessionState::Ready
        } else {
            SessionState::PointSelecting
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn source(&self) -> Option<&Raster> {
        self.source.as_deref()
    }

    pub fn result(&self) -> Option<&Raster> {
        self.result.as_ref().map(|r| &r.raster)
    }

    /// Plan of the current result, including where the reference corners
    /// landed on its canvas.
    pub fn result_plan(&self) -> Option<&TransformPlan> {
        self.result.as_ref().map(|r| &r.plan)
    }

    pub fn points(&self) -> &[Point2D] {
        &self.points
    }

    pub fn dimensions(&self) -> &DimensionSpec {
        &self.dimensions
    }

    pub fn calibration(&self, target: ImageTarget) -> Option<&ScaleCalibration> {
        match target {
            ImageTarget::Original => self.calibration.as_ref(),
            ImageTarget::Result => self.result.as_ref()?.calibration.as_ref(),
        }
    }

    /// Generation of the newest issued transform job.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Output size in pixels for the current dimensions.
    pub fn output_pixels(&self) -> (u32, u32) {
        self.dimensions.to_pixels(self.config.dpi)
    }

    // ---------------------------------------------------------------------
    // Points
    // ---------------------------------------------------------------------

    /// Place a corner point, clamped to the image. Returns its index in the
    /// stored order.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NoImage`], [`CoreError::QuadFull`]
    /// - [`CoreError::DegenerateQuad`] if the fourth point leaves no valid quad
    pub fn add_point(&mut self, point: Point2D) -> Result<usize> {
        let source = self.source.as_ref().ok_or(CoreError::NoImage)?;
        if self.points.len() == 4 {
            return Err(CoreError::QuadFull);
        }
        let point = clamp_point(point, source)?;

        let mut candidate = self.points.clone();
        candidate.push(point);
        self.commit_points(candidate, point)
    }

    /// Drag a point to a new position, clamped to the image. Returns the
    /// point's index after re-ordering.
    ///
    /// # Errors
    ///
    /// [`CoreError::DegenerateQuad`] if the move would collapse the quad; the
    /// point stays where it was.
    pub fn move_point(&mut self, index: usize, to: Point2D) -> Result<usize> {
        let source = self.source.as_ref().ok_or(CoreError::NoImage)?;
        self.check_index(index)?;
        let to = clamp_point(to, source)?;

        let mut candidate = self.points.clone();
        candidate[index] = to;
        self.commit_points(candidate, to)
    }

    /// Remove a point. The remaining points keep their order.
    pub fn remove_point(&mut self, index: usize) -> Result<Point2D> {
        self.check_index(index)?;
        let removed = self.points.remove(index);
        debug!(index, remaining = self.points.len(), "point removed");
        Ok(removed)
    }

    /// Drop all points and the result, and re-enable dimension estimation.
    pub fn reset_points(&mut self) {
        self.points.clear();
        self.dimensions.clear();
        self.result = None;
        self.generation += 1;
        debug!("points reset");
    }

    /// Index of the placed point nearest `target` within `threshold` pixels.
    pub fn hit_test(&self, target: Point2D, threshold: f64) -> Option<usize> {
        nearest_point(&self.points, target, threshold)
    }

    /// The four corners in canonical order.
    pub fn ordered_quad(&self) -> Result<OrderedQuad> {
        match <[Point2D; 4]>::try_from(self.points.as_slice()) {
            Ok(corners) => Ok(OrderedQuad::from_corners(corners)),
            Err(_) => Err(CoreError::IncompleteQuad {
                placed: self.points.len(),
            }),
        }
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index < self.points.len() {
            Ok(())
        } else {
            Err(CoreError::PointIndexOutOfRange {
                index,
                len: self.points.len(),
            })
        }
    }

    /// Store `candidate`, ordering it first when complete.
    fn commit_points(&mut self, candidate: Vec<Point2D>, moved: Point2D) -> Result<usize> {
        let candidate = match <[Point2D; 4]>::try_from(candidate.as_slice()) {
            Ok(four) => match order_points(&four) {
                Ok(quad) => quad.corners().to_vec(),
                Err(e) => {
                    warn!(error = %e, "point change rejected");
                    return Err(e);
                }
            },
            Err(_) => candidate,
        };
        self.points = candidate;
        self.refresh_dimensions();

        let index = self
            .points
            .iter()
            .position(|p| *p == moved)
            .unwrap_or(self.points.len() - 1);
        debug!(index, placed = self.points.len(), "points updated");
        Ok(index)
    }

    fn refresh_dimensions(&mut self) {
        if let Ok(quad) = self.ordered_quad() {
            self.dimensions
                .refresh(&quad, self.config.dpi, self.calibration.as_ref());
        }
    }

    // ---------------------------------------------------------------------
    // Dimensions and settings
    // ---------------------------------------------------------------------

    /// Manually set the output width, locking the dimensions.
    pub fn set_width(&mut self, value: f64) -> Result<()> {
        self.dimensions.set_width(value).inspect_err(|e| {
            warn!(error = %e, "width rejected");
        })
    }

    /// Manually set the output height, locking the dimensions.
    pub fn set_height(&mut self, value: f64) -> Result<()> {
        self.dimensions.set_height(value).inspect_err(|e| {
            warn!(error = %e, "height rejected");
        })
    }

    /// Return to estimated dimensions and recompute them now.
    pub fn unlock_dimensions(&mut self) {
        self.dimensions.unlock();
        self.refresh_dimensions();
    }

    /// Switch units. Locked values are converted; estimated ones recomputed.
    pub fn set_unit(&mut self, unit: Unit) {
        self.dimensions.convert_to(unit, self.config.dpi);
        self.config.unit = unit;
        self.refresh_dimensions();
    }

    pub fn set_dpi(&mut self, dpi: f64) -> Result<()> {
        check_dpi(dpi)?;
        self.config.dpi = dpi;
        self.refresh_dimensions();
        Ok(())
    }

    pub fn set_mode(&mut self, mode: TransformMode) {
        self.config.mode = mode;
    }

    pub fn set_background(&mut self, background: Background) {
        self.config.background = background;
    }

    // ---------------------------------------------------------------------
    // Scale calibration
    // ---------------------------------------------------------------------

    /// Calibrate the scale of one image from two points a known distance apart.
    ///
    /// A calibration on the original replaces DPI for dimension estimates.
    pub fn calibrate(
        &mut self,
        target: ImageTarget,
        p1: Point2D,
        p2: Point2D,
        real_distance: f64,
        unit: Unit,
    ) -> Result<()> {
        let raster = self.raster(target)?;
        let p1 = clamp_point(p1, raster)?;
        let p2 = clamp_point(p2, raster)?;
        let calibration = calibrate(p1, p2, real_distance, unit)?;
        info!(
            ?target,
            real_distance,
            pixel_distance = calibration.pixel_distance(),
            unit = %unit,
            "scale calibrated"
        );

        *self.calibration_slot(target)? = Some(calibration);
        if target == ImageTarget::Original {
            self.refresh_dimensions();
        }
        Ok(())
    }

    /// Drag one of the two calibration points.
    pub fn move_calibration_point(
        &mut self,
        target: ImageTarget,
        index: usize,
        to: Point2D,
    ) -> Result<()> {
        let to = clamp_point(to, self.raster(target)?)?;
        let calibration = self
            .calibration_slot(target)?
            .as_mut()
            .ok_or(CoreError::PointIndexOutOfRange { index, len: 0 })?;
        calibration.move_point(index, to)?;
        if target == ImageTarget::Original {
            self.refresh_dimensions();
        }
        Ok(())
    }

    /// Remove a calibration, returning to DPI-based conversion.
    pub fn clear_calibration(&mut self, target: ImageTarget) -> Option<ScaleCalibration> {
        let removed = self.calibration_slot(target).ok()?.take();
        if target == ImageTarget::Original {
            self.refresh_dimensions();
        }
        removed
    }

    /// Distance between two points on an image, in the session unit.
    pub fn measure(&self, target: ImageTarget, p1: Point2D, p2: Point2D) -> Result<f64> {
        self.raster(target)?;
        let pixels = p1.distance(&p2);
        let (unit, dpi) = (self.config.unit, self.config.dpi);
        Ok(match self.calibration(target) {
            Some(cal) => cal.measure_pixels(pixels, unit, dpi),
            None => unit.from_pixels(pixels, dpi),
        })
    }

    fn raster(&self, target: ImageTarget) -> Result<&Raster> {
        match target {
            ImageTarget::Original => self.source.as_deref().ok_or(CoreError::NoImage),
            ImageTarget::Result => self.result().ok_or(CoreError::NoResult),
        }
    }

    fn calibration_slot(&mut self, target: ImageTarget) -> Result<&mut Option<ScaleCalibration>> {
        match target {
            ImageTarget::Original => Ok(&mut self.calibration),
            ImageTarget::Result => self
                .result
                .as_mut()
                .map(|r| &mut r.calibration)
                .ok_or(CoreError::NoResult),
        }
    }

    // ---------------------------------------------------------------------
    // Transform
    // ---------------------------------------------------------------------

    /// Solve the transform and package the resample as a job.
    ///
    /// Issuing a job makes every earlier job stale.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NoImage`], [`CoreError::IncompleteQuad`]
    /// - [`CoreError::InvalidDimension`] if width or height is unset
    /// - [`CoreError::IllConditionedTransform`] from the solver
    #[instrument(skip(self), fields(mode = ?self.config.mode))]
    pub fn prepare_transform(&mut self) -> Result<TransformJob> {
        let source = Arc::clone(self.source.as_ref().ok_or(CoreError::NoImage)?);
        let quad = self.ordered_quad()?;
        for value in [self.dimensions.width, self.dimensions.height] {
            if !(value.is_finite() && value > 0.0) {
                return Err(CoreError::InvalidDimension(value));
            }
        }

        let output = self.output_pixels();
        let plan = solve(
            &quad,
            output,
            self.config.mode,
            source.dimensions(),
            self.config.max_canvas_dimension,
        )
        .inspect_err(|e| warn!(error = %e, "transform rejected"))?;

        self.generation += 1;
        debug!(
            generation = self.generation,
            canvas_width = plan.canvas_width,
            canvas_height = plan.canvas_height,
            "transform job issued"
        );
        Ok(TransformJob {
            generation: self.generation,
            source,
            plan,
            background: self.config.background,
        })
    }

    /// Store a finished resample if it belongs to the newest job.
    ///
    /// Returns `false`, leaving the session untouched, for stale outcomes.
    pub fn accept(&mut self, outcome: TransformOutcome) -> bool {
        if outcome.generation != self.generation {
            warn!(
                outcome = outcome.generation,
                current = self.generation,
                "stale transform result discarded"
            );
            return false;
        }
        info!(
            generation = outcome.generation,
            width = outcome.raster.width(),
            height = outcome.raster.height(),
            "transform applied"
        );
        self.result = Some(TransformResult {
            raster: outcome.raster,
            plan: outcome.plan,
            calibration: None,
        });
        true
    }

    /// Solve, resample and store synchronously.
    pub fn apply_transform(&mut self) -> Result<&Raster> {
        let outcome = self.prepare_transform()?.run()?;
        self.accept(outcome);
        self.raster(ImageTarget::Result)
    }

    /// Continue with the result as the new original.
    ///
    /// Builds a fresh session from the result raster with the same
    /// configuration; nothing else carries over.
    pub fn promote_result(&mut self) -> Result<()> {
        let result = self.result.take().ok_or(CoreError::NoResult)?;
        info!(
            width = result.raster.width(),
            height = result.raster.height(),
            "result promoted to original"
        );
        let generation = self.generation;
        *self = Self::empty(self.config);
        self.generation = generation;
        self.load_image(result.raster);
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Geometric edits
    // ---------------------------------------------------------------------

    /// Rotate one of the images by 90°.
    pub fn rotate(&mut self, target: ImageTarget, rotation: Rotation) -> Result<()> {
        self.edit_raster(target, |r| r.rotate_90(rotation))
    }

    /// Mirror one of the images.
    pub fn flip(&mut self, target: ImageTarget, axis: FlipAxis) -> Result<()> {
        self.edit_raster(target, |r| r.flip(axis))
    }

    /// Replace an image with an edited copy.
    ///
    /// Pixel coordinates tied to that image are no longer meaningful: editing
    /// the original clears the points and its calibration and makes in-flight
    /// jobs stale; editing the result drops the result's calibration.
    fn edit_raster(&mut self, target: ImageTarget, edit: impl FnOnce(&Raster) -> Raster) -> Result<()> {
        match target {
            ImageTarget::Original => {
                let source = self.source.as_ref().ok_or(CoreError::NoImage)?;
                let edited = edit(source);
                self.source = Some(Arc::new(edited));
                self.points.clear();
                self.dimensions.clear();
                self.calibration = None;
                self.generation += 1;
            }
            ImageTarget::Result => {
                let result = self.result.as_mut().ok_or(CoreError::NoResult)?;
                result.raster = edit(&result.raster);
                result.calibration = None;
            }
        }
        debug!(?target, "image edited");
        Ok(())
    }
}

fn clamp_point(point: Point2D, raster: &Raster) -> Result<Point2D> {
    if !point.is_finite() {
        return Err(CoreError::DegenerateQuad(format!(
            "point ({}, {}) is not finite",
            point.x, point.y
        )));
    }
    Ok(point.clamp_to(raster.width(), raster.height()))
}
