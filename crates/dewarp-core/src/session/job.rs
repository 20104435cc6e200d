//! Detached transform work.
//!
//! A [`TransformJob`] owns everything the resampler needs, so it can be moved
//! to a worker thread while the session keeps handling input. Each job carries
//! the generation number it was issued under; the session accepts an outcome
//! only if no newer job has been issued since.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::error::Result;
use crate::raster::Raster;
use crate::transform::{warp, Background, TransformPlan};

/// A solved transform waiting to be resampled.
#[derive(Debug, Clone)]
pub struct TransformJob {
    pub(crate) generation: u64,
    pub(crate) source: Arc<Raster>,
    pub(crate) plan: TransformPlan,
    pub(crate) background: Background,
}

impl TransformJob {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn plan(&self) -> &TransformPlan {
        &self.plan
    }

    /// Output pixel count; the cost of [`Self::run`] scales with it.
    pub fn output_pixels(&self) -> u64 {
        self.plan.canvas_width as u64 * self.plan.canvas_height as u64
    }

    /// Resample the source. This is the slow part of a transform.
    #[instrument(skip(self), fields(generation = self.generation))]
    pub fn run(self) -> Result<TransformOutcome> {
        let raster = warp(
            &self.source,
            &self.plan.matrix,
            self.plan.canvas_width,
            self.plan.canvas_height,
            self.background,
        )?;
        debug!(
            width = raster.width(),
            height = raster.height(),
            "resample finished"
        );
        Ok(TransformOutcome {
            generation: self.generation,
            raster,
            plan: self.plan,
        })
    }
}

/// A finished resample, handed back to [`crate::Session::accept`].
#[derive(Debug, Clone, PartialEq)]
pub struct TransformOutcome {
    pub(crate) generation: u64,
    pub(crate) raster: Raster,
    pub(crate) plan: TransformPlan,
}

impl TransformOutcome {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn raster(&self) -> &Raster {
        &self.raster
    }

    pub fn plan(&self) -> &TransformPlan {
        &self.plan
    }
}
