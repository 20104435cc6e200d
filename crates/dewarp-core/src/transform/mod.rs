//! Projective rectification: solving the homography and resampling through it.

mod solve;
mod warp;

pub use solve::{
    quad_to_rect, solve, Homography, TransformMode, TransformPlan, MIN_QUAD_THICKNESS,
    MIN_RECIPROCAL_CONDITION,
};
pub use warp::{warp, Background};
