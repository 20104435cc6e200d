//! Error types for the perspective correction engine.
//!
//! Every error is recoverable at the session level: the operation that
//! produced it is aborted and the session keeps its previous state.

use thiserror::Error;

/// Errors produced by the geometry, transform and session operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    /// The four points do not form a simple quadrilateral with positive area.
    #[error("cannot order points: {0}")]
    DegenerateQuad(String),

    /// The two scale calibration points coincide.
    #[error("calibration points coincide")]
    ZeroDistance,

    /// The homography solve is numerically unstable.
    #[error("transform is ill-conditioned: {0}")]
    IllConditionedTransform(String),

    /// A manual width, height or real-world length is not a positive number.
    #[error("invalid dimension: {0} (must be a positive number)")]
    InvalidDimension(f64),

    /// The DPI setting is not a positive number.
    #[error("invalid DPI: {0} (must be a positive number)")]
    InvalidDpi(f64),

    /// The pixel buffer does not match the declared layout.
    #[error("invalid raster: {0}")]
    InvalidRaster(String),

    /// The operation needs a loaded image.
    #[error("no image loaded")]
    NoImage,

    /// The operation needs a transform result.
    #[error("no transform result available")]
    NoResult,

    /// The operation needs all four corner points.
    #[error("need 4 points, {placed} placed")]
    IncompleteQuad { placed: usize },

    /// A fifth corner point was added.
    #[error("all 4 points are already placed")]
    QuadFull,

    /// A point index does not refer to a placed point.
    #[error("point index {index} out of range ({len} placed)")]
    PointIndexOutOfRange { index: usize, len: usize },
}

/// Fieldless discriminant of [`CoreError`], for callers that branch on the
/// kind of failure without inspecting its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoreErrorKind {
    DegenerateQuad,
    ZeroDistance,
    IllConditionedTransform,
    InvalidDimension,
    InvalidDpi,
    InvalidRaster,
    NoImage,
    NoResult,
    IncompleteQuad,
    QuadFull,
    PointIndexOutOfRange,
}

impl CoreError {
    /// The kind of this error.
    pub fn kind(&self) -> CoreErrorKind {
        match self {
            CoreError::DegenerateQuad(_) => CoreErrorKind::DegenerateQuad,
            CoreError::ZeroDistance => CoreErrorKind::ZeroDistance,
            CoreError::IllConditionedTransform(_) => CoreErrorKind::IllConditionedTransform,
            CoreError::InvalidDimension(_) => CoreErrorKind::InvalidDimension,
            CoreError::InvalidDpi(_) => CoreErrorKind::InvalidDpi,
            CoreError::InvalidRaster(_) => CoreErrorKind::InvalidRaster,
            CoreError::NoImage => CoreErrorKind::NoImage,
            CoreError::NoResult => CoreErrorKind::NoResult,
            CoreError::IncompleteQuad { .. } => CoreErrorKind::IncompleteQuad,
            CoreError::QuadFull => CoreErrorKind::QuadFull,
            CoreError::PointIndexOutOfRange { .. } => CoreErrorKind::PointIndexOutOfRange,
        }
    }
}

/// Alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::DegenerateQuad("points are collinear".to_string());
        assert_eq!(err.to_string(), "cannot order points: points are collinear");

        let err = CoreError::IncompleteQuad { placed: 3 };
        assert_eq!(err.to_string(), "need 4 points, 3 placed");

        let err = CoreError::InvalidDimension(-2.0);
        assert_eq!(
            err.to_string(),
            "invalid dimension: -2 (must be a positive number)"
        );
    }

    #[test]
    fn test_error_kind() {
        assert_eq!(CoreError::ZeroDistance.kind(), CoreErrorKind::ZeroDistance);
        assert_eq!(
            CoreError::IllConditionedTransform("x".into()).kind(),
            CoreErrorKind::IllConditionedTransform
        );
        assert_eq!(
            CoreError::PointIndexOutOfRange { index: 4, len: 2 }.kind(),
            CoreErrorKind::PointIndexOutOfRange
        );
    }
}
