//! Session configuration.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::measure::{check_dpi, Unit};
use crate::transform::{Background, TransformMode};

/// Settings a session is created with.
///
/// Missing fields deserialize to their defaults, so a partial JSON object
/// such as `{"dpi": 600}` is a valid configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Resolution used to convert between pixels and physical units.
    pub dpi: f64,
    /// Unit for output dimensions and measurements.
    pub unit: Unit,
    /// Output framing.
    pub mode: TransformMode,
    /// Fill for output pixels outside the source.
    pub background: Background,
    /// Largest output side, in pixels, a transform may produce.
    pub max_canvas_dimension: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            dpi: 300.0,
            unit: Unit::Millimeter,
            mode: TransformMode::FullImage,
            background: Background::BLACK,
            max_canvas_dimension: 32768,
        }
    }
}

impl SessionConfig {
    /// Check the values a session cannot work with.
    pub fn validate(&self) -> Result<()> {
        check_dpi(self.dpi)?;
        if self.max_canvas_dimension == 0 {
            return Err(CoreError::InvalidDimension(0.0));
        }
        Ok(())
    }
}
