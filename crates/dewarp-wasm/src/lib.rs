//! Dewarp WASM - WebAssembly bindings for Dewarp
//!
//! This crate exposes the dewarp-core session to JavaScript/TypeScript. It
//! holds no algorithms of its own; every call delegates to the core, and core
//! errors become `JsValue` strings carrying the error message.
//!
//! # Module Structure
//!
//! - `types` - `JsRaster` pixel buffer wrapper and enum name parsing
//! - `session` - `JsSession`, the point/dimension/transform workflow
//!
//! # Usage
//!
//! ```typescript
//! import init, { JsRaster, JsSession } from '@dewarp/wasm';
//!
//! await init();
//!
//! const session = new JsSession();
//! session.load_image(new JsRaster(data.width, data.height, 4, data.data));
//! ```

use wasm_bindgen::prelude::*;

mod session;
mod types;

pub use session::JsSession;
pub use types::JsRaster;

/// Initialize the WASM module (called automatically on load)
#[wasm_bindgen(start)]
pub fn init() {}

/// Get the version of the WASM module
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Order four points given as `[x0, y0, ..., x3, y3]`.
///
/// Returns them as top-left, top-right, bottom-right, bottom-left.
#[wasm_bindgen]
pub fn order_points(coords: Vec<f64>) -> Result<Vec<f64>, JsValue> {
    if coords.len() != 8 {
        return Err(JsValue::from_str("expected 8 coordinates"));
    }
    let points = [0, 1, 2, 3].map(|i| dewarp_core::Point2D::new(coords[2 * i], coords[2 * i + 1]));
    dewarp_core::order_points(&points)
        .map(|quad| quad.corners().iter().flat_map(|p| [p.x, p.y]).collect())
        .map_err(|e| JsValue::from_str(&e.to_string()))
}
