//! Lossless 90° rotations and flips.
//!
//! A quarter turn is a transpose followed by reversing one axis; a flip
//! reverses one axis. Both only move samples, so channel count and bit depth
//! are untouched.

use serde::{Deserialize, Serialize};

use super::types::{Raster, Samples};

/// Direction of a quarter turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rotation {
    Clockwise,
    CounterClockwise,
}

/// Axis a flip reverses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlipAxis {
    /// Mirror left-right.
    Horizontal,
    /// Mirror top-bottom.
    Vertical,
}

impl Raster {
    /// Rotate by 90° in the given direction. Width and height swap.
    pub fn rotate_90(&self, rotation: Rotation) -> Raster {
        let (w, h, c) = self.layout();
        let samples = match self.samples() {
            Samples::U8(v) => Samples::U8(rotate_samples(v, w, h, c, rotation)),
            Samples::U16(v) => Samples::U16(rotate_samples(v, w, h, c, rotation)),
        };
        Raster::from_parts(self.height(), self.width(), self.channels(), samples)
    }

    /// Mirror along the given axis.
    pub fn flip(&self, axis: FlipAxis) -> Raster {
        let (w, h, c) = self.layout();
        let samples = match self.samples() {
            Samples::U8(v) => Samples::U8(flip_samples(v, w, h, c, axis)),
            Samples::U16(v) => Samples::U16(flip_samples(v, w, h, c, axis)),
        };
        Raster::from_parts(self.width(), self.height(), self.channels(), samples)
    }

    fn layout(&self) -> (usize, usize, usize) {
        (
            self.width() as usize,
            self.height() as usize,
            self.channels() as usize,
        )
    }
}

fn rotate_samples<T: Copy>(src: &[T], w: usize, h: usize, c: usize, rotation: Rotation) -> Vec<T> {
    let mut out = Vec::with_capacity(src.len());
    // Output is h wide and w tall.
    for ny in 0..w {
        for nx in 0..h {
            let (sx, sy) = match rotation {
                Rotation::Clockwise => (ny, h - 1 - nx),
                Rotation::CounterClockwise => (w - 1 - ny, nx),
            };
            let idx = (sy * w + sx) * c;
            out.extend_from_slice(&src[idx..idx + c]);
        }
    }
    out
}

fn flip_samples<T: Copy>(src: &[T], w: usize, h: usize, c: usize, axis: FlipAxis) -> Vec<T> {
    let row_len = w * c;
    let mut out = Vec::with_capacity(src.len());
    match axis {
        FlipAxis::Horizontal => {
            for row in src.chunks_exact(row_len) {
                for pixel in row.chunks_exact(c).rev() {
                    out.extend_from_slice(pixel);
                }
            }
        }
        FlipAxis::Vertical => {
            for row in src.chunks_exact(row_len).rev() {
                out.extend_from_slice(row);
            }
        }
    }
    debug_assert_eq!(out.len(), w * h * c);
    out
}
