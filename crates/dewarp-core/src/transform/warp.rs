//! Backward-mapping resampler.
//!
//! Every output pixel `(x, y)` is mapped through the inverse homography into
//! the source and interpolated bilinearly from its four neighbours in the
//! source's own bit depth. Coordinates inside `[0, w-1] × [0, h-1]` are
//! sampled; anything else is filled with the [`Background`].
//!
//! Output pixel `(x, y)` samples source position `H⁻¹(x, y)` with no half-pixel
//! offset, so an identity mapping copies pixels exactly.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::solve::Homography;
use crate::error::{CoreError, Result};
use crate::raster::{Raster, Sample, Samples};

/// Slack for coordinates that land on the last row or column.
const EDGE_EPSILON: f64 = 1e-9;

/// Fill for output pixels that map outside the source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Background {
    /// Zero in every channel, so alpha is 0 when present.
    Transparent,
    /// Normalised RGBA, each component in `0.0..=1.0`.
    Solid([f32; 4]),
}

impl Background {
    pub const BLACK: Background = Background::Solid([0.0, 0.0, 0.0, 1.0]);
    pub const WHITE: Background = Background::Solid([1.0, 1.0, 1.0, 1.0]);

    /// Per-channel fill value for a raster with `channels` channels.
    ///
    /// 1 → R, 2 → (R, A), 3 → RGB, 4 → RGBA.
    fn fill<T: Sample>(&self, channels: u8) -> Vec<T> {
        let rgba = match self {
            Background::Transparent => return vec![T::default(); channels as usize],
            Background::Solid(rgba) => rgba,
        };
        let pick: &[usize] = match channels {
            1 => &[0],
            2 => &[0, 3],
            3 => &[0, 1, 2],
            _ => &[0, 1, 2, 3],
        };
        pick.iter()
            .map(|&i| T::from_f64((rgba[i] as f64).clamp(0.0, 1.0) * T::MAX))
            .collect()
    }
}

impl Default for Background {
    fn default() -> Self {
        Self::BLACK
    }
}

/// Resample `source` through `matrix` into a `width × height` raster.
///
/// Channel count and bit depth are preserved.
///
/// # Errors
///
/// - [`CoreError::InvalidDimension`] if `width` or `height` is zero
/// - [`CoreError::InvalidRaster`] if `source` has no pixels
/// - [`CoreError::IllConditionedTransform`] if `matrix` is not invertible
#[instrument(skip(source, matrix), fields(src_w = source.width(), src_h = source.height()))]
pub fn warp(
    source: &Raster,
    matrix: &Homography,
    width: u32,
    height: u32,
    background: Background,
) -> Result<Raster> {
    if width == 0 || height == 0 {
        return Err(CoreError::InvalidDimension(width.min(height) as f64));
    }
    if source.width() == 0 || source.height() == 0 {
        return Err(CoreError::InvalidRaster(format!(
            "cannot sample an empty {}x{} source",
            source.width(),
            source.height()
        )));
    }
    let inverse = matrix.inverse()?.as_array();
    let layout = Layout {
        src_w: source.width() as usize,
        src_h: source.height() as usize,
        channels: source.channels() as usize,
        out_w: width as usize,
        out_h: height as usize,
    };
    debug!(?inverse, "backward mapping");

    let samples = match source.samples() {
        Samples::U8(v) => {
            Samples::U8(warp_samples(v, &layout, &inverse, &background.fill(source.channels())))
        }
        Samples::U16(v) => {
            Samples::U16(warp_samples(v, &layout, &inverse, &background.fill(source.channels())))
        }
    };
    Ok(Raster::from_parts(width, height, source.channels(), samples))
}

struct Layout {
    src_w: usize,
    src_h: usize,
    channels: usize,
    out_w: usize,
    out_h: usize,
}

fn warp_samples<T: Sample>(
    src: &[T],
    layout: &Layout,
    inv: &[[f64; 3]; 3],
    fill: &[T],
) -> Vec<T> {
    let c = layout.channels;
    let max_x = (layout.src_w - 1) as f64;
    let max_y = (layout.src_h - 1) as f64;
    let mut out = Vec::with_capacity(layout.out_w * layout.out_h * c);

    for y in 0..layout.out_h {
        let fy = y as f64;
        for x in 0..layout.out_w {
            let fx = x as f64;
            let w = inv[2][0] * fx + inv[2][1] * fy + inv[2][2];
            if w.abs() < 1e-12 {
                out.extend_from_slice(fill);
                continue;
            }
            let sx = (inv[0][0] * fx + inv[0][1] * fy + inv[0][2]) / w;
            let sy = (inv[1][0] * fx + inv[1][1] * fy + inv[1][2]) / w;

            let inside = sx >= -EDGE_EPSILON
                && sy >= -EDGE_EPSILON
                && sx <= max_x + EDGE_EPSILON
                && sy <= max_y + EDGE_EPSILON;
            if !inside {
                out.extend_from_slice(fill);
                continue;
            }
            sample_bilinear(
                src,
                layout,
                sx.clamp(0.0, max_x),
                sy.clamp(0.0, max_y),
                &mut out,
            );
        }
    }
    out
}

/// Interpolate all channels at `(x, y)` and append them to `out`.
///
/// The right and bottom neighbours are clamped to the last column and row.
#[inline]
fn sample_bilinear<T: Sample>(src: &[T], layout: &Layout, x: f64, y: f64, out: &mut Vec<T>) {
    let c = layout.channels;
    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(layout.src_w - 1);
    let y1 = (y0 + 1).min(layout.src_h - 1);
    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let row = layout.src_w * c;
    let i00 = y0 * row + x0 * c;
    let i10 = y0 * row + x1 * c;
    let i01 = y1 * row + x0 * c;
    let i11 = y1 * row + x1 * c;

    for ch in 0..c {
        let v = src[i00 + ch].to_f64() * (1.0 - fx) * (1.0 - fy)
            + src[i10 + ch].to_f64() * fx * (1.0 - fy)
            + src[i01 + ch].to_f64() * (1.0 - fx) * fy
            + src[i11 + ch].to_f64() * fx * fy;
        out.push(T::from_f64(v));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreErrorKind;
    use crate::geometry::OrderedQuad;
    use crate::raster::BitDepth;
    use crate::transform::{solve, TransformMode};

    fn gradient(width: u32, height: u32, channels: u8) -> Raster {
        let mut data = Vec::new();
        for y in 0..height {
            for x in 0..width {
                for c in 0..channels as u32 {
                    data.push(((x * 20 + y * 7 + c * 3) % 256) as u8);
                }
            }
        }
        Raster::from_u8(width, height, channels, data).unwrap()
    }

    #[test]
    fn test_identity_copies_pixels() {
        let src = gradient(6, 5, 3);
        let out = warp(&src, &Homography::identity(), 6, 5, Background::BLACK).unwrap();
        assert_eq!(out, src);
    }

    #[test]
    fn test_crop_of_axis_aligned_region_reproduces_it() {
        let src = gradient(8, 6, 1);
        let quad = OrderedQuad::rectangle(2.0, 1.0, 4.0, 3.0);
        let plan = solve(&quad, (4, 3), TransformMode::Crop, (8, 6), 32768).unwrap();
        let out = warp(&src, &plan.matrix, 4, 3, Background::BLACK).unwrap();

        assert_eq!(out.dimensions(), (4, 3));
        for y in 0..3 {
            for x in 0..4 {
                assert_eq!(out.sample(x, y, 0), src.sample(x + 2, y + 1, 0), "pixel ({x},{y})");
            }
        }
    }

    #[test]
    fn test_half_pixel_shift_interpolates() {
        let src = Raster::from_u8(2, 1, 1, vec![0, 100]).unwrap();
        let shift = Homography::translation(-0.5, 0.0);
        let out = warp(&src, &shift, 1, 1, Background::BLACK).unwrap();
        assert_eq!(out.sample(0, 0, 0), Some(50));
    }

    #[test]
    fn test_last_column_is_sampled_not_background() {
        let src = Raster::from_u8(3, 1, 1, vec![10, 20, 30]).unwrap();
        let out = warp(&src, &Homography::identity(), 3, 1, Background::WHITE).unwrap();
        assert_eq!(out.sample(2, 0, 0), Some(30));
    }

    #[test]
    fn test_outside_uses_solid_background() {
        let src = gradient(4, 4, 2);
        let away = Homography::translation(100.0, 100.0);
        let bg = Background::Solid([1.0, 0.0, 0.0, 0.5]);
        let out = warp(&src, &away, 3, 2, bg).unwrap();

        match out.samples() {
            Samples::U8(v) => assert!(v.chunks(2).all(|px| px == [255, 128])),
            Samples::U16(_) => panic!("bit depth changed"),
        }
    }

    #[test]
    fn test_transparent_background_is_zero() {
        let src = Raster::from_u16(2, 2, 4, vec![u16::MAX; 16]).unwrap();
        let away = Homography::translation(-10.0, 0.0);
        let out = warp(&src, &away, 2, 2, Background::Transparent).unwrap();

        assert_eq!(out.bit_depth(), BitDepth::Sixteen);
        assert_eq!(out.channels(), 4);
        assert_eq!(out.into_samples(), Samples::U16(vec![0; 16]));
    }

    #[test]
    fn test_solid_fill_per_layout() {
        let bg = Background::Solid([0.2, 0.4, 0.6, 1.0]);
        assert_eq!(bg.fill::<u8>(1), vec![51]);
        assert_eq!(bg.fill::<u8>(2), vec![51, 255]);
        assert_eq!(bg.fill::<u8>(3), vec![51, 102, 153]);
        assert_eq!(bg.fill::<u16>(4), vec![13107, 26214, 39321, 65535]);
    }

    #[test]
    fn test_sixteen_bit_preserved() {
        let src = Raster::from_u16(3, 3, 1, (0..9).map(|v| v * 1000).collect()).unwrap();
        let out = warp(&src, &Homography::identity(), 3, 3, Background::BLACK).unwrap();
        assert_eq!(out, src);
    }

    #[test]
    fn test_zero_size_rejected() {
        let src = gradient(2, 2, 1);
        let err = warp(&src, &Homography::identity(), 0, 5, Background::BLACK).unwrap_err();
        assert_eq!(err.kind(), CoreErrorKind::InvalidDimension);
    }

    #[test]
    fn test_empty_source_rejected() {
        let empty = Raster::from_parts(0, 0, 1, Samples::U8(Vec::new()));
        let err = warp(&empty, &Homography::identity(), 2, 2, Background::BLACK).unwrap_err();
        assert_eq!(err.kind(), CoreErrorKind::InvalidRaster);
    }

    #[test]
    fn test_singular_matrix_rejected() {
        let src = gradient(2, 2, 1);
        let flat = Homography::from_array([[1.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]]);
        let err = warp(&src, &flat, 2, 2, Background::BLACK).unwrap_err();
        assert_eq!(err.kind(), CoreErrorKind::IllConditionedTransform);
    }

    #[test]
    fn test_background_serde() {
        let json = serde_json::to_string(&Background::Transparent).unwrap();
        assert_eq!(json, "\"transparent\"");
        let bg: Background = serde_json::from_str(r#"{"solid":[1.0,1.0,1.0,1.0]}"#).unwrap();
        assert_eq!(bg, Background::WHITE);
    }
}

// =============================================================================
// Property-Based Tests
// =============================================================================

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::geometry::{order_points, Point2D};
    use crate::transform::{solve, TransformMode};
    use proptest::prelude::*;

    /// A jittered rectangle inside a 64x48 source, as `[tl, tr, br, bl]`.
    /// The jitter stays below an eighth of the short side, so it is convex.
    fn convex_quad_strategy() -> impl Strategy<Value = [Point2D; 4]> {
        (0.0f64..16.0, 0.0f64..10.0, 24.0f64..40.0, 20.0f64..32.0).prop_flat_map(
            |(left, top, w, h)| {
                let j = w.min(h) / 8.0;
                proptest::array::uniform8(-j..j).prop_map(move |d| {
                    [
                        Point2D::new(left + d[0], top + d[1]),
                        Point2D::new(left + w + d[2], top + d[3]),
                        Point2D::new(left + w + d[4], top + h + d[5]),
                        Point2D::new(left + d[6], top + h + d[7]),
                    ]
                })
            },
        )
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_crop_output_has_requested_size(
            corners in convex_quad_strategy(),
            perm in Just(vec![0usize, 1, 2, 3]).prop_shuffle(),
            w in 1u32..48,
            h in 1u32..48,
            channels in 1u8..=4,
            sixteen in any::<bool>(),
        ) {
            let (sw, sh) = (64u32, 48u32);
            let len = (sw * sh) as usize * channels as usize;
            let src = if sixteen {
                Raster::from_u16(sw, sh, channels, vec![4096; len]).unwrap()
            } else {
                Raster::from_u8(sw, sh, channels, vec![200; len]).unwrap()
            };
            let picked = [corners[perm[0]], corners[perm[1]], corners[perm[2]], corners[perm[3]]];
            let quad = order_points(&picked).unwrap();

            let plan = solve(&quad, (w, h), TransformMode::Crop, (sw, sh), 32768).unwrap();
            let out = warp(&src, &plan.matrix, plan.canvas_width, plan.canvas_height, Background::BLACK).unwrap();

            prop_assert_eq!(out.dimensions(), (w, h));
            prop_assert_eq!(out.channels(), channels);
            prop_assert_eq!(out.bit_depth(), src.bit_depth());
            prop_assert_eq!(out.samples().len(), (w * h) as usize * channels as usize);
        }
    }
}
