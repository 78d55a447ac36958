// ============================================================================
// ADJUSTMENT OPERATIONS: tone enhancers and threshold
// ============================================================================
//
// Every enhancer interpolates between a "degenerate" version of the image and
// the image itself: `out = degenerate + factor * (src - degenerate)`. A factor
// of 1.0 returns the source, 0.0 returns the degenerate image, and values
// above 1.0 extrapolate. Alpha is never touched.
// ============================================================================

use image::RgbaImage;
use rayon::prelude::*;

use crate::canvas::CanvasState;
use crate::error::OpOutcome;
use crate::ops::filters::{FilterKind, filter_image};

/// Multiplicative tone factors, neutral at 1.0.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Adjustments {
    pub brightness: f32,
    pub contrast: f32,
    pub saturation: f32,
    pub sharpness: f32,
}

impl Default for Adjustments {
    fn default() -> Self {
        Self { brightness: 1.0, contrast: 1.0, saturation: 1.0, sharpness: 1.0 }
    }
}

impl Adjustments {
    pub fn is_identity(&self) -> bool {
        *self == Self::default()
    }
}

/// Integer Rec.601 luma, rounded.
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((19595 * u32::from(r) + 38470 * u32::from(g) + 7471 * u32::from(b) + 0x8000) >> 16) as u8
}

// ============================================================================
// HELPER: per-pixel transform over a flat image
// ============================================================================

/// Apply `transform` to every pixel of `src`. It receives (r, g, b, a) as f32
/// and returns (r, g, b) as f32; alpha passes through.
fn apply_pixel_transform<F>(src: &RgbaImage, transform: F) -> RgbaImage
where
    F: Fn(f32, f32, f32) -> (f32, f32, f32) + Sync,
{
    let w = src.width() as usize;
    let h = src.height() as usize;
    if w == 0 || h == 0 {
        return src.clone();
    }
    let src_raw = src.as_raw();
    let stride = w * 4;
    let mut dst_raw = vec![0u8; w * h * 4];

    dst_raw.par_chunks_mut(stride).enumerate().for_each(|(y, row_out)| {
        let row_in = &src_raw[y * stride..(y + 1) * stride];
        for x in 0..w {
            let pi = x * 4;
            let (nr, ng, nb) = transform(
                f32::from(row_in[pi]),
                f32::from(row_in[pi + 1]),
                f32::from(row_in[pi + 2]),
            );
            row_out[pi] = nr.round().clamp(0.0, 255.0) as u8;
            row_out[pi + 1] = ng.round().clamp(0.0, 255.0) as u8;
            row_out[pi + 2] = nb.round().clamp(0.0, 255.0) as u8;
            row_out[pi + 3] = row_in[pi + 3];
        }
    });

    RgbaImage::from_raw(w as u32, h as u32, dst_raw).unwrap_or_else(|| src.clone())
}

/// `degenerate + factor * (src - degenerate)` per colour channel.
fn blend_with(degenerate: &RgbaImage, src: &RgbaImage, factor: f32) -> RgbaImage {
    let mut out = src.clone();
    let deg = degenerate.as_raw();
    out.par_chunks_mut(4)
        .zip(deg.par_chunks(4))
        .for_each(|(px, d)| {
            for c in 0..3 {
                let s = f32::from(px[c]);
                let dv = f32::from(d[c]);
                px[c] = (dv + factor * (s - dv)).round().clamp(0.0, 255.0) as u8;
            }
        });
    out
}

// ============================================================================
// ENHANCERS
// ============================================================================

pub fn brightness(src: &RgbaImage, factor: f32) -> RgbaImage {
    apply_pixel_transform(src, move |r, g, b| (r * factor, g * factor, b * factor))
}

/// Contrast around the image's mean luma.
pub fn contrast(src: &RgbaImage, factor: f32) -> RgbaImage {
    let n = u64::from(src.width()) * u64::from(src.height());
    if n == 0 {
        return src.clone();
    }
    let sum: u64 = src
        .as_raw()
        .par_chunks(4)
        .map(|p| u64::from(luma(p[0], p[1], p[2])))
        .sum();
    let mean = (sum as f64 / n as f64 + 0.5).floor() as f32;
    apply_pixel_transform(src, move |r, g, b| {
        (
            mean + factor * (r - mean),
            mean + factor * (g - mean),
            mean + factor * (b - mean),
        )
    })
}

/// Colour saturation against each pixel's own grey value.
pub fn saturation(src: &RgbaImage, factor: f32) -> RgbaImage {
    apply_pixel_transform(src, move |r, g, b| {
        let l = f32::from(luma(r as u8, g as u8, b as u8));
        (l + factor * (r - l), l + factor * (g - l), l + factor * (b - l))
    })
}

/// Sharpness against a smoothed copy.
pub fn sharpness(src: &RgbaImage, factor: f32) -> RgbaImage {
    let smoothed = filter_image(src, FilterKind::Smooth);
    blend_with(&smoothed, src, factor)
}

/// Brightness, then contrast, then saturation, then sharpness. Neutral factors
/// are skipped.
pub fn adjust_image(src: &RgbaImage, adj: &Adjustments) -> RgbaImage {
    let mut out = src.clone();
    if adj.brightness != 1.0 {
        out = brightness(&out, adj.brightness);
    }
    if adj.contrast != 1.0 {
        out = contrast(&out, adj.contrast);
    }
    if adj.saturation != 1.0 {
        out = saturation(&out, adj.saturation);
    }
    if adj.sharpness != 1.0 {
        out = sharpness(&out, adj.sharpness);
    }
    out
}

/// Binarize luma: strictly brighter than `level` becomes white, the rest
/// black. Alpha is ignored on input and the result is fully opaque.
pub fn threshold_image(src: &RgbaImage, level: u8) -> RgbaImage {
    let mut out = src.clone();
    out.par_chunks_mut(4).for_each(|px| {
        let v = if luma(px[0], px[1], px[2]) > level { 255 } else { 0 };
        px.copy_from_slice(&[v, v, v, 255]);
    });
    out
}

// ============================================================================
// LAYER OPERATIONS
// ============================================================================

pub fn apply_adjustments(state: &mut CanvasState, layer_idx: usize, adj: &Adjustments) -> OpOutcome {
    let Some(layer) = state.layers.get_mut(layer_idx) else { return OpOutcome::NoOp };
    layer.pixels = adjust_image(&layer.pixels, adj);
    OpOutcome::Applied
}

pub fn apply_threshold(state: &mut CanvasState, layer_idx: usize, level: u8) -> OpOutcome {
    let Some(layer) = state.layers.get_mut(layer_idx) else { return OpOutcome::NoOp };
    layer.pixels = threshold_image(&layer.pixels, level);
    OpOutcome::Applied
}
