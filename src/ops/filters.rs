// ============================================================================
// IMAGE FILTERS: fixed-kernel convolutions (blur, sharpen, edges, ...)
// ============================================================================

use image::RgbaImage;
use rayon::prelude::*;

use crate::canvas::CanvasState;
use crate::error::OpOutcome;

/// The fixed convolution filters offered by the editor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FilterKind {
    Blur,
    Sharpen,
    FindEdges,
    Emboss,
    Contour,
    Smooth,
    Detail,
    EdgeEnhance,
}

struct Kernel {
    size: usize,
    weights: &'static [f32],
    scale: f32,
    offset: f32,
}

#[rustfmt::skip]
const BLUR: [f32; 25] = [
    1.0, 1.0, 1.0, 1.0, 1.0,
    1.0, 0.0, 0.0, 0.0, 1.0,
    1.0, 0.0, 0.0, 0.0, 1.0,
    1.0, 0.0, 0.0, 0.0, 1.0,
    1.0, 1.0, 1.0, 1.0, 1.0,
];
const EDGES: [f32; 9] = [-1.0, -1.0, -1.0, -1.0, 8.0, -1.0, -1.0, -1.0, -1.0];
const DETAIL: [f32; 9] = [0.0, -1.0, 0.0, -1.0, 10.0, -1.0, 0.0, -1.0, 0.0];
const EDGE_ENHANCE: [f32; 9] = [-1.0, -1.0, -1.0, -1.0, 10.0, -1.0, -1.0, -1.0, -1.0];
const EMBOSS: [f32; 9] = [-1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0];
const SMOOTH: [f32; 9] = [1.0, 1.0, 1.0, 1.0, 5.0, 1.0, 1.0, 1.0, 1.0];
const SHARPEN: [f32; 9] = [-2.0, -2.0, -2.0, -2.0, 32.0, -2.0, -2.0, -2.0, -2.0];

impl FilterKind {
    pub fn all() -> &'static [FilterKind] {
        &[
            FilterKind::Blur,
            FilterKind::Sharpen,
            FilterKind::FindEdges,
            FilterKind::Emboss,
            FilterKind::Contour,
            FilterKind::Smooth,
            FilterKind::Detail,
            FilterKind::EdgeEnhance,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            FilterKind::Blur => "Blur",
            FilterKind::Sharpen => "Sharpen",
            FilterKind::FindEdges => "Find Edges",
            FilterKind::Emboss => "Emboss",
            FilterKind::Contour => "Contour",
            FilterKind::Smooth => "Smooth",
            FilterKind::Detail => "Detail",
            FilterKind::EdgeEnhance => "Edge Enhance",
        }
    }

    /// Accepts `find_edges`, `find-edges`, `FindEdges`, ... (case-insensitive).
    pub fn parse(name: &str) -> Option<Self> {
        let key: String = name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match key.as_str() {
            "blur" => Some(FilterKind::Blur),
            "sharpen" => Some(FilterKind::Sharpen),
            "findedges" | "edges" => Some(FilterKind::FindEdges),
            "emboss" => Some(FilterKind::Emboss),
            "contour" => Some(FilterKind::Contour),
            "smooth" => Some(FilterKind::Smooth),
            "detail" => Some(FilterKind::Detail),
            "edgeenhance" => Some(FilterKind::EdgeEnhance),
            _ => None,
        }
    }

    fn kernel(self) -> Kernel {
        match self {
            FilterKind::Blur => Kernel { size: 5, weights: &BLUR, scale: 16.0, offset: 0.0 },
            FilterKind::Contour => Kernel { size: 3, weights: &EDGES, scale: 1.0, offset: 255.0 },
            FilterKind::Detail => Kernel { size: 3, weights: &DETAIL, scale: 6.0, offset: 0.0 },
            FilterKind::EdgeEnhance => Kernel { size: 3, weights: &EDGE_ENHANCE, scale: 2.0, offset: 0.0 },
            FilterKind::Emboss => Kernel { size: 3, weights: &EMBOSS, scale: 1.0, offset: 128.0 },
            FilterKind::FindEdges => Kernel { size: 3, weights: &EDGES, scale: 1.0, offset: 0.0 },
            FilterKind::Smooth => Kernel { size: 3, weights: &SMOOTH, scale: 13.0, offset: 0.0 },
            FilterKind::Sharpen => Kernel { size: 3, weights: &SHARPEN, scale: 16.0, offset: 0.0 },
        }
    }
}

/// Run `kind` over the colour channels of `src`. Samples beyond the border
/// repeat the edge pixel; alpha is copied through.
pub fn filter_image(src: &RgbaImage, kind: FilterKind) -> RgbaImage {
    convolve(src, &kind.kernel())
}

fn convolve(src: &RgbaImage, kernel: &Kernel) -> RgbaImage {
    let w = src.width() as usize;
    let h = src.height() as usize;
    if w == 0 || h == 0 {
        return src.clone();
    }
    let stride = w * 4;
    let src_raw = src.as_raw();
    let half = (kernel.size / 2) as isize;
    let mut dst_raw = vec![0u8; w * h * 4];

    dst_raw.par_chunks_mut(stride).enumerate().for_each(|(y, row_out)| {
        for x in 0..w {
            let mut acc = [0.0f32; 3];
            for ky in 0..kernel.size {
                let sy = (y as isize + ky as isize - half).clamp(0, h as isize - 1) as usize;
                for kx in 0..kernel.size {
                    let weight = kernel.weights[ky * kernel.size + kx];
                    if weight == 0.0 {
                        continue;
                    }
                    let sx = (x as isize + kx as isize - half).clamp(0, w as isize - 1) as usize;
                    let si = sy * stride + sx * 4;
                    acc[0] += f32::from(src_raw[si]) * weight;
                    acc[1] += f32::from(src_raw[si + 1]) * weight;
                    acc[2] += f32::from(src_raw[si + 2]) * weight;
                }
            }
            let pi = x * 4;
            for c in 0..3 {
                row_out[pi + c] = (acc[c] / kernel.scale + kernel.offset).round().clamp(0.0, 255.0) as u8;
            }
            row_out[pi + 3] = src_raw[y * stride + pi + 3];
        }
    });

    RgbaImage::from_raw(w as u32, h as u32, dst_raw).unwrap_or_else(|| src.clone())
}

/// Filter one layer in place. Out-of-range index is a `NoOp`.
pub fn apply_filter(state: &mut CanvasState, layer_idx: usize, kind: FilterKind) -> OpOutcome {
    let Some(layer) = state.layers.get_mut(layer_idx) else { return OpOutcome::NoOp };
    if layer.width() == 0 || layer.height() == 0 {
        return OpOutcome::NoOp;
    }
    layer.pixels = filter_image(&layer.pixels, kind);
    OpOutcome::Applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn flat(c: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(6, 5, Rgba(c))
    }

    #[test]
    fn flat_image_survives_normalized_kernels() {
        let src = flat([90, 140, 200, 255]);
        for kind in [
            FilterKind::Blur,
            FilterKind::Sharpen,
            FilterKind::Smooth,
            FilterKind::Detail,
            FilterKind::EdgeEnhance,
        ] {
            assert_eq!(filter_image(&src, kind), src, "{:?}", kind);
        }
    }

    #[test]
    fn edge_kernels_use_their_offsets() {
        let src = flat([90, 140, 200, 77]);
        assert_eq!(*filter_image(&src, FilterKind::FindEdges).get_pixel(2, 2), Rgba([0, 0, 0, 77]));
        assert_eq!(*filter_image(&src, FilterKind::Contour).get_pixel(2, 2), Rgba([255, 255, 255, 77]));
        assert_eq!(*filter_image(&src, FilterKind::Emboss).get_pixel(2, 2), Rgba([128, 128, 128, 77]));
    }

    #[test]
    fn find_edges_marks_a_step() {
        let src = RgbaImage::from_fn(6, 1, |x, _| {
            if x < 3 { Rgba([0, 0, 0, 255]) } else { Rgba([100, 100, 100, 255]) }
        });
        let out = filter_image(&src, FilterKind::FindEdges);
        assert_eq!(out.get_pixel(0, 0)[0], 0);
        assert!(out.get_pixel(3, 0)[0] > 0);
        assert_eq!(out.get_pixel(5, 0)[0], 0);
    }

    #[test]
    fn names_parse_loosely() {
        assert_eq!(FilterKind::parse("find_edges"), Some(FilterKind::FindEdges));
        assert_eq!(FilterKind::parse("Edge-Enhance"), Some(FilterKind::EdgeEnhance));
        assert_eq!(FilterKind::parse("posterize"), None);
        for kind in FilterKind::all() {
            assert_eq!(FilterKind::parse(kind.label()), Some(*kind));
        }
    }

    #[test]
    fn out_of_range_layer_is_noop() {
        let mut state = CanvasState::with_base("base", flat([1, 2, 3, 255]));
        assert_eq!(apply_filter(&mut state, 3, FilterKind::Blur), OpOutcome::NoOp);
        assert_eq!(apply_filter(&mut state, 0, FilterKind::Blur), OpOutcome::Applied);
    }
}
