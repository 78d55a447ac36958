// ============================================================================
// TRANSFORM OPERATIONS: whole-document rotate, flip and crop
// ============================================================================
//
// Every transform touches all layers and remaps their positions so the
// composite stays visually consistent. Positions are handled relative to the
// canvas origin (the base layer's position), which itself never moves.
// ============================================================================

use image::{RgbaImage, Rgba, imageops};
use rayon::prelude::*;

use crate::canvas::{CanvasState, Layer};
use crate::error::OpOutcome;
use crate::viewport::CropBox;

/// Whole-document geometric transforms.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransformKind {
    /// 90° counter-clockwise.
    RotateLeft,
    /// 90° clockwise.
    RotateRight,
    FlipHorizontal,
    FlipVertical,
}

impl TransformKind {
    pub fn label(&self) -> &'static str {
        match self {
            TransformKind::RotateLeft => "Rotate Left",
            TransformKind::RotateRight => "Rotate Right",
            TransformKind::FlipHorizontal => "Flip Horizontal",
            TransformKind::FlipVertical => "Flip Vertical",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().replace('-', "_").as_str() {
            "rotate_left" | "rotate_ccw" => Some(TransformKind::RotateLeft),
            "rotate_right" | "rotate_cw" => Some(TransformKind::RotateRight),
            "flip_h" | "flip_horizontal" => Some(TransformKind::FlipHorizontal),
            "flip_v" | "flip_vertical" => Some(TransformKind::FlipVertical),
            _ => None,
        }
    }

    fn transform_pixels(self, pixels: &RgbaImage) -> RgbaImage {
        match self {
            TransformKind::RotateLeft => imageops::rotate270(pixels),
            TransformKind::RotateRight => imageops::rotate90(pixels),
            TransformKind::FlipHorizontal => imageops::flip_horizontal(pixels),
            TransformKind::FlipVertical => imageops::flip_vertical(pixels),
        }
    }

    /// New canvas-relative offset of a `w`×`h` layer at (`x`, `y`) on a
    /// `canvas_w`×`canvas_h` canvas.
    fn remap(self, x: i32, y: i32, w: i32, h: i32, canvas_w: i32, canvas_h: i32) -> (i32, i32) {
        match self {
            TransformKind::RotateLeft => (y, canvas_w - (x + w)),
            TransformKind::RotateRight => (canvas_h - (y + h), x),
            TransformKind::FlipHorizontal => (canvas_w - (x + w), y),
            TransformKind::FlipVertical => (x, canvas_h - (y + h)),
        }
    }
}

/// Apply `kind` to every layer. `NoOp` on an empty document.
pub fn apply_transform(state: &mut CanvasState, kind: TransformKind) -> OpOutcome {
    let Some((cw, ch)) = state.size() else { return OpOutcome::NoOp };
    let (ox, oy) = state.origin();
    let (cw, ch) = (cw as i32, ch as i32);

    state.layers.par_iter_mut().for_each(|layer| {
        let (w, h) = (layer.width() as i32, layer.height() as i32);
        let (nx, ny) = kind.remap(layer.x - ox, layer.y - oy, w, h, cw, ch);
        layer.pixels = kind.transform_pixels(&layer.pixels);
        layer.set_position(ox + nx, oy + ny);
    });
    OpOutcome::Applied
}

/// Crop the document to `crop` (canvas coordinates).
///
/// The base layer becomes exactly the clipped box. Every other layer moves by
/// `-(x1, y1)`, keeps its buffer origin, loses whatever lies right of or below
/// the box, and has pixels left of or above the box cleared.
pub fn apply_crop(state: &mut CanvasState, crop: CropBox) -> OpOutcome {
    let Some((cw, ch)) = state.size() else { return OpOutcome::NoOp };
    let b = CropBox::new(
        crop.x1.max(0),
        crop.y1.max(0),
        crop.x2.min(cw as i32),
        crop.y2.min(ch as i32),
    );
    if b.is_empty() {
        return OpOutcome::NoOp;
    }
    let (ox, oy) = state.origin();

    for (i, layer) in state.layers.iter_mut().enumerate() {
        if i == 0 {
            layer.pixels =
                imageops::crop_imm(&layer.pixels, b.x1 as u32, b.y1 as u32, b.width(), b.height()).to_image();
            continue;
        }
        let rx = layer.x - ox;
        let ry = layer.y - oy;
        crop_to_box(layer, b.x1 - rx, b.y1 - ry, b.x2 - rx, b.y2 - ry);
        layer.set_position(layer.x - b.x1, layer.y - b.y1);
    }
    OpOutcome::Applied
}

/// Keep the layer-local region `[x1, x2) × [y1, y2)` of a layer without moving
/// its origin.
fn crop_to_box(layer: &mut Layer, x1: i32, y1: i32, x2: i32, y2: i32) {
    let (w, h) = (layer.width() as i32, layer.height() as i32);
    let keep_w = x2.min(w);
    let keep_h = y2.min(h);
    let clear_x = x1.max(0);
    let clear_y = y1.max(0);
    if keep_w <= clear_x || keep_h <= clear_y {
        layer.pixels = RgbaImage::new(0, 0);
        return;
    }
    let mut out = imageops::crop_imm(&layer.pixels, 0, 0, keep_w as u32, keep_h as u32).to_image();
    let clear = Rgba([0, 0, 0, 0]);
    for (x, y, px) in out.enumerate_pixels_mut() {
        if (x as i32) < clear_x || (y as i32) < clear_y {
            *px = clear;
        }
    }
    layer.pixels = out;
}
