// ============================================================================
// CANVAS-LEVEL OPERATIONS: add / remove / reorder / place layers
// ============================================================================
//
// None of these touch history; the Project commits after an `Applied`.
// The base layer (index 0) can never be removed, moved in the stack, or
// repositioned.
// ============================================================================

use image::RgbaImage;

use crate::canvas::{CanvasState, Layer};
use crate::error::OpOutcome;

pub const BASE_LAYER_NAME: &str = "Base Layer";
pub const PAINT_LAYER_NAME: &str = "Paint Layer";

/// Label for a text layer: the first ten characters of its text.
pub fn text_layer_name(text: &str) -> String {
    let head: String = text.chars().take(10).collect();
    format!("Text: \"{}...\"", head)
}

/// Append `pixels` as a new top layer placed at the canvas origin.
/// `None` when there is no base layer to place it against.
pub fn push_layer(state: &mut CanvasState, name: impl Into<String>, pixels: RgbaImage) -> Option<usize> {
    let base = state.base()?;
    let (x, y) = base.position();
    let mut layer = Layer::new(name, pixels);
    layer.set_position(x, y);
    state.layers.push(layer);
    Some(state.layers.len() - 1)
}

/// Append a fully transparent paint layer sized to the base layer.
pub fn add_paint_layer(state: &mut CanvasState) -> Option<usize> {
    let (w, h) = state.size()?;
    let idx = push_layer(state, PAINT_LAYER_NAME, RgbaImage::new(w, h))?;
    state.layers[idx].is_paint_layer = true;
    Some(idx)
}

pub fn remove_layer(state: &mut CanvasState, layer_idx: usize) -> OpOutcome {
    if layer_idx == 0 || layer_idx >= state.layers.len() {
        return OpOutcome::NoOp;
    }
    state.layers.remove(layer_idx);
    OpOutcome::Applied
}

/// Swap with the layer above. The top layer cannot go higher.
pub fn move_layer_up(state: &mut CanvasState, layer_idx: usize) -> OpOutcome {
    if layer_idx == 0 || layer_idx + 1 >= state.layers.len() {
        return OpOutcome::NoOp;
    }
    state.layers.swap(layer_idx, layer_idx + 1);
    OpOutcome::Applied
}

/// Swap with the layer below. Nothing may go beneath the base layer.
pub fn move_layer_down(state: &mut CanvasState, layer_idx: usize) -> OpOutcome {
    if layer_idx <= 1 || layer_idx >= state.layers.len() {
        return OpOutcome::NoOp;
    }
    state.layers.swap(layer_idx, layer_idx - 1);
    OpOutcome::Applied
}

/// Set opacity, clamped to [0, 1]. Unchanged values are a `NoOp`.
pub fn set_layer_opacity(state: &mut CanvasState, layer_idx: usize, opacity: f32) -> OpOutcome {
    let Some(layer) = state.layers.get_mut(layer_idx) else { return OpOutcome::NoOp };
    let opacity = if opacity.is_nan() { 1.0 } else { opacity.clamp(0.0, 1.0) };
    if layer.opacity == opacity {
        return OpOutcome::NoOp;
    }
    layer.opacity = opacity;
    OpOutcome::Applied
}

pub fn set_layer_visible(state: &mut CanvasState, layer_idx: usize, visible: bool) -> OpOutcome {
    let Some(layer) = state.layers.get_mut(layer_idx) else { return OpOutcome::NoOp };
    if layer.visible == visible {
        return OpOutcome::NoOp;
    }
    layer.visible = visible;
    OpOutcome::Applied
}

/// Place a non-base layer at canvas position (`x`, `y`).
pub fn set_layer_position(state: &mut CanvasState, layer_idx: usize, x: i32, y: i32) -> OpOutcome {
    if layer_idx == 0 {
        return OpOutcome::NoOp;
    }
    let (ox, oy) = state.origin();
    let Some(layer) = state.layers.get_mut(layer_idx) else { return OpOutcome::NoOp };
    let target = (ox + x, oy + y);
    if layer.position() == target {
        return OpOutcome::NoOp;
    }
    layer.set_position(target.0, target.1);
    OpOutcome::Applied
}
