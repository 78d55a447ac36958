// ============================================================================
// BRUSH: round dabs and strokes with the current size and colour
// ============================================================================

use image::{Rgba, RgbaImage};

use crate::canvas::CanvasState;
use crate::error::OpOutcome;
use crate::settings::EditorSettings;

/// Paint tool configuration read at stroke time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BrushState {
    /// Diameter in pixels, always >= 1.
    size: u32,
    pub color: Rgba<u8>,
}

impl Default for BrushState {
    fn default() -> Self {
        Self { size: 10, color: Rgba([255, 0, 0, 255]) }
    }
}

impl BrushState {
    pub fn new(size: u32, color: Rgba<u8>) -> Self {
        Self { size: size.max(1), color }
    }

    pub fn from_settings(settings: &EditorSettings) -> Self {
        Self::new(settings.brush_size, settings.brush_color)
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn set_size(&mut self, size: u32) {
        self.size = size.max(1);
    }

    fn radius(&self) -> f32 {
        self.size as f32 / 2.0
    }
}

/// Replace every pixel within `radius` of (`cx`, `cy`) with `color`.
pub fn paint_dab(img: &mut RgbaImage, cx: i32, cy: i32, radius: f32, color: Rgba<u8>) {
    paint_capsule(img, (cx, cy), (cx, cy), radius, color);
}

/// Replace every pixel within `radius` of the segment `from`..`to`.
pub fn paint_line(img: &mut RgbaImage, from: (i32, i32), to: (i32, i32), radius: f32, color: Rgba<u8>) {
    paint_capsule(img, from, to, radius, color);
}

fn paint_capsule(img: &mut RgbaImage, from: (i32, i32), to: (i32, i32), radius: f32, color: Rgba<u8>) {
    let (w, h) = (img.width() as i64, img.height() as i64);
    if w == 0 || h == 0 {
        return;
    }
    let reach = radius.ceil() as i64;
    let min_x = (i64::from(from.0.min(to.0)) - reach).max(0);
    let max_x = (i64::from(from.0.max(to.0)) + reach).min(w - 1);
    let min_y = (i64::from(from.1.min(to.1)) - reach).max(0);
    let max_y = (i64::from(from.1.max(to.1)) + reach).min(h - 1);
    if min_x > max_x || min_y > max_y {
        return;
    }

    let (ax, ay) = (from.0 as f32, from.1 as f32);
    let (dx, dy) = (to.0 as f32 - ax, to.1 as f32 - ay);
    let len_sq = dx * dx + dy * dy;
    let r_sq = radius * radius;

    for y in min_y..=max_y {
        for x in min_x..=max_x {
            let (px, py) = (x as f32, y as f32);
            let t = if len_sq > 0.0 {
                (((px - ax) * dx + (py - ay) * dy) / len_sq).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let qx = px - (ax + t * dx);
            let qy = py - (ay + t * dy);
            if qx * qx + qy * qy <= r_sq {
                img.put_pixel(x as u32, y as u32, color);
            }
        }
    }
}

/// Paint onto layer `layer_idx`. Points are canvas coordinates. With no
/// `from` point a single dab is painted at `to`; otherwise a segment.
pub fn draw_stroke(
    state: &mut CanvasState,
    layer_idx: usize,
    from: Option<(i32, i32)>,
    to: (i32, i32),
    brush: &BrushState,
) -> OpOutcome {
    let Some((dx, dy)) = state.canvas_offset(layer_idx) else { return OpOutcome::NoOp };
    let Some(layer) = state.layers.get_mut(layer_idx) else { return OpOutcome::NoOp };
    let local = |(x, y): (i32, i32)| (x - dx, y - dy);
    let to = local(to);
    match from {
        None => paint_dab(&mut layer.pixels, to.0, to.1, brush.radius(), brush.color),
        Some(from) => paint_line(&mut layer.pixels, local(from), to, brush.radius(), brush.color),
    }
    OpOutcome::Applied
}
