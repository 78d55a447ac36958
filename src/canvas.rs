// ============================================================================
// LAYER STORE & COMPOSITOR
// ============================================================================
//
// Layers are stored back-to-front. Layer 0 is the base layer: its pixel buffer
// defines the document size, and its position is the canvas origin. Every
// other layer is drawn at `position - base.position`.
// ============================================================================

use image::{Rgba, RgbaImage};
use rayon::prelude::*;

/// One positioned, independently-pixeled element of a document.
#[derive(Clone, Debug, PartialEq)]
pub struct Layer {
    pub name: String,
    pub pixels: RgbaImage,
    /// 0.0..=1.0, applied to the alpha channel at composite time.
    pub opacity: f32,
    pub visible: bool,
    /// Top-left corner in document space.
    pub x: i32,
    pub y: i32,
    /// Created for freehand drawing. Informational only.
    pub is_paint_layer: bool,
}

impl Layer {
    pub fn new(name: impl Into<String>, pixels: RgbaImage) -> Self {
        Self {
            name: name.into(),
            pixels,
            opacity: 1.0,
            visible: true,
            x: 0,
            y: 0,
            is_paint_layer: false,
        }
    }

    /// A fully transparent layer of the given size.
    pub fn transparent(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self::new(name, RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0])))
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn position(&self) -> (i32, i32) {
        (self.x, self.y)
    }

    pub fn set_position(&mut self, x: i32, y: i32) {
        self.x = x;
        self.y = y;
    }

    pub fn memory_bytes(&self) -> usize {
        self.pixels.as_raw().len() + self.name.len()
    }
}

/// The ordered layer stack of one document.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CanvasState {
    pub layers: Vec<Layer>,
}

impl CanvasState {
    pub fn new() -> Self {
        Self::default()
    }

    /// A document holding a single base layer at the origin.
    pub fn with_base(name: impl Into<String>, pixels: RgbaImage) -> Self {
        Self { layers: vec![Layer::new(name, pixels)] }
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn base(&self) -> Option<&Layer> {
        self.layers.first()
    }

    /// Base layer dimensions, i.e. the composite size.
    pub fn size(&self) -> Option<(u32, u32)> {
        self.base().map(|b| (b.width(), b.height()))
    }

    /// The document-space point that maps to canvas (0, 0).
    pub fn origin(&self) -> (i32, i32) {
        self.base().map_or((0, 0), Layer::position)
    }

    /// Layer position relative to the canvas origin.
    pub fn canvas_offset(&self, index: usize) -> Option<(i32, i32)> {
        let (ox, oy) = self.origin();
        self.layers.get(index).map(|l| (l.x - ox, l.y - oy))
    }

    pub fn get(&self, index: usize) -> Option<&Layer> {
        self.layers.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Layer> {
        self.layers.get_mut(index)
    }

    pub fn memory_bytes(&self) -> usize {
        self.layers.iter().map(Layer::memory_bytes).sum()
    }

    /// Flatten all visible layers into one image sized to the base layer.
    ///
    /// Returns `None` when the stack is empty. Read-only: safe to call at any
    /// time, including mid-drag for live previews.
    pub fn composite(&self) -> Option<RgbaImage> {
        let (width, height) = self.size()?;
        let (ox, oy) = self.origin();
        let mut result = RgbaImage::new(width, height);
        if width == 0 || height == 0 {
            return Some(result);
        }

        let stride = width as usize * 4;
        let dst = &mut *result;

        for layer in &self.layers {
            if !layer.visible || layer.width() == 0 || layer.height() == 0 {
                continue;
            }
            let opacity = layer.opacity.clamp(0.0, 1.0);
            if opacity <= 0.0 {
                continue;
            }
            let lx = i64::from(layer.x) - i64::from(ox);
            let ly = i64::from(layer.y) - i64::from(oy);
            let lw = i64::from(layer.width());
            let lh = i64::from(layer.height());

            // Intersection of the layer with the canvas, in canvas coordinates.
            let x0 = lx.max(0);
            let y0 = ly.max(0);
            let x1 = (lx + lw).min(i64::from(width));
            let y1 = (ly + lh).min(i64::from(height));
            if x0 >= x1 || y0 >= y1 {
                continue;
            }

            let src = layer.pixels.as_raw();
            let src_stride = layer.width() as usize * 4;

            dst.par_chunks_mut(stride)
                .enumerate()
                .skip(y0 as usize)
                .take((y1 - y0) as usize)
                .for_each(|(cy, row_out)| {
                    let sy = (cy as i64 - ly) as usize;
                    let row_in = &src[sy * src_stride..(sy + 1) * src_stride];
                    for cx in x0..x1 {
                        let sx = (cx - lx) as usize;
                        let si = sx * 4;
                        let mut top = Rgba([row_in[si], row_in[si + 1], row_in[si + 2], row_in[si + 3]]);
                        if opacity < 1.0 {
                            top[3] = (f32::from(top[3]) * opacity).round() as u8;
                        }
                        let di = cx as usize * 4;
                        let base = Rgba([row_out[di], row_out[di + 1], row_out[di + 2], row_out[di + 3]]);
                        let out = blend_over(base, top);
                        row_out[di..di + 4].copy_from_slice(&out.0);
                    }
                });
        }

        Some(result)
    }
}

/// Straight-alpha Porter-Duff "over".
pub fn blend_over(base: Rgba<u8>, top: Rgba<u8>) -> Rgba<u8> {
    if top[3] == 0 {
        return base;
    }
    if top[3] == 255 || base[3] == 0 {
        return top;
    }

    let top_a = f32::from(top[3]) / 255.0;
    let base_a = f32::from(base[3]) / 255.0;
    let out_a = top_a + base_a * (1.0 - top_a);

    let channel = |t: u8, b: u8| -> u8 {
        let t = f32::from(t) / 255.0;
        let b = f32::from(b) / 255.0;
        let v = (t * top_a + b * base_a * (1.0 - top_a)) / out_a;
        (v * 255.0).round().clamp(0.0, 255.0) as u8
    };

    Rgba([
        channel(top[0], base[0]),
        channel(top[1], base[1]),
        channel(top[2], base[2]),
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(w: u32, h: u32, c: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba(c))
    }

    #[test]
    fn empty_stack_has_no_composite() {
        assert!(CanvasState::new().composite().is_none());
    }

    #[test]
    fn single_opaque_base_composites_to_itself() {
        let base = RgbaImage::from_fn(7, 5, |x, y| Rgba([x as u8 * 30, y as u8 * 40, 9, 255]));
        let state = CanvasState::with_base("base", base.clone());
        assert_eq!(state.composite().unwrap(), base);
    }

    #[test]
    fn translucent_base_alone_is_preserved() {
        let base = RgbaImage::from_fn(4, 4, |x, _| Rgba([200, 100, 50, 40 * x as u8]));
        let state = CanvasState::with_base("base", base.clone());
        assert_eq!(state.composite().unwrap(), base);
    }

    #[test]
    fn hidden_layers_are_skipped() {
        let mut state = CanvasState::with_base("base", solid(4, 4, [0, 0, 255, 255]));
        let mut top = Layer::new("top", solid(4, 4, [255, 0, 0, 255]));
        top.visible = false;
        state.layers.push(top);
        assert_eq!(*state.composite().unwrap().get_pixel(1, 1), Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn layer_is_placed_at_its_position_and_clipped() {
        let mut state = CanvasState::with_base("base", solid(10, 10, [0, 0, 0, 255]));
        let mut top = Layer::new("top", solid(4, 4, [255, 255, 255, 255]));
        top.set_position(8, -2);
        state.layers.push(top);
        let out = state.composite().unwrap();
        assert_eq!(*out.get_pixel(8, 0), Rgba([255, 255, 255, 255]));
        assert_eq!(*out.get_pixel(9, 1), Rgba([255, 255, 255, 255]));
        assert_eq!(*out.get_pixel(8, 2), Rgba([0, 0, 0, 255]));
        assert_eq!(*out.get_pixel(7, 0), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn opacity_scales_alpha_before_blending() {
        let mut state = CanvasState::with_base("base", solid(2, 2, [0, 0, 0, 255]));
        let mut top = Layer::new("top", solid(2, 2, [255, 255, 255, 255]));
        top.opacity = 0.5;
        state.layers.push(top);
        let px = *state.composite().unwrap().get_pixel(0, 0);
        assert_eq!(px[3], 255);
        assert!((127..=129).contains(&px[0]), "got {:?}", px);
    }

    #[test]
    fn transparent_source_leaves_destination_untouched() {
        let mut state = CanvasState::with_base("base", solid(3, 3, [10, 20, 30, 255]));
        state.layers.push(Layer::transparent("paint", 3, 3));
        assert_eq!(state.composite().unwrap(), solid(3, 3, [10, 20, 30, 255]));
    }

    #[test]
    fn canvas_origin_follows_base_position() {
        let mut state = CanvasState::with_base("base", solid(4, 4, [0, 0, 0, 255]));
        state.layers[0].set_position(-2, -3);
        let mut top = Layer::new("dot", solid(1, 1, [255, 0, 0, 255]));
        top.set_position(-1, -2);
        state.layers.push(top);
        assert_eq!(state.canvas_offset(1), Some((1, 1)));
        assert_eq!(*state.composite().unwrap().get_pixel(1, 1), Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn blend_over_mixes_partial_alpha() {
        let out = blend_over(Rgba([0, 0, 0, 0]), Rgba([100, 150, 200, 128]));
        assert_eq!(out, Rgba([100, 150, 200, 128]));
        let out = blend_over(Rgba([0, 0, 255, 255]), Rgba([255, 0, 0, 0]));
        assert_eq!(out, Rgba([0, 0, 255, 255]));
    }
}
