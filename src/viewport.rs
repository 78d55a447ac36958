// ============================================================================
// COORDINATE MAPPER: zoom-to-fit display space <-> image pixel space
// ============================================================================

/// Fit-inside, aspect-preserving, centred placement of an image in a display
/// area.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FitTransform {
    pub scale: f32,
    pub offset_x: f32,
    pub offset_y: f32,
    pub image_width: u32,
    pub image_height: u32,
}

/// An image-space rectangle, `x1 < x2` and `y1 < y2` once normalized.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CropBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl CropBox {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn is_empty(&self) -> bool {
        self.x1 >= self.x2 || self.y1 >= self.y2
    }

    pub fn width(&self) -> u32 {
        (self.x2 - self.x1).max(0) as u32
    }

    pub fn height(&self) -> u32 {
        (self.y2 - self.y1).max(0) as u32
    }
}

impl FitTransform {
    /// `None` when any dimension is zero (nothing loaded, or a collapsed view).
    pub fn new(canvas_w: u32, canvas_h: u32, image_w: u32, image_h: u32) -> Option<Self> {
        if canvas_w == 0 || canvas_h == 0 || image_w == 0 || image_h == 0 {
            return None;
        }
        let (cw, ch) = (canvas_w as f32, canvas_h as f32);
        let (iw, ih) = (image_w as f32, image_h as f32);
        let scale = (cw / iw).min(ch / ih);
        Some(Self {
            scale,
            offset_x: (cw - iw * scale) / 2.0,
            offset_y: (ch - ih * scale) / 2.0,
            image_width: image_w,
            image_height: image_h,
        })
    }

    /// Size of the image as drawn on the display.
    pub fn display_size(&self) -> (f32, f32) {
        (
            self.image_width as f32 * self.scale,
            self.image_height as f32 * self.scale,
        )
    }

    /// Map a display point to image pixels. `None` inside the letterbox.
    pub fn to_image_coords(&self, cx: f32, cy: f32) -> Option<(i32, i32)> {
        let (dw, dh) = self.display_size();
        let lx = cx - self.offset_x;
        let ly = cy - self.offset_y;
        if lx < 0.0 || ly < 0.0 || lx >= dw || ly >= dh {
            return None;
        }
        let x = ((lx / self.scale) as i32).min(self.image_width as i32 - 1);
        let y = ((ly / self.scale) as i32).min(self.image_height as i32 - 1);
        Some((x, y))
    }

    pub fn to_display_coords(&self, x: f32, y: f32) -> (f32, f32) {
        (x * self.scale + self.offset_x, y * self.scale + self.offset_y)
    }

    /// Turn a drag rectangle drawn on the display into an image-space box.
    ///
    /// Corners may come in any order. They are clamped onto the displayed
    /// image first, so a drag that starts in the letterbox still selects up to
    /// the image edge. Returns `None` if the result has no area.
    pub fn crop_box_from_display(&self, x1: f32, y1: f32, x2: f32, y2: f32) -> Option<CropBox> {
        let (dw, dh) = self.display_size();
        let to_image = |v: f32, offset: f32, extent: f32| -> i32 {
            ((v - offset).clamp(0.0, extent) / self.scale) as i32
        };
        let ax = to_image(x1.min(x2), self.offset_x, dw);
        let bx = to_image(x1.max(x2), self.offset_x, dw);
        let ay = to_image(y1.min(y2), self.offset_y, dh);
        let by = to_image(y1.max(y2), self.offset_y, dh);
        let b = CropBox::new(
            ax,
            ay,
            bx.min(self.image_width as i32),
            by.min(self.image_height as i32),
        );
        (!b.is_empty()).then_some(b)
    }
}

/// One-shot form of [`FitTransform::to_image_coords`].
pub fn to_image_coords(
    canvas_w: u32,
    canvas_h: u32,
    image_w: u32,
    image_h: u32,
    cx: f32,
    cy: f32,
) -> Option<(i32, i32)> {
    FitTransform::new(canvas_w, canvas_h, image_w, image_h)?.to_image_coords(cx, cy)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_sized_image_maps_nothing() {
        assert!(FitTransform::new(800, 600, 0, 0).is_none());
        assert_eq!(to_image_coords(800, 600, 0, 100, 10.0, 10.0), None);
    }

    #[test]
    fn wide_image_is_letterboxed_vertically() {
        let t = FitTransform::new(400, 400, 200, 100).unwrap();
        assert_eq!(t.scale, 2.0);
        assert_eq!(t.offset_x, 0.0);
        assert_eq!(t.offset_y, 100.0);
        assert_eq!(t.to_image_coords(10.0, 50.0), None);
        assert_eq!(t.to_image_coords(10.0, 350.0), None);
        assert_eq!(t.to_image_coords(11.0, 101.0), Some((5, 0)));
        assert_eq!(t.to_image_coords(399.0, 299.0), Some((199, 99)));
    }

    #[test]
    fn display_round_trip_lands_on_pixel() {
        let t = FitTransform::new(300, 500, 120, 80).unwrap();
        let (dx, dy) = t.to_display_coords(37.0, 12.0);
        assert_eq!(t.to_image_coords(dx + 0.1, dy + 0.1), Some((37, 12)));
    }

    #[test]
    fn crop_box_normalizes_corners() {
        let t = FitTransform::new(200, 200, 100, 100).unwrap();
        let b = t.crop_box_from_display(150.0, 120.0, 20.0, 40.0).unwrap();
        assert_eq!(b, CropBox::new(10, 20, 75, 60));
    }

    #[test]
    fn crop_box_clamps_into_image() {
        let t = FitTransform::new(400, 400, 200, 100).unwrap();
        let b = t.crop_box_from_display(-50.0, 0.0, 500.0, 400.0).unwrap();
        assert_eq!(b, CropBox::new(0, 0, 200, 100));
        assert!(t.crop_box_from_display(10.0, 10.0, 10.0, 90.0).is_none());
    }
}
