use ab_glyph::{Font, FontArc, GlyphId, OutlinedGlyph, ScaleFont, point};
use image::{Rgba, RgbaImage};

use crate::ops::builtin_font;

/// A resolved face for text layers.
#[derive(Clone)]
pub enum TextFont {
    System(FontArc),
    /// The built-in bitmap face.
    Builtin,
}

impl std::fmt::Debug for TextFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TextFont::System(_) => f.write_str("TextFont::System"),
            TextFont::Builtin => f.write_str("TextFont::Builtin"),
        }
    }
}

impl TextFont {
    /// Look `family` up on the system, falling back to the built-in face.
    pub fn resolve(family: &str) -> Self {
        match load_system_font(family, 400, false) {
            Some(font) => TextFont::System(font),
            None => {
                crate::log_warn!("font '{}' not found, using built-in face", family);
                TextFont::Builtin
            }
        }
    }
}

/// Load a font by family name, weight, and style from the system.
/// `weight` is a CSS-style weight value (100=Thin, 400=Regular, 700=Bold, etc.)
/// Returns None if the font cannot be found.
pub fn load_system_font(family: &str, weight: u16, italic: bool) -> Option<FontArc> {
    use font_kit::family_name::FamilyName;
    use font_kit::properties::{Properties, Style, Weight};
    use font_kit::source::SystemSource;

    if family.trim().is_empty() {
        return None;
    }
    let mut props = Properties::new();
    props.weight = Weight(f32::from(weight));
    if italic {
        props.style = Style::Italic;
    }

    let handle = SystemSource::new()
        .select_best_match(&[FamilyName::Title(family.to_string())], &props)
        .ok()?;
    let font_data = handle.load().ok()?;
    let bytes = font_data.copy_font_data()?;
    FontArc::try_from_vec((*bytes).clone()).ok()
}

/// Rasterize `text` into a buffer cropped tightly to its visible pixels.
///
/// Never fails: if the system face yields nothing the built-in face is used,
/// and text with no visible pixels at all gives a 1×1 transparent buffer.
pub fn render_text(font: &TextFont, text: &str, font_size: f32, color: Rgba<u8>) -> RgbaImage {
    let size = if font_size.is_finite() { font_size.clamp(1.0, builtin_font::MAX_FONT_SIZE) } else { 12.0 };
    let raw = match font {
        TextFont::System(f) => {
            let img = rasterize_with_font(f, text, size, color);
            if has_visible_pixels(&img) { img } else { builtin_font::render(text, size, color) }
        }
        TextFont::Builtin => builtin_font::render(text, size, color),
    };
    trim_transparent(&raw).unwrap_or_else(|| RgbaImage::new(1, 1))
}

fn rasterize_with_font(font: &FontArc, text: &str, font_size: f32, color: Rgba<u8>) -> RgbaImage {
    let scaled = font.as_scaled(font_size);
    let ascent = scaled.ascent();
    let line_height = scaled.height() + scaled.line_gap();

    let mut outlined: Vec<OutlinedGlyph> = Vec::new();
    for (line_idx, line) in text.split('\n').enumerate() {
        let baseline = ascent + line_idx as f32 * line_height;
        let mut cursor_x = 0.0f32;
        let mut last_glyph: Option<GlyphId> = None;
        for ch in line.chars() {
            let glyph_id = font.glyph_id(ch);
            if let Some(prev) = last_glyph {
                cursor_x += scaled.kern(prev, glyph_id);
            }
            let glyph = glyph_id.with_scale_and_position(font_size, point(cursor_x, baseline));
            cursor_x += scaled.h_advance(glyph_id);
            last_glyph = Some(glyph_id);
            if let Some(o) = font.outline_glyph(glyph) {
                outlined.push(o);
            }
        }
    }
    if outlined.is_empty() {
        return RgbaImage::new(0, 0);
    }

    let mut min_x = f32::MAX;
    let mut min_y = f32::MAX;
    let mut max_x = f32::MIN;
    let mut max_y = f32::MIN;
    for o in &outlined {
        let b = o.px_bounds();
        min_x = min_x.min(b.min.x);
        min_y = min_y.min(b.min.y);
        max_x = max_x.max(b.max.x);
        max_y = max_y.max(b.max.y);
    }
    let x0 = min_x.floor();
    let y0 = min_y.floor();
    let buf_w = (max_x.ceil() - x0).max(0.0) as u32;
    let buf_h = (max_y.ceil() - y0).max(0.0) as u32;
    if buf_w == 0 || buf_h == 0 || !within_raster_limit(buf_w, buf_h) {
        return RgbaImage::new(0, 0);
    }

    // Single-channel coverage, max-combined where glyphs overlap.
    let mut coverage = vec![0.0f32; buf_w as usize * buf_h as usize];
    for o in &outlined {
        let b = o.px_bounds();
        let ox = (b.min.x - x0) as i64;
        let oy = (b.min.y - y0) as i64;
        o.draw(|px, py, cov| {
            let ix = ox + i64::from(px);
            let iy = oy + i64::from(py);
            if ix >= 0 && iy >= 0 && ix < i64::from(buf_w) && iy < i64::from(buf_h) {
                let idx = iy as usize * buf_w as usize + ix as usize;
                coverage[idx] = coverage[idx].max(cov.clamp(0.0, 1.0));
            }
        });
    }

    let mut img = RgbaImage::new(buf_w, buf_h);
    for (i, px) in img.pixels_mut().enumerate() {
        let a = (coverage[i] * f32::from(color[3])).round() as u8;
        if a > 0 {
            *px = Rgba([color[0], color[1], color[2], a]);
        }
    }
    img
}

fn within_raster_limit(w: u32, h: u32) -> bool {
    w <= builtin_font::MAX_TEXT_EXTENT
        && h <= builtin_font::MAX_TEXT_EXTENT
        && u64::from(w) * u64::from(h) <= builtin_font::MAX_TEXT_PIXELS
}

fn has_visible_pixels(img: &RgbaImage) -> bool {
    img.pixels().any(|p| p[3] > 0)
}

/// Crop to the bounding box of non-transparent pixels. `None` if there are none.
pub fn trim_transparent(img: &RgbaImage) -> Option<RgbaImage> {
    let mut min_x = u32::MAX;
    let mut min_y = u32::MAX;
    let mut max_x = 0;
    let mut max_y = 0;
    for (x, y, p) in img.enumerate_pixels() {
        if p[3] > 0 {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
    }
    if min_x > max_x || min_y > max_y {
        return None;
    }
    Some(image::imageops::crop_imm(img, min_x, min_y, max_x - min_x + 1, max_y - min_y + 1).to_image())
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

    #[test]
    fn unknown_family_falls_back() {
        let font = TextFont::resolve("No Such Family 7f3e9c");
        assert!(matches!(font, TextFont::Builtin));
    }

    #[test]
    fn builtin_text_is_tightly_cropped() {
        let img = render_text(&TextFont::Builtin, "Hi", 8.0, BLACK);
        // 'H' is 5 cells wide, one blank column, then 'I' spans columns 1..=3.
        assert_eq!(img.dimensions(), (10, 7));
        assert_eq!(*img.get_pixel(0, 0), BLACK);
        assert_eq!(img.get_pixel(9, 6)[3], 255);
    }

    #[test]
    fn builtin_text_scales_with_size() {
        let small = render_text(&TextFont::Builtin, "Hi", 8.0, BLACK);
        let large = render_text(&TextFont::Builtin, "Hi", 48.0, BLACK);
        assert_eq!(large.width(), small.width() * 6);
        assert_eq!(large.height(), small.height() * 6);
    }

    #[test]
    fn huge_font_size_is_clamped() {
        let clamped = render_text(&TextFont::Builtin, "Hi", builtin_font::MAX_FONT_SIZE, BLACK);
        let huge = render_text(&TextFont::Builtin, "Hi", 1.0e12, BLACK);
        assert_eq!(huge.dimensions(), clamped.dimensions());
        assert!(!within_raster_limit(builtin_font::MAX_TEXT_EXTENT + 1, 1));
    }

    #[test]
    fn blank_text_still_produces_a_buffer() {
        let img = render_text(&TextFont::Builtin, "   ", 24.0, BLACK);
        assert_eq!(img.dimensions(), (1, 1));
        assert_eq!(img.get_pixel(0, 0)[3], 0);
    }

    #[test]
    fn resolved_font_always_renders() {
        let font = TextFont::resolve("Arial");
        let img = render_text(&font, "Hi", 48.0, BLACK);
        assert!(img.width() > 0 && img.height() > 0);
        assert!(has_visible_pixels(&img));
    }

    #[test]
    fn trim_finds_bounds() {
        let mut img = RgbaImage::new(10, 10);
        img.put_pixel(3, 4, BLACK);
        img.put_pixel(6, 5, BLACK);
        let t = trim_transparent(&img).unwrap();
        assert_eq!(t.dimensions(), (4, 2));
        assert!(trim_transparent(&RgbaImage::new(3, 3)).is_none());
    }
}
