//! Built-in 5×7 bitmap face used when no system font can be loaded.
//!
//! Each glyph is seven rows of five bits, most significant bit on the left.
//! Lowercase letters render as their uppercase form; anything without a
//! glyph renders as a hollow box.

use image::{Rgba, RgbaImage};

pub const GLYPH_W: u32 = 5;
pub const GLYPH_H: u32 = 7;
/// Horizontal advance per character, in glyph cells.
const ADVANCE: u32 = GLYPH_W + 1;
/// Vertical advance per line, in glyph cells.
const LINE_ADVANCE: u32 = GLYPH_H + 2;

/// Largest accepted font size; bigger requests are clamped.
pub const MAX_FONT_SIZE: f32 = 1000.0;
/// Largest text raster edge, in pixels.
pub const MAX_TEXT_EXTENT: u32 = 16_384;
/// Largest text raster area, in pixels.
pub const MAX_TEXT_PIXELS: u64 = 1 << 26;

const MISSING: [u8; 7] = [0x1F, 0x11, 0x11, 0x11, 0x11, 0x11, 0x1F];

#[rustfmt::skip]
pub fn glyph_rows(ch: char) -> [u8; 7] {
    match ch.to_ascii_uppercase() {
        'A' => [0x0E, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'B' => [0x1E, 0x11, 0x11, 0x1E, 0x11, 0x11, 0x1E],
        'C' => [0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E],
        'D' => [0x1E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x1E],
        'E' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F],
        'F' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x10],
        'G' => [0x0E, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0F],
        'H' => [0x11, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'I' => [0x0E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E],
        'J' => [0x07, 0x02, 0x02, 0x02, 0x02, 0x12, 0x0C],
        'K' => [0x11, 0x12, 0x14, 0x18, 0x14, 0x12, 0x11],
        'L' => [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1F],
        'M' => [0x11, 0x1B, 0x15, 0x15, 0x11, 0x11, 0x11],
        'N' => [0x11, 0x11, 0x19, 0x15, 0x13, 0x11, 0x11],
        'O' => [0x0E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'P' => [0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10],
        'Q' => [0x0E, 0x11, 0x11, 0x11, 0x15, 0x12, 0x0D],
        'R' => [0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11],
        'S' => [0x0F, 0x10, 0x10, 0x0E, 0x01, 0x01, 0x1E],
        'T' => [0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
        'U' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'V' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x0A, 0x04],
        'W' => [0x11, 0x11, 0x11, 0x15, 0x15, 0x15, 0x0A],
        'X' => [0x11, 0x11, 0x0A, 0x04, 0x0A, 0x11, 0x11],
        'Y' => [0x11, 0x11, 0x11, 0x0A, 0x04, 0x04, 0x04],
        'Z' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x10, 0x1F],
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        ' ' => [0x00; 7],
        '!' => [0x04, 0x04, 0x04, 0x04, 0x04, 0x00, 0x04],
        '?' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x00, 0x04],
        '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C],
        ',' => [0x00, 0x00, 0x00, 0x00, 0x0C, 0x04, 0x08],
        ':' => [0x00, 0x0C, 0x0C, 0x00, 0x0C, 0x0C, 0x00],
        ';' => [0x00, 0x0C, 0x0C, 0x00, 0x0C, 0x04, 0x08],
        '-' => [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00],
        '+' => [0x00, 0x04, 0x04, 0x1F, 0x04, 0x04, 0x00],
        '\'' => [0x0C, 0x04, 0x08, 0x00, 0x00, 0x00, 0x00],
        '"' => [0x0A, 0x0A, 0x00, 0x00, 0x00, 0x00, 0x00],
        '(' => [0x02, 0x04, 0x08, 0x08, 0x08, 0x04, 0x02],
        ')' => [0x08, 0x04, 0x02, 0x02, 0x02, 0x04, 0x08],
        '/' => [0x00, 0x01, 0x02, 0x04, 0x08, 0x10, 0x00],
        '=' => [0x00, 0x00, 0x1F, 0x00, 0x1F, 0x00, 0x00],
        '_' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x1F],
        '#' => [0x0A, 0x0A, 0x1F, 0x0A, 0x1F, 0x0A, 0x0A],
        '%' => [0x18, 0x19, 0x02, 0x04, 0x08, 0x13, 0x03],
        '&' => [0x0C, 0x12, 0x14, 0x08, 0x15, 0x12, 0x0D],
        '*' => [0x00, 0x04, 0x15, 0x0E, 0x15, 0x04, 0x00],
        _ => MISSING,
    }
}

/// Pixels per glyph cell for a requested font size (roughly one cell per
/// eighth of the size, never below one).
pub fn cell_size(font_size: f32) -> u32 {
    (font_size.min(MAX_FONT_SIZE) / 8.0).round().max(1.0) as u32
}

/// Cell size for a `cols`×`rows` character grid: the size-derived cell,
/// shrunk so the raster stays within [`MAX_TEXT_EXTENT`] and
/// [`MAX_TEXT_PIXELS`]. `None` when even a one-pixel cell would not fit.
fn grid_cell(cols: u32, rows: u32, font_size: f32) -> Option<u32> {
    let grid_w = cols.checked_mul(ADVANCE)?;
    let grid_h = rows.checked_mul(LINE_ADVANCE)?;
    let grid_area = u64::from(grid_w) * u64::from(grid_h);
    let fit_area = (MAX_TEXT_PIXELS as f64 / grid_area.max(1) as f64).sqrt() as u32;
    let fit = (MAX_TEXT_EXTENT / grid_w.max(1))
        .min(MAX_TEXT_EXTENT / grid_h.max(1))
        .min(fit_area);
    if fit == 0 {
        return None;
    }
    Some(cell_size(font_size).min(fit))
}

/// Render `text` (lines split on `\n`) in solid `color`. The buffer covers the
/// full character grid; callers trim it. Text too large for the raster limit
/// gives an empty buffer.
pub fn render(text: &str, font_size: f32, color: Rgba<u8>) -> RgbaImage {
    let lines: Vec<&str> = text.split('\n').collect();
    let cols = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
    if cols == 0 {
        return RgbaImage::new(0, 0);
    }
    let (Ok(cols), Ok(rows)) = (u32::try_from(cols), u32::try_from(lines.len())) else {
        return RgbaImage::new(0, 0);
    };
    let Some(cell) = grid_cell(cols, rows, font_size) else {
        return RgbaImage::new(0, 0);
    };
    let width = cols * ADVANCE * cell;
    let height = rows * LINE_ADVANCE * cell;
    let mut img = RgbaImage::new(width, height);

    for (row, line) in lines.iter().enumerate() {
        let top = row as u32 * LINE_ADVANCE * cell;
        for (col, ch) in line.chars().enumerate() {
            let left = col as u32 * ADVANCE * cell;
            for (gy, bits) in glyph_rows(ch).iter().enumerate() {
                for gx in 0..GLYPH_W {
                    if bits & (0x10 >> gx) == 0 {
                        continue;
                    }
                    let x0 = left + gx * cell;
                    let y0 = top + gy as u32 * cell;
                    for y in y0..y0 + cell {
                        for x in x0..x0 + cell {
                            img.put_pixel(x, y, color);
                        }
                    }
                }
            }
        }
    }
    img
}
