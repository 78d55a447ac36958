use image::codecs::bmp::BmpEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::tga::TgaEncoder;
use image::codecs::tiff::TiffEncoder;
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, ImageError, RgbaImage};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::canvas::{CanvasState, Layer};
use crate::error::EditorError;

// ============================================================================
// FORMATS
// ============================================================================

/// Output formats, chosen from the destination's extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SaveFormat {
    Png,
    Jpeg,
    Bmp,
    Tga,
    Tiff,
    Webp,
    Ico,
    /// Layered project file.
    Ldp,
}

impl SaveFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(SaveFormat::Png),
            "jpg" | "jpeg" => Some(SaveFormat::Jpeg),
            "bmp" => Some(SaveFormat::Bmp),
            "tga" => Some(SaveFormat::Tga),
            "tif" | "tiff" => Some(SaveFormat::Tiff),
            "webp" => Some(SaveFormat::Webp),
            "ico" => Some(SaveFormat::Ico),
            "ldp" => Some(SaveFormat::Ldp),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    pub fn extension(&self) -> &'static str {
        match self {
            SaveFormat::Png => "png",
            SaveFormat::Jpeg => "jpg",
            SaveFormat::Bmp => "bmp",
            SaveFormat::Tga => "tga",
            SaveFormat::Tiff => "tiff",
            SaveFormat::Webp => "webp",
            SaveFormat::Ico => "ico",
            SaveFormat::Ldp => "ldp",
        }
    }

    /// JPEG drops the alpha channel on save.
    pub fn has_alpha(&self) -> bool {
        !matches!(self, SaveFormat::Jpeg)
    }
}

// ============================================================================
// DECODE / ENCODE
// ============================================================================

/// Decode any supported raster file to RGBA.
pub fn decode_image(path: &Path) -> Result<RgbaImage, EditorError> {
    let img = image::open(path).map_err(|e| EditorError::decode(path, e))?;
    Ok(img.into_rgba8())
}

/// Flatten to RGB by dropping alpha.
pub fn flatten_to_rgb(image: &RgbaImage) -> image::RgbImage {
    DynamicImage::ImageRgba8(image.clone()).to_rgb8()
}

/// Encode and write an image to a file.
/// This is a standalone function (no `&mut self`) so it can be called from
/// background threads via `rayon::spawn`.
pub fn encode_and_write(
    image: &RgbaImage,
    path: &Path,
    format: SaveFormat,
    quality: u8,
) -> Result<(), EditorError> {
    write_encoded(image, path, format, quality).map_err(|e| EditorError::encode(path, e))
}

fn write_encoded(image: &RgbaImage, path: &Path, format: SaveFormat, quality: u8) -> Result<(), ImageError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    match format {
        SaveFormat::Png => {
            let encoder = PngEncoder::new(&mut writer);
            #[allow(deprecated)]
            encoder.encode(
                image.as_raw(),
                image.width(),
                image.height(),
                image::ColorType::Rgba8,
            )?;
        }
        SaveFormat::Jpeg => {
            let rgb_image = flatten_to_rgb(image);
            let mut encoder = JpegEncoder::new_with_quality(&mut writer, quality.clamp(1, 100));
            encoder.encode(
                rgb_image.as_raw(),
                rgb_image.width(),
                rgb_image.height(),
                image::ColorType::Rgb8,
            )?;
        }
        SaveFormat::Bmp => {
            let mut encoder = BmpEncoder::new(&mut writer);
            encoder.encode(
                image.as_raw(),
                image.width(),
                image.height(),
                image::ColorType::Rgba8,
            )?;
        }
        SaveFormat::Tga => {
            let encoder = TgaEncoder::new(&mut writer);
            encoder.encode(
                image.as_raw(),
                image.width(),
                image.height(),
                image::ColorType::Rgba8,
            )?;
        }
        SaveFormat::Tiff => {
            let encoder = TiffEncoder::new(&mut writer);
            encoder.encode(
                image.as_raw(),
                image.width(),
                image.height(),
                image::ColorType::Rgba8,
            )?;
        }
        SaveFormat::Webp => {
            // Lossless, so a saved document reloads pixel-exact.
            #[allow(deprecated)]
            let encoder = WebPEncoder::new_lossless(&mut writer);
            encoder.encode(
                image.as_raw(),
                image.width(),
                image.height(),
                image::ColorType::Rgba8,
            )?;
        }
        SaveFormat::Ico => {
            // ICO entries limited to 256×256; scale down if needed
            let dyn_img = if image.width() > 256 || image.height() > 256 {
                let scale = 256.0 / image.width().max(image.height()) as f32;
                let new_w = ((image.width() as f32 * scale) as u32).max(1);
                let new_h = ((image.height() as f32 * scale) as u32).max(1);
                let resized = image::imageops::resize(
                    image,
                    new_w,
                    new_h,
                    image::imageops::FilterType::Lanczos3,
                );
                DynamicImage::ImageRgba8(resized)
            } else {
                DynamicImage::ImageRgba8(image.clone())
            };
            dyn_img.write_to(&mut writer, image::ImageOutputFormat::Ico)?;
        }
        SaveFormat::Ldp => {
            return Err(ImageError::IoError(std::io::Error::other(
                "layered projects are written with save_project",
            )));
        }
    }

    Ok(())
}

// ============================================================================
// LDP PROJECT FILE FORMAT
// ============================================================================

const LDP_MAGIC: &str = "LDP1";

/// Maximum supported layer dimension in pixels (per axis).
/// Prevents memory exhaustion from crafted project files.
const MAX_CANVAS_DIM: u32 = 32_768;
/// Maximum number of layers in a project file.
const MAX_LAYERS: usize = 256;

#[derive(Serialize, Deserialize)]
struct ProjectFile {
    magic: String,
    layers: Vec<LayerData>,
}

#[derive(Serialize, Deserialize)]
struct LayerData {
    name: String,
    visible: bool,
    opacity: f32,
    x: i32,
    y: i32,
    is_paint_layer: bool,
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

/// Write the full layer stack to a `.ldp` file.
pub fn save_project(state: &CanvasState, path: &Path) -> Result<(), EditorError> {
    if state.is_empty() {
        return Err(EditorError::EmptyDocument);
    }
    let project = ProjectFile {
        magic: LDP_MAGIC.to_string(),
        layers: state
            .layers
            .iter()
            .map(|l| LayerData {
                name: l.name.clone(),
                visible: l.visible,
                opacity: l.opacity,
                x: l.x,
                y: l.y,
                is_paint_layer: l.is_paint_layer,
                width: l.width(),
                height: l.height(),
                pixels: l.pixels.as_raw().clone(),
            })
            .collect(),
    };
    let file = File::create(path).map_err(|e| EditorError::encode(path, e))?;
    let writer = BufWriter::new(file);
    bincode::serialize_into(writer, &project).map_err(|e| EditorError::encode(path, e))
}

/// Read a `.ldp` file back into a layer stack.
pub fn load_project(path: &Path) -> Result<CanvasState, EditorError> {
    let raw = std::fs::read(path).map_err(|e| EditorError::decode(path, e))?;
    parse_project(&raw)
}

fn parse_project(raw: &[u8]) -> Result<CanvasState, EditorError> {
    // bincode encodes a String as an 8-byte length prefix + UTF-8 data, so the
    // four magic bytes sit at 8..12.
    if raw.len() < 12 {
        return Err(EditorError::InvalidProject("file too small".into()));
    }
    let magic = std::str::from_utf8(&raw[8..12]).unwrap_or("");
    if magic != LDP_MAGIC {
        return Err(EditorError::InvalidProject(format!("unknown magic '{}'", magic)));
    }

    let project: ProjectFile =
        bincode::deserialize(raw).map_err(|e| EditorError::InvalidProject(e.to_string()))?;

    if project.layers.is_empty() {
        return Err(EditorError::InvalidProject("project contains no layers".into()));
    }
    if project.layers.len() > MAX_LAYERS {
        return Err(EditorError::InvalidProject(format!(
            "project contains {} layers, which exceeds the maximum of {}",
            project.layers.len(),
            MAX_LAYERS
        )));
    }

    let mut layers = Vec::with_capacity(project.layers.len());
    for (i, data) in project.layers.into_iter().enumerate() {
        if data.width > MAX_CANVAS_DIM || data.height > MAX_CANVAS_DIM {
            return Err(EditorError::InvalidProject(format!(
                "layer '{}' is {}x{}, larger than {}x{}",
                data.name, data.width, data.height, MAX_CANVAS_DIM, MAX_CANVAS_DIM
            )));
        }
        if i == 0 && (data.width == 0 || data.height == 0) {
            return Err(EditorError::InvalidProject("base layer cannot be empty".into()));
        }
        let expected = data.width as usize * data.height as usize * 4;
        if data.pixels.len() != expected {
            return Err(EditorError::InvalidProject(format!(
                "layer '{}' has {} bytes, expected {} ({}x{}x4)",
                data.name,
                data.pixels.len(),
                expected,
                data.width,
                data.height
            )));
        }
        let pixels = RgbaImage::from_raw(data.width, data.height, data.pixels).ok_or_else(|| {
            EditorError::InvalidProject(format!("failed to rebuild pixels for layer '{}'", data.name))
        })?;
        let opacity = if data.opacity.is_nan() { 1.0 } else { data.opacity.clamp(0.0, 1.0) };
        layers.push(Layer {
            name: data.name,
            pixels,
            opacity,
            visible: data.visible,
            x: data.x,
            y: data.y,
            is_paint_layer: data.is_paint_layer,
        });
    }

    Ok(CanvasState { layers })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn sample_state() -> CanvasState {
        let mut state = CanvasState::with_base("Base Layer", RgbaImage::from_pixel(4, 3, Rgba([10, 20, 30, 255])));
        let mut top = Layer::new("Paint Layer", RgbaImage::from_pixel(2, 2, Rgba([255, 0, 0, 128])));
        top.set_position(-1, 2);
        top.opacity = 0.25;
        top.visible = false;
        top.is_paint_layer = true;
        state.layers.push(top);
        state
    }

    #[test]
    fn formats_follow_extension() {
        assert_eq!(SaveFormat::from_path(Path::new("a/b.JPEG")), Some(SaveFormat::Jpeg));
        assert_eq!(SaveFormat::from_path(Path::new("x.tif")), Some(SaveFormat::Tiff));
        assert_eq!(SaveFormat::from_path(Path::new("x.ldp")), Some(SaveFormat::Ldp));
        assert_eq!(SaveFormat::from_path(Path::new("noext")), None);
        assert!(!SaveFormat::Jpeg.has_alpha());
    }

    #[test]
    fn png_round_trips_pixels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.png");
        let img = RgbaImage::from_fn(5, 4, |x, y| Rgba([x as u8 * 40, y as u8 * 50, 7, 100 + x as u8]));
        encode_and_write(&img, &path, SaveFormat::Png, 90).unwrap();
        assert_eq!(decode_image(&path).unwrap(), img);
    }

    #[test]
    fn webp_is_written_lossless() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.webp");
        let mut img = RgbaImage::from_fn(9, 6, |x, y| Rgba([x as u8 * 25, y as u8 * 40, 90, 255]));
        img.put_pixel(4, 2, Rgba([30, 60, 90, 128]));
        encode_and_write(&img, &path, SaveFormat::Webp, 85).unwrap();
        assert_eq!(image::ImageFormat::from_path(&path).unwrap(), image::ImageFormat::WebP);
        assert_eq!(decode_image(&path).unwrap(), img);
    }

    #[test]
    fn jpeg_output_is_opaque() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jpg");
        let img = RgbaImage::from_pixel(8, 8, Rgba([200, 100, 50, 40]));
        encode_and_write(&img, &path, SaveFormat::Jpeg, 95).unwrap();
        let back = decode_image(&path).unwrap();
        assert!(back.pixels().all(|p| p[3] == 255));
    }

    #[test]
    fn decode_failure_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not an image").unwrap();
        let err = decode_image(&path).unwrap_err();
        assert!(matches!(err, EditorError::Decode { .. }));
    }

    #[test]
    fn unwritable_destination_is_encode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.png");
        let err = encode_and_write(&RgbaImage::new(1, 1), &path, SaveFormat::Png, 90).unwrap_err();
        assert!(matches!(err, EditorError::Encode { .. }));
    }

    #[test]
    fn project_round_trips_every_layer_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.ldp");
        let state = sample_state();
        save_project(&state, &path).unwrap();
        assert_eq!(load_project(&path).unwrap(), state);
    }

    #[test]
    fn project_rejects_foreign_files() {
        assert!(matches!(parse_project(b"short"), Err(EditorError::InvalidProject(_))));
        let mut bogus = vec![4, 0, 0, 0, 0, 0, 0, 0];
        bogus.extend_from_slice(b"PFE1");
        bogus.extend_from_slice(&[0; 16]);
        assert!(matches!(parse_project(&bogus), Err(EditorError::InvalidProject(_))));
    }

    #[test]
    fn project_rejects_size_mismatch() {
        let project = ProjectFile {
            magic: LDP_MAGIC.to_string(),
            layers: vec![LayerData {
                name: "base".into(),
                visible: true,
                opacity: 1.0,
                x: 0,
                y: 0,
                is_paint_layer: false,
                width: 2,
                height: 2,
                pixels: vec![0; 3],
            }],
        };
        let raw = bincode::serialize(&project).unwrap();
        assert!(matches!(parse_project(&raw), Err(EditorError::InvalidProject(_))));
    }
}
