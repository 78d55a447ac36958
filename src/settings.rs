// ============================================================================
// EDITOR SETTINGS: persisted key = value configuration
// ============================================================================

use std::path::PathBuf;

use image::Rgba;

use crate::logger::Level;

/// Persisted editor configuration. Passed explicitly to the
/// [`Project`](crate::project::Project) and to batch jobs; nothing reads it
/// from global state.
#[derive(Clone, Debug, PartialEq)]
pub struct EditorSettings {
    /// Default brush diameter in pixels (always >= 1).
    pub brush_size: u32,
    /// Default brush colour.
    pub brush_color: Rgba<u8>,
    /// Font family requested for text layers. Falls back to the built-in face.
    pub text_font_family: String,
    /// Maximum number of history entries kept (0 = unlimited).
    pub history_limit: usize,
    /// Distance in pixels between the watermark and the chosen corner.
    pub watermark_margin: u32,
    /// Watermark width as a fraction of the target image width.
    pub watermark_scale: f32,
    /// Quality used when encoding JPEG output (1-100).
    pub jpeg_quality: u8,
    /// Least severe level written to the session log.
    pub log_level: Level,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            brush_size: 10,
            brush_color: Rgba([255, 0, 0, 255]),
            text_font_family: "Arial".to_string(),
            history_limit: 0,
            watermark_margin: 20,
            watermark_scale: 0.15,
            jpeg_quality: 90,
            log_level: Level::Info,
        }
    }
}

impl EditorSettings {
    #[allow(unreachable_code)]
    pub(crate) fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
                    PathBuf::from(home).join(".config")
                })
                .join("layerdesk");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join("layerdesk_settings.cfg"));
        }
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA")
                .or_else(|_| std::env::var("USERPROFILE"))
                .ok()?;
            let config_dir = PathBuf::from(appdata).join("LayerDesk");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join("layerdesk_settings.cfg"));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").ok()?;
            let config_dir = PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("LayerDesk");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join("layerdesk_settings.cfg"));
        }
        None
    }

    /// Load settings from the platform config file. Missing file or bad
    /// values fall back to defaults.
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else { return Self::default() };
        let Ok(content) = std::fs::read_to_string(&path) else { return Self::default() };
        Self::parse(&content)
    }

    /// Write settings to the platform config file.
    pub fn save(&self) {
        let Some(path) = Self::settings_path() else { return };
        if let Err(e) = std::fs::write(&path, self.to_config_string()) {
            crate::log_warn!("could not write settings to {}: {}", path.display(), e);
        }
    }

    /// Parse `key = value` lines. Unknown keys and malformed values are skipped.
    pub fn parse(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else { continue };
            let val = val.trim();
            match key.trim() {
                "brush_size" => {
                    if let Ok(v) = val.parse::<u32>() {
                        s.brush_size = v.max(1);
                    }
                }
                "brush_color" => {
                    if let Some(c) = parse_rgba(val) {
                        s.brush_color = c;
                    }
                }
                "text_font_family" => {
                    if !val.is_empty() {
                        s.text_font_family = val.to_string();
                    }
                }
                "history_limit" => {
                    if let Ok(v) = val.parse() {
                        s.history_limit = v;
                    }
                }
                "watermark_margin" => {
                    if let Ok(v) = val.parse() {
                        s.watermark_margin = v;
                    }
                }
                "watermark_scale" => {
                    if let Ok(v) = val.parse::<f32>()
                        && v > 0.0
                        && v <= 1.0
                    {
                        s.watermark_scale = v;
                    }
                }
                "jpeg_quality" => {
                    if let Ok(v) = val.parse::<u8>() {
                        s.jpeg_quality = v.clamp(1, 100);
                    }
                }
                "log_level" => {
                    if let Some(level) = Level::parse(val) {
                        s.log_level = level;
                    }
                }
                _ => {}
            }
        }
        s
    }

    pub fn to_config_string(&self) -> String {
        let c = self.brush_color.0;
        format!(
            "brush_size={}\nbrush_color={},{},{},{}\ntext_font_family={}\nhistory_limit={}\n\
             watermark_margin={}\nwatermark_scale={}\njpeg_quality={}\nlog_level={}\n",
            self.brush_size,
            c[0], c[1], c[2], c[3],
            self.text_font_family,
            self.history_limit,
            self.watermark_margin,
            self.watermark_scale,
            self.jpeg_quality,
            self.log_level.tag().to_ascii_lowercase(),
        )
    }
}

/// Parse `r,g,b,a` (alpha optional, defaults to 255).
pub fn parse_rgba(s: &str) -> Option<Rgba<u8>> {
    let parts: Vec<u8> = s
        .split(',')
        .map(|p| p.trim().parse::<u8>())
        .collect::<Result<_, _>>()
        .ok()?;
    match parts.as_slice() {
        [r, g, b] => Some(Rgba([*r, *g, *b, 255])),
        [r, g, b, a] => Some(Rgba([*r, *g, *b, *a])),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_red_brush() {
        let s = EditorSettings::default();
        assert_eq!(s.brush_size, 10);
        assert_eq!(s.brush_color, Rgba([255, 0, 0, 255]));
        assert_eq!(s.history_limit, 0);
    }

    #[test]
    fn config_string_round_trips() {
        let s = EditorSettings {
            brush_size: 4,
            brush_color: Rgba([1, 2, 3, 4]),
            text_font_family: "DejaVu Sans".to_string(),
            history_limit: 25,
            watermark_margin: 8,
            watermark_scale: 0.25,
            jpeg_quality: 70,
            log_level: Level::Debug,
        };
        assert_eq!(EditorSettings::parse(&s.to_config_string()), s);
    }

    #[test]
    fn bad_values_keep_defaults() {
        let s = EditorSettings::parse(
            "brush_size=zero\nbrush_color=1,2\nwatermark_scale=4.0\nunknown=1\n# comment\njpeg_quality=0",
        );
        let d = EditorSettings::default();
        assert_eq!(s.brush_size, d.brush_size);
        assert_eq!(s.brush_color, d.brush_color);
        assert_eq!(s.watermark_scale, d.watermark_scale);
        assert_eq!(s.jpeg_quality, 1);
        assert_eq!(EditorSettings::parse("log_level=loud").log_level, Level::Info);
    }

    #[test]
    fn brush_size_is_at_least_one() {
        assert_eq!(EditorSettings::parse("brush_size=0").brush_size, 1);
    }

    #[test]
    fn rgba_parses_with_optional_alpha() {
        assert_eq!(parse_rgba("10, 20, 30"), Some(Rgba([10, 20, 30, 255])));
        assert_eq!(parse_rgba("10,20,30,40"), Some(Rgba([10, 20, 30, 40])));
        assert_eq!(parse_rgba("300,0,0"), None);
    }
}
