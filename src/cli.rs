// ============================================================================
// LayerDesk CLI: headless editing and batch jobs via command-line arguments
// ============================================================================
//
// Usage examples:
//   layerdesk edit -i photo.png -o out.png --op rotate-left --op threshold:128
//   layerdesk edit -i photo.jpg -o out.ldp --op crop:10,10,200,150 --op "text:Hello"
//   layerdesk watermark --source shots/ --watermark logo.png --dest marked/ --position top-right
//   layerdesk compress-images -i "shots/*.jpg" --output-dir small/ --resize 0.5 --quality 70
//   layerdesk compress-files -i "docs/*" -o docs.zip --level max
//   layerdesk compress-audio -i "takes/*.wav" --output-dir small/ --quality 0.8 --rate 22050
//
// Every command runs synchronously on the current thread and reports through
// stdout / stderr plus the session log.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use image::Rgba;

use crate::batch::{
    self, ArchiveLevel, AudioCompressOptions, CancelFlag, CompressOptions, WatermarkJob, WatermarkPosition,
};
use crate::io::SaveFormat;
use crate::ops::adjustments::Adjustments;
use crate::ops::filters::FilterKind;
use crate::ops::transform::TransformKind;
use crate::project::Project;
use crate::settings::{self, EditorSettings};
use crate::viewport::CropBox;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// LayerDesk headless image editor.
#[derive(Parser, Debug)]
#[command(
    name = "layerdesk",
    about = "LayerDesk headless layer editor and batch tools",
    long_about = "Apply editor operations to image files, watermark whole folders,\n\
                  re-encode image batches, pack ZIP archives and rescale WAV batches\n\
                  without a GUI. Images: PNG, JPEG, WEBP, BMP,\n\
                  TGA, ICO, TIFF and LDP layered project files.\n\n\
                  Example:\n  \
                  layerdesk edit -i photo.png -o out.png --op rotate-left --op blur"
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Print per-step progress and timing information.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load one file, apply operations in order, save the result.
    Edit(EditArgs),
    /// Watermark every image in a folder.
    Watermark(WatermarkArgs),
    /// Resize and re-encode a batch of images.
    CompressImages(CompressArgs),
    /// Pack files into one ZIP archive.
    CompressFiles(ArchiveArgs),
    /// Rescale and relabel a batch of WAV files.
    CompressAudio(AudioCompressArgs),
}

#[derive(Args, Debug)]
pub struct EditArgs {
    /// Input image or .ldp project.
    #[arg(short, long, value_name = "FILE")]
    pub input: PathBuf,

    /// Output file; the format follows its extension.
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,

    /// Operation to apply, repeatable. One of: rotate-left, rotate-right,
    /// flip-h, flip-v, <filter name>, threshold:N, brightness:F, contrast:F,
    /// saturation:F, sharpness:F, crop:X1,Y1,X2,Y2, text:STRING.
    #[arg(long = "op", value_name = "OP")]
    pub ops: Vec<String>,

    /// Font size for text operations.
    #[arg(long, default_value_t = 48.0)]
    pub text_size: f32,

    /// Text colour as r,g,b[,a].
    #[arg(long, default_value = "0,0,0,255")]
    pub text_color: String,
}

#[derive(Args, Debug)]
pub struct WatermarkArgs {
    /// Folder of source images (jpg, jpeg, png, bmp).
    #[arg(long, value_name = "DIR")]
    pub source: PathBuf,

    /// Watermark image.
    #[arg(long, value_name = "FILE")]
    pub watermark: PathBuf,

    /// Destination folder for marked_<name> outputs.
    #[arg(long, value_name = "DIR")]
    pub dest: PathBuf,

    /// top-left, top-right, bottom-left or bottom-right.
    #[arg(long, default_value = "bottom-right")]
    pub position: String,
}

#[derive(Args, Debug)]
pub struct CompressArgs {
    /// Input file(s). Glob patterns accepted (e.g. "*.png", "shots/*.jpg").
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// Output directory.
    #[arg(long, value_name = "DIR")]
    pub output_dir: PathBuf,

    /// Output format (png, jpeg, webp, bmp, tga, ico, tiff). Defaults to each input's own.
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// JPEG quality (1–100).
    #[arg(short, long, default_value_t = 85, value_name = "1-100")]
    pub quality: u8,

    /// Scale factor applied to both dimensions.
    #[arg(long, default_value_t = 1.0)]
    pub resize: f32,
}

#[derive(Args, Debug)]
pub struct ArchiveArgs {
    /// Input file(s). Glob patterns accepted.
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// Archive to write.
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,

    /// store (normal), deflate (high) or bzip2 (max).
    #[arg(long, default_value = "deflate")]
    pub level: String,
}

#[derive(Args, Debug)]
pub struct AudioCompressArgs {
    /// Input WAV file(s). Glob patterns accepted.
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// Output directory.
    #[arg(long, value_name = "DIR")]
    pub output_dir: PathBuf,

    /// Amplitude factor (0.0–1.0) for 16-bit and wider samples.
    #[arg(short, long, default_value_t = 1.0)]
    pub quality: f32,

    /// Sample rate for the output header. Defaults to each input's own.
    #[arg(long, value_name = "HZ")]
    pub rate: Option<u32>,
}

// ============================================================================
// Edit operations
// ============================================================================

/// One `--op` argument.
#[derive(Clone, Debug, PartialEq)]
pub enum EditOp {
    Transform(TransformKind),
    Filter(FilterKind),
    Threshold(u8),
    Adjust(Adjustments),
    Crop(CropBox),
    Text(String),
}

impl EditOp {
    pub fn parse(raw: &str) -> Result<Self, String> {
        let (name, arg) = match raw.split_once(':') {
            Some((n, a)) => (n.trim().to_ascii_lowercase(), Some(a)),
            None => (raw.trim().to_ascii_lowercase(), None),
        };

        let factor = |arg: Option<&str>| -> Result<f32, String> {
            arg.and_then(|a| a.trim().parse::<f32>().ok())
                .filter(|f| f.is_finite())
                .ok_or_else(|| format!("'{}' needs a numeric factor, e.g. {}:1.2", raw, name))
        };

        match name.as_str() {
            "threshold" => arg
                .and_then(|a| a.trim().parse::<u8>().ok())
                .map(EditOp::Threshold)
                .ok_or_else(|| format!("'{}' needs a level 0-255, e.g. threshold:128", raw)),
            "brightness" => Ok(EditOp::Adjust(Adjustments { brightness: factor(arg)?, ..Adjustments::default() })),
            "contrast" => Ok(EditOp::Adjust(Adjustments { contrast: factor(arg)?, ..Adjustments::default() })),
            "saturation" => Ok(EditOp::Adjust(Adjustments { saturation: factor(arg)?, ..Adjustments::default() })),
            "sharpness" => Ok(EditOp::Adjust(Adjustments { sharpness: factor(arg)?, ..Adjustments::default() })),
            "crop" => {
                let nums: Vec<i32> = arg
                    .unwrap_or("")
                    .split(',')
                    .filter_map(|n| n.trim().parse().ok())
                    .collect();
                match nums.as_slice() {
                    [x1, y1, x2, y2] => Ok(EditOp::Crop(CropBox::new(*x1, *y1, *x2, *y2))),
                    _ => Err(format!("'{}' needs four integers, e.g. crop:0,0,100,100", raw)),
                }
            }
            "text" => match raw.split_once(':') {
                Some((_, text)) if !text.is_empty() => Ok(EditOp::Text(text.to_string())),
                _ => Err("text needs a string, e.g. text:Hello".to_string()),
            },
            _ => {
                if let Some(kind) = TransformKind::parse(&name) {
                    Ok(EditOp::Transform(kind))
                } else if let Some(kind) = FilterKind::parse(&name) {
                    Ok(EditOp::Filter(kind))
                } else {
                    Err(format!("unknown operation '{}'", raw))
                }
            }
        }
    }
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run the selected command and return an OS exit code.
pub fn run(args: CliArgs, settings: &EditorSettings) -> ExitCode {
    let verbose = args.verbose;
    let ok = match args.command {
        Command::Edit(edit) => run_edit(&edit, settings, verbose),
        Command::Watermark(wm) => run_watermark(&wm, settings, verbose),
        Command::CompressImages(c) => run_compress(&c, verbose),
        Command::CompressFiles(a) => run_archive(&a, verbose),
        Command::CompressAudio(a) => run_compress_audio(&a, verbose),
    };
    if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}

fn run_edit(args: &EditArgs, settings: &EditorSettings, verbose: bool) -> bool {
    let start = Instant::now();
    match edit_file(args, settings, verbose) {
        Ok(()) => {
            if verbose {
                println!(
                    "  → {} ({:.0}ms)",
                    args.output.display(),
                    start.elapsed().as_secs_f64() * 1000.0
                );
            }
            true
        }
        Err(e) => {
            eprintln!("error: {}", e);
            crate::log_err!("cli edit: {}", e);
            false
        }
    }
}

/// Load, apply every `--op` to the top layer (or the whole document), save.
pub fn edit_file(args: &EditArgs, settings: &EditorSettings, verbose: bool) -> Result<(), String> {
    // Parse everything first so a typo never leaves a half-written output.
    let ops = args
        .ops
        .iter()
        .map(|raw| EditOp::parse(raw))
        .collect::<Result<Vec<_>, _>>()?;
    let text_color: Rgba<u8> = settings::parse_rgba(&args.text_color)
        .ok_or_else(|| format!("invalid --text-color '{}'", args.text_color))?;

    let mut project = Project::open(&args.input, settings).map_err(|e| e.to_string())?;

    for (op, raw) in ops.iter().zip(&args.ops) {
        let top = project.layer_count().saturating_sub(1);
        let applied = match op {
            EditOp::Transform(kind) => project.apply_transform(*kind).is_applied(),
            EditOp::Filter(kind) => project.apply_filter(top, *kind).is_applied(),
            EditOp::Threshold(level) => project.apply_threshold(top, *level).is_applied(),
            EditOp::Adjust(adj) => project.apply_adjustments(top, adj).is_applied(),
            EditOp::Crop(crop) => project.apply_crop(*crop).is_applied(),
            EditOp::Text(text) => project.add_text_layer(text, args.text_size, text_color).is_ok(),
        };
        if !applied {
            eprintln!("warning: '{}' had no effect", raw);
        } else if verbose {
            println!("  {}", raw);
        }
    }

    project.save(&args.output).map_err(|e| e.to_string())
}

fn run_watermark(args: &WatermarkArgs, settings: &EditorSettings, verbose: bool) -> bool {
    let Some(position) = WatermarkPosition::parse(&args.position) else {
        eprintln!("error: unknown watermark position '{}'", args.position);
        return false;
    };
    if let Err(e) = std::fs::create_dir_all(&args.dest) {
        eprintln!("error: could not create output directory '{}': {}", args.dest.display(), e);
        return false;
    }
    let job = WatermarkJob {
        source_dir: args.source.clone(),
        watermark_path: args.watermark.clone(),
        dest_dir: args.dest.clone(),
        position,
    };
    let outcome = batch::watermark_folder(&job, settings, &CancelFlag::new(), |p| {
        if verbose && !p.done {
            println!("[{:>3.0}%] {}", p.fraction * 100.0, p.message);
        }
    });
    report_outcome(&outcome)
}

fn run_compress(args: &CompressArgs, verbose: bool) -> bool {
    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        eprintln!("error: no input files matched the given pattern(s).");
        return false;
    }
    let format = match args.format.as_deref() {
        Some(f) => match SaveFormat::from_extension(f).filter(|f| *f != SaveFormat::Ldp) {
            Some(format) => Some(format),
            None => {
                eprintln!("error: unsupported output format '{}'", f);
                return false;
            }
        },
        None => None,
    };
    if let Err(e) = std::fs::create_dir_all(&args.output_dir) {
        eprintln!("error: could not create output directory '{}': {}", args.output_dir.display(), e);
        return false;
    }

    let options = CompressOptions { resize_factor: args.resize, format, quality: args.quality };
    let outcome = batch::compress_images(&inputs, &args.output_dir, &options, &CancelFlag::new(), |p| {
        if verbose && !p.done {
            println!("[{:>3.0}%] {}", p.fraction * 100.0, p.message);
        }
    });
    report_outcome(&outcome)
}

fn run_archive(args: &ArchiveArgs, verbose: bool) -> bool {
    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        eprintln!("error: no input files matched the given pattern(s).");
        return false;
    }
    let Some(level) = ArchiveLevel::parse(&args.level) else {
        eprintln!("error: unknown compression level '{}'", args.level);
        return false;
    };
    if let Some(parent) = args.output.parent().filter(|p| !p.as_os_str().is_empty())
        && let Err(e) = std::fs::create_dir_all(parent)
    {
        eprintln!("error: could not create output directory '{}': {}", parent.display(), e);
        return false;
    }

    let outcome = batch::compress_files(&inputs, &args.output, level, &CancelFlag::new(), |p| {
        if verbose && !p.done {
            println!("[{:>3.0}%] {}", p.fraction * 100.0, p.message);
        }
    });
    report_outcome(&outcome)
}

fn run_compress_audio(args: &AudioCompressArgs, verbose: bool) -> bool {
    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        eprintln!("error: no input files matched the given pattern(s).");
        return false;
    }
    if let Err(e) = std::fs::create_dir_all(&args.output_dir) {
        eprintln!("error: could not create output directory '{}': {}", args.output_dir.display(), e);
        return false;
    }

    let options = AudioCompressOptions { quality_factor: args.quality, sample_rate: args.rate };
    let outcome = batch::compress_audio(&inputs, &args.output_dir, &options, &CancelFlag::new(), |p| {
        if verbose && !p.done {
            println!("[{:>3.0}%] {}", p.fraction * 100.0, p.message);
        }
    });
    report_outcome(&outcome)
}

fn report_outcome(outcome: &batch::BatchOutcome) -> bool {
    if outcome.success {
        println!("{}", outcome.message);
    } else {
        eprintln!("error: {}", outcome.message);
    }
    outcome.success
}

// ============================================================================
// Helpers
// ============================================================================

/// Expand glob patterns and literal paths into a deduplicated, ordered list.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let as_path = Path::new(pattern);

        if as_path.exists() {
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        match glob::glob(pattern) {
            Ok(entries) => {
                let mut matched = false;
                for entry in entries.flatten() {
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                    matched = true;
                }
                if !matched {
                    eprintln!("warning: pattern '{}' matched no files.", pattern);
                }
            }
            Err(e) => {
                eprintln!("warning: invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    #[test]
    fn parses_ops() {
        assert_eq!(EditOp::parse("rotate-left"), Ok(EditOp::Transform(TransformKind::RotateLeft)));
        assert_eq!(EditOp::parse("Find_Edges"), Ok(EditOp::Filter(FilterKind::FindEdges)));
        assert_eq!(EditOp::parse("threshold:128"), Ok(EditOp::Threshold(128)));
        assert_eq!(EditOp::parse("crop:1,2,30,40"), Ok(EditOp::Crop(CropBox::new(1, 2, 30, 40))));
        assert_eq!(EditOp::parse("text:a:b"), Ok(EditOp::Text("a:b".to_string())));
        match EditOp::parse("contrast:0.5") {
            Ok(EditOp::Adjust(adj)) => assert_eq!(adj.contrast, 0.5),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn rejects_bad_ops() {
        assert!(EditOp::parse("threshold:300").is_err());
        assert!(EditOp::parse("brightness").is_err());
        assert!(EditOp::parse("crop:1,2,3").is_err());
        assert!(EditOp::parse("text:").is_err());
        assert!(EditOp::parse("explode").is_err());
    }

    #[test]
    fn clap_accepts_subcommands() {
        let args = CliArgs::try_parse_from([
            "layerdesk", "edit", "-i", "in.png", "-o", "out.png", "--op", "blur", "--op", "flip-h",
        ])
        .unwrap();
        match args.command {
            Command::Edit(edit) => assert_eq!(edit.ops, vec!["blur", "flip-h"]),
            other => panic!("unexpected {:?}", other),
        }
        assert!(CliArgs::try_parse_from(["layerdesk", "compress-images", "--output-dir", "x"]).is_err());

        let args = CliArgs::try_parse_from([
            "layerdesk", "compress-audio", "-i", "a.wav", "--output-dir", "out", "--rate", "22050",
        ])
        .unwrap();
        match args.command {
            Command::CompressAudio(audio) => {
                assert_eq!(audio.rate, Some(22050));
                assert_eq!(audio.quality, 1.0);
            }
            other => panic!("unexpected {:?}", other),
        }
        let args = CliArgs::try_parse_from(["layerdesk", "compress-files", "-i", "a", "b", "-o", "x.zip"]).unwrap();
        match args.command {
            Command::CompressFiles(archive) => {
                assert_eq!(archive.input, vec!["a", "b"]);
                assert_eq!(archive.level, "deflate");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn archive_command_writes_zip() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("notes.txt");
        std::fs::write(&input, "some notes").unwrap();
        let output = dir.path().join("out").join("notes.zip");
        let args = ArchiveArgs {
            input: vec![input.to_string_lossy().to_string()],
            output: output.clone(),
            level: "max".to_string(),
        };
        assert!(run_archive(&args, false));
        assert!(output.exists());

        let bad = ArchiveArgs { level: "ultra".to_string(), ..args };
        assert!(!run_archive(&bad, false));
    }

    #[test]
    fn edit_rotates_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.png");
        let output = dir.path().join("out.png");
        RgbaImage::new(6, 3).save(&input).unwrap();
        let args = EditArgs {
            input,
            output: output.clone(),
            ops: vec!["rotate-right".to_string(), "threshold:10".to_string()],
            text_size: 48.0,
            text_color: "0,0,0,255".to_string(),
        };
        edit_file(&args, &EditorSettings::default(), false).unwrap();
        assert_eq!(image::image_dimensions(&output).unwrap(), (3, 6));
    }

    #[test]
    fn edit_with_bad_op_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.png");
        let output = dir.path().join("out.png");
        RgbaImage::new(2, 2).save(&input).unwrap();
        let args = EditArgs {
            input,
            output: output.clone(),
            ops: vec!["nope".to_string()],
            text_size: 12.0,
            text_color: "0,0,0".to_string(),
        };
        assert!(edit_file(&args, &EditorSettings::default(), false).is_err());
        assert!(!output.exists());
    }

    #[test]
    fn literal_inputs_are_deduplicated() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.png");
        RgbaImage::new(1, 1).save(&a).unwrap();
        let pattern = dir.path().join("*.png").to_string_lossy().to_string();
        let literal = a.to_string_lossy().to_string();
        let found = resolve_inputs(&[literal, pattern]);
        assert_eq!(found, vec![a]);
    }
}
