// ============================================================================
// BATCH COLLABORATORS: watermarking, image, archive and audio compression
// ============================================================================
//
// Batch jobs never touch a `Project`. Each file is decoded fresh, processed
// and written straight to the destination, so a job can run on a rayon worker
// while the document is being edited.
//
// Progress contract: fractions never decrease and exactly one report carries
// `done = true`, whatever the outcome. Cancellation is checked between files;
// outputs already written stay on disk.
// ============================================================================

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use image::{RgbaImage, imageops};

use crate::error::EditorError;
use crate::io::{self, SaveFormat};
use crate::settings::EditorSettings;

/// Source extensions picked up by [`watermark_folder`].
pub const WATERMARK_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

/// One progress report sent back to the controlling thread.
#[derive(Clone, Debug, PartialEq)]
pub struct Progress {
    /// 0.0 ..= 1.0, never decreasing within one job.
    pub fraction: f32,
    pub message: String,
    pub done: bool,
}

/// Cooperative cancel flag shared between the caller and a running job.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Final result of a batch job. Batch routines never return `Err`.
#[derive(Clone, Debug, PartialEq)]
pub struct BatchOutcome {
    pub success: bool,
    pub message: String,
    pub processed: usize,
    pub failed: usize,
}

impl BatchOutcome {
    fn failure(message: impl Into<String>, processed: usize, failed: usize) -> Self {
        Self { success: false, message: message.into(), processed, failed }
    }
}

/// Wraps a progress callback and enforces the reporting contract.
struct ProgressSink<F: FnMut(Progress)> {
    callback: F,
    last: f32,
}

impl<F: FnMut(Progress)> ProgressSink<F> {
    fn new(callback: F) -> Self {
        Self { callback, last: 0.0 }
    }

    fn report(&mut self, fraction: f32, message: impl Into<String>) {
        self.last = self.last.max(fraction.min(1.0));
        (self.callback)(Progress { fraction: self.last, message: message.into(), done: false });
    }

    fn finish(mut self, outcome: BatchOutcome) -> BatchOutcome {
        (self.callback)(Progress { fraction: 1.0, message: outcome.message.clone(), done: true });
        outcome
    }
}

// ============================================================================
// WATERMARK
// ============================================================================

/// Corner a watermark is pasted into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum WatermarkPosition {
    TopLeft,
    TopRight,
    BottomLeft,
    #[default]
    BottomRight,
}

impl WatermarkPosition {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "top_left" => Some(WatermarkPosition::TopLeft),
            "top_right" => Some(WatermarkPosition::TopRight),
            "bottom_left" => Some(WatermarkPosition::BottomLeft),
            "bottom_right" => Some(WatermarkPosition::BottomRight),
            _ => None,
        }
    }

    /// Top-left paste point of a `mark_w`×`mark_h` mark `margin` pixels in
    /// from this corner. May be negative when the mark does not fit.
    pub fn place(self, image_w: u32, image_h: u32, mark_w: u32, mark_h: u32, margin: u32) -> (i64, i64) {
        let m = i64::from(margin);
        let right = i64::from(image_w) - i64::from(mark_w) - m;
        let bottom = i64::from(image_h) - i64::from(mark_h) - m;
        match self {
            WatermarkPosition::TopLeft => (m, m),
            WatermarkPosition::TopRight => (right, m),
            WatermarkPosition::BottomLeft => (m, bottom),
            WatermarkPosition::BottomRight => (right, bottom),
        }
    }
}

/// Inputs of one folder watermarking run.
#[derive(Clone, Debug)]
pub struct WatermarkJob {
    pub source_dir: PathBuf,
    pub watermark_path: PathBuf,
    pub dest_dir: PathBuf,
    pub position: WatermarkPosition,
}

/// Allow-listed images directly inside `dir`, sorted by file name.
pub fn list_source_images(dir: &Path) -> Result<Vec<PathBuf>, EditorError> {
    let entries = fs::read_dir(dir).map_err(|e| EditorError::decode(dir, e))?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .filter(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| WATERMARK_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Scale `mark` to `scale` × the image width (keeping its aspect) and paste it
/// into the chosen corner. Returns `false` when the scaled mark would be empty.
pub fn apply_watermark(
    image: &mut RgbaImage,
    mark: &RgbaImage,
    position: WatermarkPosition,
    scale: f32,
    margin: u32,
) -> bool {
    if mark.width() == 0 || mark.height() == 0 {
        return false;
    }
    let mark_w = (image.width() as f32 * scale) as u32;
    let ratio = mark_w as f32 / mark.width() as f32;
    let mark_h = (mark.height() as f32 * ratio) as u32;
    if mark_w == 0 || mark_h == 0 {
        return false;
    }
    let resized = imageops::resize(mark, mark_w, mark_h, imageops::FilterType::Lanczos3);
    let (x, y) = position.place(image.width(), image.height(), mark_w, mark_h, margin);
    imageops::overlay(image, &resized, x, y);
    true
}

/// Watermark every allow-listed image in `job.source_dir` and write
/// `marked_<name>` into `job.dest_dir`.
pub fn watermark_folder(
    job: &WatermarkJob,
    settings: &EditorSettings,
    cancel: &CancelFlag,
    progress: impl FnMut(Progress),
) -> BatchOutcome {
    let sink = ProgressSink::new(progress);

    let mark = match io::decode_image(&job.watermark_path) {
        Ok(mark) => mark,
        Err(e) => {
            crate::log_err!("watermark: {}", e);
            return sink.finish(BatchOutcome::failure(e.to_string(), 0, 0));
        }
    };
    let files = match list_source_images(&job.source_dir) {
        Ok(files) => files,
        Err(e) => {
            crate::log_err!("watermark: {}", e);
            return sink.finish(BatchOutcome::failure(e.to_string(), 0, 0));
        }
    };
    if files.is_empty() {
        return sink.finish(BatchOutcome {
            success: true,
            message: "No images found in the source folder; nothing processed.".to_string(),
            processed: 0,
            failed: 0,
        });
    }

    crate::log_info!(
        "watermark: {} file(s) from {} -> {}",
        files.len(),
        job.source_dir.display(),
        job.dest_dir.display()
    );
    run_per_file(sink, &files, cancel, "Watermarking", "image", |path| {
        let name = file_name(path);
        let mut image = io::decode_image(path)?;
        apply_watermark(&mut image, &mark, job.position, settings.watermark_scale, settings.watermark_margin);
        let out = job.dest_dir.join(format!("marked_{}", name));
        write_output(&image, &out, settings.jpeg_quality)
    })
}

/// Run a watermark job on the rayon pool. `on_done` receives the outcome on
/// the worker thread after the final progress report.
pub fn spawn_watermark<P, D>(job: WatermarkJob, settings: EditorSettings, cancel: CancelFlag, progress: P, on_done: D)
where
    P: FnMut(Progress) + Send + 'static,
    D: FnOnce(BatchOutcome) + Send + 'static,
{
    rayon::spawn(move || {
        let outcome = watermark_folder(&job, &settings, &cancel, progress);
        on_done(outcome);
    });
}

// ============================================================================
// IMAGE COMPRESSION
// ============================================================================

/// Settings for [`compress_images`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CompressOptions {
    /// Scale applied to both dimensions; 1.0 keeps the size.
    pub resize_factor: f32,
    /// Output format; `None` keeps each file's own extension.
    pub format: Option<SaveFormat>,
    /// JPEG quality (1-100).
    pub quality: u8,
}

impl Default for CompressOptions {
    fn default() -> Self {
        Self { resize_factor: 1.0, format: None, quality: 85 }
    }
}

/// Output path `<dest>/<stem>_compressed.<ext>` for `source`.
pub fn compressed_output_path(source: &Path, dest: &Path, format: Option<SaveFormat>) -> Option<PathBuf> {
    let stem = source.file_stem()?.to_string_lossy();
    let ext = match format {
        Some(f) => f.extension().to_string(),
        None => source.extension()?.to_string_lossy().to_ascii_lowercase(),
    };
    Some(dest.join(format!("{}_compressed.{}", stem, ext)))
}

/// Re-encode `files` into `dest`, optionally resizing them.
pub fn compress_images(
    files: &[PathBuf],
    dest: &Path,
    options: &CompressOptions,
    cancel: &CancelFlag,
    progress: impl FnMut(Progress),
) -> BatchOutcome {
    let sink = ProgressSink::new(progress);
    if files.is_empty() {
        return sink.finish(BatchOutcome {
            success: true,
            message: "No images selected; nothing processed.".to_string(),
            processed: 0,
            failed: 0,
        });
    }

    crate::log_info!("compress: {} file(s) -> {}", files.len(), dest.display());
    run_per_file(sink, files, cancel, "Compressing", "image", |path| {
        let mut image = io::decode_image(path)?;
        if options.resize_factor > 0.0 && options.resize_factor != 1.0 {
            let w = ((image.width() as f32 * options.resize_factor) as u32).max(1);
            let h = ((image.height() as f32 * options.resize_factor) as u32).max(1);
            image = imageops::resize(&image, w, h, imageops::FilterType::Lanczos3);
        }
        let out = compressed_output_path(path, dest, options.format)
            .ok_or_else(|| EditorError::encode(path, "cannot derive an output name"))?;
        write_output(&image, &out, options.quality)
    })
}

// ============================================================================
// ARCHIVE COMPRESSION
// ============================================================================

/// Compression applied to every entry of a [`compress_files`] archive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ArchiveLevel {
    /// No compression.
    Store,
    #[default]
    Deflate,
    /// Slowest, usually smallest.
    Bzip2,
}

impl ArchiveLevel {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "store" | "normal" => Some(ArchiveLevel::Store),
            "deflate" | "high" => Some(ArchiveLevel::Deflate),
            "bzip2" | "max" => Some(ArchiveLevel::Bzip2),
            _ => None,
        }
    }

    fn method(self) -> zip::CompressionMethod {
        match self {
            ArchiveLevel::Store => zip::CompressionMethod::Stored,
            ArchiveLevel::Deflate => zip::CompressionMethod::Deflated,
            ArchiveLevel::Bzip2 => zip::CompressionMethod::Bzip2,
        }
    }
}

/// Percentage saved going from `original` to `compressed` bytes; 0 for empty input.
pub fn compression_ratio(original: u64, compressed: u64) -> f64 {
    if original == 0 {
        return 0.0;
    }
    (1.0 - compressed as f64 / original as f64) * 100.0
}

/// Pack `files` (by base name) into one ZIP archive at `output`.
///
/// The archive is all-or-nothing: any unreadable input or a cancel removes
/// the partial archive and fails the job.
pub fn compress_files(
    files: &[PathBuf],
    output: &Path,
    level: ArchiveLevel,
    cancel: &CancelFlag,
    progress: impl FnMut(Progress),
) -> BatchOutcome {
    let mut sink = ProgressSink::new(progress);
    if files.is_empty() {
        return sink.finish(BatchOutcome {
            success: true,
            message: "No files selected; nothing processed.".to_string(),
            processed: 0,
            failed: 0,
        });
    }

    let original_size: u64 = files
        .iter()
        .filter_map(|f| fs::metadata(f).ok())
        .filter(|m| m.is_file())
        .map(|m| m.len())
        .sum();
    crate::log_info!("archive: {} file(s) -> {} ({:?})", files.len(), output.display(), level);

    match write_archive(files, output, level, cancel, &mut sink) {
        Ok(()) => {
            let compressed_size = fs::metadata(output).map(|m| m.len()).unwrap_or(0);
            let message = format!(
                "Archived {} file(s); compression ratio {:.1}%.",
                files.len(),
                compression_ratio(original_size, compressed_size)
            );
            crate::log_info!("archive: {}", message);
            sink.finish(BatchOutcome { success: true, message, processed: files.len(), failed: 0 })
        }
        Err(e) => {
            if output.exists() {
                let _ = fs::remove_file(output);
            }
            let failed = usize::from(!matches!(e, EditorError::Cancelled));
            if failed == 0 {
                crate::log_warn!("archive: cancelled");
            } else {
                crate::log_err!("archive: {}", e);
            }
            sink.finish(BatchOutcome::failure(e.to_string(), 0, failed))
        }
    }
}

fn write_archive<F: FnMut(Progress)>(
    files: &[PathBuf],
    output: &Path,
    level: ArchiveLevel,
    cancel: &CancelFlag,
    sink: &mut ProgressSink<F>,
) -> Result<(), EditorError> {
    let file = File::create(output).map_err(|e| EditorError::encode(output, e))?;
    let mut archive = zip::ZipWriter::new(BufWriter::new(file));
    let options = zip::write::FileOptions::default()
        .compression_method(level.method())
        .large_file(true);

    let total = files.len();
    for (i, path) in files.iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(EditorError::Cancelled);
        }
        let name = file_name(path);
        sink.report(i as f32 / total as f32, format!("Archiving {}", name));
        let mut source = File::open(path).map_err(|e| EditorError::decode(path, e))?;
        archive
            .start_file(name, options)
            .map_err(|e| EditorError::encode(output, e))?;
        std::io::copy(&mut source, &mut archive).map_err(|e| EditorError::encode(output, e))?;
    }

    let mut writer = archive.finish().map_err(|e| EditorError::encode(output, e))?;
    writer.flush().map_err(|e| EditorError::encode(output, e))
}

// ============================================================================
// AUDIO COMPRESSION
// ============================================================================

/// Settings for [`compress_audio`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AudioCompressOptions {
    /// Amplitude scale for samples wider than 8 bits; 1.0 or more keeps them.
    pub quality_factor: f32,
    /// Sample rate written to the header; `None` keeps each file's own.
    pub sample_rate: Option<u32>,
}

impl Default for AudioCompressOptions {
    fn default() -> Self {
        Self { quality_factor: 1.0, sample_rate: None }
    }
}

/// Rewrite each WAV in `files` as `<dest>/<stem>_compressed.wav`, scaling
/// sample amplitude and relabelling the sample rate. Frames are not resampled.
pub fn compress_audio(
    files: &[PathBuf],
    dest: &Path,
    options: &AudioCompressOptions,
    cancel: &CancelFlag,
    progress: impl FnMut(Progress),
) -> BatchOutcome {
    let sink = ProgressSink::new(progress);
    if files.is_empty() {
        return sink.finish(BatchOutcome {
            success: true,
            message: "No audio files selected; nothing processed.".to_string(),
            processed: 0,
            failed: 0,
        });
    }

    crate::log_info!("compress audio: {} file(s) -> {}", files.len(), dest.display());
    run_per_file(sink, files, cancel, "Processing", "audio file", |path| {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .ok_or_else(|| EditorError::decode(path, "no file name"))?;
        let out = dest.join(format!("{}_compressed.wav", stem));
        let result = requantize_wav(path, &out, options);
        if result.is_err() && out.exists() {
            let _ = fs::remove_file(&out);
        }
        result
    })
}

fn requantize_wav(source: &Path, out: &Path, options: &AudioCompressOptions) -> Result<(), EditorError> {
    let mut reader = hound::WavReader::open(source).map_err(|e| EditorError::decode(source, e))?;
    let spec = reader.spec();
    let out_spec = hound::WavSpec { sample_rate: options.sample_rate.unwrap_or(spec.sample_rate), ..spec };
    let factor = options.quality_factor.clamp(0.0, 1.0);
    let scale = spec.bits_per_sample > 8 && factor < 1.0;

    let mut writer = hound::WavWriter::create(out, out_spec).map_err(|e| EditorError::encode(out, e))?;
    match spec.sample_format {
        hound::SampleFormat::Int => {
            for sample in reader.samples::<i32>() {
                let s = sample.map_err(|e| EditorError::decode(source, e))?;
                let s = if scale { (f64::from(s) * f64::from(factor)) as i32 } else { s };
                writer.write_sample(s).map_err(|e| EditorError::encode(out, e))?;
            }
        }
        hound::SampleFormat::Float => {
            for sample in reader.samples::<f32>() {
                let s = sample.map_err(|e| EditorError::decode(source, e))?;
                let s = if scale { s * factor } else { s };
                writer.write_sample(s).map_err(|e| EditorError::encode(out, e))?;
            }
        }
    }
    writer.finalize().map_err(|e| EditorError::encode(out, e))
}

// ============================================================================
// SHARED PLUMBING
// ============================================================================

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Encode to the format named by `out`'s extension. A partially written file
/// is removed on failure.
fn write_output(image: &RgbaImage, out: &Path, quality: u8) -> Result<(), EditorError> {
    let format = SaveFormat::from_path(out)
        .filter(|f| *f != SaveFormat::Ldp)
        .ok_or_else(|| EditorError::encode(out, "unsupported output format"))?;
    let result = io::encode_and_write(image, out, format, quality);
    if result.is_err() && out.exists() {
        let _ = fs::remove_file(out);
    }
    result
}

fn run_per_file<F, W>(
    mut sink: ProgressSink<F>,
    files: &[PathBuf],
    cancel: &CancelFlag,
    verb: &str,
    noun: &str,
    mut work: W,
) -> BatchOutcome
where
    F: FnMut(Progress),
    W: FnMut(&Path) -> Result<(), EditorError>,
{
    let total = files.len();
    let mut processed = 0;
    let mut failed = 0;

    for (i, path) in files.iter().enumerate() {
        if cancel.is_cancelled() {
            crate::log_warn!("{}: cancelled after {} file(s)", verb, processed);
            return sink.finish(BatchOutcome::failure(EditorError::Cancelled.to_string(), processed, failed));
        }
        sink.report(i as f32 / total as f32, format!("{} {}", verb, file_name(path)));
        match work(path) {
            Ok(()) => {
                crate::log_debug!("{}: {} done", verb, path.display());
                processed += 1;
            }
            Err(e) => {
                crate::log_err!("{}: {}", verb, e);
                failed += 1;
            }
        }
    }

    let message = if failed == 0 {
        format!("Processed {} {}(s).", processed, noun)
    } else {
        format!("Processed {} {}(s), {} failed.", processed, noun, failed)
    };
    crate::log_info!("{}: {}", verb, message);
    sink.finish(BatchOutcome { success: failed == 0, message, processed, failed })
}
