use std::borrow::Cow;
use std::path::{Path, PathBuf};

use image::{Rgba, RgbaImage};
use uuid::Uuid;

use crate::canvas::{CanvasState, Layer};
use crate::components::history::{CanvasSnapshot, HistoryManager};
use crate::error::{EditorError, OpOutcome};
use crate::io::{self, SaveFormat};
use crate::ops::adjustments::{self, Adjustments};
use crate::ops::brush::{self, BrushState};
use crate::ops::canvas_ops::{self, BASE_LAYER_NAME};
use crate::ops::filters::{self, FilterKind};
use crate::ops::text::{self, TextFont};
use crate::ops::transform::{self, TransformKind};
use crate::settings::EditorSettings;
use crate::viewport::{CropBox, FitTransform};

/// Untouched pixels of a layer while an adjustment dialog previews on it.
#[derive(Clone, Debug)]
struct AdjustmentPreview {
    layer_idx: usize,
    original: RgbaImage,
}

/// Single open document and everything that edits it.
///
/// Every mutating call either returns `NoOp` and leaves the document alone, or
/// applies its change, commits one history entry and marks the project dirty.
/// Drags and adjustment previews are the two exceptions: they update the live
/// document without committing until they are finished.
pub struct Project {
    pub id: Uuid,
    /// Display name (derived from path or "Untitled")
    pub name: String,
    /// `None` until the document has been loaded or saved.
    pub path: Option<PathBuf>,
    canvas: CanvasState,
    history: HistoryManager,
    brush: BrushState,
    text_font_family: String,
    jpeg_quality: u8,
    unsaved_changes: bool,
    adjustment_preview: Option<AdjustmentPreview>,
    drag_pending: bool,
}

impl Project {
    /// An empty project. Nothing can be edited until [`Project::load`].
    pub fn new(settings: &EditorSettings) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: "Untitled".to_string(),
            path: None,
            canvas: CanvasState::new(),
            history: HistoryManager::new(settings.history_limit),
            brush: BrushState::from_settings(settings),
            text_font_family: settings.text_font_family.clone(),
            jpeg_quality: settings.jpeg_quality,
            unsaved_changes: false,
            adjustment_preview: None,
            drag_pending: false,
        }
    }

    pub fn open(path: &Path, settings: &EditorSettings) -> Result<Self, EditorError> {
        let mut project = Self::new(settings);
        project.load(path)?;
        Ok(project)
    }

    // ========================================================================
    // STATE ACCESS
    // ========================================================================

    pub fn canvas(&self) -> &CanvasState {
        &self.canvas
    }

    pub fn layer(&self, index: usize) -> Option<&Layer> {
        self.canvas.get(index)
    }

    pub fn layer_count(&self) -> usize {
        self.canvas.len()
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn brush(&self) -> &BrushState {
        &self.brush
    }

    pub fn unsaved_changes(&self) -> bool {
        self.unsaved_changes
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Get the display title (name with dirty indicator)
    pub fn display_title(&self) -> String {
        if self.unsaved_changes {
            format!("{}*", self.name)
        } else {
            self.name.clone()
        }
    }

    /// Flattened view of the live document, including any running preview.
    pub fn composite(&self) -> Option<RgbaImage> {
        self.canvas.composite()
    }

    /// Zoom-to-fit mapping of the document into a display area.
    pub fn fit_transform(&self, display_w: u32, display_h: u32) -> Option<FitTransform> {
        let (w, h) = self.canvas.size()?;
        FitTransform::new(display_w, display_h, w, h)
    }

    // ========================================================================
    // LOAD / SAVE
    // ========================================================================

    /// Replace the document with the file at `path`. `.ldp` files restore a
    /// full layer stack; anything else becomes a single base layer.
    pub fn load(&mut self, path: &Path) -> Result<(), EditorError> {
        let canvas = if SaveFormat::from_path(path) == Some(SaveFormat::Ldp) {
            io::load_project(path)?
        } else {
            CanvasState::with_base(BASE_LAYER_NAME, io::decode_image(path)?)
        };
        crate::log_info!(
            "opened {} ({} layer(s), {:?})",
            path.display(),
            canvas.len(),
            canvas.size().unwrap_or_default()
        );
        self.canvas = canvas;
        self.history.reset("Open", CanvasSnapshot::capture(&self.canvas));
        self.adjustment_preview = None;
        self.drag_pending = false;
        self.unsaved_changes = false;
        self.set_path(path);
        Ok(())
    }

    /// Write the document to `path`, in the format its extension names.
    /// Formats without alpha are flattened by dropping it.
    pub fn save(&mut self, path: &Path) -> Result<(), EditorError> {
        let state = self.committed_state();
        if state.is_empty() {
            return Err(EditorError::EmptyDocument);
        }
        let format = SaveFormat::from_path(path)
            .ok_or_else(|| EditorError::encode(path, "unsupported file extension"))?;

        let result = if format == SaveFormat::Ldp {
            io::save_project(&state, path)
        } else {
            let image = state.composite().ok_or(EditorError::EmptyDocument)?;
            io::encode_and_write(&image, path, format, self.jpeg_quality)
        };
        if let Err(e) = result {
            crate::log_err!("save failed: {}", e);
            return Err(e);
        }

        crate::log_info!("saved {}", path.display());
        self.unsaved_changes = false;
        self.set_path(path);
        Ok(())
    }

    fn set_path(&mut self, path: &Path) {
        self.path = Some(path.to_path_buf());
        self.name = path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "Unknown".to_string());
    }

    /// The document without any uncommitted preview pixels.
    fn committed_state(&self) -> Cow<'_, CanvasState> {
        match &self.adjustment_preview {
            Some(preview) if preview.layer_idx < self.canvas.len() => {
                let mut state = self.canvas.clone();
                state.layers[preview.layer_idx].pixels = preview.original.clone();
                Cow::Owned(state)
            }
            _ => Cow::Borrowed(&self.canvas),
        }
    }

    // ========================================================================
    // HISTORY
    // ========================================================================

    fn commit(&mut self, description: &str) {
        self.history.commit(description, CanvasSnapshot::capture(&self.canvas));
        self.unsaved_changes = true;
        crate::log_debug!(
            "commit '{}' ({} entries, {} bytes)",
            description,
            self.history.entry_count(),
            self.history.memory_usage()
        );
    }

    fn finish(&mut self, outcome: OpOutcome, description: &str) -> OpOutcome {
        if outcome.is_applied() {
            self.commit(description);
        }
        outcome
    }

    /// Close out transient interactions before a regular edit: a preview is
    /// rolled back and a finished-but-unreleased drag is committed.
    fn settle(&mut self) {
        self.cancel_adjustment_preview();
        let _ = self.end_drag();
    }

    /// Step back one entry. `false` when there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        self.adjustment_preview = None;
        self.drag_pending = false;
        match self.history.undo() {
            Ok(snapshot) => {
                snapshot.restore_into(&mut self.canvas);
                self.unsaved_changes = true;
                true
            }
            Err(e) => {
                crate::log_debug!("undo: {}", e);
                // The live document may still hold a cancelled drag.
                if let Some(current) = self.history.current() {
                    current.restore_into(&mut self.canvas);
                }
                false
            }
        }
    }

    /// Step forward one entry. `false` when there is nothing to redo.
    pub fn redo(&mut self) -> bool {
        self.adjustment_preview = None;
        self.drag_pending = false;
        match self.history.redo() {
            Ok(snapshot) => {
                snapshot.restore_into(&mut self.canvas);
                self.unsaved_changes = true;
                true
            }
            Err(e) => {
                crate::log_debug!("redo: {}", e);
                if let Some(current) = self.history.current() {
                    current.restore_into(&mut self.canvas);
                }
                false
            }
        }
    }

    // ========================================================================
    // LAYERS
    // ========================================================================

    /// Decode `path` and stack it on top as a new layer.
    pub fn add_image_layer(&mut self, path: &Path) -> Result<usize, EditorError> {
        if self.canvas.is_empty() {
            return Err(EditorError::EmptyDocument);
        }
        let pixels = io::decode_image(path)?;
        self.settle();
        let name = path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "Image".to_string());
        let idx = canvas_ops::push_layer(&mut self.canvas, name, pixels).ok_or(EditorError::EmptyDocument)?;
        self.commit("Add Image Layer");
        Ok(idx)
    }

    /// Rasterize `text` into a new top layer. Font lookup falls back to the
    /// built-in face, so this only fails without a document.
    pub fn add_text_layer(&mut self, text: &str, font_size: f32, color: Rgba<u8>) -> Result<usize, EditorError> {
        if self.canvas.is_empty() {
            return Err(EditorError::EmptyDocument);
        }
        self.settle();
        let font = TextFont::resolve(&self.text_font_family);
        let pixels = text::render_text(&font, text, font_size, color);
        let name = canvas_ops::text_layer_name(text);
        let idx = canvas_ops::push_layer(&mut self.canvas, name, pixels).ok_or(EditorError::EmptyDocument)?;
        self.commit("Add Text Layer");
        Ok(idx)
    }

    /// Transparent, base-sized layer for painting. `None` without a document.
    pub fn add_paint_layer(&mut self) -> Option<usize> {
        self.canvas.base()?;
        self.settle();
        let idx = canvas_ops::add_paint_layer(&mut self.canvas)?;
        self.commit("Add Paint Layer");
        Some(idx)
    }

    pub fn remove_layer(&mut self, index: usize) -> OpOutcome {
        self.settle();
        let outcome = canvas_ops::remove_layer(&mut self.canvas, index);
        self.finish(outcome, "Remove Layer")
    }

    pub fn move_layer_up(&mut self, index: usize) -> OpOutcome {
        self.settle();
        let outcome = canvas_ops::move_layer_up(&mut self.canvas, index);
        self.finish(outcome, "Move Layer Up")
    }

    pub fn move_layer_down(&mut self, index: usize) -> OpOutcome {
        self.settle();
        let outcome = canvas_ops::move_layer_down(&mut self.canvas, index);
        self.finish(outcome, "Move Layer Down")
    }

    pub fn set_layer_opacity(&mut self, index: usize, opacity: f32) -> OpOutcome {
        self.settle();
        let outcome = canvas_ops::set_layer_opacity(&mut self.canvas, index, opacity);
        self.finish(outcome, "Layer Opacity")
    }

    pub fn set_layer_visible(&mut self, index: usize, visible: bool) -> OpOutcome {
        self.settle();
        let outcome = canvas_ops::set_layer_visible(&mut self.canvas, index, visible);
        self.finish(outcome, "Layer Visibility")
    }

    /// Move a non-base layer to canvas position (`x`, `y`) without
    /// committing. Call [`Project::end_drag`] on release.
    pub fn drag_layer(&mut self, index: usize, x: i32, y: i32) -> OpOutcome {
        self.cancel_adjustment_preview();
        let outcome = canvas_ops::set_layer_position(&mut self.canvas, index, x, y);
        if outcome.is_applied() {
            self.drag_pending = true;
        }
        outcome
    }

    /// Commit the drag in progress, if any moved a layer.
    pub fn end_drag(&mut self) -> OpOutcome {
        if !std::mem::take(&mut self.drag_pending) {
            return OpOutcome::NoOp;
        }
        self.commit("Move Layer");
        OpOutcome::Applied
    }

    // ========================================================================
    // PIXEL OPERATIONS
    // ========================================================================

    pub fn apply_filter(&mut self, index: usize, kind: FilterKind) -> OpOutcome {
        self.settle();
        let outcome = filters::apply_filter(&mut self.canvas, index, kind);
        self.finish(outcome, kind.label())
    }

    /// Apply tone factors. While a preview runs on the same layer the
    /// factors are computed from the untouched original.
    pub fn apply_adjustments(&mut self, index: usize, adj: &Adjustments) -> OpOutcome {
        if let Some(preview) = self.adjustment_preview.take_if(|p| p.layer_idx == index)
            && let Some(layer) = self.canvas.get_mut(index)
        {
            layer.pixels = adjustments::adjust_image(&preview.original, adj);
            self.commit("Adjustments");
            return OpOutcome::Applied;
        }
        self.settle();
        let outcome = adjustments::apply_adjustments(&mut self.canvas, index, adj);
        self.finish(outcome, "Adjustments")
    }

    pub fn apply_threshold(&mut self, index: usize, level: u8) -> OpOutcome {
        self.settle();
        let outcome = adjustments::apply_threshold(&mut self.canvas, index, level);
        self.finish(outcome, "Threshold")
    }

    pub fn apply_transform(&mut self, kind: TransformKind) -> OpOutcome {
        self.settle();
        let outcome = transform::apply_transform(&mut self.canvas, kind);
        self.finish(outcome, kind.label())
    }

    pub fn apply_crop(&mut self, crop: CropBox) -> OpOutcome {
        self.settle();
        let outcome = transform::apply_crop(&mut self.canvas, crop);
        self.finish(outcome, "Crop")
    }

    /// Paint with the current brush. Every call commits, so a drag of N
    /// motion events produces N history entries.
    pub fn draw_stroke(&mut self, index: usize, from: Option<(i32, i32)>, to: (i32, i32)) -> OpOutcome {
        self.settle();
        let outcome = brush::draw_stroke(&mut self.canvas, index, from, to, &self.brush);
        self.finish(outcome, "Brush Stroke")
    }

    // ========================================================================
    // ADJUSTMENT PREVIEW
    // ========================================================================

    /// Start previewing adjustments on `index`, remembering its pixels.
    pub fn begin_adjustment_preview(&mut self, index: usize) -> OpOutcome {
        self.settle();
        let Some(layer) = self.canvas.get(index) else { return OpOutcome::NoOp };
        self.adjustment_preview = Some(AdjustmentPreview {
            layer_idx: index,
            original: layer.pixels.clone(),
        });
        OpOutcome::Applied
    }

    /// Show `adj` applied to the original pixels. Never commits.
    pub fn preview_adjustments(&mut self, adj: &Adjustments) -> OpOutcome {
        let Some(preview) = &self.adjustment_preview else { return OpOutcome::NoOp };
        let Some(layer) = self.canvas.layers.get_mut(preview.layer_idx) else { return OpOutcome::NoOp };
        layer.pixels = adjustments::adjust_image(&preview.original, adj);
        OpOutcome::Applied
    }

    /// Drop the preview and put the original pixels back.
    pub fn cancel_adjustment_preview(&mut self) {
        if let Some(preview) = self.adjustment_preview.take()
            && let Some(layer) = self.canvas.get_mut(preview.layer_idx)
        {
            layer.pixels = preview.original;
        }
    }

    pub fn is_previewing(&self) -> bool {
        self.adjustment_preview.is_some()
    }

    // ========================================================================
    // TOOL CONFIGURATION
    // ========================================================================

    pub fn set_brush_size(&mut self, size: u32) {
        self.brush.set_size(size);
    }

    pub fn set_brush_color(&mut self, color: Rgba<u8>) {
        self.brush.color = color;
    }

    pub fn set_text_font_family(&mut self, family: impl Into<String>) {
        self.text_font_family = family.into();
    }
}
