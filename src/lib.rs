//! LayerDesk: a layered raster editing core with linear snapshot history,
//! plus the batch and audio collaborators that sit beside it.
//!
//! The [`Project`] is the entry point for interactive editing. Batch jobs in
//! [`batch`] work file-to-file and never touch an open project.

#![allow(clippy::too_many_arguments)]

pub mod audio;
pub mod batch;
pub mod canvas;
pub mod cli;
pub mod components;
pub mod error;
pub mod io;
pub mod logger;
pub mod ops;
pub mod project;
pub mod settings;
pub mod viewport;

pub use canvas::{CanvasState, Layer};
pub use error::{EditorError, HistoryError, OpOutcome};
pub use project::Project;
pub use settings::EditorSettings;
