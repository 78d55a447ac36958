use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by document and file operations.
#[derive(Debug, Error)]
pub enum EditorError {
    /// The input could not be read or parsed as an image.
    #[error("could not decode '{}': {message}", path.display())]
    Decode { path: PathBuf, message: String },

    /// The output could not be encoded or written (permissions, unsupported format, ...).
    #[error("could not encode '{}': {message}", path.display())]
    Encode { path: PathBuf, message: String },

    /// The operation needs a loaded document (or a non-empty audio clip) but none exists.
    #[error("no document is loaded")]
    EmptyDocument,

    /// A batch run was stopped through its cancel flag.
    #[error("operation cancelled")]
    Cancelled,

    /// A layered project file is structurally invalid.
    #[error("invalid project file: {0}")]
    InvalidProject(String),
}

impl EditorError {
    pub(crate) fn decode(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        EditorError::Decode { path: path.into(), message: message.to_string() }
    }

    pub(crate) fn encode(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        EditorError::Encode { path: path.into(), message: message.to_string() }
    }
}

/// Routine history conditions. The [`Project`](crate::project::Project)
/// reports these to callers as `false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HistoryError {
    #[error("nothing to undo")]
    NothingToUndo,
    #[error("nothing to redo")]
    NothingToRedo,
}

/// Result of a per-layer or whole-document operation.
///
/// `NoOp` covers out-of-range layer indices, protected base-layer edits and
/// degenerate arguments. A `NoOp` never commits history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum OpOutcome {
    Applied,
    NoOp,
}

impl OpOutcome {
    pub fn is_applied(self) -> bool {
        self == OpOutcome::Applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_error_names_the_file() {
        let err = EditorError::decode("/tmp/broken.png", "bad magic");
        let text = err.to_string();
        assert!(text.contains("broken.png"));
        assert!(text.contains("bad magic"));
    }

    #[test]
    fn outcome_reports_applied() {
        assert!(OpOutcome::Applied.is_applied());
        assert!(!OpOutcome::NoOp.is_applied());
    }
}
