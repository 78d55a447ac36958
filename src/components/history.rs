use crate::canvas::{CanvasState, Layer};
use crate::error::HistoryError;

// ============================================================================
// CANVAS SNAPSHOT: full-document value copy
// ============================================================================

/// A deep copy of the full layer stack at one point in time.
///
/// Pixel buffers are owned by value, so later edits to the live document never
/// reach a stored snapshot, and every restore hands out a fresh copy.
#[derive(Clone, Debug, PartialEq)]
pub struct CanvasSnapshot {
    pub layers: Vec<Layer>,
}

impl CanvasSnapshot {
    pub fn capture(state: &CanvasState) -> Self {
        Self { layers: state.layers.clone() }
    }

    pub fn restore_into(&self, state: &mut CanvasState) {
        state.layers.clone_from(&self.layers);
    }

    pub fn to_state(&self) -> CanvasState {
        CanvasState { layers: self.layers.clone() }
    }

    pub fn memory_bytes(&self) -> usize {
        self.layers.iter().map(Layer::memory_bytes).sum()
    }
}

/// One log entry: a snapshot plus the label of the operation that produced it.
#[derive(Clone, Debug)]
pub struct HistoryEntry {
    pub description: String,
    pub snapshot: CanvasSnapshot,
}

// ============================================================================
// HISTORY MANAGER: linear snapshot log with a cursor
// ============================================================================

/// Snapshot log for undo/redo.
///
/// `entries[cursor]` is the current state. Committing while the cursor is not
/// at the end discards the redo branch.
#[derive(Clone, Debug, Default)]
pub struct HistoryManager {
    entries: Vec<HistoryEntry>,
    cursor: usize,
    /// Maximum number of entries kept. `None` keeps everything.
    max_entries: Option<usize>,
    /// Running byte total across all entries.
    total_memory: usize,
}

impl HistoryManager {
    /// `limit == 0` means unlimited.
    pub fn new(limit: usize) -> Self {
        Self {
            max_entries: (limit > 0).then_some(limit),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replace the whole log with a single entry.
    pub fn reset(&mut self, description: impl Into<String>, initial: CanvasSnapshot) {
        self.entries.clear();
        self.total_memory = initial.memory_bytes();
        self.entries.push(HistoryEntry { description: description.into(), snapshot: initial });
        self.cursor = 0;
    }

    pub fn commit(&mut self, description: impl Into<String>, snapshot: CanvasSnapshot) {
        if !self.entries.is_empty() {
            for dropped in self.entries.drain(self.cursor + 1..) {
                self.total_memory = self.total_memory.saturating_sub(dropped.snapshot.memory_bytes());
            }
        }
        self.total_memory += snapshot.memory_bytes();
        self.entries.push(HistoryEntry { description: description.into(), snapshot });
        self.cursor = self.entries.len() - 1;
        self.prune();
    }

    pub fn undo(&mut self) -> Result<CanvasSnapshot, HistoryError> {
        if self.cursor == 0 || self.entries.is_empty() {
            return Err(HistoryError::NothingToUndo);
        }
        self.cursor -= 1;
        Ok(self.entries[self.cursor].snapshot.clone())
    }

    pub fn redo(&mut self) -> Result<CanvasSnapshot, HistoryError> {
        if self.cursor + 1 >= self.entries.len() {
            return Err(HistoryError::NothingToRedo);
        }
        self.cursor += 1;
        Ok(self.entries[self.cursor].snapshot.clone())
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn current(&self) -> Option<&CanvasSnapshot> {
        self.entries.get(self.cursor).map(|e| &e.snapshot)
    }

    pub fn undo_description(&self) -> Option<&str> {
        if !self.can_undo() {
            return None;
        }
        self.entries.get(self.cursor).map(|e| e.description.as_str())
    }

    pub fn redo_description(&self) -> Option<&str> {
        self.entries.get(self.cursor + 1).map(|e| e.description.as_str())
    }

    /// All descriptions up to and including the cursor, most recent first.
    pub fn undo_history(&self) -> Vec<&str> {
        self.entries
            .iter()
            .take(self.cursor + 1)
            .rev()
            .map(|e| e.description.as_str())
            .collect()
    }

    /// Bytes held by stored snapshots (O(1) via cached total).
    pub fn memory_usage(&self) -> usize {
        self.total_memory
    }

    /// Drop the oldest entries past the cap; the cursor moves with them.
    fn prune(&mut self) {
        let Some(max) = self.max_entries else { return };
        while self.entries.len() > max && self.cursor > 0 {
            let removed = self.entries.remove(0);
            self.total_memory = self.total_memory.saturating_sub(removed.snapshot.memory_bytes());
            self.cursor -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn state_with(value: u8) -> CanvasState {
        CanvasState::with_base("base", RgbaImage::from_pixel(2, 2, Rgba([value, 0, 0, 255])))
    }

    fn red(snap: &CanvasSnapshot) -> u8 {
        snap.layers[0].pixels.get_pixel(0, 0)[0]
    }

    #[test]
    fn empty_log_cannot_move() {
        let mut h = HistoryManager::new(0);
        assert_eq!(h.undo(), Err(HistoryError::NothingToUndo));
        assert_eq!(h.redo(), Err(HistoryError::NothingToRedo));
    }

    #[test]
    fn undo_and_redo_walk_the_cursor() {
        let mut h = HistoryManager::new(0);
        h.reset("Open", CanvasSnapshot::capture(&state_with(0)));
        h.commit("One", CanvasSnapshot::capture(&state_with(1)));
        h.commit("Two", CanvasSnapshot::capture(&state_with(2)));
        assert_eq!(h.undo_description(), Some("Two"));
        assert_eq!(red(&h.undo().unwrap()), 1);
        assert_eq!(red(&h.undo().unwrap()), 0);
        assert_eq!(h.undo(), Err(HistoryError::NothingToUndo));
        assert_eq!(red(&h.redo().unwrap()), 1);
        assert_eq!(red(&h.redo().unwrap()), 2);
        assert_eq!(h.redo(), Err(HistoryError::NothingToRedo));
    }

    #[test]
    fn commit_after_undo_prunes_redo_branch() {
        let mut h = HistoryManager::new(0);
        h.reset("Open", CanvasSnapshot::capture(&state_with(0)));
        h.commit("One", CanvasSnapshot::capture(&state_with(1)));
        h.commit("Two", CanvasSnapshot::capture(&state_with(2)));
        h.undo().unwrap();
        h.commit("Three", CanvasSnapshot::capture(&state_with(3)));
        assert_eq!(h.entry_count(), 3);
        assert_eq!(h.redo(), Err(HistoryError::NothingToRedo));
        assert_eq!(h.undo_history(), vec!["Three", "One", "Open"]);
    }

    #[test]
    fn restored_snapshots_are_independent() {
        let mut h = HistoryManager::new(0);
        h.reset("Open", CanvasSnapshot::capture(&state_with(0)));
        h.commit("One", CanvasSnapshot::capture(&state_with(1)));
        let mut a = h.undo().unwrap();
        a.layers[0].pixels.put_pixel(0, 0, Rgba([99, 0, 0, 255]));
        h.redo().unwrap();
        let b = h.undo().unwrap();
        assert_eq!(red(&b), 0);
    }

    #[test]
    fn limit_drops_oldest_and_shifts_cursor() {
        let mut h = HistoryManager::new(3);
        h.reset("Open", CanvasSnapshot::capture(&state_with(0)));
        for v in 1..=4 {
            h.commit(format!("Edit {v}"), CanvasSnapshot::capture(&state_with(v)));
        }
        assert_eq!(h.entry_count(), 3);
        assert_eq!(h.cursor(), 2);
        assert_eq!(red(&h.undo().unwrap()), 3);
        assert_eq!(red(&h.undo().unwrap()), 2);
        assert!(!h.can_undo());
    }

    #[test]
    fn memory_usage_tracks_entries() {
        let mut h = HistoryManager::new(0);
        let snap = CanvasSnapshot::capture(&state_with(0));
        let one = snap.memory_bytes();
        h.reset("Open", snap);
        h.commit("One", CanvasSnapshot::capture(&state_with(1)));
        assert_eq!(h.memory_usage(), one * 2);
        h.reset("Open", CanvasSnapshot::capture(&state_with(0)));
        assert_eq!(h.memory_usage(), one);
    }
}
