// Snapshot-based linear undo/redo over the auction state store.

use std::collections::VecDeque;

use super::state::AuctionSnapshot;

/// Maximum undo depth; the oldest snapshot is evicted beyond this.
pub const HISTORY_DEPTH: usize = 100;

/// Bounded undo/redo stacks of full-state snapshots.
///
/// Snapshots are deep copies (fully owned data), so nothing stored here
/// aliases the live state. Diff-based undo was rejected in favor of whole
/// snapshots: the mutation surface is small and the moderator needs exact
/// structural restoration.
#[derive(Debug, Default)]
pub struct History {
    undo_stack: VecDeque<AuctionSnapshot>,
    redo_stack: Vec<AuctionSnapshot>,
}

impl History {
    pub fn new() -> Self {
        History::default()
    }

    /// Record the pre-mutation snapshot of a successful operation.
    /// Evicts the oldest entry past [`HISTORY_DEPTH`] and clears redo.
    pub fn record(&mut self, snapshot: AuctionSnapshot) {
        self.undo_stack.push_back(snapshot);
        if self.undo_stack.len() > HISTORY_DEPTH {
            self.undo_stack.pop_front();
        }
        self.redo_stack.clear();
    }

    /// Pop the latest undo snapshot, exchanging it for the live one.
    /// Returns the snapshot the caller should apply, or `None` when the
    /// undo stack is empty (live state untouched).
    pub fn undo(&mut self, live: AuctionSnapshot) -> Option<AuctionSnapshot> {
        let previous = self.undo_stack.pop_back()?;
        self.redo_stack.push(live);
        Some(previous)
    }

    /// Mirror of [`History::undo`].
    pub fn redo(&mut self, live: AuctionSnapshot) -> Option<AuctionSnapshot> {
        let next = self.redo_stack.pop()?;
        self.undo_stack.push_back(live);
        Some(next)
    }

    /// Drop both stacks. Only an auction reset does this.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal distinguishable snapshot.
    fn snap(marker: usize) -> AuctionSnapshot {
        AuctionSnapshot {
            active_player_index: marker,
            selected_category: "ALL".into(),
            ..Default::default()
        }
    }

    #[test]
    fn undo_on_empty_stack_returns_none() {
        let mut history = History::new();
        assert!(history.undo(snap(0)).is_none());
        assert!(!history.can_undo());
    }

    #[test]
    fn undo_returns_recorded_snapshot_and_enables_redo() {
        let mut history = History::new();
        history.record(snap(1));

        let restored = history.undo(snap(2)).unwrap();
        assert_eq!(restored.active_player_index, 1);
        assert!(history.can_redo());

        let redone = history.redo(restored).unwrap();
        assert_eq!(redone.active_player_index, 2);
    }

    #[test]
    fn record_clears_redo_stack() {
        let mut history = History::new();
        history.record(snap(1));
        let _ = history.undo(snap(2));
        assert!(history.can_redo());

        history.record(snap(3));
        assert!(!history.can_redo());
    }

    #[test]
    fn undo_redo_symmetry() {
        // op, undo, redo must land back on the post-op state.
        let mut history = History::new();
        let before = snap(10);
        let after = snap(20);

        history.record(before.clone());
        let restored = history.undo(after.clone()).unwrap();
        assert_eq!(restored, before);
        let redone = history.redo(restored).unwrap();
        assert_eq!(redone, after);
    }

    #[test]
    fn depth_is_bounded_with_oldest_evicted() {
        let mut history = History::new();
        for i in 0..HISTORY_DEPTH + 10 {
            history.record(snap(i));
        }

        // Unwind everything; the deepest reachable snapshot is the one
        // recorded 100 steps ago, entries 0..=9 were evicted.
        let mut live = snap(usize::MAX);
        let mut last = None;
        while let Some(restored) = history.undo(live) {
            live = restored.clone();
            last = Some(restored);
        }
        assert_eq!(last.unwrap().active_player_index, 10);
    }

    #[test]
    fn clear_drops_both_stacks() {
        let mut history = History::new();
        history.record(snap(1));
        let _ = history.undo(snap(2));
        assert!(history.can_redo());

        history.clear();
        assert!(!history.can_undo());
        assert!(!history.can_redo());
    }
}
