//! Undo/redo functionality for reversing structural edits.
//!
//! History is kept as full snapshots of the playbook rather than inverse
//! actions. Each [`HistoryEntry`] owns its own copy of the graph, so later
//! edits to the live playbook can never reach back into stored history.

use crate::constants::MAX_UNDO_HISTORY;
use crate::types::Playbook;
use std::collections::VecDeque;

/// An immutable snapshot of the playbook at one point in the edit history.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    sequence: u64,
    playbook: Playbook,
}

impl HistoryEntry {
    /// Monotonic position of this snapshot in the session's history.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// The captured graph.
    pub fn playbook(&self) -> &Playbook {
        &self.playbook
    }
}

/// Bounded two-stack undo/redo history over playbook snapshots.
#[derive(Debug, Clone)]
pub struct History {
    /// Snapshots that can be restored by undo, oldest first
    undo_stack: VecDeque<HistoryEntry>,
    /// Snapshots that can be restored by redo, most recent last
    redo_stack: Vec<HistoryEntry>,
    /// The snapshot matching the live playbook
    current: HistoryEntry,
    max_depth: usize,
    next_sequence: u64,
}

impl Default for History {
    fn default() -> Self {
        Self::new(MAX_UNDO_HISTORY)
    }
}

impl History {
    /// Creates a history whose current entry is the empty playbook.
    ///
    /// # Arguments
    ///
    /// * `max_depth` - Maximum number of undo entries kept; the oldest are evicted beyond it.
    ///   A depth of zero is treated as one.
    pub fn new(max_depth: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            current: HistoryEntry {
                sequence: 0,
                playbook: Playbook::new(),
            },
            max_depth: max_depth.max(1),
            next_sequence: 1,
        }
    }

    /// Records a committed structural change.
    ///
    /// This clears the redo stack since a new edit invalidates any previously undone ones.
    ///
    /// # Arguments
    ///
    /// * `playbook` - The state of the playbook after the change
    pub fn push(&mut self, playbook: &Playbook) {
        let entry = HistoryEntry {
            sequence: self.next_sequence,
            playbook: playbook.clone(),
        };
        self.next_sequence += 1;

        let previous = std::mem::replace(&mut self.current, entry);
        self.undo_stack.push_back(previous);
        self.redo_stack.clear();

        while self.undo_stack.len() > self.max_depth {
            if let Some(evicted) = self.undo_stack.pop_front() {
                log::debug!("History full, evicted entry #{}", evicted.sequence);
            }
        }
    }

    /// Steps back one entry.
    ///
    /// # Returns
    ///
    /// The playbook to restore, or `None` if there is nothing to undo.
    pub fn undo(&mut self) -> Option<Playbook> {
        let entry = self.undo_stack.pop_back()?;
        let previous = std::mem::replace(&mut self.current, entry);
        self.redo_stack.push(previous);
        Some(self.current.playbook.clone())
    }

    /// Steps forward one entry.
    ///
    /// # Returns
    ///
    /// The playbook to restore, or `None` if there is nothing to redo.
    pub fn redo(&mut self) -> Option<Playbook> {
        let entry = self.redo_stack.pop()?;
        let previous = std::mem::replace(&mut self.current, entry);
        self.undo_stack.push_back(previous);
        Some(self.current.playbook.clone())
    }

    /// Returns true if there are entries that can be undone.
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// Returns true if there are entries that can be redone.
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Number of entries available to undo.
    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    /// The entry matching the live playbook.
    pub fn current(&self) -> &HistoryEntry {
        &self.current
    }

    /// Drops all undo/redo entries and makes `playbook` the new baseline.
    pub fn reset(&mut self, playbook: &Playbook) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.current = HistoryEntry {
            sequence: self.next_sequence,
            playbook: playbook.clone(),
        };
        self.next_sequence += 1;
    }
}
