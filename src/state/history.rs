/// Bounded undo history of full pixel snapshots
///
/// Geometry edits are destructive (they replace the RAW buffer), so undo keeps
/// the whole pre-edit image. Capacity eviction is FIFO: the oldest snapshot
/// goes first, and nothing is ever reordered.

use std::collections::VecDeque;

use crate::pixels::RawImage;

/// Snapshot of the authoritative image before a destructive edit
pub type UndoState = RawImage;

pub const DEFAULT_CAPACITY: usize = 10;

#[derive(Debug)]
pub struct UndoStack {
    entries: VecDeque<UndoState>,
    capacity: usize,
}

impl Default for UndoStack {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl UndoStack {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a snapshot, evicting the oldest when over capacity
    pub fn push(&mut self, snapshot: UndoState) {
        self.entries.push_back(snapshot);
        while self.entries.len() > self.capacity {
            if let Some(evicted) = self.entries.pop_front() {
                tracing::debug!(
                    "🗑️  Undo history full, dropped {}x{} snapshot",
                    evicted.width,
                    evicted.height
                );
            }
        }
    }

    /// Most recent snapshot, or `None` when empty
    pub fn pop(&mut self) -> Option<UndoState> {
        self.entries.pop_back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Oldest first
    pub fn iter(&self) -> impl Iterator<Item = &UndoState> {
        self.entries.iter()
    }

    /// Bytes held by all snapshots
    pub fn memory_usage(&self) -> usize {
        self.entries.iter().map(RawImage::byte_size).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(tag: u16) -> UndoState {
        RawImage::filled(2, 1, [tag, tag, tag, 65535])
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut stack = UndoStack::new(10);
        for i in 0..11 {
            stack.push(snapshot(i));
        }
        assert_eq!(stack.len(), 10);
        let tags: Vec<u16> = stack.iter().map(|s| s.data[0]).collect();
        assert_eq!(tags, (1..11).collect::<Vec<_>>());
    }

    #[test]
    fn test_pop_is_most_recent() {
        let mut stack = UndoStack::default();
        stack.push(snapshot(1));
        stack.push(snapshot(2));
        assert_eq!(stack.pop().map(|s| s.data[0]), Some(2));
        assert_eq!(stack.pop().map(|s| s.data[0]), Some(1));
        assert!(stack.pop().is_none());
    }

    #[test]
    fn test_memory_usage() {
        let mut stack = UndoStack::new(3);
        stack.push(snapshot(0));
        assert_eq!(stack.memory_usage(), 2 * 4 * 2);
    }
}
