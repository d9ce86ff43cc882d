//! Buffer Queue
//!
//! FIFO of admitted items waiting to be shown. No capacity bound and no
//! deduplication: while the slideshow is paused the queue keeps growing.
//! Push and pop both happen on the widget's single event loop, so insertion
//! order is display order.

use std::collections::VecDeque;

use crate::event::DisplayItem;

/// Pending display items in arrival order
#[derive(Debug, Default)]
pub struct BufferQueue {
    items: VecDeque<DisplayItem>,
    /// Total items ever pushed
    pushed: u64,
    /// Largest length observed
    peak_len: usize,
}

impl BufferQueue {
    /// Create an empty queue
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an item at the back
    pub fn push(&mut self, item: DisplayItem) {
        self.items.push_back(item);
        self.pushed += 1;
        if self.items.len() > self.peak_len {
            self.peak_len = self.items.len();
        }
    }

    /// Remove and return the oldest item
    pub fn pop_oldest(&mut self) -> Option<DisplayItem> {
        self.items.pop_front()
    }

    /// Look at the oldest item without removing it
    #[must_use]
    pub fn peek_oldest(&self) -> Option<&DisplayItem> {
        self.items.front()
    }

    /// Number of pending items
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether no items are pending
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Total items ever pushed
    #[must_use]
    pub fn total_pushed(&self) -> u64 {
        self.pushed
    }

    /// Largest length the queue has reached
    #[must_use]
    pub fn peak_len(&self) -> usize {
        self.peak_len
    }

    /// Iterate pending items oldest first
    pub fn iter(&self) -> impl Iterator<Item = &DisplayItem> {
        self.items.iter()
    }
}
