//! Slideshow Scheduler
//!
//! Advances the displayed item on a fixed timer, independent of when feed
//! items arrive.
//!
//! On each tick:
//! - paused: nothing happens
//! - running, queue empty: nothing happens, the current item stays
//! - running, queue non-empty: the oldest item is popped and shown at once as
//!   a tentative (unloaded) current item, and a preload request is returned
//!   for the caller to run
//!
//! When the preload resolves, the loaded version replaces the tentative one,
//! but only if that tentative item is still current and the slideshow is not
//! paused. A failed preload leaves the tentative item in place; the next tick
//! moves on to the next queued item.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::PreloadError;
use crate::event::DisplayItem;
use crate::pause::PauseReader;
use crate::queue::BufferQueue;

/// Default time between slides
pub const DEFAULT_SLIDE_INTERVAL: Duration = Duration::from_millis(3000);

// ============================================================================
// Display Slot
// ============================================================================

/// The "current displayed item"
///
/// Every time a new item is shown the slot's epoch increases. Late preload
/// results compare against the epoch they were issued for.
#[derive(Debug, Default)]
pub struct DisplaySlot {
    current: Option<DisplayItem>,
    epoch: u64,
}

impl DisplaySlot {
    /// Create an empty slot
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The item on display
    #[must_use]
    pub fn current(&self) -> Option<&DisplayItem> {
        self.current.as_ref()
    }

    /// Epoch of the item on display
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Put a new item on display, returning its epoch
    pub fn show(&mut self, item: DisplayItem) -> u64 {
        self.epoch += 1;
        self.current = Some(item);
        self.epoch
    }

    /// Replace the item shown at `epoch` with a newer version of itself
    ///
    /// Returns false if something else has been shown since.
    pub fn refresh(&mut self, epoch: u64, item: DisplayItem) -> bool {
        if self.epoch != epoch {
            return false;
        }
        self.current = Some(item);
        true
    }
}

// ============================================================================
// Scheduler
// ============================================================================

/// Scheduler state derived from the pause flag
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulerState {
    /// Advancing on each tick
    Running,
    /// Ticks are ignored
    Paused,
}

/// Identifies the tentative item a slideshow preload belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlideTicket {
    /// Display epoch of the tentative item
    pub epoch: u64,
}

/// A preload the caller must run for the scheduler
#[derive(Clone, Debug)]
pub struct SlideRequest {
    /// Ticket to hand back with the result
    pub ticket: SlideTicket,
    /// Item to preload
    pub item: DisplayItem,
}

/// Slideshow counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideStats {
    /// Ticks received
    pub ticks: u64,
    /// Items popped and shown
    pub promoted: u64,
    /// Preloads that replaced their tentative item
    pub loaded: u64,
    /// Preloads that failed
    pub failed: u64,
    /// Preload results discarded as stale
    pub stale: u64,
}

/// Timer-driven slideshow
#[derive(Debug)]
pub struct SlideshowScheduler {
    pause: PauseReader,
    stats: SlideStats,
}

impl SlideshowScheduler {
    /// Create a scheduler reading the given pause flag
    #[must_use]
    pub fn new(pause: PauseReader) -> Self {
        Self {
            pause,
            stats: SlideStats::default(),
        }
    }

    /// Running or paused
    #[must_use]
    pub fn state(&self) -> SchedulerState {
        if self.pause.is_paused() {
            SchedulerState::Paused
        } else {
            SchedulerState::Running
        }
    }

    /// Counters
    #[must_use]
    pub fn stats(&self) -> SlideStats {
        self.stats
    }

    /// Handle one timer tick
    ///
    /// Pops at most one item.
    pub fn tick(&mut self, queue: &mut BufferQueue, slot: &mut DisplaySlot) -> Option<SlideRequest> {
        self.stats.ticks += 1;

        if self.pause.is_paused() {
            tracing::trace!(pending = queue.len(), "Slideshow paused, tick ignored");
            return None;
        }

        let item = queue.pop_oldest()?;
        let epoch = slot.show(item.clone());
        self.stats.promoted += 1;

        tracing::debug!(
            item = %item.id,
            epoch,
            pending = queue.len(),
            "Slide promoted"
        );

        Some(SlideRequest {
            ticket: SlideTicket { epoch },
            item,
        })
    }

    /// Handle a finished slideshow preload
    ///
    /// Returns true if the loaded item replaced the tentative one.
    pub fn on_preloaded(
        &mut self,
        ticket: SlideTicket,
        result: Result<DisplayItem, PreloadError>,
        slot: &mut DisplaySlot,
    ) -> bool {
        match result {
            Ok(item) => {
                if self.pause.is_paused() {
                    self.stats.stale += 1;
                    tracing::debug!(item = %item.id, "Slideshow paused, discarding preload");
                    return false;
                }
                let item_id = item.id;
                if slot.refresh(ticket.epoch, item) {
                    self.stats.loaded += 1;
                    true
                } else {
                    self.stats.stale += 1;
                    tracing::debug!(item = %item_id, "Slide superseded, discarding preload");
                    false
                }
            }
            Err(e) => {
                self.stats.failed += 1;
                tracing::warn!(error = %e, epoch = ticket.epoch, "Slide preload failed, keeping tentative item");
                false
            }
        }
    }
}
