//! Pause State
//!
//! The slideshow's pause flag has exactly one writer (the edit coordinator)
//! and one or more readers (the scheduler, status snapshots). The split is
//! enforced by type: only [`PauseSwitch`] can change the flag.

use tokio::sync::watch;

/// Write side of the pause flag
#[derive(Debug)]
pub struct PauseSwitch {
    tx: watch::Sender<bool>,
}

/// Read side of the pause flag
#[derive(Clone, Debug)]
pub struct PauseReader {
    rx: watch::Receiver<bool>,
}

/// Create a pause flag, initially running (not paused)
#[must_use]
pub fn pause_channel() -> (PauseSwitch, PauseReader) {
    let (tx, rx) = watch::channel(false);
    (PauseSwitch { tx }, PauseReader { rx })
}

impl PauseSwitch {
    /// Set the flag; returns true if the value changed
    pub fn set(&self, paused: bool) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == paused {
                false
            } else {
                *current = paused;
                true
            }
        })
    }

    /// Current value
    #[must_use]
    pub fn is_paused(&self) -> bool {
        *self.tx.borrow()
    }

    /// Create another reader
    #[must_use]
    pub fn reader(&self) -> PauseReader {
        PauseReader {
            rx: self.tx.subscribe(),
        }
    }
}

impl PauseReader {
    /// Current value
    #[must_use]
    pub fn is_paused(&self) -> bool {
        *self.rx.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_switch_drives_readers() {
        let (switch, reader) = pause_channel();
        let other = switch.reader();
        assert!(!reader.is_paused());

        assert!(switch.set(true));
        assert!(reader.is_paused());
        assert!(other.is_paused());
        assert!(!switch.set(true));

        assert!(switch.set(false));
        assert!(!reader.is_paused());
    }
}
