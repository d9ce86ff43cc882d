//! Scripted Transport
//!
//! In-memory `FeedTransport` that plays back a queue of prepared sessions.
//! Used by tests and demos to drive the feed connection without a network.
//!
//! Each call to `open` consumes the next scripted session:
//! - `Session::Refuse` fails the handshake
//! - `Session::Frames` opens and delivers the frames, then ends the stream
//! - `Session::Live` opens and hands the frame sender to the caller via
//!   `live_sender`, so a test can push frames at chosen times
//!
//! Once the script is exhausted every further `open` is refused.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use url::Url;

use super::traits::{FeedFrame, FeedTransport};
use crate::error::FeedError;

/// One scripted connection attempt
#[derive(Clone, Debug)]
pub enum Session {
    /// Handshake fails
    Refuse,
    /// Deliver these frames then close
    Frames(Vec<FeedFrame>),
    /// Stay open; frames are pushed through the sender from `live_sender`
    Live,
}

#[derive(Default)]
struct ScriptState {
    sessions: VecDeque<Session>,
    live: VecDeque<mpsc::Sender<FeedFrame>>,
    opened_urls: Vec<Url>,
}

/// Playback transport for tests
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    state: Arc<Mutex<ScriptState>>,
    attempts: Arc<AtomicUsize>,
}

impl ScriptedTransport {
    /// Create a transport with the given sessions
    #[must_use]
    pub fn new(sessions: impl IntoIterator<Item = Session>) -> Self {
        let transport = Self::default();
        transport.extend(sessions);
        transport
    }

    /// Append more sessions to the script
    pub fn extend(&self, sessions: impl IntoIterator<Item = Session>) {
        self.state.lock().sessions.extend(sessions);
    }

    /// Number of `open` calls so far
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// URLs passed to `open`, in order
    #[must_use]
    pub fn opened_urls(&self) -> Vec<Url> {
        self.state.lock().opened_urls.clone()
    }

    /// Take the sender of the oldest open `Session::Live` connection
    #[must_use]
    pub fn live_sender(&self) -> Option<mpsc::Sender<FeedFrame>> {
        self.state.lock().live.pop_front()
    }
}

#[async_trait]
impl FeedTransport for ScriptedTransport {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn open(&self, url: &Url) -> Result<mpsc::Receiver<FeedFrame>, FeedError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let mut state = self.state.lock();
        state.opened_urls.push(url.clone());

        match state.sessions.pop_front() {
            None | Some(Session::Refuse) => {
                Err(FeedError::ConnectionFailed("scripted refusal".to_string()))
            }
            Some(Session::Frames(frames)) => {
                let (tx, rx) = mpsc::channel(frames.len().max(1));
                for frame in frames {
                    // Capacity equals the frame count, so this never fails
                    let _ = tx.try_send(frame);
                }
                Ok(rx)
            }
            Some(Session::Live) => {
                let (tx, rx) = mpsc::channel(64);
                state.live.push_back(tx);
                Ok(rx)
            }
        }
    }
}
