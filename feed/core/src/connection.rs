//! Feed Connection
//!
//! Keeps exactly one server-push connection open per widget and turns its
//! messages into display items.
//!
//! # Connection State Machine
//!
//! ```text
//!            handshake ok              transport error / stream end
//! Connecting ────────────▶ Open ─────────────────────────────▶ Erroring
//!     ▲                                                            │
//!     └──────────────── fixed reconnect delay (1 s) ───────────────┘
//!
//! any state ── close() / handle dropped ──▶ Closed
//! ```
//!
//! There is no retry limit and no exponential backoff.
//!
//! # Message Handling
//!
//! 1. Parse JSON; malformed payloads are dropped.
//! 2. Record `concurrentRequests` as the load metric, whether or not the
//!    event is later filtered.
//! 3. Run the content filter; admitted events with renderable content are
//!    forwarded to the widget and counted.
//!
//! # Shared Status
//!
//! Connection state, the last load metric and the item counter are published
//! on a `watch` channel. The connection task owns the only sender; any number
//! of readers can subscribe through [`FeedHandle::status`].

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use url::Url;

use crate::event::{DisplayItem, FeedEvent, FeedKind};
use crate::filter::{ContentFilter, FilterVerdict};
use crate::transport::{FeedFrame, FeedTransport};

/// Delay between a failed connection and the next attempt
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(1000);

// ============================================================================
// Status
// ============================================================================

/// Lifecycle of the push connection
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Opening a connection
    #[default]
    Connecting,
    /// Connected and receiving
    Open,
    /// Connection failed; waiting to reconnect
    Erroring,
    /// Torn down by the owner
    Closed,
}

impl ConnectionState {
    /// Short label for status lines
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Erroring => "erroring",
            Self::Closed => "closed",
        }
    }
}

/// Snapshot of feed telemetry
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedStatus {
    /// Current connection state
    pub state: ConnectionState,
    /// Last `concurrentRequests` value seen on any event
    pub last_load: Option<u32>,
    /// Admitted items forwarded to the widget
    pub items_generated: u64,
    /// Connection attempts made so far
    pub connection_attempts: u64,
}

// ============================================================================
// Message Ingest
// ============================================================================

/// What happened to one inbound message
#[derive(Clone, Debug, PartialEq)]
pub enum IngestOutcome {
    /// Payload was not a JSON object
    Malformed,
    /// Rejected by the content filter
    Filtered(FilterVerdict),
    /// Admitted but carries nothing renderable for this feed kind
    NoContent,
    /// Ready for the buffer queue
    Admitted(DisplayItem),
}

/// Result of ingesting one message
#[derive(Clone, Debug, PartialEq)]
pub struct Ingested {
    /// Load metric carried by the message, if any
    pub load: Option<u32>,
    /// Disposition of the message
    pub outcome: IngestOutcome,
}

/// Turns raw message payloads into display items
#[derive(Clone, Debug)]
pub struct FeedIngest {
    kind: FeedKind,
    filter: ContentFilter,
}

impl FeedIngest {
    /// Create an ingest stage for a feed kind
    #[must_use]
    pub fn new(kind: FeedKind, filter: ContentFilter) -> Self {
        Self { kind, filter }
    }

    /// Feed kind this stage produces items for
    #[must_use]
    pub fn kind(&self) -> FeedKind {
        self.kind
    }

    /// Process one message payload
    #[must_use]
    pub fn ingest(&self, data: &str) -> Ingested {
        let event = match FeedEvent::parse(data) {
            Ok(event) => event,
            Err(e) => {
                tracing::debug!(error = %e, "Dropping malformed feed message");
                return Ingested {
                    load: None,
                    outcome: IngestOutcome::Malformed,
                };
            }
        };

        let load = event.concurrent_requests;

        if !self.filter.admit(&event) {
            return Ingested {
                load,
                outcome: IngestOutcome::Filtered(self.filter.check(&event)),
            };
        }

        let outcome = match DisplayItem::from_event(&event, self.kind) {
            Some(item) => IngestOutcome::Admitted(item),
            None => IngestOutcome::NoContent,
        };
        Ingested { load, outcome }
    }
}

// ============================================================================
// Connection
// ============================================================================

/// Handle to a running feed connection
///
/// Dropping the handle tears the connection down.
pub struct FeedHandle {
    status: watch::Receiver<FeedStatus>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl FeedHandle {
    /// Subscribe to feed status updates
    #[must_use]
    pub fn status(&self) -> watch::Receiver<FeedStatus> {
        self.status.clone()
    }

    /// Current status snapshot
    #[must_use]
    pub fn current_status(&self) -> FeedStatus {
        self.status.borrow().clone()
    }

    /// Close the connection and wait for the task to finish
    pub async fn close(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Feed connection task failed");
            }
        }
    }
}

impl Drop for FeedHandle {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

/// Outcome of waiting on the next frame
enum Step {
    Shutdown,
    Frame(Option<FeedFrame>),
}

/// Opens and maintains the push connection
pub struct FeedConnection {
    url: Url,
    transport: Arc<dyn FeedTransport>,
    ingest: FeedIngest,
    reconnect_delay: Duration,
}

impl FeedConnection {
    /// Create a connection (not yet opened)
    #[must_use]
    pub fn new(url: Url, transport: Arc<dyn FeedTransport>, ingest: FeedIngest) -> Self {
        Self {
            url,
            transport,
            ingest,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }

    /// Override the reconnect delay
    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Start the connection task
    ///
    /// Admitted items are sent on `items` in arrival order. The task runs
    /// until the handle is closed or dropped, or `items` is closed.
    #[must_use]
    pub fn open(self, items: mpsc::UnboundedSender<DisplayItem>) -> FeedHandle {
        let (status_tx, status_rx) = watch::channel(FeedStatus::default());
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let task = tokio::spawn(self.run(items, status_tx, shutdown_rx));

        FeedHandle {
            status: status_rx,
            shutdown: Some(shutdown_tx),
            task: Some(task),
        }
    }

    async fn run(
        self,
        items: mpsc::UnboundedSender<DisplayItem>,
        status: watch::Sender<FeedStatus>,
        mut shutdown: oneshot::Receiver<()>,
    ) {
        tracing::info!(
            url = %self.url,
            transport = self.transport.name(),
            kind = %self.ingest.kind(),
            "Feed connection starting"
        );

        'connect: loop {
            status.send_modify(|s| {
                s.state = ConnectionState::Connecting;
                s.connection_attempts += 1;
            });

            let opened = tokio::select! {
                _ = &mut shutdown => break 'connect,
                opened = self.transport.open(&self.url) => opened,
            };

            match opened {
                Ok(mut frames) => {
                    status.send_modify(|s| s.state = ConnectionState::Open);
                    tracing::info!(url = %self.url, "Feed connected");

                    loop {
                        let step = tokio::select! {
                            _ = &mut shutdown => Step::Shutdown,
                            frame = frames.recv() => Step::Frame(frame),
                        };

                        match step {
                            Step::Shutdown => break 'connect,
                            Step::Frame(Some(FeedFrame::Message(data))) => {
                                if !self.handle_message(&data, &items, &status) {
                                    tracing::debug!("Item receiver dropped, stopping feed");
                                    break 'connect;
                                }
                            }
                            Step::Frame(Some(FeedFrame::Error(e))) => {
                                tracing::warn!(error = %e, "Feed stream error");
                                break;
                            }
                            Step::Frame(None) => {
                                tracing::warn!("Feed stream ended");
                                break;
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, url = %self.url, "Feed connection failed");
                }
            }

            status.send_modify(|s| s.state = ConnectionState::Erroring);

            // Flat reconnect backoff, retried forever
            tokio::select! {
                _ = &mut shutdown => break 'connect,
                () = tokio::time::sleep(self.reconnect_delay) => {}
            }
        }

        status.send_modify(|s| s.state = ConnectionState::Closed);
        tracing::info!(url = %self.url, "Feed connection closed");
    }

    /// Returns false once the item receiver is gone
    fn handle_message(
        &self,
        data: &str,
        items: &mpsc::UnboundedSender<DisplayItem>,
        status: &watch::Sender<FeedStatus>,
    ) -> bool {
        let ingested = self.ingest.ingest(data);

        if let Some(load) = ingested.load {
            status.send_modify(|s| s.last_load = Some(load));
        }

        if let IngestOutcome::Admitted(item) = ingested.outcome {
            if items.send(item).is_err() {
                return false;
            }
            status.send_modify(|s| s.items_generated += 1);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{ScriptedTransport, Session};

    fn feed_url() -> Url {
        Url::parse("http://feed.test/feed").unwrap()
    }

    fn ingest() -> FeedIngest {
        FeedIngest::new(FeedKind::Image, ContentFilter::default())
    }

    fn message(json: &str) -> FeedFrame {
        FeedFrame::Message(json.to_string())
    }

    #[test]
    fn test_ingest_reports_load_for_filtered_events() {
        let result = ingest().ingest(
            r#"{"imageURL":"b.png","prompt":"y","concurrentRequests":5,"nsfw":true}"#,
        );
        assert_eq!(result.load, Some(5));
        assert_eq!(
            result.outcome,
            IngestOutcome::Filtered(FilterVerdict::FlaggedUnsafe)
        );
    }

    #[test]
    fn test_ingest_malformed() {
        let result = ingest().ingest("{oops");
        assert_eq!(result.load, None);
        assert_eq!(result.outcome, IngestOutcome::Malformed);
    }

    #[test]
    fn test_ingest_tolerates_misshapen_parameters() {
        let result = ingest().ingest(
            r#"{"imageURL":"a.png","prompt":"a fox","parameters":{"messages":"hi"},"concurrentRequests":4}"#,
        );
        assert_eq!(result.load, Some(4));
        assert!(matches!(result.outcome, IngestOutcome::Admitted(ref item) if item.prompt == "a fox"));

        let result = ingest().ingest(
            r#"{"imageURL":"b.png","prompt":"a cat","parameters":"flux","concurrentRequests":6}"#,
        );
        assert_eq!(result.load, Some(6));
        assert!(matches!(result.outcome, IngestOutcome::Admitted(_)));
    }

    #[test]
    fn test_ingest_gate_matches_filter_admit() {
        let filter = ContentFilter::default();
        let stage = FeedIngest::new(FeedKind::Image, filter.clone());
        for raw in [
            r#"{"imageURL":"a.png","prompt":"a fox"}"#,
            r#"{"imageURL":"a.png","prompt":"NSFW fox"}"#,
            r#"{"imageURL":"a.png","prompt":"a fox","nsfw":1}"#,
            r#"{"imageURL":"a.png"}"#,
        ] {
            let event = FeedEvent::parse(raw).unwrap();
            let passed = !matches!(stage.ingest(raw).outcome, IngestOutcome::Filtered(_));
            assert_eq!(passed, filter.admit(&event), "{raw}");
        }
    }

    #[test]
    fn test_ingest_without_renderable_content() {
        let result = ingest().ingest(r#"{"response":"text","prompt":"x","concurrentRequests":2}"#);
        assert_eq!(result.load, Some(2));
        assert_eq!(result.outcome, IngestOutcome::NoContent);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scenario_filters_and_tracks_load() {
        let transport = Arc::new(ScriptedTransport::new([
            Session::Frames(vec![
                message(r#"{"imageURL":"a.png","prompt":"x","concurrentRequests":2}"#),
                message(r#"{"imageURL":"b.png","prompt":"y","concurrentRequests":5,"nsfw":true}"#),
                message("not json"),
                message(r#"{"imageURL":"c.png","prompt":"z","concurrentRequests":1}"#),
            ]),
            Session::Live,
        ]));

        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = FeedConnection::new(feed_url(), transport.clone(), ingest()).open(tx);

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.url.as_deref(), Some("a.png"));
        assert_eq!(second.url.as_deref(), Some("c.png"));

        let mut status = handle.status();
        let status = status
            .wait_for(|s| s.state == ConnectionState::Open && s.connection_attempts == 2)
            .await
            .unwrap()
            .clone();
        assert_eq!(status.last_load, Some(1));
        assert_eq!(status.items_generated, 2);
        assert!(rx.try_recv().is_err());

        handle.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnects_after_fixed_delay() {
        let transport = Arc::new(ScriptedTransport::new([
            Session::Refuse,
            Session::Frames(vec![]),
            Session::Refuse,
            Session::Live,
        ]));

        let (tx, _rx) = mpsc::unbounded_channel();
        let started = tokio::time::Instant::now();
        let handle = FeedConnection::new(feed_url(), transport.clone(), ingest()).open(tx);

        let mut status = handle.status();
        status
            .wait_for(|s| s.state == ConnectionState::Open && s.connection_attempts == 4)
            .await
            .unwrap();

        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(3000), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_millis(3100), "elapsed {elapsed:?}");
        assert_eq!(transport.attempts(), 4);
        assert!(transport.opened_urls().iter().all(|u| *u == feed_url()));

        handle.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_marks_closed_and_stops_reconnecting() {
        let transport = Arc::new(ScriptedTransport::new([]));
        let (tx, _rx) = mpsc::unbounded_channel();
        let handle = FeedConnection::new(feed_url(), transport.clone(), ingest()).open(tx);

        let mut status = handle.status();
        status
            .wait_for(|s| s.connection_attempts >= 2)
            .await
            .unwrap();

        handle.close().await;
        assert_eq!(status.borrow().state, ConnectionState::Closed);

        let attempts = transport.attempts();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(transport.attempts(), attempts);
    }
}
