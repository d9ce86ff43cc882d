//! Feed Widget
//!
//! One widget = one feed connection, one buffer queue, one slideshow and one
//! edit coordinator, all owned by a single tokio task.
//!
//! # Design Philosophy
//!
//! Everything that touches widget state runs on that task, one event at a
//! time. Feed arrivals, timer ticks, user commands and preload completions
//! are all channel receives in one `select!` loop, so there is no locking
//! and no interleaving inside a handler. Preloads are the only work that
//! leaves the loop; they run in a `JoinSet` owned by the widget, carrying the
//! ticket or token they were issued with, and are aborted when it stops.
//!
//! ```text
//!  FeedConnection ──items──┐
//!  WidgetHandle ──commands─┤
//!  interval ──────ticks────┼──► widget task ──► watch<WidgetSnapshot>
//!  preload tasks ──done────┤        │
//!  feed status ──changed───┘        └──spawn──► Preloader
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{AbortHandle, JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};
use url::Url;

use crate::connection::{FeedConnection, FeedIngest, FeedStatus, DEFAULT_RECONNECT_DELAY};
use crate::edit::{EditCoordinator, EditStatus, EditToken};
use crate::error::{FeedError, PreloadError};
use crate::event::{DisplayItem, FeedKind};
use crate::filter::ContentFilter;
use crate::params::{GenerationParams, ParamUpdate, RequestUrlBuilder};
use crate::pause::pause_channel;
use crate::preload::Preloader;
use crate::queue::BufferQueue;
use crate::scheduler::{
    DisplaySlot, SlideRequest, SlideStats, SlideTicket, SlideshowScheduler,
    DEFAULT_SLIDE_INTERVAL,
};
use crate::transport::FeedTransport;

/// Shortest slide interval a widget will run with
pub const MIN_SLIDE_INTERVAL: Duration = Duration::from_millis(1);

// ============================================================================
// Configuration
// ============================================================================

/// Everything needed to start a widget
#[derive(Clone, Debug)]
pub struct WidgetConfig {
    /// Which feed to consume
    pub kind: FeedKind,
    /// Push stream URL
    pub feed_url: Url,
    /// Time between slides
    pub slide_interval: Duration,
    /// Delay before reconnecting a failed feed
    pub reconnect_delay: Duration,
    /// Content filter applied to every event
    pub filter: ContentFilter,
    /// Request URL construction for edits
    pub urls: RequestUrlBuilder,
    /// Initial edit candidate
    pub params: GenerationParams,
}

impl WidgetConfig {
    /// Default settings for a feed
    #[must_use]
    pub fn new(kind: FeedKind, feed_url: Url) -> Self {
        Self {
            kind,
            feed_url,
            slide_interval: DEFAULT_SLIDE_INTERVAL,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            filter: ContentFilter::default(),
            urls: RequestUrlBuilder::default(),
            params: GenerationParams::default(),
        }
    }

    /// Set the slide interval (at least [`MIN_SLIDE_INTERVAL`])
    #[must_use]
    pub fn with_slide_interval(mut self, interval: Duration) -> Self {
        self.slide_interval = interval.max(MIN_SLIDE_INTERVAL);
        self
    }

    /// Set the reconnect delay
    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Set the content filter
    #[must_use]
    pub fn with_filter(mut self, filter: ContentFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Set the request URL builder
    #[must_use]
    pub fn with_urls(mut self, urls: RequestUrlBuilder) -> Self {
        self.urls = urls;
        self
    }

    /// Set the initial edit candidate
    #[must_use]
    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }
}

// ============================================================================
// Snapshot
// ============================================================================

/// What the UI renders
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WidgetSnapshot {
    /// Feed kind
    pub kind: FeedKind,
    /// Item on display
    pub current: Option<DisplayItem>,
    /// Items waiting in the buffer queue
    pub queue_len: usize,
    /// Largest queue length seen
    pub peak_queue_len: usize,
    /// Slideshow paused (edit mode)
    pub paused: bool,
    /// Progress of the latest edit
    pub edit: EditStatus,
    /// Live edit candidate
    pub params: GenerationParams,
    /// Feed telemetry
    pub feed: FeedStatus,
    /// Slideshow counters
    pub slides: SlideStats,
}

// ============================================================================
// Handle
// ============================================================================

enum Command {
    UpdateParam(ParamUpdate),
    SetParam {
        name: String,
        value: String,
        reply: oneshot::Sender<Result<(), FeedError>>,
    },
    BeginEdit {
        reply: oneshot::Sender<bool>,
    },
    Submit {
        reply: oneshot::Sender<Result<Url, FeedError>>,
    },
    Cancel,
    Resume,
    Shutdown,
}

/// Handle to a running widget
///
/// Dropping every handle shuts the widget down.
pub struct WidgetHandle {
    commands: mpsc::UnboundedSender<Command>,
    snapshot: watch::Receiver<WidgetSnapshot>,
    task: JoinHandle<()>,
}

impl WidgetHandle {
    fn send(&self, command: Command) -> Result<(), FeedError> {
        self.commands
            .send(command)
            .map_err(|_| FeedError::WidgetClosed)
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, FeedError> {
        let (tx, rx) = oneshot::channel();
        self.send(make(tx))?;
        rx.await.map_err(|_| FeedError::WidgetClosed)
    }

    /// Subscribe to snapshots
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<WidgetSnapshot> {
        self.snapshot.clone()
    }

    /// Latest snapshot
    #[must_use]
    pub fn snapshot(&self) -> WidgetSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Pause and merge a typed parameter edit
    ///
    /// # Errors
    ///
    /// Returns `FeedError::WidgetClosed` if the widget has stopped.
    pub fn update_param(&self, update: ParamUpdate) -> Result<(), FeedError> {
        self.send(Command::UpdateParam(update))
    }

    /// Pause and merge a by-name parameter edit
    ///
    /// # Errors
    ///
    /// Returns the parse error for a bad name or value, or
    /// `FeedError::WidgetClosed`.
    pub async fn set_param(&self, name: &str, value: &str) -> Result<(), FeedError> {
        let (name, value) = (name.to_string(), value.to_string());
        self.request(|reply| Command::SetParam { name, value, reply })
            .await?
    }

    /// Start editing the item on display
    ///
    /// Returns false if nothing is on display yet.
    ///
    /// # Errors
    ///
    /// Returns `FeedError::WidgetClosed` if the widget has stopped.
    pub async fn begin_edit(&self) -> Result<bool, FeedError> {
        self.request(|reply| Command::BeginEdit { reply }).await
    }

    /// Submit the edit candidate, returning the request URL
    ///
    /// # Errors
    ///
    /// Returns `FeedError::EmptyPrompt` or `FeedError::WidgetClosed`.
    pub async fn submit(&self) -> Result<Url, FeedError> {
        self.request(|reply| Command::Submit { reply }).await?
    }

    /// Cancel the pending edit
    ///
    /// # Errors
    ///
    /// Returns `FeedError::WidgetClosed` if the widget has stopped.
    pub fn cancel(&self) -> Result<(), FeedError> {
        self.send(Command::Cancel)
    }

    /// Leave edit mode and resume the slideshow
    ///
    /// # Errors
    ///
    /// Returns `FeedError::WidgetClosed` if the widget has stopped.
    pub fn resume(&self) -> Result<(), FeedError> {
        self.send(Command::Resume)
    }

    /// Stop the widget and close its feed connection
    pub async fn shutdown(self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "Widget task failed");
        }
    }
}

// ============================================================================
// Widget Task
// ============================================================================

enum PreloadDone {
    Slide(SlideTicket, Result<DisplayItem, PreloadError>),
    Edit(EditToken, Result<DisplayItem, PreloadError>),
}

/// The widget event loop
pub struct FeedWidget {
    kind: FeedKind,
    queue: BufferQueue,
    slot: DisplaySlot,
    scheduler: SlideshowScheduler,
    editor: EditCoordinator,
    preloader: Arc<dyn Preloader>,
    preloads: JoinSet<PreloadDone>,
    edit_task: Option<AbortHandle>,
    feed: FeedStatus,
}

impl FeedWidget {
    /// Start a widget on the current runtime
    #[must_use]
    pub fn spawn(
        config: WidgetConfig,
        transport: Arc<dyn FeedTransport>,
        preloader: Arc<dyn Preloader>,
    ) -> WidgetHandle {
        let (items_tx, items_rx) = mpsc::unbounded_channel();
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();

        let (switch, reader) = pause_channel();
        let editor = EditCoordinator::new(config.kind, config.urls, switch).with_params(config.params);

        let feed = FeedConnection::new(
            config.feed_url,
            transport,
            FeedIngest::new(config.kind, config.filter),
        )
        .with_reconnect_delay(config.reconnect_delay)
        .open(items_tx);

        let widget = Self {
            kind: config.kind,
            queue: BufferQueue::new(),
            slot: DisplaySlot::new(),
            scheduler: SlideshowScheduler::new(reader),
            editor,
            preloader,
            preloads: JoinSet::new(),
            edit_task: None,
            feed: feed.current_status(),
        };

        let interval = if config.slide_interval < MIN_SLIDE_INTERVAL {
            tracing::warn!(
                requested = ?config.slide_interval,
                "Slide interval too short, using minimum"
            );
            MIN_SLIDE_INTERVAL
        } else {
            config.slide_interval
        };

        let (snapshot_tx, snapshot_rx) = watch::channel(widget.snapshot());

        let task = tokio::spawn(widget.run(feed, interval, items_rx, commands_rx, snapshot_tx));

        WidgetHandle {
            commands: commands_tx,
            snapshot: snapshot_rx,
            task,
        }
    }

    async fn run(
        mut self,
        feed: crate::connection::FeedHandle,
        interval: Duration,
        mut items: mpsc::UnboundedReceiver<DisplayItem>,
        mut commands: mpsc::UnboundedReceiver<Command>,
        snapshot: watch::Sender<WidgetSnapshot>,
    ) {
        let mut feed_status = feed.status();
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(kind = %self.kind, interval = ?interval, "Widget started");

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    None | Some(Command::Shutdown) => break,
                    Some(command) => self.handle_command(command),
                },
                Some(item) = items.recv() => {
                    tracing::trace!(item = %item.id, "Item queued");
                    self.queue.push(item);
                }
                Some(joined) = self.preloads.join_next() => match joined {
                    Ok(done) => self.handle_preloaded(done),
                    Err(e) if e.is_cancelled() => {}
                    Err(e) => tracing::warn!(error = %e, "Preload task failed"),
                },
                _ = ticker.tick() => self.handle_tick(),
                Ok(()) = feed_status.changed() => {
                    self.feed = feed_status.borrow_and_update().clone();
                }
            }

            let next = self.snapshot();
            snapshot.send_if_modified(|current| {
                if *current == next {
                    false
                } else {
                    *current = next;
                    true
                }
            });
        }

        self.edit_task = None;
        self.preloads.shutdown().await;
        feed.close().await;
        self.feed = feed_status.borrow().clone();
        snapshot.send_replace(self.snapshot());

        tracing::info!(kind = %self.kind, "Widget stopped");
    }

    fn snapshot(&self) -> WidgetSnapshot {
        WidgetSnapshot {
            kind: self.kind,
            current: self.slot.current().cloned(),
            queue_len: self.queue.len(),
            peak_queue_len: self.queue.peak_len(),
            paused: self.editor.is_paused(),
            edit: self.editor.status().clone(),
            params: self.editor.params().clone(),
            feed: self.feed.clone(),
            slides: self.scheduler.stats(),
        }
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::UpdateParam(update) => self.editor.update_param(update),
            Command::SetParam { name, value, reply } => {
                let _ = reply.send(self.editor.update_param_named(&name, &value));
            }
            Command::BeginEdit { reply } => {
                let started = match self.slot.current() {
                    Some(item) => {
                        self.editor.begin_edit(item);
                        true
                    }
                    None => false,
                };
                let _ = reply.send(started);
            }
            Command::Submit { reply } => {
                let _ = reply.send(self.submit_edit());
            }
            Command::Cancel => {
                self.editor.cancel();
                self.abort_edit_task();
            }
            Command::Resume => {
                self.editor.resume();
                self.abort_edit_task();
            }
            Command::Shutdown => {}
        }
    }

    fn submit_edit(&mut self) -> Result<Url, FeedError> {
        let request = self.editor.submit()?;
        self.abort_edit_task();

        let preloader = Arc::clone(&self.preloader);
        let token = request.token;
        let item = request.item;
        self.edit_task = Some(self.preloads.spawn(async move {
            PreloadDone::Edit(token, preloader.preload(item).await)
        }));

        Ok(request.url)
    }

    fn abort_edit_task(&mut self) {
        if let Some(task) = self.edit_task.take() {
            task.abort();
        }
    }

    fn handle_tick(&mut self) {
        let Some(SlideRequest { ticket, item }) = self.scheduler.tick(&mut self.queue, &mut self.slot)
        else {
            return;
        };

        let preloader = Arc::clone(&self.preloader);
        self.preloads.spawn(async move {
            PreloadDone::Slide(ticket, preloader.preload(item).await)
        });
    }

    fn handle_preloaded(&mut self, result: PreloadDone) {
        match result {
            PreloadDone::Slide(ticket, result) => {
                self.scheduler.on_preloaded(ticket, result, &mut self.slot);
            }
            PreloadDone::Edit(token, result) => {
                if let Some(item) = self.editor.on_preloaded(token, result) {
                    self.edit_task = None;
                    self.slot.show(item);
                }
            }
        }
    }
}
