//! Genfeed Core - Live Generation Feed Widgets
//!
//! This crate consumes the public server-push feeds of a generative-media
//! backend, filters and buffers the generations they announce, and drives a
//! timed slideshow with an interactive edit mode on top. It has no UI: a
//! surface renders the [`WidgetSnapshot`]s a widget publishes and sends user
//! edits through a [`WidgetHandle`].
//!
//! # Architecture
//!
//! ```text
//!  FeedConnection ──► ContentFilter ──► BufferQueue
//!  (transport, 1 s reconnect)               │
//!                                           ▼  tick (3 s)
//!                                  SlideshowScheduler ◄── pause ── EditCoordinator
//!                                           │                           │
//!                                           ▼                           │
//!                     Preloader ◄────── DisplaySlot ◄── edit results ───┘
//! ```
//!
//! All of it runs inside one [`FeedWidget`] task.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use genfeed_core::{
//!     load_config, FeedKind, FeedWidget, HttpFeedTransport, HttpPreloader,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config()?;
//!     let widget = FeedWidget::spawn(
//!         config.widget_config(FeedKind::Image)?,
//!         Arc::new(HttpFeedTransport::new()),
//!         Arc::new(HttpPreloader::new()),
//!     );
//!
//!     let mut snapshots = widget.subscribe();
//!     while snapshots.changed().await.is_ok() {
//!         let snapshot = snapshots.borrow_and_update().clone();
//!         // render snapshot.current
//!     }
//!     widget.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`event`]: Wire events and display items
//! - [`filter`]: Content filter
//! - [`transport`]: Feed transports and the SSE decoder
//! - [`connection`]: Reconnecting feed connection and shared feed status
//! - [`queue`]: FIFO buffer of items waiting to be shown
//! - [`preload`]: Media preloading
//! - [`scheduler`]: Timed slideshow
//! - [`params`]: Generation parameters and request URLs
//! - [`pause`]: Single-writer pause flag
//! - [`edit`]: Edit coordinator
//! - [`widget`]: The widget event loop
//! - [`config`]: TOML and environment configuration

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod connection;
pub mod edit;
pub mod error;
pub mod event;
pub mod filter;
pub mod params;
pub mod pause;
pub mod preload;
pub mod queue;
pub mod scheduler;
pub mod transport;
pub mod widget;

// Re-exports for convenience
pub use connection::{
    ConnectionState, FeedConnection, FeedHandle, FeedIngest, FeedStatus, IngestOutcome, Ingested,
    DEFAULT_RECONNECT_DELAY,
};
pub use edit::{EditCoordinator, EditRequest, EditStatus, EditToken};
pub use error::{FeedError, PreloadError};
pub use event::{DisplayItem, FeedEvent, FeedKind, ItemId, ItemOrigin};
pub use filter::{ContentFilter, FilterVerdict, DEFAULT_BLOCKED_TERMS};
pub use params::{GenerationParams, ParamUpdate, RequestUrlBuilder};
pub use pause::{pause_channel, PauseReader, PauseSwitch};
pub use preload::{HttpPreloader, Preloader};
pub use queue::BufferQueue;
pub use scheduler::{
    DisplaySlot, SchedulerState, SlideRequest, SlideStats, SlideTicket, SlideshowScheduler,
    DEFAULT_SLIDE_INTERVAL,
};
pub use transport::{FeedFrame, FeedTransport, HttpFeedTransport, ScriptedTransport, Session};
pub use widget::{FeedWidget, WidgetConfig, WidgetHandle, WidgetSnapshot, MIN_SLIDE_INTERVAL};

// Config exports
pub use config::{
    default_config_path, load_config, load_config_from_path, ConfigError, ConfigOverrides,
    ConfigSource, GenfeedConfig, GenfeedToml,
};
