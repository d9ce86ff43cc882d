//! Feed Transport Layer
//!
//! Provides abstraction over how the server-push feed is reached:
//! - `HttpFeedTransport`: `text/event-stream` over HTTP (reqwest)
//! - `ScriptedTransport`: in-memory playback for tests and demos
//!
//! The transport only opens connections and yields raw message payloads.
//! Reconnection, parsing and filtering live in [`crate::connection`].

pub mod http;
pub mod scripted;
pub mod traits;

// Re-exports for convenience
pub use http::HttpFeedTransport;
pub use scripted::{ScriptedTransport, Session};
pub use traits::{FeedFrame, FeedTransport};
