//! Feed Transport Traits
//!
//! The seam between the feed connection and the network. A transport opens
//! one push connection and hands back a channel of frames; the connection
//! layer owns parsing, filtering, and reconnection.

use async_trait::async_trait;
use tokio::sync::mpsc;
use url::Url;

use crate::error::FeedError;

/// One unit delivered by an open push connection
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FeedFrame {
    /// Data payload of one server-sent message
    Message(String),
    /// The connection failed after it was opened
    Error(String),
}

/// A server-push connection factory
///
/// `open` resolves once the handshake succeeded. The returned receiver yields
/// frames until the connection ends; a closed channel means the stream is
/// gone and the caller should treat it like an error.
#[async_trait]
pub trait FeedTransport: Send + Sync {
    /// Transport name for logging
    fn name(&self) -> &str;

    /// Open a push connection to `url`
    async fn open(&self, url: &Url) -> Result<mpsc::Receiver<FeedFrame>, FeedError>;
}
