//! HTTP Feed Transport
//!
//! Opens the feed endpoint as a `reqwest-eventsource` event source and
//! forwards each message's data as a `FeedFrame::Message`.
//!
//! The event source runs with the `Never` retry policy: one `open` is one
//! HTTP request, and reconnecting is left to the feed connection.
//!
//! Only a connect timeout is set. The body read has none; the stream ends on
//! transport error or when the server closes it.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::CACHE_CONTROL;
use reqwest_eventsource::retry::Never;
use reqwest_eventsource::{Error as EventSourceError, Event, EventSource};
use tokio::sync::mpsc;
use url::Url;

use super::traits::{FeedFrame, FeedTransport};
use crate::error::FeedError;

/// Frames buffered between the network task and the connection loop
const FRAME_CHANNEL_CAPACITY: usize = 256;

/// reqwest-backed `text/event-stream` transport
#[derive(Clone)]
pub struct HttpFeedTransport {
    http_client: reqwest::Client,
}

impl HttpFeedTransport {
    /// Create a transport with its own HTTP client
    #[must_use]
    pub fn new() -> Self {
        Self {
            http_client: reqwest::Client::builder()
                .connect_timeout(Duration::from_secs(10))
                .build()
                .expect("Failed to create HTTP client"),
        }
    }

    /// Create a transport sharing an existing client
    #[must_use]
    pub fn with_client(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }
}

impl Default for HttpFeedTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// Map a failed handshake to the feed's error type
fn handshake_error(error: EventSourceError) -> FeedError {
    match error {
        EventSourceError::InvalidStatusCode(status, _) => FeedError::HttpStatus {
            status: status.as_u16(),
        },
        other => FeedError::ConnectionFailed(other.to_string()),
    }
}

#[async_trait]
impl FeedTransport for HttpFeedTransport {
    fn name(&self) -> &str {
        "http-sse"
    }

    async fn open(&self, url: &Url) -> Result<mpsc::Receiver<FeedFrame>, FeedError> {
        let request = self
            .http_client
            .get(url.clone())
            .header(CACHE_CONTROL, "no-cache");
        let mut source =
            EventSource::new(request).map_err(|e| FeedError::ConnectionFailed(e.to_string()))?;
        source.set_retry_policy(Box::new(Never));

        // A successful handshake always yields `Event::Open` first
        match source.next().await {
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                source.close();
                return Err(handshake_error(e));
            }
            None => {
                return Err(FeedError::ConnectionFailed(
                    "event source closed before opening".to_string(),
                ));
            }
        }

        let (tx, rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);

        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    () = tx.closed() => {
                        tracing::debug!("Feed receiver dropped, closing stream");
                        break;
                    }
                    event = source.next() => event,
                };

                match event {
                    Some(Ok(Event::Message(message))) => {
                        if message.data.is_empty() {
                            continue;
                        }
                        if tx.send(FeedFrame::Message(message.data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Event::Open)) => {}
                    Some(Err(EventSourceError::StreamEnded)) | None => {
                        tracing::debug!("Feed body stream ended");
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::debug!(error = %e, "Feed body stream failed");
                        let _ = tx.send(FeedFrame::Error(e.to_string())).await;
                        break;
                    }
                }
            }
            source.close();
        });

        Ok(rx)
    }
}
