//! Media Preloader
//!
//! Ensures an item's media is fully fetched and decoded before it is shown.
//! A successful preload returns the same item stamped `loaded: true`; a
//! failure returns the underlying error and never panics. Callers decide what
//! a failure means (the slideshow skips on, an edit reports failure).
//!
//! # HTTP Preloader
//!
//! - Image items: GET the media URL, then decode the bytes with the `image`
//!   crate on a blocking worker. Missing dimensions are filled in from the
//!   decoded image.
//! - Text items that already carry a response are stamped immediately.
//! - Text items without a response (edit requests) GET the request URL and
//!   store the body as the response.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::PreloadError;
use crate::event::{DisplayItem, FeedKind};

/// Ensures an item's media is ready for display
#[async_trait]
pub trait Preloader: Send + Sync {
    /// Fetch/decode the item's media and return it stamped as loaded
    async fn preload(&self, item: DisplayItem) -> Result<DisplayItem, PreloadError>;
}

/// reqwest-backed preloader
#[derive(Clone)]
pub struct HttpPreloader {
    http_client: reqwest::Client,
}

impl HttpPreloader {
    /// Create a preloader with its own HTTP client
    #[must_use]
    pub fn new() -> Self {
        Self {
            http_client: reqwest::Client::builder()
                .connect_timeout(Duration::from_secs(10))
                .build()
                .expect("Failed to create HTTP client"),
        }
    }

    /// Create a preloader sharing an existing client
    #[must_use]
    pub fn with_client(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }

    async fn fetch(&self, url: &str) -> Result<reqwest::Response, PreloadError> {
        let response = self.http_client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(PreloadError::HttpStatus(response.status().as_u16()));
        }
        Ok(response)
    }

    async fn preload_image(&self, item: DisplayItem) -> Result<DisplayItem, PreloadError> {
        let url = item.url.as_deref().ok_or(PreloadError::MissingUrl)?;
        let bytes = self.fetch(url).await?.bytes().await?;

        let (width, height) = tokio::task::spawn_blocking(move || {
            image::load_from_memory(&bytes).map(|img| (img.width(), img.height()))
        })
        .await
        .map_err(|e| {
            if e.is_cancelled() {
                PreloadError::Cancelled
            } else {
                PreloadError::Decode(e.to_string())
            }
        })??;

        tracing::trace!(url = %url, width, height, "Image preloaded");

        let mut item = item;
        item.width.get_or_insert(width);
        item.height.get_or_insert(height);
        Ok(item.mark_loaded())
    }

    async fn preload_text(&self, item: DisplayItem) -> Result<DisplayItem, PreloadError> {
        if item.response.is_some() {
            return Ok(item.mark_loaded());
        }

        let url = item.url.as_deref().ok_or(PreloadError::MissingUrl)?;
        let text = self.fetch(url).await?.text().await?;
        Ok(item.with_response(text).mark_loaded())
    }
}

impl Default for HttpPreloader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Preloader for HttpPreloader {
    async fn preload(&self, item: DisplayItem) -> Result<DisplayItem, PreloadError> {
        if item.loaded {
            return Ok(item);
        }
        match item.kind {
            FeedKind::Image => self.preload_image(item).await,
            FeedKind::Text => self.preload_text(item).await,
        }
    }
}
