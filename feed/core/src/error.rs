//! Error Types
//!
//! Errors produced by the feed pipeline. None of these ever reach the UI as a
//! panic: transport errors drive reconnection, parse errors drop a message,
//! preload errors skip an item or mark an edit as failed.

use thiserror::Error;

/// Errors from the feed connection, request construction and parameter edits
#[derive(Debug, Error)]
pub enum FeedError {
    /// Could not establish the push connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The feed endpoint answered with a non-success status
    #[error("Feed endpoint returned HTTP {status}")]
    HttpStatus {
        /// Status code returned by the server
        status: u16,
    },

    /// The stream failed after it was opened
    #[error("Stream error: {0}")]
    Stream(String),

    /// A message payload was not valid JSON
    #[error("Malformed feed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A configured or constructed URL is invalid
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// An edit named a parameter that does not exist
    #[error("Unknown generation parameter: {0}")]
    UnknownParam(String),

    /// An edit supplied a value that cannot be normalised for its parameter
    #[error("Invalid value {value:?} for parameter {name}")]
    InvalidParamValue {
        /// Parameter name
        name: String,
        /// The rejected raw value
        value: String,
    },

    /// Submit was called with an empty prompt
    #[error("Cannot submit an empty prompt")]
    EmptyPrompt,

    /// The widget event loop has shut down
    #[error("Feed widget is closed")]
    WidgetClosed,
}

impl From<reqwest::Error> for FeedError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_builder() {
            Self::ConnectionFailed(err.to_string())
        } else {
            Self::Stream(err.to_string())
        }
    }
}

/// Errors from fetching or decoding an item's media
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PreloadError {
    /// The item has no URL to fetch
    #[error("Item has no media URL")]
    MissingUrl,

    /// Network failure while fetching
    #[error("Fetch failed: {0}")]
    Fetch(String),

    /// The media server answered with a non-success status
    #[error("Media server returned HTTP {0}")]
    HttpStatus(u16),

    /// The fetched bytes could not be decoded
    #[error("Decode failed: {0}")]
    Decode(String),

    /// The preload task was aborted before it finished
    #[error("Preload cancelled")]
    Cancelled,
}

impl From<reqwest::Error> for PreloadError {
    fn from(err: reqwest::Error) -> Self {
        Self::Fetch(err.to_string())
    }
}

impl From<image::ImageError> for PreloadError {
    fn from(err: image::ImageError) -> Self {
        Self::Decode(err.to_string())
    }
}
