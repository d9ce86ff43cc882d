//! Feed Events and Display Items
//!
//! `FeedEvent` is the wire-level payload of one server-push message. Its
//! fields are loosely typed in practice (numbers arrive as strings, the
//! `nsfw` flag arrives as a bool, a number or a string), so every optional
//! scalar is deserialized leniently: a value that cannot be normalised is
//! treated as absent instead of failing the whole message.
//!
//! `DisplayItem` is the validated form of an event that cleared the content
//! filter. It is what the buffer queue holds and what the UI renders.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::FeedError;

// ============================================================================
// Feed Kind
// ============================================================================

/// Which backend feed a widget consumes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedKind {
    /// Image generations (`imageURL` is the renderable content)
    #[default]
    Image,
    /// Text completions (`response` is the renderable content)
    Text,
}

impl FeedKind {
    /// Get a short label
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Text => "text",
        }
    }
}

impl std::fmt::Display for FeedKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for FeedKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "image" | "img" => Ok(Self::Image),
            "text" | "txt" => Ok(Self::Text),
            other => Err(format!("unknown feed kind: {other}")),
        }
    }
}

// ============================================================================
// Wire Format
// ============================================================================

/// One chat message inside `parameters.messages`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Speaker role (`user`, `system`, `assistant`)
    #[serde(default, deserialize_with = "lenient::string")]
    pub role: Option<String>,
    /// Message content: either a string or a list of content parts
    #[serde(default)]
    pub content: serde_json::Value,
}

impl ChatMessage {
    /// Flatten the content into plain text
    ///
    /// String content is returned as-is; a list of parts is joined from each
    /// part's `text` field.
    #[must_use]
    pub fn text(&self) -> Option<String> {
        match &self.content {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Array(parts) => {
                let joined: Vec<&str> = parts
                    .iter()
                    .filter_map(|p| p.get("text").and_then(serde_json::Value::as_str))
                    .collect();
                if joined.is_empty() {
                    None
                } else {
                    Some(joined.join(" "))
                }
            }
            _ => None,
        }
    }
}

/// Nested request parameters attached to text-feed events
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedParameters {
    /// Conversation sent to the text backend
    #[serde(default, deserialize_with = "lenient::messages")]
    pub messages: Vec<ChatMessage>,
    /// Model used for the completion
    #[serde(default, deserialize_with = "lenient::string")]
    pub model: Option<String>,
    /// Seed used for the completion
    #[serde(default, deserialize_with = "lenient::u64")]
    pub seed: Option<u64>,
}

/// A raw event from the generation feed
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedEvent {
    /// Generated image location (image feed)
    #[serde(rename = "imageURL", default, deserialize_with = "lenient::string")]
    pub image_url: Option<String>,
    /// Generated text (text feed)
    #[serde(default, deserialize_with = "lenient::string")]
    pub response: Option<String>,
    /// Prompt that produced this generation
    #[serde(default, deserialize_with = "lenient::string")]
    pub prompt: Option<String>,
    /// Nested request parameters (text feed)
    #[serde(default, deserialize_with = "lenient::parameters")]
    pub parameters: Option<FeedParameters>,
    /// Seed
    #[serde(default, deserialize_with = "lenient::u64")]
    pub seed: Option<u64>,
    /// Model name
    #[serde(default, deserialize_with = "lenient::string")]
    pub model: Option<String>,
    /// Output width in pixels
    #[serde(default, deserialize_with = "lenient::u32")]
    pub width: Option<u32>,
    /// Output height in pixels
    #[serde(default, deserialize_with = "lenient::u32")]
    pub height: Option<u32>,
    /// Backend load metric at the time the event was emitted
    #[serde(default, deserialize_with = "lenient::u32")]
    pub concurrent_requests: Option<u32>,
    /// Flagged unsafe by the backend
    #[serde(default, deserialize_with = "lenient::flag")]
    pub nsfw: bool,
}

impl FeedEvent {
    /// Parse one message payload
    ///
    /// # Errors
    ///
    /// Returns `FeedError::Malformed` if the payload is not a JSON object.
    pub fn parse(data: &str) -> Result<Self, FeedError> {
        Ok(serde_json::from_str(data)?)
    }

    /// The prompt text used for filtering and display
    ///
    /// Prefers the top-level `prompt`; falls back to the last `user` message
    /// in `parameters.messages`.
    #[must_use]
    pub fn prompt_text(&self) -> Option<String> {
        if let Some(prompt) = self.prompt.as_deref().filter(|p| !p.trim().is_empty()) {
            return Some(prompt.to_string());
        }

        let messages = &self.parameters.as_ref()?.messages;
        messages
            .iter()
            .rev()
            .find(|m| m.role.as_deref() == Some("user"))
            .and_then(ChatMessage::text)
            .filter(|t| !t.trim().is_empty())
    }

    /// Seed, falling back to `parameters.seed`
    #[must_use]
    pub fn effective_seed(&self) -> Option<u64> {
        self.seed
            .or_else(|| self.parameters.as_ref().and_then(|p| p.seed))
    }

    /// Model, falling back to `parameters.model`
    #[must_use]
    pub fn effective_model(&self) -> Option<String> {
        self.model
            .clone()
            .or_else(|| self.parameters.as_ref().and_then(|p| p.model.clone()))
    }

    /// The renderable content for a feed kind, if present
    #[must_use]
    pub fn content(&self, kind: FeedKind) -> Option<&str> {
        let content = match kind {
            FeedKind::Image => self.image_url.as_deref(),
            FeedKind::Text => self.response.as_deref(),
        };
        content.filter(|c| !c.trim().is_empty())
    }
}

// ============================================================================
// Display Items
// ============================================================================

/// Unique identifier for a display item
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemId(pub Uuid);

impl ItemId {
    /// Generate a fresh id
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a display item came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemOrigin {
    /// Received from the live feed
    Feed,
    /// Produced by a user edit submission
    Edit,
}

/// A validated, display-ready generation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DisplayItem {
    /// Unique id
    pub id: ItemId,
    /// Feed kind this item belongs to
    pub kind: FeedKind,
    /// Feed arrival or edit submission
    pub origin: ItemOrigin,
    /// Media location: the feed's `imageURL`, or the request URL for edits
    pub url: Option<String>,
    /// Generated text (text items)
    pub response: Option<String>,
    /// Prompt text
    pub prompt: String,
    /// Seed
    pub seed: Option<u64>,
    /// Model name
    pub model: Option<String>,
    /// Width in pixels
    pub width: Option<u32>,
    /// Height in pixels
    pub height: Option<u32>,
    /// When the item was received or created
    pub received_at: DateTime<Utc>,
    /// Whether the preloader has resolved this item's media
    pub loaded: bool,
}

impl DisplayItem {
    /// Build a display item from a feed event
    ///
    /// Returns `None` when the event has no renderable content for `kind` or
    /// no prompt text.
    #[must_use]
    pub fn from_event(event: &FeedEvent, kind: FeedKind) -> Option<Self> {
        let content = event.content(kind)?.to_string();
        let prompt = event.prompt_text()?;

        let (url, response) = match kind {
            FeedKind::Image => (Some(content), None),
            FeedKind::Text => (None, Some(content)),
        };

        Some(Self {
            id: ItemId::generate(),
            kind,
            origin: ItemOrigin::Feed,
            url,
            response,
            prompt,
            seed: event.effective_seed(),
            model: event.effective_model(),
            width: event.width,
            height: event.height,
            received_at: Utc::now(),
            loaded: false,
        })
    }

    /// Return a copy stamped as loaded
    #[must_use]
    pub fn mark_loaded(mut self) -> Self {
        self.loaded = true;
        self
    }

    /// Return a copy carrying fetched text
    #[must_use]
    pub fn with_response(mut self, response: impl Into<String>) -> Self {
        self.response = Some(response.into());
        self
    }
}

// ============================================================================
// Lenient scalar deserializers
// ============================================================================

mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    fn to_u64(value: &Value) -> Option<u64> {
        match value {
            Value::Number(n) => n.as_u64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0)
                    .map(|f| f as u64)
            }),
            Value::String(s) => s.trim().parse::<u64>().ok(),
            _ => None,
        }
    }

    pub fn u64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
        let value = Option::<Value>::deserialize(d)?;
        Ok(value.as_ref().and_then(to_u64))
    }

    pub fn u32<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
        let value = Option::<Value>::deserialize(d)?;
        Ok(value
            .as_ref()
            .and_then(to_u64)
            .and_then(|v| u32::try_from(v).ok()))
    }

    pub fn string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        let value = Option::<Value>::deserialize(d)?;
        Ok(match value {
            Some(Value::String(s)) => Some(s),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
    }

    /// Anything but an object counts as absent
    pub fn parameters<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<super::FeedParameters>, D::Error> {
        let value = Option::<Value>::deserialize(d)?;
        Ok(value
            .filter(Value::is_object)
            .and_then(|v| serde_json::from_value(v).ok()))
    }

    /// Non-array values become empty; entries that are not objects are skipped
    pub fn messages<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Vec<super::ChatMessage>, D::Error> {
        let value = Option::<Value>::deserialize(d)?;
        Ok(match value {
            Some(Value::Array(items)) => items
                .into_iter()
                .filter(Value::is_object)
                .filter_map(|m| serde_json::from_value(m).ok())
                .collect(),
            _ => Vec::new(),
        })
    }

    pub fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        let value = Option::<Value>::deserialize(d)?;
        Ok(match value {
            Some(Value::Bool(b)) => b,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
            Some(Value::String(s)) => {
                matches!(s.trim().to_lowercase().as_str(), "true" | "1" | "yes")
            }
            _ => false,
        })
    }
}
