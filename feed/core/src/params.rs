//! Generation Parameters and Request URLs
//!
//! `GenerationParams` is the live, user-editable parameter set of a widget.
//! `RequestUrlBuilder` turns it into a GET URL for the image or text backend:
//! the prompt becomes a percent-encoded path segment, and only parameters that
//! differ from their documented defaults are appended as query pairs, which
//! keeps URLs minimal and cache-friendly.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::FeedError;
use crate::event::{DisplayItem, FeedKind};

/// Default output width
pub const DEFAULT_WIDTH: u32 = 1024;

/// Default output height
pub const DEFAULT_HEIGHT: u32 = 1024;

/// Default seed
pub const DEFAULT_SEED: u64 = 42;

/// Default image generation endpoint
pub const DEFAULT_IMAGE_BASE_URL: &str = "https://image.pollinations.ai/prompt/";

/// Default text generation endpoint
pub const DEFAULT_TEXT_BASE_URL: &str = "https://text.pollinations.ai/";

// ============================================================================
// Parameters
// ============================================================================

/// User-editable generation parameters
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Prompt text
    pub prompt: String,
    /// Output width in pixels
    pub width: u32,
    /// Output height in pixels
    pub height: u32,
    /// Seed
    pub seed: u64,
    /// Model name (`None` = backend default)
    pub model: Option<String>,
    /// Suppress the backend watermark
    pub nologo: bool,
    /// Keep the result out of the public feed
    pub nofeed: bool,
    /// Let the backend rewrite the prompt
    pub enhance: bool,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            seed: DEFAULT_SEED,
            model: None,
            nologo: false,
            nofeed: false,
            enhance: false,
        }
    }
}

impl GenerationParams {
    /// Create parameters for a prompt with all other fields at their defaults
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    /// Set the seed
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the output size
    #[must_use]
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Seed parameters from a displayed item
    ///
    /// Fields the item does not carry fall back to their defaults.
    #[must_use]
    pub fn from_item(item: &DisplayItem) -> Self {
        Self {
            prompt: item.prompt.clone(),
            width: item.width.unwrap_or(DEFAULT_WIDTH),
            height: item.height.unwrap_or(DEFAULT_HEIGHT),
            seed: item.seed.unwrap_or(DEFAULT_SEED),
            model: item.model.clone(),
            ..Default::default()
        }
    }

    /// Copy with cosmetic differences removed
    ///
    /// Prompts are trimmed and an empty model name is the same as no model.
    #[must_use]
    pub fn normalized(&self) -> Self {
        Self {
            prompt: self.prompt.trim().to_string(),
            model: self
                .model
                .as_deref()
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(str::to_string),
            ..self.clone()
        }
    }

    /// Whether two parameter sets describe the same request
    #[must_use]
    pub fn same_request_as(&self, other: &Self) -> bool {
        self.normalized() == other.normalized()
    }

    /// Merge a single edit
    pub fn apply(&mut self, update: ParamUpdate) {
        match update {
            ParamUpdate::Prompt(prompt) => self.prompt = prompt,
            ParamUpdate::Width(width) => self.width = width,
            ParamUpdate::Height(height) => self.height = height,
            ParamUpdate::Seed(seed) => self.seed = seed,
            ParamUpdate::Model(model) => self.model = model,
            ParamUpdate::NoLogo(flag) => self.nologo = flag,
            ParamUpdate::NoFeed(flag) => self.nofeed = flag,
            ParamUpdate::Enhance(flag) => self.enhance = flag,
        }
    }
}

// ============================================================================
// Parameter Updates
// ============================================================================

/// One user edit to the live parameters
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamUpdate {
    /// Replace the prompt
    Prompt(String),
    /// Set the width
    Width(u32),
    /// Set the height
    Height(u32),
    /// Set the seed
    Seed(u64),
    /// Set or clear the model
    Model(Option<String>),
    /// Toggle watermark suppression
    NoLogo(bool),
    /// Toggle keeping the result private
    NoFeed(bool),
    /// Toggle prompt enhancement
    Enhance(bool),
}

impl ParamUpdate {
    /// Parse a by-name edit, normalising the raw string value
    ///
    /// Numbers may arrive as `"1024"`, `" 1024 "` or `"1024.0"`; flags accept
    /// `true/false`, `1/0`, `yes/no` and `on/off`.
    ///
    /// # Errors
    ///
    /// Returns `FeedError::UnknownParam` for an unknown name and
    /// `FeedError::InvalidParamValue` when the value cannot be normalised.
    pub fn parse(name: &str, value: &str) -> Result<Self, FeedError> {
        let invalid = || FeedError::InvalidParamValue {
            name: name.to_string(),
            value: value.to_string(),
        };

        match name.trim().to_lowercase().as_str() {
            "prompt" => Ok(Self::Prompt(value.to_string())),
            "width" => parse_number(value)
                .and_then(|n| u32::try_from(n).ok())
                .filter(|n| *n > 0)
                .map(Self::Width)
                .ok_or_else(invalid),
            "height" => parse_number(value)
                .and_then(|n| u32::try_from(n).ok())
                .filter(|n| *n > 0)
                .map(Self::Height)
                .ok_or_else(invalid),
            "seed" => parse_number(value).map(Self::Seed).ok_or_else(invalid),
            "model" => {
                let model = value.trim();
                Ok(Self::Model(if model.is_empty() {
                    None
                } else {
                    Some(model.to_string())
                }))
            }
            "nologo" => parse_flag(value).map(Self::NoLogo).ok_or_else(invalid),
            "nofeed" | "private" => parse_flag(value).map(Self::NoFeed).ok_or_else(invalid),
            "enhance" => parse_flag(value).map(Self::Enhance).ok_or_else(invalid),
            other => Err(FeedError::UnknownParam(other.to_string())),
        }
    }
}

fn parse_number(value: &str) -> Option<u64> {
    let value = value.trim();
    value.parse::<u64>().ok().or_else(|| {
        value
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0)
            .map(|f| f as u64)
    })
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

// ============================================================================
// Request URLs
// ============================================================================

/// Builds generation request URLs for both backends
#[derive(Clone, Debug)]
pub struct RequestUrlBuilder {
    image_base: Url,
    text_base: Url,
}

impl Default for RequestUrlBuilder {
    fn default() -> Self {
        Self {
            image_base: Url::parse(DEFAULT_IMAGE_BASE_URL).expect("default image URL is valid"),
            text_base: Url::parse(DEFAULT_TEXT_BASE_URL).expect("default text URL is valid"),
        }
    }
}

impl RequestUrlBuilder {
    /// Create a builder from base URLs
    ///
    /// # Errors
    ///
    /// Returns `FeedError::InvalidUrl` if either base does not parse or
    /// cannot carry path segments.
    pub fn new(image_base: &str, text_base: &str) -> Result<Self, FeedError> {
        Ok(Self {
            image_base: parse_base(image_base)?,
            text_base: parse_base(text_base)?,
        })
    }

    /// Request URL for a feed kind
    #[must_use]
    pub fn request_url(&self, kind: FeedKind, params: &GenerationParams) -> Url {
        match kind {
            FeedKind::Image => self.image_url(params),
            FeedKind::Text => self.text_url(params),
        }
    }

    /// Image request URL
    #[must_use]
    pub fn image_url(&self, params: &GenerationParams) -> Url {
        let mut pairs: Vec<(&str, String)> = Vec::new();
        if params.width != DEFAULT_WIDTH {
            pairs.push(("width", params.width.to_string()));
        }
        if params.height != DEFAULT_HEIGHT {
            pairs.push(("height", params.height.to_string()));
        }
        if params.seed != DEFAULT_SEED {
            pairs.push(("seed", params.seed.to_string()));
        }
        if params.nofeed {
            pairs.push(("nofeed", "true".to_string()));
        }
        if params.nologo {
            pairs.push(("nologo", "true".to_string()));
        }
        if let Some(model) = params.normalized().model {
            pairs.push(("model", model));
        }
        if params.enhance {
            pairs.push(("enhance", "true".to_string()));
        }

        with_prompt_and_query(&self.image_base, &params.prompt, &pairs)
    }

    /// Text request URL
    #[must_use]
    pub fn text_url(&self, params: &GenerationParams) -> Url {
        let mut pairs: Vec<(&str, String)> = Vec::new();
        if params.seed != DEFAULT_SEED {
            pairs.push(("seed", params.seed.to_string()));
        }
        if let Some(model) = params.normalized().model {
            pairs.push(("model", model));
        }

        with_prompt_and_query(&self.text_base, &params.prompt, &pairs)
    }
}

fn parse_base(raw: &str) -> Result<Url, FeedError> {
    let url = Url::parse(raw)?;
    if url.cannot_be_a_base() {
        return Err(FeedError::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase));
    }
    Ok(url)
}

fn with_prompt_and_query(base: &Url, prompt: &str, pairs: &[(&str, String)]) -> Url {
    let mut url = base.clone();
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.pop_if_empty().push(prompt.trim());
    }
    if !pairs.is_empty() {
        url.query_pairs_mut()
            .extend_pairs(pairs.iter().map(|(k, v)| (*k, v.as_str())));
    }
    url
}
