//! TOML Configuration File Support
//!
//! Loads widget settings from `~/.config/genfeed/genfeed.toml`.
//!
//! # Configuration Priority
//!
//! Highest first:
//! 1. CLI arguments (via [`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! [feed]
//! image_url = "https://image.pollinations.ai/feed"
//! text_url = "https://text.pollinations.ai/feed"
//! reconnect_delay_ms = 1000
//!
//! [slideshow]
//! interval_ms = 3000
//!
//! [generation]
//! image_base_url = "https://image.pollinations.ai/prompt/"
//! text_base_url = "https://text.pollinations.ai/"
//! width = 1024
//! height = 1024
//! seed = 42
//! model = "flux"
//! nologo = false
//!
//! [filter]
//! blocked_terms = ["gore", "blood"]
//! use_default_terms = true
//! ```
//!
//! # Environment Variables
//!
//! - `GENFEED_IMAGE_FEED_URL`, `GENFEED_TEXT_FEED_URL`
//! - `GENFEED_RECONNECT_DELAY_MS`, `GENFEED_SLIDE_INTERVAL_MS`
//! - `GENFEED_BLOCKED_TERMS` (comma separated, added to the blocklist)

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::connection::DEFAULT_RECONNECT_DELAY;
use crate::event::FeedKind;
use crate::filter::{ContentFilter, DEFAULT_BLOCKED_TERMS};
use crate::params::{GenerationParams, RequestUrlBuilder, DEFAULT_IMAGE_BASE_URL, DEFAULT_TEXT_BASE_URL};
use crate::scheduler::DEFAULT_SLIDE_INTERVAL;
use crate::widget::WidgetConfig;

/// Default image feed stream
pub const DEFAULT_IMAGE_FEED_URL: &str = "https://image.pollinations.ai/feed";

/// Default text feed stream
pub const DEFAULT_TEXT_FEED_URL: &str = "https://text.pollinations.ai/feed";

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where the configuration came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Command-line argument
    Cli,
    /// Environment variable
    Env,
    /// TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// `[feed]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedToml {
    /// Image feed stream URL
    pub image_url: Option<String>,
    /// Text feed stream URL
    pub text_url: Option<String>,
    /// Delay before reconnecting, in milliseconds
    pub reconnect_delay_ms: Option<u64>,
}

/// `[slideshow]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SlideshowToml {
    /// Time between slides, in milliseconds
    pub interval_ms: Option<u64>,
}

/// `[generation]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationToml {
    /// Image request base URL
    pub image_base_url: Option<String>,
    /// Text request base URL
    pub text_base_url: Option<String>,
    /// Initial width
    pub width: Option<u32>,
    /// Initial height
    pub height: Option<u32>,
    /// Initial seed
    pub seed: Option<u64>,
    /// Initial model
    pub model: Option<String>,
    /// Initial watermark suppression
    pub nologo: Option<bool>,
    /// Initial private flag
    pub nofeed: Option<bool>,
    /// Initial prompt enhancement
    pub enhance: Option<bool>,
}

/// `[filter]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterToml {
    /// Extra blocked terms
    pub blocked_terms: Option<Vec<String>>,
    /// Keep the built-in blocklist (default true)
    pub use_default_terms: Option<bool>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GenfeedToml {
    /// Feed connection section
    pub feed: FeedToml,
    /// Slideshow section
    pub slideshow: SlideshowToml,
    /// Generation defaults section
    pub generation: GenerationToml,
    /// Content filter section
    pub filter: FilterToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Resolved configuration
#[derive(Clone, Debug)]
pub struct GenfeedConfig {
    /// Image feed stream URL
    pub image_feed_url: Url,
    /// Text feed stream URL
    pub text_feed_url: Url,
    /// Delay before reconnecting a failed feed
    pub reconnect_delay: Duration,
    /// Time between slides
    pub slide_interval: Duration,
    /// Image request base URL
    pub image_base_url: String,
    /// Text request base URL
    pub text_base_url: String,
    /// Initial edit candidate
    pub params: GenerationParams,
    /// Blocked terms added to the blocklist
    pub blocked_terms: Vec<String>,
    /// Keep the built-in blocklist
    pub use_default_terms: bool,
    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    source: ConfigSource,
}

impl Default for GenfeedConfig {
    fn default() -> Self {
        Self {
            image_feed_url: Url::parse(DEFAULT_IMAGE_FEED_URL).expect("default image feed URL is valid"),
            text_feed_url: Url::parse(DEFAULT_TEXT_FEED_URL).expect("default text feed URL is valid"),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            slide_interval: DEFAULT_SLIDE_INTERVAL,
            image_base_url: DEFAULT_IMAGE_BASE_URL.to_string(),
            text_base_url: DEFAULT_TEXT_BASE_URL.to_string(),
            params: GenerationParams::default(),
            blocked_terms: Vec::new(),
            use_default_terms: true,
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl GenfeedConfig {
    /// Create a configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Stream URL for a feed kind
    #[must_use]
    pub fn feed_url(&self, kind: FeedKind) -> &Url {
        match kind {
            FeedKind::Image => &self.image_feed_url,
            FeedKind::Text => &self.text_feed_url,
        }
    }

    /// Build the content filter
    #[must_use]
    pub fn content_filter(&self) -> ContentFilter {
        let defaults: &[&str] = if self.use_default_terms {
            DEFAULT_BLOCKED_TERMS
        } else {
            &[]
        };
        ContentFilter::new(
            defaults
                .iter()
                .map(|t| (*t).to_string())
                .chain(self.blocked_terms.iter().cloned()),
        )
    }

    /// Check values that would break a running widget
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.slide_interval.is_zero() {
            return Err(ConfigError::ValidationError(
                "slideshow interval must be greater than zero".to_string(),
            ));
        }
        if self.params.width == 0 || self.params.height == 0 {
            return Err(ConfigError::ValidationError(
                "generation width and height must be greater than zero".to_string(),
            ));
        }
        RequestUrlBuilder::new(&self.image_base_url, &self.text_base_url)
            .map_err(|e| ConfigError::ValidationError(format!("generation base URL: {e}")))?;
        Ok(())
    }

    /// Build a widget configuration for a feed kind
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if the configuration is invalid.
    pub fn widget_config(&self, kind: FeedKind) -> Result<WidgetConfig, ConfigError> {
        self.validate()?;
        let urls = RequestUrlBuilder::new(&self.image_base_url, &self.text_base_url)
            .map_err(|e| ConfigError::ValidationError(format!("generation base URL: {e}")))?;

        Ok(WidgetConfig::new(kind, self.feed_url(kind).clone())
            .with_slide_interval(self.slide_interval)
            .with_reconnect_delay(self.reconnect_delay)
            .with_filter(self.content_filter())
            .with_urls(urls)
            .with_params(self.params.clone()))
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/genfeed/genfeed.toml` or
/// `~/.config/genfeed/genfeed.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("genfeed").join("genfeed.toml"))
}

/// Load configuration from the default path, then the environment
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be read, parsed or
/// validated. A missing config file is not an error.
pub fn load_config() -> Result<GenfeedConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path, then the environment
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<GenfeedConfig, ConfigError> {
    let mut config = GenfeedConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: GenfeedToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config)?;
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config, |key| std::env::var(key).ok());

    Ok(config)
}

fn parse_url(field: &str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|e| ConfigError::ValidationError(format!("{field}: {e}")))
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut GenfeedConfig, toml: &GenfeedToml) -> Result<(), ConfigError> {
    // Feed
    if let Some(ref url) = toml.feed.image_url {
        config.image_feed_url = parse_url("feed.image_url", url)?;
    }
    if let Some(ref url) = toml.feed.text_url {
        config.text_feed_url = parse_url("feed.text_url", url)?;
    }
    if let Some(delay) = toml.feed.reconnect_delay_ms {
        config.reconnect_delay = Duration::from_millis(delay);
    }

    // Slideshow
    if let Some(interval) = toml.slideshow.interval_ms {
        config.slide_interval = Duration::from_millis(interval);
    }

    // Generation
    let generation = &toml.generation;
    if let Some(ref base) = generation.image_base_url {
        config.image_base_url = base.clone();
    }
    if let Some(ref base) = generation.text_base_url {
        config.text_base_url = base.clone();
    }
    if let Some(width) = generation.width {
        config.params.width = width;
    }
    if let Some(height) = generation.height {
        config.params.height = height;
    }
    if let Some(seed) = generation.seed {
        config.params.seed = seed;
    }
    if generation.model.is_some() {
        config.params.model = generation.model.clone();
    }
    if let Some(flag) = generation.nologo {
        config.params.nologo = flag;
    }
    if let Some(flag) = generation.nofeed {
        config.params.nofeed = flag;
    }
    if let Some(flag) = generation.enhance {
        config.params.enhance = flag;
    }

    // Filter
    if let Some(ref terms) = toml.filter.blocked_terms {
        config.blocked_terms.clone_from(terms);
    }
    if let Some(keep) = toml.filter.use_default_terms {
        config.use_default_terms = keep;
    }

    config.validate()
}

/// Apply environment variable overrides to the config
fn apply_env_config(config: &mut GenfeedConfig, var: impl Fn(&str) -> Option<String>) {
    if let Some(raw) = var("GENFEED_IMAGE_FEED_URL") {
        match Url::parse(&raw) {
            Ok(url) => {
                config.image_feed_url = url;
                config.source = ConfigSource::Env;
            }
            Err(e) => tracing::warn!(error = %e, "Ignoring invalid GENFEED_IMAGE_FEED_URL"),
        }
    }
    if let Some(raw) = var("GENFEED_TEXT_FEED_URL") {
        match Url::parse(&raw) {
            Ok(url) => {
                config.text_feed_url = url;
                config.source = ConfigSource::Env;
            }
            Err(e) => tracing::warn!(error = %e, "Ignoring invalid GENFEED_TEXT_FEED_URL"),
        }
    }
    if let Some(delay) = var("GENFEED_RECONNECT_DELAY_MS") {
        if let Ok(ms) = delay.trim().parse::<u64>() {
            config.reconnect_delay = Duration::from_millis(ms);
            config.source = ConfigSource::Env;
        }
    }
    if let Some(interval) = var("GENFEED_SLIDE_INTERVAL_MS") {
        if let Ok(ms) = interval.trim().parse::<u64>() {
            if ms > 0 {
                config.slide_interval = Duration::from_millis(ms);
                config.source = ConfigSource::Env;
            }
        }
    }
    if let Some(terms) = var("GENFEED_BLOCKED_TERMS") {
        config.blocked_terms.extend(
            terms
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string),
        );
        config.source = ConfigSource::Env;
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Command-line overrides, applied after [`load_config`]
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Feed URL override for one feed kind
    pub feed_url: Option<(FeedKind, Url)>,

    /// Slide interval override (milliseconds)
    pub slide_interval_ms: Option<u64>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set feed URL override
    #[must_use]
    pub fn with_feed_url(mut self, kind: FeedKind, url: Url) -> Self {
        self.feed_url = Some((kind, url));
        self
    }

    /// Set slide interval override
    #[must_use]
    pub fn with_slide_interval_ms(mut self, ms: u64) -> Self {
        self.slide_interval_ms = Some(ms);
        self
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut GenfeedConfig) {
        if self.feed_url.is_some() || self.slide_interval_ms.is_some() {
            config.source = ConfigSource::Cli;
        }

        if let Some((kind, url)) = &self.feed_url {
            match kind {
                FeedKind::Image => config.image_feed_url = url.clone(),
                FeedKind::Text => config.text_feed_url = url.clone(),
            }
        }

        if let Some(ms) = self.slide_interval_ms {
            config.slide_interval = Duration::from_millis(ms);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
