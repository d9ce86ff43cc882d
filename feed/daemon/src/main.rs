//! Genfeed Watch - Headless Feed Widget
//!
//! Runs one image or text feed widget without a UI. Every slide change,
//! connection state change and edit outcome is logged, and the edit mode is
//! driven by line commands on stdin.
//!
//! # Usage
//!
//! ```bash
//! # Watch the image feed with defaults
//! genfeed-watch
//!
//! # Text feed, faster slideshow
//! genfeed-watch --kind text --interval-ms 1000
//!
//! # Custom config / feed
//! genfeed-watch --config ./genfeed.toml --feed-url http://localhost:8080/feed
//!
//! # Verbose logging
//! RUST_LOG=debug genfeed-watch
//! ```
//!
//! # Stdin Commands
//!
//! - `set <name> <value>`: edit a parameter (pauses the slideshow)
//! - `edit`: start editing the item on display
//! - `submit`: submit the edit candidate
//! - `cancel`: drop the pending edit
//! - `resume`: leave edit mode
//! - `status`: print the current snapshot as JSON
//! - `quit`: shut down
//!
//! # Signals
//!
//! - `SIGINT` (Ctrl-C): graceful shutdown, the feed connection is closed

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use url::Url;

use genfeed_core::{
    load_config_from_path, default_config_path, ConfigOverrides, FeedKind, FeedWidget,
    HttpFeedTransport, HttpPreloader, WidgetHandle, WidgetSnapshot,
};

/// Genfeed Watch - headless generation feed slideshow
#[derive(Parser, Debug)]
#[command(name = "genfeed-watch")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Feed to watch (image or text)
    #[arg(short = 'k', long, env = "GENFEED_KIND", default_value = "image")]
    kind: FeedKind,

    /// Configuration file path
    #[arg(short = 'c', long, env = "GENFEED_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Feed stream URL (overrides config)
    #[arg(short = 'u', long, value_name = "URL")]
    feed_url: Option<Url>,

    /// Slide interval in milliseconds (overrides config)
    #[arg(short = 'i', long, value_name = "MS")]
    interval_ms: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "GENFEED_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

/// Initialize logging with the specified level
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("genfeed_watch={level},genfeed_core={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

// ============================================================================
// Stdin Commands
// ============================================================================

/// One line of operator input
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Set { name: String, value: String },
    Edit,
    Submit,
    Cancel,
    Resume,
    Status,
    Quit,
}

impl Command {
    fn parse(line: &str) -> Result<Option<Self>, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let command = match word.to_lowercase().as_str() {
            "set" => {
                let (name, value) = rest
                    .trim()
                    .split_once(char::is_whitespace)
                    .ok_or_else(|| "usage: set <name> <value>".to_string())?;
                Self::Set {
                    name: name.to_string(),
                    value: value.trim().to_string(),
                }
            }
            "edit" => Self::Edit,
            "submit" => Self::Submit,
            "cancel" => Self::Cancel,
            "resume" => Self::Resume,
            "status" => Self::Status,
            "quit" | "exit" => Self::Quit,
            other => return Err(format!("unknown command: {other}")),
        };
        Ok(Some(command))
    }
}

/// Run one command; returns false when the operator asked to quit
async fn run_command(widget: &WidgetHandle, command: Command) -> Result<bool> {
    match command {
        Command::Set { name, value } => match widget.set_param(&name, &value).await {
            Ok(()) => info!(name = %name, value = %value, "Parameter set"),
            Err(e) => warn!(error = %e, "Parameter rejected"),
        },
        Command::Edit => {
            if !widget.begin_edit().await? {
                warn!("Nothing on display to edit yet");
            }
        }
        Command::Submit => match widget.submit().await {
            Ok(url) => info!(url = %url, "Edit submitted"),
            Err(e) => warn!(error = %e, "Submit rejected"),
        },
        Command::Cancel => widget.cancel()?,
        Command::Resume => widget.resume()?,
        Command::Status => {
            let snapshot = widget.snapshot();
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        Command::Quit => return Ok(false),
    }
    Ok(true)
}

// ============================================================================
// Snapshot Logging
// ============================================================================

fn log_changes(previous: &WidgetSnapshot, next: &WidgetSnapshot) {
    if previous.feed.state != next.feed.state {
        info!(
            state = next.feed.state.label(),
            attempts = next.feed.connection_attempts,
            "Feed connection"
        );
    }

    let shown = |s: &WidgetSnapshot| s.current.as_ref().map(|i| (i.id, i.loaded));
    if shown(previous) != shown(next) {
        if let Some(item) = &next.current {
            info!(
                item = %item.id,
                origin = ?item.origin,
                loaded = item.loaded,
                prompt = %item.prompt,
                url = item.url.as_deref().unwrap_or(""),
                queued = next.queue_len,
                load = ?next.feed.last_load,
                "Now showing"
            );
        }
    }

    if previous.paused != next.paused {
        info!(paused = next.paused, "Slideshow");
    }
    if previous.edit != next.edit {
        info!(edit = ?next.edit, "Edit status");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level);

    info!("Genfeed Watch starting");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config_path = args.config.clone().or_else(default_config_path);
    let mut config = load_config_from_path(config_path).context("Failed to load configuration")?;

    let mut overrides = ConfigOverrides::new();
    if let Some(url) = args.feed_url.clone() {
        overrides = overrides.with_feed_url(args.kind, url);
    }
    if let Some(ms) = args.interval_ms {
        overrides = overrides.with_slide_interval_ms(ms);
    }
    overrides.apply(&mut config);

    let widget_config = config
        .widget_config(args.kind)
        .context("Invalid configuration")?;

    info!(
        kind = %args.kind,
        feed = %widget_config.feed_url,
        interval = ?widget_config.slide_interval,
        source = %config.source(),
        "Configuration loaded"
    );

    let widget = FeedWidget::spawn(
        widget_config,
        Arc::new(HttpFeedTransport::new()),
        Arc::new(HttpPreloader::new()),
    );

    let mut snapshots = widget.subscribe();
    let mut last = snapshots.borrow_and_update().clone();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl-C, shutting down");
                break;
            }
            changed = snapshots.changed() => {
                if changed.is_err() {
                    warn!("Widget stopped unexpectedly");
                    break;
                }
                let next = snapshots.borrow_and_update().clone();
                log_changes(&last, &next);
                last = next;
            }
            line = lines.next_line(), if stdin_open => match line? {
                Some(line) => match Command::parse(&line) {
                    Ok(Some(command)) => {
                        if !run_command(&widget, command).await? {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => warn!("{e}"),
                },
                None => stdin_open = false,
            },
        }
    }

    widget.shutdown().await;
    info!("Genfeed Watch stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("  "), Ok(None));
        assert_eq!(Command::parse("submit"), Ok(Some(Command::Submit)));
        assert_eq!(Command::parse("RESUME"), Ok(Some(Command::Resume)));
        assert_eq!(
            Command::parse("set prompt a red fox"),
            Ok(Some(Command::Set {
                name: "prompt".to_string(),
                value: "a red fox".to_string(),
            }))
        );
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(Command::parse("set width").is_err());
        assert!(Command::parse("launch").is_err());
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from(["genfeed-watch", "--kind", "text", "--interval-ms", "500"])
            .unwrap();
        assert_eq!(args.kind, FeedKind::Text);
        assert_eq!(args.interval_ms, Some(500));
        assert!(args.feed_url.is_none());
    }
}
