//! Edit Coordinator
//!
//! Owns the pause switch and the widget's live `GenerationParams`.
//!
//! # Edit Flow
//!
//! ```text
//!   update_param ──► pause ──► merge into candidate
//!   submit ──► pause ──► same as last? ──yes──► seed + 1
//!                              │
//!                              ▼
//!                     build URL, new token ──► EditRequest (caller preloads)
//!   on_preloaded(token) ──► token current? ──no──► discard
//!                              │
//!                              ▼
//!                        item becomes current
//! ```
//!
//! `submit` never resumes the slideshow. Only `resume` clears the pause flag.
//! Every submission gets a fresh, monotonically increasing token; a result
//! whose token is not the pending one is stale and dropped.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{FeedError, PreloadError};
use crate::event::{DisplayItem, FeedKind, ItemId, ItemOrigin};
use crate::params::{GenerationParams, ParamUpdate, RequestUrlBuilder};
use crate::pause::{PauseReader, PauseSwitch};

/// Identifies one edit submission
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EditToken(pub u64);

impl std::fmt::Display for EditToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "edit-{}", self.0)
    }
}

/// Progress of the most recent edit
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EditStatus {
    /// Nothing in flight
    #[default]
    Idle,
    /// Waiting for a preload
    Loading {
        /// The pending submission
        token: EditToken,
    },
    /// The last submission failed to load
    Failed {
        /// Error text
        reason: String,
    },
}

/// A submitted edit the caller must preload
#[derive(Clone, Debug)]
pub struct EditRequest {
    /// Token to hand back with the result
    pub token: EditToken,
    /// Unloaded item built from the submitted params
    pub item: DisplayItem,
    /// Request URL
    pub url: Url,
    /// Parameters as submitted (after any seed increment)
    pub params: GenerationParams,
}

/// Coordinates parameter edits, submissions and the pause flag
#[derive(Debug)]
pub struct EditCoordinator {
    kind: FeedKind,
    urls: RequestUrlBuilder,
    pause: PauseSwitch,
    live: GenerationParams,
    last_submitted: Option<GenerationParams>,
    next_token: u64,
    pending: Option<EditToken>,
    status: EditStatus,
}

impl EditCoordinator {
    /// Create a coordinator owning the pause switch
    #[must_use]
    pub fn new(kind: FeedKind, urls: RequestUrlBuilder, pause: PauseSwitch) -> Self {
        Self {
            kind,
            urls,
            pause,
            live: GenerationParams::default(),
            last_submitted: None,
            next_token: 1,
            pending: None,
            status: EditStatus::Idle,
        }
    }

    /// Start from the given parameters instead of the defaults
    #[must_use]
    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.live = params;
        self
    }

    /// The live candidate
    #[must_use]
    pub fn params(&self) -> &GenerationParams {
        &self.live
    }

    /// The most recent submission
    #[must_use]
    pub fn last_submitted(&self) -> Option<&GenerationParams> {
        self.last_submitted.as_ref()
    }

    /// Whether the slideshow is paused
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.pause.is_paused()
    }

    /// Whether an edit preload is in flight
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    /// Current edit status
    #[must_use]
    pub fn status(&self) -> &EditStatus {
        &self.status
    }

    /// A reader for the pause flag
    #[must_use]
    pub fn pause_reader(&self) -> PauseReader {
        self.pause.reader()
    }

    fn enter_edit_mode(&self) {
        if self.pause.set(true) {
            tracing::info!(kind = %self.kind, "Slideshow paused for editing");
        }
    }

    /// Seed the candidate from a displayed item and pause
    pub fn begin_edit(&mut self, item: &DisplayItem) {
        self.enter_edit_mode();
        self.live = GenerationParams::from_item(item);
        tracing::debug!(item = %item.id, seed = self.live.seed, "Editing from item");
    }

    /// Pause, then merge one typed edit into the candidate
    pub fn update_param(&mut self, update: ParamUpdate) {
        self.enter_edit_mode();
        tracing::debug!(?update, "Parameter updated");
        self.live.apply(update);
    }

    /// Pause, then merge one by-name edit into the candidate
    ///
    /// # Errors
    ///
    /// Returns the parse error for an unknown name or bad value. The
    /// candidate is unchanged in that case but the slideshow stays paused.
    pub fn update_param_named(&mut self, name: &str, value: &str) -> Result<(), FeedError> {
        self.enter_edit_mode();
        let update = ParamUpdate::parse(name, value)?;
        tracing::debug!(?update, "Parameter updated");
        self.live.apply(update);
        Ok(())
    }

    /// Submit the candidate
    ///
    /// If the candidate describes the same request as the previous
    /// submission, its seed is bumped by one first (and the bump is kept in
    /// the live candidate). Any earlier pending edit becomes stale.
    ///
    /// # Errors
    ///
    /// Returns `FeedError::EmptyPrompt` if the prompt is blank.
    pub fn submit(&mut self) -> Result<EditRequest, FeedError> {
        self.enter_edit_mode();

        if self.live.prompt.trim().is_empty() {
            return Err(FeedError::EmptyPrompt);
        }

        if let Some(last) = &self.last_submitted {
            if self.live.same_request_as(last) {
                let bumped = self.live.seed.wrapping_add(1);
                tracing::debug!(from = self.live.seed, to = bumped, "Unchanged params, bumping seed");
                self.live.seed = bumped;
            }
        }

        let params = self.live.normalized();
        let url = self.urls.request_url(self.kind, &params);

        let token = EditToken(self.next_token);
        self.next_token += 1;

        if let Some(previous) = self.pending.replace(token) {
            tracing::debug!(superseded = %previous, by = %token, "Edit superseded");
        }
        self.status = EditStatus::Loading { token };
        self.last_submitted = Some(params.clone());

        tracing::info!(token = %token, url = %url, "Edit submitted");

        let item = DisplayItem {
            id: ItemId::generate(),
            kind: self.kind,
            origin: ItemOrigin::Edit,
            url: Some(url.to_string()),
            response: None,
            prompt: params.prompt.clone(),
            seed: Some(params.seed),
            model: params.model.clone(),
            width: Some(params.width),
            height: Some(params.height),
            received_at: chrono::Utc::now(),
            loaded: false,
        };

        Ok(EditRequest {
            token,
            item,
            url,
            params,
        })
    }

    /// Handle a finished edit preload
    ///
    /// Returns the item to display, or `None` if the result is stale or
    /// failed.
    pub fn on_preloaded(
        &mut self,
        token: EditToken,
        result: Result<DisplayItem, PreloadError>,
    ) -> Option<DisplayItem> {
        if self.pending != Some(token) {
            tracing::debug!(token = %token, "Discarding stale edit result");
            return None;
        }
        self.pending = None;

        match result {
            Ok(item) => {
                tracing::info!(token = %token, item = %item.id, "Edit loaded");
                self.status = EditStatus::Idle;
                Some(item)
            }
            Err(e) => {
                tracing::warn!(token = %token, error = %e, "Edit preload failed");
                self.status = EditStatus::Failed {
                    reason: e.to_string(),
                };
                None
            }
        }
    }

    /// Abandon the pending edit and clear any failure, staying paused
    pub fn cancel(&mut self) -> Option<EditToken> {
        let cancelled = self.pending.take();
        if let Some(token) = cancelled {
            tracing::info!(token = %token, "Edit cancelled");
        }
        self.status = EditStatus::Idle;
        cancelled
    }

    /// Resume the slideshow, discarding any pending edit
    pub fn resume(&mut self) -> Option<EditToken> {
        let discarded = self.pending.take();
        self.status = EditStatus::Idle;
        if self.pause.set(false) {
            tracing::info!(kind = %self.kind, "Slideshow resumed");
        }
        discarded
    }
}
