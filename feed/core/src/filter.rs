//! Content Filter
//!
//! Pure admission predicate for feed events. An event is rejected when the
//! backend flagged it unsafe, when its prompt contains a blocked term
//! (case-insensitive substring match), or when it has no prompt at all.
//! Rejection is never an error.

/// Terms rejected by default
pub const DEFAULT_BLOCKED_TERMS: &[&str] = &[
    "nsfw", "nude", "naked", "porn", "hentai", "sex", "xxx", "gore", "lingerie",
];

/// Why an event was or was not admitted
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FilterVerdict {
    /// Event may enter the buffer queue
    Admit,
    /// Backend flagged the event unsafe
    FlaggedUnsafe,
    /// Prompt matched a blocked term
    BlockedTerm(String),
    /// Event has no prompt text to check
    MissingPrompt,
}

impl FilterVerdict {
    /// Whether the verdict admits the event
    #[must_use]
    pub fn is_admitted(&self) -> bool {
        matches!(self, Self::Admit)
    }
}

/// Blocklist-based content filter
#[derive(Clone, Debug)]
pub struct ContentFilter {
    /// Lowercased blocked terms
    blocked: Vec<String>,
}

impl Default for ContentFilter {
    fn default() -> Self {
        Self::new(DEFAULT_BLOCKED_TERMS.iter().copied())
    }
}

impl ContentFilter {
    /// Create a filter from a list of blocked terms
    ///
    /// Terms are lowercased; empty terms are ignored.
    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut blocked: Vec<String> = terms
            .into_iter()
            .map(|t| t.as_ref().trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        blocked.sort();
        blocked.dedup();
        Self { blocked }
    }

    /// Default terms plus additional ones
    pub fn with_extra_terms<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut terms: Vec<String> = DEFAULT_BLOCKED_TERMS.iter().map(|t| (*t).to_string()).collect();
        terms.extend(extra.into_iter().map(|t| t.as_ref().to_string()));
        Self::new(terms)
    }

    /// The blocked terms (lowercased, sorted)
    #[must_use]
    pub fn terms(&self) -> &[String] {
        &self.blocked
    }

    /// Classify an event
    #[must_use]
    pub fn check(&self, event: &crate::event::FeedEvent) -> FilterVerdict {
        if event.nsfw {
            return FilterVerdict::FlaggedUnsafe;
        }

        let Some(prompt) = event.prompt_text() else {
            return FilterVerdict::MissingPrompt;
        };

        match self.blocked_term_in(&prompt) {
            Some(term) => FilterVerdict::BlockedTerm(term.to_string()),
            None => FilterVerdict::Admit,
        }
    }

    /// Whether an event may be displayed
    #[must_use]
    pub fn admit(&self, event: &crate::event::FeedEvent) -> bool {
        let verdict = self.check(event);
        match &verdict {
            FilterVerdict::Admit => {}
            FilterVerdict::BlockedTerm(term) => {
                tracing::debug!(term = %term, "Feed event rejected by blocklist");
            }
            other => {
                tracing::trace!(verdict = ?other, "Feed event rejected");
            }
        }
        verdict.is_admitted()
    }

    /// First blocked term contained in `text`, if any
    #[must_use]
    pub fn blocked_term_in(&self, text: &str) -> Option<&str> {
        let lowered = text.to_lowercase();
        self.blocked
            .iter()
            .find(|term| lowered.contains(term.as_str()))
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::FeedEvent;

    fn event(json: &str) -> FeedEvent {
        FeedEvent::parse(json).unwrap()
    }

    #[test]
    fn test_admits_clean_event() {
        let filter = ContentFilter::default();
        assert!(filter.admit(&event(r#"{"imageURL":"a.png","prompt":"a red fox"}"#)));
    }

    #[test]
    fn test_rejects_nsfw_flag() {
        let filter = ContentFilter::default();
        let e = event(r#"{"imageURL":"a.png","prompt":"a red fox","nsfw":true}"#);
        assert_eq!(filter.check(&e), FilterVerdict::FlaggedUnsafe);
        assert!(!filter.admit(&e));
    }

    #[test]
    fn test_blocklist_is_case_insensitive_substring() {
        let filter = ContentFilter::new(["Forbidden"]);
        let e = event(r#"{"imageURL":"a.png","prompt":"a totally FORBIDDENthing"}"#);
        assert_eq!(
            filter.check(&e),
            FilterVerdict::BlockedTerm("forbidden".to_string())
        );
    }

    #[test]
    fn test_missing_prompt_is_not_admissible() {
        let filter = ContentFilter::default();
        let e = event(r#"{"imageURL":"a.png"}"#);
        assert_eq!(filter.check(&e), FilterVerdict::MissingPrompt);
    }

    #[test]
    fn test_blocklist_checks_message_fallback() {
        let filter = ContentFilter::new(["secret"]);
        let e = event(
            r#"{"response":"ok","parameters":{"messages":[{"role":"user","content":"tell me a Secret"}]}}"#,
        );
        assert!(!filter.admit(&e));
    }

    #[test]
    fn test_extra_terms_extend_defaults() {
        let filter = ContentFilter::with_extra_terms(["  Spoiler ", ""]);
        assert!(filter.terms().iter().any(|t| t == "spoiler"));
        assert!(filter.terms().iter().any(|t| t == "nsfw"));
        assert!(!filter.terms().iter().any(String::is_empty));
    }
}
