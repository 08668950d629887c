//! Wake phrase detection over transcribed text.
//!
//! The browser client streams every transcription result through the
//! matcher; a hit is what promotes ambient listening into a conversation.
//! Matching is text-based and runs after speech recognition, not on audio.

/// Matches a configured wake phrase against transcription results.
///
/// Matching is case-insensitive and ignores punctuation in the transcript:
/// every character that is not alphanumeric, an underscore, or whitespace is
/// stripped before testing containment. A multi-word phrase therefore has to
/// appear contiguously and in order.
#[derive(Debug, Clone)]
pub struct WakePhraseMatcher {
    /// The wake phrase, uppercased at construction.
    phrase: String,
}

impl WakePhraseMatcher {
    /// Create a matcher for the given phrase.
    pub fn new(phrase: impl Into<String>) -> Self {
        Self {
            phrase: phrase.into().to_uppercase(),
        }
    }

    /// The configured phrase (uppercased).
    #[must_use]
    pub fn phrase(&self) -> &str {
        &self.phrase
    }

    /// Returns `true` if the wake phrase occurs in `text`.
    ///
    /// An empty or whitespace-only phrase never matches: an unconfigured
    /// matcher must not fire on every utterance.
    #[must_use]
    pub fn matches(&self, text: &str) -> bool {
        if self.phrase.trim().is_empty() || text.is_empty() {
            return false;
        }
        normalize(text).contains(&self.phrase)
    }
}

/// Uppercase `text` and strip everything that is not alphanumeric,
/// an underscore, or whitespace.
fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '_')
        .collect::<String>()
        .to_uppercase()
}
