//! Streaming chat completion capability.
//!
//! [`ChatCompletion`] is the narrow seam between the conversation core and
//! whatever cloud model serves it. Adapters normalize provider wire formats
//! into a flat, finite stream of text fragments; the session layer folds
//! that stream into one reply.

pub mod azure;
pub mod sse;

use crate::error::Result;
use crate::history::Role;
use async_trait::async_trait;
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// Default token budget per reply. Voice replies are short.
pub const DEFAULT_MAX_TOKENS: u32 = 200;

/// A role/content pair in provider wire form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who authored the message.
    pub role: Role,
    /// The message text.
    pub content: String,
}

impl ChatMessage {
    /// Create a message with the given role.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Sampling and length options for a completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestOptions {
    /// Maximum tokens to generate. `None` means provider default.
    pub max_tokens: Option<u32>,
    /// Sampling temperature. `None` means provider default.
    pub temperature: Option<f32>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            max_tokens: Some(DEFAULT_MAX_TOKENS),
            temperature: None,
        }
    }
}

impl RequestOptions {
    /// Create request options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of tokens to generate.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the sampling temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// A finite stream of reply text fragments. Not restartable.
pub type CompletionStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Streaming chat completion capability.
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    /// Provider name for logs (e.g. `"azure-openai"`).
    fn name(&self) -> &str;

    /// Issue a completion request and stream back text fragments in
    /// arrival order.
    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &RequestOptions,
    ) -> Result<CompletionStream>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_constructors_set_roles() {
        assert_eq!(ChatMessage::system("s").role, Role::System);
        assert_eq!(ChatMessage::user("u").role, Role::User);
        assert_eq!(ChatMessage::assistant("a").role, Role::Assistant);
    }

    #[test]
    fn message_serializes_with_lowercase_role() {
        let json = serde_json::to_value(ChatMessage::user("hello")).unwrap_or_default();
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"], "hello");
    }

    #[test]
    fn default_options_cap_tokens() {
        let options = RequestOptions::new();
        assert_eq!(options.max_tokens, Some(DEFAULT_MAX_TOKENS));
        assert!(options.temperature.is_none());
    }

    #[test]
    fn option_builders() {
        let options = RequestOptions::new().with_max_tokens(64).with_temperature(0.2);
        assert_eq!(options.max_tokens, Some(64));
        assert_eq!(options.temperature, Some(0.2));
    }
}
