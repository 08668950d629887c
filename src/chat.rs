//! Chat session: bounded conversation state around a streaming model call.
//!
//! One session owns one [`TurnHistory`] and an optional system prompt. The
//! prompt is injected at request time rather than stored in history, so it
//! can be swapped without rewriting accumulated context and so history
//! capacity governs only genuine conversational turns.

use std::sync::Arc;

use futures_util::StreamExt;
use tracing::debug;

use crate::error::{CarelineError, Result};
use crate::history::{Turn, TurnHistory};
use crate::llm::{ChatCompletion, ChatMessage, RequestOptions};

/// A conversation with one user, backed by a streaming completion provider.
pub struct ChatSession {
    provider: Arc<dyn ChatCompletion>,
    options: RequestOptions,
    system_prompt: Option<String>,
    history: TurnHistory,
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("provider", &self.provider.name())
            .field("history_len", &self.history.len())
            .field("has_system_prompt", &self.system_prompt.is_some())
            .finish()
    }
}

impl ChatSession {
    /// Create a session with default options and history capacity.
    pub fn new(provider: Arc<dyn ChatCompletion>) -> Self {
        Self {
            provider,
            options: RequestOptions::default(),
            system_prompt: None,
            history: TurnHistory::default(),
        }
    }

    /// Set the history capacity (turns, not exchanges).
    #[must_use]
    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history = TurnHistory::new(capacity);
        self
    }

    /// Set the request options used for every completion call.
    #[must_use]
    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    /// Replace the active system prompt. History is untouched.
    pub fn set_system_prompt(&mut self, prompt: impl Into<String>) {
        self.system_prompt = Some(prompt.into());
    }

    /// Remove the active system prompt.
    pub fn clear_system_prompt(&mut self) {
        self.system_prompt = None;
    }

    /// The active system prompt, if any.
    #[must_use]
    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    /// Number of turns currently retained.
    #[must_use]
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Iterate retained turns in chronological order.
    pub fn history(&self) -> impl Iterator<Item = &Turn> {
        self.history.iter()
    }

    /// Build the request message list: system prompt (if set), retained
    /// turns in chronological order, then the new user message.
    fn request_messages(&self, user_text: &str) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.history.len() + 2);
        if let Some(prompt) = &self.system_prompt {
            messages.push(ChatMessage::system(prompt));
        }
        messages.extend(
            self.history
                .iter()
                .map(|turn| ChatMessage::new(turn.role, &turn.content)),
        );
        messages.push(ChatMessage::user(user_text));
        messages
    }

    /// Send one user message and return the assembled reply.
    ///
    /// Fragments are concatenated in arrival order and trimmed. The turn
    /// pair is committed to history only after the full stream completes;
    /// a failed call, an error mid-stream, or an empty result fails with
    /// [`CarelineError::Generation`] and leaves history byte-identical.
    pub async fn send(&mut self, user_text: &str) -> Result<String> {
        let messages = self.request_messages(user_text);
        let mut stream = self.provider.complete(&messages, &self.options).await?;

        let mut assembled = String::new();
        while let Some(fragment) = stream.next().await {
            assembled.push_str(&fragment?);
        }

        let reply = assembled.trim().to_owned();
        if reply.is_empty() {
            return Err(CarelineError::Generation(
                "model produced no content".to_owned(),
            ));
        }

        debug!(
            provider = self.provider.name(),
            chars = reply.len(),
            "completion assembled"
        );

        self.history.push(Turn::user(user_text));
        self.history.push(Turn::assistant(reply.clone()));
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::history::Role;
    use async_trait::async_trait;
    use crate::llm::CompletionStream;
    use std::sync::Mutex;

    /// What the scripted provider should do on a given call.
    #[derive(Clone)]
    enum Script {
        /// Stream these fragments, then end cleanly.
        Reply(Vec<&'static str>),
        /// Fail before any stream is produced.
        FailRequest,
        /// Stream one fragment, then abort.
        FailMidStream,
        /// Produce a stream with no fragments at all.
        Empty,
    }

    /// Scripted in-memory provider that records the requests it receives.
    struct ScriptedProvider {
        script: Script,
        requests: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedProvider {
        fn new(script: Script) -> Arc<Self> {
            Arc::new(Self {
                script,
                requests: Mutex::new(Vec::new()),
            })
        }

        fn last_request(&self) -> Vec<ChatMessage> {
            self.requests.lock().unwrap().last().cloned().unwrap_or_default()
        }
    }

    #[async_trait]
    impl ChatCompletion for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(
            &self,
            messages: &[ChatMessage],
            _options: &RequestOptions,
        ) -> Result<CompletionStream> {
            self.requests.lock().unwrap().push(messages.to_vec());
            match &self.script {
                Script::Reply(fragments) => {
                    let items: Vec<Result<String>> =
                        fragments.iter().map(|f| Ok((*f).to_owned())).collect();
                    Ok(Box::pin(futures_util::stream::iter(items)))
                }
                Script::FailRequest => Err(CarelineError::Generation(
                    "request refused".to_owned(),
                )),
                Script::FailMidStream => {
                    let items: Vec<Result<String>> = vec![
                        Ok("partial ".to_owned()),
                        Err(CarelineError::Generation("stream aborted".to_owned())),
                    ];
                    Ok(Box::pin(futures_util::stream::iter(items)))
                }
                Script::Empty => Ok(Box::pin(futures_util::stream::iter(
                    Vec::<Result<String>>::new(),
                ))),
            }
        }
    }

    #[tokio::test]
    async fn send_assembles_and_trims_fragments() {
        let provider = ScriptedProvider::new(Script::Reply(vec!["  Hello", ", ", "world!  "]));
        let mut session = ChatSession::new(provider);
        let reply = session.send("hi").await.unwrap();
        assert_eq!(reply, "Hello, world!");
    }

    #[tokio::test]
    async fn send_appends_user_then_assistant() {
        let provider = ScriptedProvider::new(Script::Reply(vec!["sure"]));
        let mut session = ChatSession::new(provider);
        session.send("can you help?").await.unwrap();

        let turns: Vec<(Role, &str)> = session
            .history()
            .map(|t| (t.role, t.content.as_str()))
            .collect();
        assert_eq!(
            turns,
            vec![(Role::User, "can you help?"), (Role::Assistant, "sure")]
        );
    }

    #[tokio::test]
    async fn system_prompt_leads_and_stays_out_of_history() {
        let provider = ScriptedProvider::new(Script::Reply(vec!["ok"]));
        let mut session = ChatSession::new(provider.clone());
        session.set_system_prompt("be gentle");
        session.send("first").await.unwrap();
        session.send("second").await.unwrap();

        let request = provider.last_request();
        assert_eq!(request[0].role, Role::System);
        assert_eq!(request[0].content, "be gentle");
        // first exchange, then the new user message
        assert_eq!(request[1].content, "first");
        assert_eq!(request[2].content, "ok");
        assert_eq!(request[3].content, "second");

        // History only holds the conversational turns.
        assert_eq!(session.history_len(), 4);
        assert!(session.history().all(|t| t.role != Role::System));
    }

    #[tokio::test]
    async fn swapping_prompt_does_not_touch_history() {
        let provider = ScriptedProvider::new(Script::Reply(vec!["ok"]));
        let mut session = ChatSession::new(provider);
        session.set_system_prompt("first prompt");
        session.send("hello").await.unwrap();
        let before = session.history_len();
        session.set_system_prompt("second prompt");
        assert_eq!(session.history_len(), before);
        assert_eq!(session.system_prompt(), Some("second prompt"));
    }

    #[tokio::test]
    async fn history_is_bounded_and_fifo() {
        let provider = ScriptedProvider::new(Script::Reply(vec!["r"]));
        let mut session = ChatSession::new(provider).with_history_capacity(4);

        for i in 0..3 {
            session.send(&format!("message {i}")).await.unwrap();
        }
        assert_eq!(session.history_len(), 4);

        // The first exchange was evicted wholesale.
        let contents: Vec<&str> = session.history().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["message 1", "r", "message 2", "r"]);
    }

    #[tokio::test]
    async fn failed_request_leaves_history_unchanged() {
        let provider = ScriptedProvider::new(Script::FailRequest);
        let mut session = ChatSession::new(provider);
        let before = session.history_len();
        let result = session.send("hello").await;
        assert!(matches!(result, Err(CarelineError::Generation(_))));
        assert_eq!(session.history_len(), before);
    }

    #[tokio::test]
    async fn mid_stream_error_discards_partial_reply() {
        let provider = ScriptedProvider::new(Script::FailMidStream);
        let mut session = ChatSession::new(provider);
        let result = session.send("hello").await;
        assert!(matches!(result, Err(CarelineError::Generation(_))));
        assert_eq!(session.history_len(), 0);
    }

    #[tokio::test]
    async fn empty_stream_is_a_generation_error() {
        let provider = ScriptedProvider::new(Script::Empty);
        let mut session = ChatSession::new(provider);
        let result = session.send("hello").await;
        assert!(matches!(result, Err(CarelineError::Generation(_))));
        assert_eq!(session.history_len(), 0);
    }

    #[tokio::test]
    async fn whitespace_only_reply_is_a_generation_error() {
        let provider = ScriptedProvider::new(Script::Reply(vec!["  ", "\n"]));
        let mut session = ChatSession::new(provider);
        assert!(matches!(
            session.send("hello").await,
            Err(CarelineError::Generation(_))
        ));
        assert_eq!(session.history_len(), 0);
    }

    #[tokio::test]
    async fn no_system_prompt_means_user_message_first() {
        let provider = ScriptedProvider::new(Script::Reply(vec!["ok"]));
        let mut session = ChatSession::new(provider.clone());
        session.send("solo").await.unwrap();
        let request = provider.last_request();
        assert_eq!(request.len(), 1);
        assert_eq!(request[0].role, Role::User);
    }
}
