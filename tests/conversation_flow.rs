//! End-to-end conversation core flow with an in-memory provider.
//!
//! Exercises the full control path a client walks: load profiles, fetch
//! (and optionally edit) a prompt, install it as the session system prompt,
//! then hold a bounded conversation.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use careline::chat::ChatSession;
use careline::error::{CarelineError, Result};
use careline::history::Role;
use careline::llm::{ChatCompletion, ChatMessage, CompletionStream, RequestOptions};
use careline::profile::{Profile, ProfileStore};

/// Provider that echoes a canned reply and records every request.
struct EchoProvider {
    reply: &'static [&'static str],
    requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl EchoProvider {
    fn new(reply: &'static [&'static str]) -> Arc<Self> {
        Arc::new(Self {
            reply,
            requests: Mutex::new(Vec::new()),
        })
    }

    fn request(&self, index: usize) -> Vec<ChatMessage> {
        self.requests
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(index)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl ChatCompletion for EchoProvider {
    fn name(&self) -> &str {
        "echo"
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        _options: &RequestOptions,
    ) -> Result<CompletionStream> {
        self.requests
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(messages.to_vec());
        let items: Vec<Result<String>> =
            self.reply.iter().map(|f| Ok((*f).to_owned())).collect();
        Ok(Box::pin(futures_util::stream::iter(items)))
    }
}

fn profile(id: &str, name: &str, tone: &str) -> Profile {
    Profile {
        id: id.to_owned(),
        name: name.to_owned(),
        daily_routine: Some("tea at four".to_owned()),
        family_notes: Some("nephew visits monthly".to_owned()),
        reminders: Some("physiotherapy on Tuesdays".to_owned()),
        emotional_tone: Some(tone.to_owned()),
    }
}

#[tokio::test]
async fn prompt_activation_flows_into_the_conversation() {
    let mut store = ProfileStore::new();
    store
        .load(vec![profile("simeon@example.com", "Simeon", "gentle")])
        .expect("profiles load");

    // Fetch the rendered prompt, edit it, write it back.
    let rendered = store.prompt_by_id("simeon@example.com").expect("render");
    assert!(rendered.contains("Simeon"));
    let edited = format!("{rendered}\nAlways answer in short sentences.");
    store
        .update_prompt_cache("simeon@example.com", edited.clone())
        .expect("cache update");

    // Install the edited prompt and talk.
    let provider = EchoProvider::new(&["Of course", ", Simeon."]);
    let mut session = ChatSession::new(provider.clone());
    session.set_system_prompt(store.prompt_by_id("simeon@example.com").expect("cached"));

    let reply = session.send("could you keep me company?").await.expect("send");
    assert_eq!(reply, "Of course, Simeon.");

    // The request carried the edited prompt, then the user message.
    let request = provider.request(0);
    assert_eq!(request[0].role, Role::System);
    assert_eq!(request[0].content, edited);
    assert_eq!(request[1].role, Role::User);

    // Both sides of the exchange were committed.
    assert_eq!(session.history_len(), 2);
}

#[tokio::test]
async fn history_window_slides_across_many_exchanges() {
    let provider = EchoProvider::new(&["noted"]);
    let mut session = ChatSession::new(provider.clone()).with_history_capacity(6);

    for i in 0..10 {
        session.send(&format!("entry {i}")).await.expect("send");
    }

    // Capacity held throughout, oldest exchanges gone.
    assert_eq!(session.history_len(), 6);
    let oldest = session.history().next().expect("non-empty");
    assert_eq!(oldest.content, "entry 7");

    // The next request replays exactly the retained window plus the new
    // user message (no system prompt set).
    session.send("latest").await.expect("send");
    let request = provider.request(10);
    assert_eq!(request.len(), 7);
    assert_eq!(request[0].content, "entry 7");
    assert_eq!(request.last().map(|m| m.content.as_str()), Some("latest"));
}

#[tokio::test]
async fn ambiguous_names_force_id_disambiguation() {
    let mut store = ProfileStore::new();
    store
        .load(vec![
            profile("ada1@example.com", "Ada", "warm"),
            profile("ada2@example.com", "Ada", "brisk"),
        ])
        .expect("profiles load");

    assert!(matches!(
        store.prompt_by_name("Ada"),
        Err(CarelineError::AmbiguousName { count: 2, .. })
    ));

    // Disambiguating by id still works and renders distinct prompts.
    let first = store.prompt_by_id("ada1@example.com").expect("render");
    let second = store.prompt_by_id("ada2@example.com").expect("render");
    assert!(first.contains("warm"));
    assert!(second.contains("brisk"));
}
