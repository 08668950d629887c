//! Careline backend server binary.
//!
//! Loads configuration, constructs the core instances once, and serves the
//! HTTP API. There are no hidden singletons: everything request handlers
//! touch is built here and passed in through shared state.

use std::path::PathBuf;
use std::sync::Arc;

use careline::chat::ChatSession;
use careline::config::AppConfig;
use careline::llm::RequestOptions;
use careline::llm::azure::AzureChatClient;
use careline::profile::ProfileStore;
use careline::server::{self, AppState};
use careline::stt::AzureSpeechRecognizer;
use careline::tts::{AzureSpeechSynthesizer, TextToSpeech};
use careline::wake::WakePhraseMatcher;
use tokio::sync::Mutex;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = AppConfig::load(config_path.as_deref())?;

    let mut profiles = ProfileStore::new();
    if config.profiles.path.exists() {
        profiles.load_from_path(&config.profiles.path)?;
        tracing::info!(
            count = profiles.len(),
            path = %config.profiles.path.display(),
            "profiles loaded"
        );
    } else {
        tracing::warn!(
            path = %config.profiles.path.display(),
            "no profile records file; starting with an empty store"
        );
    }

    let provider = Arc::new(AzureChatClient::new(config.llm.resolve()?));
    let session = ChatSession::new(provider)
        .with_history_capacity(config.chat.history_capacity)
        .with_options(RequestOptions::new().with_max_tokens(config.llm.max_tokens));

    let region = config.speech.resolve_region()?;
    let speech_key = config.speech.key.resolve()?;
    let recognizer = AzureSpeechRecognizer::new(&region, speech_key.clone());
    let mut synthesizer = AzureSpeechSynthesizer::new(&region, speech_key);
    if let Some(voice) = &config.speech.voice {
        synthesizer.set_voice(voice);
    }

    let state = Arc::new(AppState {
        profiles: Mutex::new(profiles),
        session: Mutex::new(session),
        recognizer: Box::new(recognizer),
        synthesizer: Mutex::new(Box::new(synthesizer)),
        wake: WakePhraseMatcher::new(&config.wake.phrase),
    });

    server::serve(state, &config.server).await?;
    Ok(())
}
