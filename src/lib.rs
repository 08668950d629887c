//! Careline: voice companion backend.
//!
//! Bridges a web client to three cloud capabilities — speech-to-text,
//! a streaming chat model, and text-to-speech — around an in-memory
//! conversation core:
//!
//! - **[`profile`]**: immutable user profiles, template-rendered system
//!   prompts, and an overwrite-only prompt cache
//! - **[`chat`]** / **[`history`]**: a bounded conversation session that
//!   injects the active system prompt at call time and commits a turn pair
//!   only after the full streamed reply arrives
//! - **[`wake`]**: wake phrase detection over transcription text
//!
//! The cloud services sit behind the narrow [`llm::ChatCompletion`],
//! [`stt::SpeechToText`], and [`tts::TextToSpeech`] traits; the [`server`]
//! module maps the core onto plain JSON-over-HTTP routes for the client.

pub mod chat;
pub mod config;
pub mod error;
pub mod history;
pub mod llm;
pub mod profile;
pub mod server;
pub mod stt;
pub mod tts;
pub mod wake;

pub use chat::ChatSession;
pub use config::AppConfig;
pub use error::{CarelineError, Result};
pub use history::{Role, Turn, TurnHistory};
pub use profile::{Profile, ProfileStore};
pub use wake::WakePhraseMatcher;
