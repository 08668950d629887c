//! Error types for the careline backend.

/// Top-level error type for the voice companion backend.
#[derive(Debug, thiserror::Error)]
pub enum CarelineError {
    /// A profile with the same id is already registered.
    #[error("profile id already exists: {0}")]
    DuplicateId(String),

    /// No profile with the given id or name.
    #[error("profile not found: {0}")]
    NotFound(String),

    /// A display name resolves to more than one profile.
    #[error("{count} profiles share the name \"{name}\"")]
    AmbiguousName {
        /// The ambiguous display name.
        name: String,
        /// How many profiles carry it.
        count: usize,
    },

    /// The prompt template references a field the profile record lacks.
    #[error("profile field missing for prompt template: {0}")]
    Render(String),

    /// The model call failed or produced no content.
    #[error("generation error: {0}")]
    Generation(String),

    /// Speech-to-text transcription error.
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech synthesis error.
    #[error("TTS error: {0}")]
    Tts(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, CarelineError>;
