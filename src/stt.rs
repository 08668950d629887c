//! Speech-to-text capability and cloud adapter.
//!
//! The web client uploads one utterance at a time; transcription is a
//! single request/response call, not a live stream.

use async_trait::async_trait;
use tracing::debug;

use crate::error::{CarelineError, Result};

/// One-shot speech transcription.
///
/// Audio is raw PCM, 16 kHz, mono, 16-bit little-endian — the format the
/// browser capture worklet produces and the cloud short-audio endpoint
/// accepts.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Transcribe a single audio buffer.
    async fn transcribe(&self, audio: &[u8]) -> Result<String>;
}

/// Azure Cognitive Services speech recognizer (short-audio REST API).
pub struct AzureSpeechRecognizer {
    base_url: String,
    api_key: String,
    language: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for AzureSpeechRecognizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureSpeechRecognizer")
            .field("base_url", &self.base_url)
            .field("language", &self.language)
            .finish()
    }
}

impl AzureSpeechRecognizer {
    /// Create a recognizer for the given service region.
    pub fn new(region: impl AsRef<str>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: format!("https://{}.stt.speech.microsoft.com", region.as_ref()),
            api_key: api_key.into(),
            language: "en-US".to_owned(),
            client: reqwest::Client::new(),
        }
    }

    /// Override the service base URL (tests point this at a mock server).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the recognition language.
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// The short-audio recognition URL.
    fn recognize_url(&self) -> String {
        format!(
            "{}/speech/recognition/conversation/cognitiveservices/v1?language={}&format=simple",
            self.base_url.trim_end_matches('/'),
            self.language,
        )
    }
}

#[async_trait]
impl SpeechToText for AzureSpeechRecognizer {
    async fn transcribe(&self, audio: &[u8]) -> Result<String> {
        debug!(bytes = audio.len(), "transcribing utterance");

        let response = self
            .client
            .post(self.recognize_url())
            .header("Ocp-Apim-Subscription-Key", &self.api_key)
            .header(
                "Content-Type",
                "audio/wav; codecs=audio/pcm; samplerate=16000",
            )
            .header("Accept", "application/json")
            .body(audio.to_vec())
            .send()
            .await
            .map_err(|e| CarelineError::Stt(format!("transcription request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CarelineError::Stt(format!(
                "recognition endpoint returned {}: {body}",
                status.as_u16(),
            )));
        }

        let parsed: serde_json::Value = response
            .json()
            .await
            .map_err(|e| CarelineError::Stt(format!("invalid recognition response: {e}")))?;

        match parsed.get("RecognitionStatus").and_then(|s| s.as_str()) {
            Some("Success") => Ok(parsed
                .get("DisplayText")
                .and_then(|t| t.as_str())
                .unwrap_or_default()
                .to_owned()),
            // Silence or unintelligible audio: not an error, just nothing said.
            Some("NoMatch") => Ok(String::new()),
            other => Err(CarelineError::Stt(format!(
                "recognition failed: {}",
                other.unwrap_or("unknown status"),
            ))),
        }
    }
}
