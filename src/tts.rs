//! Text-to-speech capability and cloud adapter.
//!
//! Synthesis returns a complete audio buffer rather than a live stream;
//! the web client plays it back whole. Voice discovery is filtered to the
//! locales and genders the client's voice picker offers.

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use tracing::debug;

use crate::error::{CarelineError, Result};

/// Locales offered to the voice picker.
pub const LOCALES: &[&str] = &["en-US", "en-GB", "en-CA", "fr-CA"];

/// Genders offered to the voice picker.
pub const GENDERS: &[&str] = &["female", "male"];

/// Voice used when the client has not picked one.
const DEFAULT_VOICE: &str = "en-US-JennyNeural";

/// Output format requested from the synthesis endpoint.
const OUTPUT_FORMAT: &str = "riff-16khz-16bit-mono-pcm";

/// Text synthesis with a selectable voice.
#[async_trait]
pub trait TextToSpeech: Send + Sync {
    /// Synthesize text into one audio buffer (WAV).
    async fn synthesize(&self, text: &str) -> Result<Bytes>;

    /// Select the voice used for subsequent synthesis calls.
    fn set_voice(&mut self, voice: &str);

    /// The currently selected voice, if any.
    fn voice(&self) -> Option<&str>;

    /// List available voice short-names, optionally filtered by gender
    /// and/or locale. With no filter, the picker allowlists apply.
    async fn list_voices(
        &self,
        gender: Option<&str>,
        locale: Option<&str>,
    ) -> Result<Vec<String>>;
}

/// One voice record from the cloud voice catalogue.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct VoiceInfo {
    short_name: String,
    locale: String,
    gender: String,
}

/// Azure Cognitive Services speech synthesizer (REST API).
pub struct AzureSpeechSynthesizer {
    base_url: String,
    api_key: String,
    voice: Option<String>,
    client: reqwest::Client,
}

impl std::fmt::Debug for AzureSpeechSynthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureSpeechSynthesizer")
            .field("base_url", &self.base_url)
            .field("voice", &self.voice)
            .finish()
    }
}

impl AzureSpeechSynthesizer {
    /// Create a synthesizer for the given service region.
    pub fn new(region: impl AsRef<str>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: format!("https://{}.tts.speech.microsoft.com", region.as_ref()),
            api_key: api_key.into(),
            voice: None,
            client: reqwest::Client::new(),
        }
    }

    /// Override the service base URL (tests point this at a mock server).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn synthesis_url(&self) -> String {
        format!("{}/cognitiveservices/v1", self.base_url.trim_end_matches('/'))
    }

    fn voices_url(&self) -> String {
        format!(
            "{}/cognitiveservices/voices/list",
            self.base_url.trim_end_matches('/'),
        )
    }
}

#[async_trait]
impl TextToSpeech for AzureSpeechSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<Bytes> {
        let voice = self.voice.as_deref().unwrap_or(DEFAULT_VOICE);
        let ssml = build_ssml(voice, text);
        debug!(voice, chars = text.len(), "synthesizing speech");

        let response = self
            .client
            .post(self.synthesis_url())
            .header("Ocp-Apim-Subscription-Key", &self.api_key)
            .header("Content-Type", "application/ssml+xml")
            .header("X-Microsoft-OutputFormat", OUTPUT_FORMAT)
            .header("User-Agent", "careline")
            .body(ssml)
            .send()
            .await
            .map_err(|e| CarelineError::Tts(format!("synthesis request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CarelineError::Tts(format!(
                "synthesis endpoint returned {}: {body}",
                status.as_u16(),
            )));
        }

        response
            .bytes()
            .await
            .map_err(|e| CarelineError::Tts(format!("failed to read audio body: {e}")))
    }

    fn set_voice(&mut self, voice: &str) {
        self.voice = Some(voice.to_owned());
    }

    fn voice(&self) -> Option<&str> {
        self.voice.as_deref()
    }

    async fn list_voices(
        &self,
        gender: Option<&str>,
        locale: Option<&str>,
    ) -> Result<Vec<String>> {
        let response = self
            .client
            .get(self.voices_url())
            .header("Ocp-Apim-Subscription-Key", &self.api_key)
            .send()
            .await
            .map_err(|e| CarelineError::Tts(format!("voice list request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CarelineError::Tts(format!(
                "voice list endpoint returned {}",
                status.as_u16(),
            )));
        }

        let voices: Vec<VoiceInfo> = response
            .json()
            .await
            .map_err(|e| CarelineError::Tts(format!("invalid voice list response: {e}")))?;

        Ok(filter_voices(&voices, gender, locale))
    }
}

/// Wrap text in minimal SSML for the given voice.
fn build_ssml(voice: &str, text: &str) -> String {
    format!(
        "<speak version='1.0' xml:lang='en-US'><voice name='{}'>{}</voice></speak>",
        xml_escape(voice),
        xml_escape(text),
    )
}

/// Escape the five XML-significant characters.
fn xml_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Filter catalogue voices to the requested gender/locale, falling back to
/// the picker allowlists when no filter is given.
fn filter_voices(
    voices: &[VoiceInfo],
    gender: Option<&str>,
    locale: Option<&str>,
) -> Vec<String> {
    let gender_matches = |v: &VoiceInfo| match gender {
        Some(wanted) => v.gender.eq_ignore_ascii_case(wanted),
        None => GENDERS.iter().any(|g| v.gender.eq_ignore_ascii_case(g)),
    };
    let locale_matches = |v: &VoiceInfo| match locale {
        Some(wanted) => v.locale.eq_ignore_ascii_case(wanted),
        None => LOCALES.iter().any(|l| v.locale.eq_ignore_ascii_case(l)),
    };

    voices
        .iter()
        .filter(|v| gender_matches(v) && locale_matches(v))
        .map(|v| v.short_name.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voice(short_name: &str, locale: &str, gender: &str) -> VoiceInfo {
        VoiceInfo {
            short_name: short_name.to_owned(),
            locale: locale.to_owned(),
            gender: gender.to_owned(),
        }
    }

    #[test]
    fn ssml_escapes_reserved_characters() {
        let ssml = build_ssml("en-US-GuyNeural", "fish & chips <now>");
        assert!(ssml.contains("fish &amp; chips &lt;now&gt;"));
        assert!(ssml.contains("name='en-US-GuyNeural'"));
    }

    #[test]
    fn filter_defaults_to_picker_allowlists() {
        let catalogue = vec![
            voice("en-US-JennyNeural", "en-US", "Female"),
            voice("de-DE-KatjaNeural", "de-DE", "Female"),
            voice("en-GB-RyanNeural", "en-GB", "Male"),
        ];
        let names = filter_voices(&catalogue, None, None);
        assert_eq!(names, vec!["en-US-JennyNeural", "en-GB-RyanNeural"]);
    }

    #[test]
    fn filter_by_gender_and_locale() {
        let catalogue = vec![
            voice("en-GB-SoniaNeural", "en-GB", "Female"),
            voice("en-GB-RyanNeural", "en-GB", "Male"),
            voice("en-US-JennyNeural", "en-US", "Female"),
        ];
        let names = filter_voices(&catalogue, Some("female"), Some("en-GB"));
        assert_eq!(names, vec!["en-GB-SoniaNeural"]);
    }

    #[test]
    fn voice_catalogue_deserializes_pascal_case() {
        let raw = r#"[{"ShortName":"en-CA-ClaraNeural","Locale":"en-CA","Gender":"Female"}]"#;
        let parsed: Vec<VoiceInfo> = serde_json::from_str(raw).unwrap_or_default();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].short_name, "en-CA-ClaraNeural");
    }

    #[test]
    fn set_voice_overrides_default() {
        let mut synthesizer = AzureSpeechSynthesizer::new("westus2", "key");
        assert!(synthesizer.voice().is_none());
        synthesizer.set_voice("en-US-GuyNeural");
        assert_eq!(synthesizer.voice(), Some("en-US-GuyNeural"));
    }

    #[test]
    fn urls_are_region_based() {
        let synthesizer = AzureSpeechSynthesizer::new("canadacentral", "key");
        assert_eq!(
            synthesizer.voices_url(),
            "https://canadacentral.tts.speech.microsoft.com/cognitiveservices/voices/list"
        );
    }
}
