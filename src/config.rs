//! Configuration for the careline backend.
//!
//! Settings come from an optional TOML file with serde defaults; secrets
//! are referenced, not stored, and resolved from the environment at
//! startup. Plain connection fields (endpoint, region, deployment) fall
//! back to the conventional environment variables when the file leaves
//! them unset, so a bare `.env`-style deployment needs no config file at
//! all.

use crate::error::{CarelineError, Result};
use crate::history::DEFAULT_HISTORY_CAPACITY;
use crate::llm::DEFAULT_MAX_TOKENS;
use crate::llm::azure::AzureChatConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP listener settings.
    pub server: ServerConfig,
    /// Language model settings.
    pub llm: LlmConfig,
    /// Speech service settings (shared by STT and TTS).
    pub speech: SpeechConfig,
    /// Conversation settings.
    pub chat: ChatConfig,
    /// Wake phrase settings.
    pub wake: WakeConfig,
    /// Profile records source.
    pub profiles: ProfilesConfig,
}

impl AppConfig {
    /// Load configuration.
    ///
    /// An explicit `path` must exist and parse. Without one, the default
    /// location is used if present, otherwise pure defaults are returned.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let default = Self::default_path();
                if default.exists() {
                    Self::from_file(&default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// The default config file location (`<config dir>/careline/config.toml`).
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("careline")
            .join("config.toml")
    }

    fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CarelineError::Config(format!("failed to read config ({}): {e}", path.display()))
        })?;
        toml::from_str(&raw).map_err(|e| {
            CarelineError::Config(format!("invalid config ({}): {e}", path.display()))
        })
    }
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 8080,
        }
    }
}

/// Language model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Resource endpoint. Falls back to `AZURE_OPENAI_ENDPOINT`.
    pub endpoint: Option<String>,
    /// Deployment name. Falls back to `DEPLOYMENT_ID`.
    pub deployment: Option<String>,
    /// API version. Falls back to `AZURE_OPENAI_API_VERSION`, then the
    /// client default.
    pub api_version: Option<String>,
    /// API key reference.
    pub api_key: SecretRef,
    /// Token budget per reply.
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            deployment: None,
            api_version: None,
            api_key: SecretRef::Env {
                var: "AZURE_OPENAI_API_KEY".to_owned(),
            },
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

impl LlmConfig {
    /// Resolve into a ready chat client configuration.
    pub fn resolve(&self) -> Result<AzureChatConfig> {
        let endpoint = require(self.endpoint.as_deref(), "AZURE_OPENAI_ENDPOINT", "llm.endpoint")?;
        let deployment = require(self.deployment.as_deref(), "DEPLOYMENT_ID", "llm.deployment")?;
        let api_key = self.api_key.resolve()?;

        let mut config = AzureChatConfig::new(endpoint, deployment, api_key);
        let api_version = self
            .api_version
            .clone()
            .or_else(|| env_nonempty("AZURE_OPENAI_API_VERSION"));
        if let Some(api_version) = api_version {
            config = config.with_api_version(api_version);
        }
        Ok(config)
    }
}

/// Speech service configuration, shared by recognition and synthesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Service region, e.g. `canadacentral`. Falls back to `SPEECH_REGION`.
    pub region: Option<String>,
    /// API key reference.
    pub key: SecretRef,
    /// Initial synthesis voice.
    pub voice: Option<String>,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            region: None,
            key: SecretRef::Env {
                var: "SPEECH_KEY".to_owned(),
            },
            voice: None,
        }
    }
}

impl SpeechConfig {
    /// The service region, from config or environment.
    pub fn resolve_region(&self) -> Result<String> {
        require(self.region.as_deref(), "SPEECH_REGION", "speech.region")
    }
}

/// Conversation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Turns retained per session.
    pub history_capacity: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

/// Wake phrase configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WakeConfig {
    /// The phrase that promotes ambient listening into a conversation.
    pub phrase: String,
}

impl Default for WakeConfig {
    fn default() -> Self {
        Self {
            phrase: "hey companion".to_owned(),
        }
    }
}

/// Profile records source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfilesConfig {
    /// JSON file of profile records loaded at startup.
    pub path: PathBuf,
}

impl Default for ProfilesConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("user_profiles.json"),
        }
    }
}

/// Secret reference used for API keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SecretRef {
    /// Resolve from an environment variable.
    Env {
        /// Variable name.
        var: String,
    },
    /// Inline literal (discouraged; prefer `env`).
    Literal {
        /// The secret value.
        value: String,
    },
}

impl SecretRef {
    /// Resolve the secret value. A missing or empty environment variable
    /// is a configuration error.
    pub fn resolve(&self) -> Result<String> {
        match self {
            Self::Env { var } => {
                let value = std::env::var(var).map_err(|_| {
                    CarelineError::Config(format!("secret env var is missing: {var}"))
                })?;
                if value.trim().is_empty() {
                    return Err(CarelineError::Config(format!(
                        "secret env var is empty: {var}"
                    )));
                }
                Ok(value)
            }
            Self::Literal { value } => Ok(value.clone()),
        }
    }
}

/// Take the configured value, else a non-empty environment fallback, else
/// fail naming both places the value could have come from.
fn require(configured: Option<&str>, env_var: &str, config_key: &str) -> Result<String> {
    configured
        .map(str::to_owned)
        .or_else(|| env_nonempty(env_var))
        .ok_or_else(|| {
            CarelineError::Config(format!("{config_key} is not set (or set {env_var})"))
        })
}

fn env_nonempty(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.trim().is_empty())
}
