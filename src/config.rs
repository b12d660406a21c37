use std::path::PathBuf;

use eyre::Result;
use log::debug;
use serde::{Deserialize, Serialize};

/// LLM endpoint settings. The client is constructed from these at the
/// summarizing stage; nothing reads them before that.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    pub endpoint: String,
    /// Explicit key; falls back to the `OPENAI_API_KEY` environment variable.
    pub api_key: Option<String>,
    pub temperature: f32,
    pub streaming: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key: None,
            temperature: 0.01,
            streaming: true,
        }
    }
}

impl LlmConfig {
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
    }
}

/// Speech-to-text settings for the audio fallback path.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WhisperConfig {
    pub model: String,
    pub endpoint: String,
    /// Explicit key; falls back to the `OPENAI_API_KEY` environment variable.
    pub api_key: Option<String>,
}

impl Default for WhisperConfig {
    fn default() -> Self {
        Self {
            model: "whisper-1".to_string(),
            endpoint: "https://api.openai.com/v1/audio/transcriptions".to_string(),
            api_key: None,
        }
    }
}

impl WhisperConfig {
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Caption language preference order.
    pub languages: Vec<String>,
    /// Language the summary is written in.
    pub summary_language: String,
    pub llm: LlmConfig,
    pub whisper: WhisperConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            languages: vec!["en".to_string(), "fr".to_string(), "de".to_string()],
            summary_language: "english".to_string(),
            llm: LlmConfig::default(),
            whisper: WhisperConfig::default(),
        }
    }
}

impl Config {
    /// Load config from ~/.config/ytsum/config.toml if it exists
    pub fn load() -> Result<Self> {
        let path = config_path();
        if path.exists() {
            debug!("Loading config from {}", path.display());
            let content = std::fs::read_to_string(&path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            debug!("No config file found at {}", path.display());
            Ok(Config::default())
        }
    }
}

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from(".config"))
        .join("ytsum")
        .join("config.toml")
}
