use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    #[serde(default)]
    pub feed: FeedConfig,

    #[serde(default)]
    pub translation: TranslationConfig,

    #[serde(default)]
    pub speech: SpeechConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_feed_base_url")]
    pub base_url: String,

    /// Stream to read, e.g. `user/-/category/global.all`.
    #[serde(default = "default_stream_id")]
    pub stream_id: String,

    pub token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationConfig {
    pub anthropic_api_key: Option<String>,

    /// LibreTranslate-compatible endpoint for the self-hosted engine.
    #[serde(default = "default_libre_url")]
    pub libre_url: String,

    pub libre_api_key: Option<String>,

    /// Where per-language lexicon models are fetched from
    /// (`{lexicon_base_url}/{code}.json`).
    #[serde(default = "default_lexicon_base_url")]
    pub lexicon_base_url: String,

    #[serde(default = "default_models_dir")]
    pub models_dir: String,

    #[serde(default = "default_source_language")]
    pub source_language: String,

    #[serde(default = "default_target_language")]
    pub target_language: String,

    /// External translator binary for the command engine.
    #[serde(default = "default_translator_command")]
    pub command: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    #[serde(default = "default_speech_program")]
    pub program: String,

    /// Language used for playback segments after the first one.
    #[serde(default = "default_speech_language")]
    pub default_language: String,
}

fn app_data_dir() -> PathBuf {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("babel-reader");
    std::fs::create_dir_all(&data_dir).ok();
    data_dir
}

fn default_db_path() -> String {
    app_data_dir()
        .join("bookmarks.db")
        .to_string_lossy()
        .to_string()
}

fn default_feed_base_url() -> String {
    "https://cloud.feedly.com/v3".to_string()
}

fn default_stream_id() -> String {
    "user/-/category/global.all".to_string()
}

fn default_libre_url() -> String {
    "http://127.0.0.1:5000".to_string()
}

fn default_lexicon_base_url() -> String {
    "https://raw.githubusercontent.com/mwojtyczka/babel-lexicons/main".to_string()
}

fn default_models_dir() -> String {
    app_data_dir().join("models").to_string_lossy().to_string()
}

fn default_source_language() -> String {
    "en".to_string()
}

fn default_target_language() -> String {
    "zh".to_string()
}

fn default_translator_command() -> String {
    "trans".to_string()
}

fn default_speech_program() -> String {
    "espeak-ng".to_string()
}

fn default_speech_language() -> String {
    "zh".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            feed: FeedConfig::default(),
            translation: TranslationConfig::default(),
            speech: SpeechConfig::default(),
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: default_feed_base_url(),
            stream_id: default_stream_id(),
            token: None,
        }
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            anthropic_api_key: None,
            libre_url: default_libre_url(),
            libre_api_key: None,
            lexicon_base_url: default_lexicon_base_url(),
            models_dir: default_models_dir(),
            source_language: default_source_language(),
            target_language: default_target_language(),
            command: default_translator_command(),
        }
    }
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            program: default_speech_program(),
            default_language: default_speech_language(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("babel-reader")
            .join("config.toml")
    }
}
