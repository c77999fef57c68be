//! Translation engines and the dispatcher that selects between them.
//!
//! Four engines share one entry point: an on-device lexicon, a cloud
//! LLM, a self-hosted LibreTranslate-style server and an external
//! command. Engines never fall back to each other and share no result
//! state; a failing engine fails alone.

mod cloud;
mod command;
mod lexicon;
mod libre;
mod service;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::TranslationConfig;

use cloud::CloudTranslator;
use command::CommandTranslator;
use libre::LibreTranslator;

pub use lexicon::{LexiconEngine, ModelState};
pub use service::{DownloadOutcome, TranslationOutcome, TranslationService};

/// Selectable translation engine. The serialized form doubles as the
/// stable id stored with bookmarks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Engine {
    #[default]
    OnDevice,
    CloudLlm,
    SelfHosted,
    Command,
}

impl Engine {
    pub const ALL: [Engine; 4] = [
        Engine::OnDevice,
        Engine::CloudLlm,
        Engine::SelfHosted,
        Engine::Command,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Engine::OnDevice => "on-device",
            Engine::CloudLlm => "cloud-llm",
            Engine::SelfHosted => "self-hosted",
            Engine::Command => "command",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Engine::OnDevice => "On-device lexicon",
            Engine::CloudLlm => "Cloud LLM",
            Engine::SelfHosted => "Self-hosted API",
            Engine::Command => "System command",
        }
    }

    pub fn next(self) -> Self {
        match self {
            Engine::OnDevice => Engine::CloudLlm,
            Engine::CloudLlm => Engine::SelfHosted,
            Engine::SelfHosted => Engine::Command,
            Engine::Command => Engine::OnDevice,
        }
    }
}

#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("language model '{language}' is not ready")]
    ModelNotReady { language: String },

    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("translation request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("translation API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("translator command failed: {0}")]
    Command(String),

    #[error("invalid language model: {0}")]
    Model(String),

    #[error("model storage error: {0}")]
    Io(#[from] std::io::Error),
}

/// Owns one instance of every engine and routes calls to the selected
/// one.
pub struct Translator {
    lexicon: LexiconEngine,
    cloud: CloudTranslator,
    libre: LibreTranslator,
    command: CommandTranslator,
}

impl Translator {
    pub fn new(config: &TranslationConfig) -> Self {
        Self {
            lexicon: LexiconEngine::new(
                &config.lexicon_base_url,
                &config.models_dir,
                &config.target_language,
            ),
            cloud: CloudTranslator::new(
                config.anthropic_api_key.clone(),
                &config.source_language,
                &config.target_language,
            ),
            libre: LibreTranslator::new(
                &config.libre_url,
                config.libre_api_key.clone(),
                &config.source_language,
                &config.target_language,
            ),
            command: CommandTranslator::new(
                &config.command,
                &config.source_language,
                &config.target_language,
            ),
        }
    }

    /// Translate `text` with the given engine. Empty input returns
    /// empty output without touching any backend.
    pub async fn translate(
        &self,
        engine: Engine,
        text: &str,
    ) -> std::result::Result<String, TranslateError> {
        if text.is_empty() {
            return Ok(String::new());
        }

        match engine {
            Engine::OnDevice => self.lexicon.translate(text),
            Engine::CloudLlm => self.cloud.translate(text).await,
            Engine::SelfHosted => self.libre.translate(text).await,
            Engine::Command => self.command.translate(text).await,
        }
    }

    pub fn lexicon(&self) -> &LexiconEngine {
        &self.lexicon
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every backend here would error if called: no lexicon installed,
    /// no API key, a refused port and a missing binary.
    fn unreachable_translator(models_dir: &std::path::Path) -> Translator {
        Translator::new(&TranslationConfig {
            anthropic_api_key: None,
            libre_url: "http://127.0.0.1:1".to_string(),
            libre_api_key: None,
            lexicon_base_url: "http://127.0.0.1:1".to_string(),
            models_dir: models_dir.to_string_lossy().to_string(),
            source_language: "en".to_string(),
            target_language: "zh".to_string(),
            command: "no-such-translator-binary".to_string(),
        })
    }

    #[tokio::test]
    async fn empty_input_short_circuits_every_engine() {
        let dir = tempfile::tempdir().expect("tempdir");
        let translator = unreachable_translator(dir.path());

        for engine in Engine::ALL {
            let translated = translator
                .translate(engine, "")
                .await
                .unwrap_or_else(|e| panic!("{} should not be called: {e}", engine.id()));
            assert_eq!(translated, "");
        }
    }

    #[tokio::test]
    async fn on_device_without_model_reports_not_ready() {
        let dir = tempfile::tempdir().expect("tempdir");
        let translator = unreachable_translator(dir.path());

        let result = translator.translate(Engine::OnDevice, "hello").await;
        assert!(matches!(
            result,
            Err(TranslateError::ModelNotReady { language }) if language == "zh"
        ));
    }

    #[tokio::test]
    async fn cloud_without_key_is_not_configured() {
        let dir = tempfile::tempdir().expect("tempdir");
        let translator = unreachable_translator(dir.path());

        let result = translator.translate(Engine::CloudLlm, "hello").await;
        assert!(matches!(result, Err(TranslateError::NotConfigured(_))));
    }

    #[tokio::test]
    async fn command_engine_reports_missing_binary() {
        let dir = tempfile::tempdir().expect("tempdir");
        let translator = unreachable_translator(dir.path());

        let result = translator.translate(Engine::Command, "hello").await;
        assert!(matches!(result, Err(TranslateError::Command(_))));
    }

    #[test]
    fn cycle_visits_every_engine_once() {
        let mut seen = vec![Engine::default()];
        let mut engine = Engine::default();
        for _ in 0..3 {
            engine = engine.next();
            seen.push(engine);
        }
        assert_eq!(seen, Engine::ALL.to_vec());
        assert_eq!(engine.next(), Engine::default());
    }

    #[test]
    fn serialized_form_matches_stable_id() {
        for engine in Engine::ALL {
            let json = serde_json::to_string(&engine).expect("serialize");
            assert_eq!(json, format!("\"{}\"", engine.id()));
            let back: Engine = serde_json::from_str(&json).expect("deserialize");
            assert_eq!(back, engine);
        }
    }
}
