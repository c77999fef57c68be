//! On-device engine: per-language lexicon files downloaded once and
//! applied locally.
//!
//! A lexicon is a JSON file of source phrases mapped to target-language
//! replacements, fetched from `{base_url}/{code}.json` and kept under
//! the models directory. Application is longest phrase first and
//! case-insensitive; text no entry matches passes through unchanged.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use regex::{NoExpand, Regex};
use reqwest::Client;
use serde::Deserialize;

use super::TranslateError;

/// Readiness of one language model. `Downloading` lives only in memory;
/// restarts fall back to whatever the persisted set says.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelState {
    #[default]
    NotDownloaded,
    Downloading,
    Ready,
}

impl ModelState {
    pub fn label(self) -> &'static str {
        match self {
            ModelState::NotDownloaded => "not downloaded",
            ModelState::Downloading => "downloading…",
            ModelState::Ready => "ready",
        }
    }
}

#[derive(Debug, Deserialize)]
struct LexiconFile {
    language: String,
    entries: BTreeMap<String, String>,
}

struct LexiconEntry {
    pattern: Regex,
    replacement: String,
}

/// A parsed lexicon with entries ordered longest-first and patterns
/// compiled once.
struct Lexicon {
    language: String,
    entries: Vec<LexiconEntry>,
}

impl Lexicon {
    fn from_json(raw: &str) -> std::result::Result<Self, TranslateError> {
        let file: LexiconFile = serde_json::from_str(raw)
            .map_err(|e| TranslateError::Model(format!("not a lexicon file: {e}")))?;
        if file.entries.is_empty() {
            return Err(TranslateError::Model(format!(
                "lexicon for '{}' has no entries",
                file.language
            )));
        }

        let mut pairs: Vec<(String, String)> = file.entries.into_iter().collect();
        // Longer phrases must win over their sub-phrases.
        pairs.sort_by(|a, b| {
            b.0.chars()
                .count()
                .cmp(&a.0.chars().count())
                .then_with(|| a.0.cmp(&b.0))
        });

        let mut entries = Vec::with_capacity(pairs.len());
        for (phrase, replacement) in pairs {
            let pattern = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(&phrase)))
                .map_err(|e| TranslateError::Model(format!("phrase '{phrase}': {e}")))?;
            entries.push(LexiconEntry {
                pattern,
                replacement,
            });
        }

        Ok(Self {
            language: file.language,
            entries,
        })
    }

    fn apply(&self, text: &str) -> String {
        let mut result = text.to_string();
        for entry in &self.entries {
            result = entry
                .pattern
                .replace_all(&result, NoExpand(&entry.replacement))
                .into_owned();
        }
        result
    }
}

pub struct LexiconEngine {
    client: Client,
    base_url: String,
    models_dir: PathBuf,
    target: String,
    cache: Mutex<HashMap<String, Arc<Lexicon>>>,
}

impl LexiconEngine {
    pub fn new(base_url: &str, models_dir: &str, target: &str) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            models_dir: PathBuf::from(models_dir),
            target: target.to_string(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn model_path(&self, code: &str) -> PathBuf {
        self.models_dir.join(format!("{code}.json"))
    }

    pub fn is_installed(&self, code: &str) -> bool {
        self.model_path(code).exists()
    }

    /// Download and install the lexicon for `code`. The payload is
    /// validated before anything is written, so a failed install leaves
    /// no broken model behind.
    pub async fn install(&self, code: &str) -> std::result::Result<(), TranslateError> {
        let url = format!("{}/{code}.json", self.base_url);
        tracing::info!("Downloading language model '{code}' from {url}");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TranslateError::Api {
                status: status.as_u16(),
                message: format!("model download for '{code}' failed"),
            });
        }

        let raw = response.text().await?;
        let lexicon = Arc::new(Lexicon::from_json(&raw)?);
        if lexicon.language != code {
            return Err(TranslateError::Model(format!(
                "requested '{code}' but payload declares '{}'",
                lexicon.language
            )));
        }

        tokio::fs::create_dir_all(&self.models_dir).await?;
        tokio::fs::write(self.model_path(code), raw).await?;

        self.lock_cache().insert(code.to_string(), lexicon);
        Ok(())
    }

    pub fn translate(&self, text: &str) -> std::result::Result<String, TranslateError> {
        let lexicon = self.load(&self.target)?;
        Ok(lexicon.apply(text))
    }

    fn load(&self, code: &str) -> std::result::Result<Arc<Lexicon>, TranslateError> {
        if let Some(lexicon) = self.lock_cache().get(code) {
            return Ok(Arc::clone(lexicon));
        }

        if !self.is_installed(code) {
            return Err(TranslateError::ModelNotReady {
                language: code.to_string(),
            });
        }

        let raw = std::fs::read_to_string(self.model_path(code))?;
        let lexicon = Arc::new(Lexicon::from_json(&raw)?);
        self.lock_cache().insert(code.to_string(), Arc::clone(&lexicon));
        Ok(lexicon)
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<Lexicon>>> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
