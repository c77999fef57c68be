//! Persisted user preferences: engine selection, speech settings, theme
//! and the downloaded-language set. Written on every change, read once
//! at startup.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::translate::Engine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Auto,
    Light,
    Dark,
}

impl Theme {
    pub fn next(self) -> Self {
        match self {
            Theme::Auto => Theme::Light,
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Auto,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Theme::Auto => "Auto",
            Theme::Light => "Light",
            Theme::Dark => "Dark",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prefs {
    #[serde(default)]
    pub engine: Engine,

    #[serde(default)]
    pub voice: Option<String>,

    #[serde(default = "default_level")]
    pub rate: f32,

    #[serde(default = "default_level")]
    pub pitch: f32,

    #[serde(default = "default_level")]
    pub volume: f32,

    #[serde(default)]
    pub theme: Theme,

    #[serde(default)]
    pub downloaded_languages: BTreeSet<String>,
}

fn default_level() -> f32 {
    1.0
}

impl Default for Prefs {
    fn default() -> Self {
        Self {
            engine: Engine::default(),
            voice: None,
            rate: default_level(),
            pitch: default_level(),
            volume: default_level(),
            theme: Theme::default(),
            downloaded_languages: BTreeSet::new(),
        }
    }
}

/// Tiny load/save wrapper around the prefs file. Cheap to clone; every
/// `update` re-reads the file so independent holders never clobber each
/// other's fields.
#[derive(Debug, Clone)]
pub struct PrefsStore {
    path: PathBuf,
}

impl PrefsStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("babel-reader")
            .join("prefs.json")
    }

    /// Missing or unreadable files degrade to defaults; a corrupt prefs
    /// file must never keep the app from starting.
    pub fn load(&self) -> Prefs {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(_) => return Prefs::default(),
        };

        match serde_json::from_str(&content) {
            Ok(prefs) => prefs,
            Err(e) => {
                tracing::warn!(
                    "Ignoring unreadable prefs file {}: {e}",
                    self.path.display()
                );
                Prefs::default()
            }
        }
    }

    pub fn save(&self, prefs: &Prefs) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(prefs)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }

    pub fn update<F>(&self, mutate: F) -> Result<Prefs>
    where
        F: FnOnce(&mut Prefs),
    {
        let mut prefs = self.load();
        mutate(&mut prefs);
        self.save(&prefs)?;
        Ok(prefs)
    }
}
