use serde::{Deserialize, Serialize};

/// How the reading pane combines the original body with its
/// translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadingMode {
    #[default]
    Original,
    Translated,
    Bilingual,
}

impl ReadingMode {
    pub fn next(self) -> Self {
        match self {
            ReadingMode::Original => ReadingMode::Translated,
            ReadingMode::Translated => ReadingMode::Bilingual,
            ReadingMode::Bilingual => ReadingMode::Original,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ReadingMode::Original => "Original",
            ReadingMode::Translated => "Translated",
            ReadingMode::Bilingual => "Bilingual",
        }
    }

    /// Text rendered in the reading pane. Modes that want a translation
    /// fall back to the original while none is available.
    pub fn compose(self, original: &str, translated: Option<&str>) -> String {
        match self {
            ReadingMode::Original => original.to_string(),
            ReadingMode::Translated => translated.unwrap_or(original).to_string(),
            ReadingMode::Bilingual => match translated {
                Some(translation) => {
                    format!("{original}\n\n--- translation ---\n\n{translation}")
                }
                None => original.to_string(),
            },
        }
    }

    /// Text handed to the speech player: the original in original mode,
    /// otherwise the translation when one exists.
    pub fn speech_text<'a>(self, original: &'a str, translated: Option<&'a str>) -> &'a str {
        match self {
            ReadingMode::Original => original,
            ReadingMode::Translated | ReadingMode::Bilingual => translated.unwrap_or(original),
        }
    }
}
