use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::text::strip_html;

/// A single entry from the personalized stream. Everything except the
/// id can be missing on the wire; accessors below supply the fallbacks
/// the views rely on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: String,
    pub title: String,
    pub content_html: Option<String>,
    pub origin: Option<String>,
    pub published: Option<DateTime<Utc>>,
}

impl Article {
    /// Body text with HTML tags removed; empty when the stream carried
    /// no content for this entry.
    pub fn plain_content(&self) -> String {
        self.content_html
            .as_deref()
            .map(strip_html)
            .unwrap_or_default()
    }

    pub fn origin_title(&self) -> &str {
        self.origin.as_deref().unwrap_or("unknown source")
    }

    pub fn published_label(&self) -> Option<String> {
        self.published
            .map(|date| date.format("%Y-%m-%d %H:%M").to_string())
    }
}
