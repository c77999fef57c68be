use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A saved article, snapshotted at bookmark time so it stays readable
/// after the entry drops out of the stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bookmark {
    pub article_id: String,
    pub title: String,
    pub content: String,
    pub translated_content: Option<String>,
    pub engine: String,
    pub origin: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewBookmark {
    pub article_id: String,
    pub title: String,
    pub content: String,
    pub translated_content: Option<String>,
    pub engine: String,
    pub origin: Option<String>,
}
