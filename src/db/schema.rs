pub const SCHEMA: &str = r#"
-- bookmarks table: snapshot of an article at save time, one live row
-- per article id
CREATE TABLE IF NOT EXISTS bookmarks (
    article_id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    content TEXT NOT NULL,
    translated_content TEXT,
    engine TEXT NOT NULL,
    origin TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_bookmarks_created_at ON bookmarks(created_at DESC);
"#;
