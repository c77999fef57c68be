use chrono::{DateTime, Utc};
use rusqlite::{params, Row};
use tokio_rusqlite::Connection;

use crate::error::Result;
use crate::models::{Bookmark, NewBookmark};

use super::schema::SCHEMA;

pub struct BookmarkRepository {
    conn: Connection,
}

impl BookmarkRepository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;

        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    pub async fn exists(&self, article_id: &str) -> Result<bool> {
        let article_id = article_id.to_string();
        let exists = self
            .conn
            .call(move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM bookmarks WHERE article_id = ?1",
                    params![article_id],
                    |row| row.get(0),
                )?;
                Ok(count > 0)
            })
            .await?;
        Ok(exists)
    }

    /// Upsert keyed on article id, so a double save can never produce a
    /// second row for the same article.
    pub async fn save(&self, bookmark: NewBookmark) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO bookmarks (article_id, title, content, translated_content, engine, origin)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                       ON CONFLICT(article_id) DO UPDATE SET
                           title = excluded.title,
                           content = excluded.content,
                           translated_content = excluded.translated_content,
                           engine = excluded.engine,
                           origin = excluded.origin"#,
                    params![
                        bookmark.article_id,
                        bookmark.title,
                        bookmark.content,
                        bookmark.translated_content,
                        bookmark.engine,
                        bookmark.origin,
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn delete(&self, article_id: &str) -> Result<()> {
        let article_id = article_id.to_string();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "DELETE FROM bookmarks WHERE article_id = ?1",
                    params![article_id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn list_all(&self) -> Result<Vec<Bookmark>> {
        let bookmarks = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT article_id, title, content, translated_content, engine, origin, created_at
                       FROM bookmarks
                       ORDER BY created_at DESC, rowid DESC"#,
                )?;
                let bookmarks = stmt
                    .query_map([], |row| Ok(bookmark_from_row(row)))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(bookmarks)
            })
            .await?;
        Ok(bookmarks)
    }
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    // Try RFC3339 first (e.g., "2026-01-11T12:34:56+00:00")
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Try SQLite datetime format (e.g., "2026-01-11 12:34:56")
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

fn bookmark_from_row(row: &Row) -> Bookmark {
    Bookmark {
        article_id: row.get(0).unwrap(),
        title: row.get(1).unwrap(),
        content: row.get(2).unwrap(),
        translated_content: row.get(3).unwrap(),
        engine: row.get(4).unwrap(),
        origin: row.get(5).unwrap(),
        created_at: row
            .get::<_, String>(6)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
    }
}
