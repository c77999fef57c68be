//! HTTP client for the personalized stream endpoint.
//!
//! Fetches `{base_url}/streams/contents?streamId={id}` and maps the
//! wire items onto [`Article`]. Transient failures are retried a fixed
//! number of times with a flat delay before the error is handed to the
//! caller.

use std::time::Duration;

use chrono::DateTime;
use reqwest::Client;
use serde::Deserialize;

use crate::config::FeedConfig;
use crate::error::{AppError, Result};
use crate::models::Article;

const MAX_RETRIES: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_secs(2);
const USER_AGENT: &str = concat!("babel-reader/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct FeedClient {
    client: Client,
    base_url: String,
    stream_id: String,
    token: Option<String>,
    retry_delay: Duration,
}

#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    items: Vec<StreamItem>,
}

#[derive(Debug, Deserialize)]
struct StreamItem {
    id: String,
    title: Option<String>,
    content: Option<ItemContent>,
    origin: Option<ItemOrigin>,
    /// Epoch milliseconds.
    published: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ItemContent {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ItemOrigin {
    title: Option<String>,
}

impl StreamItem {
    fn into_article(self) -> Article {
        Article {
            id: self.id,
            title: self
                .title
                .filter(|title| !title.is_empty())
                .unwrap_or_else(|| "Untitled".to_string()),
            content_html: self.content.and_then(|c| c.content),
            origin: self.origin.and_then(|o| o.title),
            published: self.published.and_then(DateTime::from_timestamp_millis),
        }
    }
}

impl FeedClient {
    pub fn new(config: &FeedConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(USER_AGENT)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            stream_id: config.stream_id.clone(),
            token: config.token.clone(),
            retry_delay: RETRY_DELAY,
        }
    }

    #[cfg(test)]
    fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Fetch the stream, retrying transient failures. Gives up after
    /// `MAX_RETRIES` retries and returns the last error; the caller
    /// decides whether to offer a manual retry.
    pub async fn fetch_articles(&self) -> Result<Vec<Article>> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.fetch_once().await {
                Ok(articles) => {
                    tracing::debug!("Fetched {} articles from stream", articles.len());
                    return Ok(articles);
                }
                Err(e) if attempts <= MAX_RETRIES => {
                    tracing::warn!(
                        "Feed fetch attempt {attempts} failed: {e}; retrying in {}s",
                        self.retry_delay.as_secs()
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => {
                    tracing::error!("Feed fetch failed after {attempts} attempts: {e}");
                    return Err(e);
                }
            }
        }
    }

    async fn fetch_once(&self) -> Result<Vec<Article>> {
        let url = format!(
            "{}/streams/contents?streamId={}",
            self.base_url,
            urlencoding::encode(&self.stream_id)
        );

        let mut request = self.client.get(&url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::FeedApi(format!(
                "stream request returned HTTP {status}"
            )));
        }

        let stream: StreamResponse = response.json().await?;
        Ok(stream
            .items
            .into_iter()
            .map(StreamItem::into_article)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const ITEMS_BODY: &str = r#"{
        "id": "user/-/category/global.all",
        "items": [
            {
                "id": "entry/1",
                "title": "First",
                "content": {"content": "<p>Hello <b>World</b></p>", "direction": "ltr"},
                "origin": {"title": "Example Wire", "htmlUrl": "https://example.com"},
                "published": 1735689600000
            },
            {"id": "entry/2"}
        ]
    }"#;

    /// One canned status per request; requests past the end of the plan
    /// reuse the last entry. Returns the base URL, a hit counter and the
    /// captured request heads.
    async fn spawn_stub(plan: Vec<u16>) -> (String, Arc<AtomicUsize>, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind stub");
        let addr = listener.local_addr().expect("stub addr");
        let hits = Arc::new(AtomicUsize::new(0));
        let heads = Arc::new(Mutex::new(Vec::new()));

        let seen = Arc::clone(&hits);
        let captured = Arc::clone(&heads);
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let index = seen.fetch_add(1, Ordering::SeqCst);
                let status = *plan.get(index).or(plan.last()).unwrap_or(&200);

                let mut head = Vec::new();
                let mut buf = [0u8; 2048];
                loop {
                    let Ok(n) = socket.read(&mut buf).await else {
                        break;
                    };
                    if n == 0 {
                        break;
                    }
                    head.extend_from_slice(&buf[..n]);
                    if head.windows(4).any(|w| w == b"\r\n\r\n") {
                        break;
                    }
                }
                captured
                    .lock()
                    .expect("stub heads")
                    .push(String::from_utf8_lossy(&head).into_owned());

                let (line, body) = if status == 200 {
                    ("200 OK", ITEMS_BODY)
                } else {
                    ("500 Internal Server Error", "{}")
                };
                let response = format!(
                    "HTTP/1.1 {line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        (format!("http://{addr}"), hits, heads)
    }

    fn client_for(base_url: &str) -> FeedClient {
        let config = FeedConfig {
            base_url: base_url.to_string(),
            stream_id: "user/-/category/global.all".to_string(),
            token: Some("secret-token".to_string()),
        };
        FeedClient::new(&config).with_retry_delay(Duration::ZERO)
    }

    #[tokio::test]
    async fn maps_stream_items_with_fallbacks() {
        let (base_url, _, _) = spawn_stub(vec![200]).await;
        let articles = client_for(&base_url).fetch_articles().await.expect("fetch");

        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].id, "entry/1");
        assert_eq!(articles[0].title, "First");
        assert_eq!(articles[0].plain_content(), "Hello World");
        assert_eq!(articles[0].origin_title(), "Example Wire");
        assert!(articles[0].published.is_some());

        // A bare item still becomes a renderable article.
        assert_eq!(articles[1].title, "Untitled");
        assert_eq!(articles[1].plain_content(), "");
        assert_eq!(articles[1].origin_title(), "unknown source");
        assert!(articles[1].published.is_none());
    }

    #[tokio::test]
    async fn sends_bearer_token_and_encodes_stream_id() {
        let (base_url, _, heads) = spawn_stub(vec![200]).await;
        client_for(&base_url).fetch_articles().await.expect("fetch");

        let heads = heads.lock().expect("stub heads");
        let head = &heads[0];
        assert!(head.contains("streamId=user%2F-%2Fcategory%2Fglobal.all"));
        assert!(head.contains("authorization: Bearer secret-token")
            || head.contains("Authorization: Bearer secret-token"));
    }

    #[tokio::test]
    async fn gives_up_after_bounded_retries() {
        let (base_url, hits, _) = spawn_stub(vec![500]).await;
        let result = client_for(&base_url).fetch_articles().await;

        assert!(result.is_err());
        assert_eq!(hits.load(Ordering::SeqCst), 1 + MAX_RETRIES as usize);
    }

    #[tokio::test]
    async fn recovers_when_a_retry_succeeds() {
        let (base_url, hits, _) = spawn_stub(vec![500, 500, 200]).await;
        let articles = client_for(&base_url)
            .fetch_articles()
            .await
            .expect("fetch succeeds on a later attempt");

        assert_eq!(articles.len(), 2);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }
}
