//! Self-hosted engine: a LibreTranslate-compatible server reached over
//! plain HTTP, typically on the local network.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::TranslateError;

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    #[serde(rename = "translatedText")]
    translated_text: String,
}

pub struct LibreTranslator {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    source: String,
    target: String,
}

impl LibreTranslator {
    pub fn new(base_url: &str, api_key: Option<String>, source: &str, target: &str) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            source: source.to_string(),
            target: target.to_string(),
        }
    }

    pub async fn translate(&self, text: &str) -> std::result::Result<String, TranslateError> {
        let request = TranslateRequest {
            q: text,
            source: &self.source,
            target: &self.target,
            format: "text",
            api_key: self.api_key.as_deref(),
        };

        let response = self
            .client
            .post(format!("{}/translate", self.base_url))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(TranslateError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let translated: TranslateResponse = response.json().await?;
        Ok(translated.translated_text)
    }
}
