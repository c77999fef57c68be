//! Cloud LLM engine: translation through an Anthropic-style messages
//! API. Input is capped at a fixed character limit before it leaves
//! the device.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::text::truncate_chars;

use super::TranslateError;

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const MODEL: &str = "claude-3-5-haiku-20241022";
const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4096;
const MAX_INPUT_CHARS: usize = 5_000;

#[derive(Debug, Serialize)]
struct MessageRequest {
    model: String,
    max_tokens: u32,
    system: String,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

pub struct CloudTranslator {
    client: Client,
    api_key: Option<String>,
    source: String,
    target: String,
}

impl CloudTranslator {
    pub fn new(api_key: Option<String>, source: &str, target: &str) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            api_key,
            source: source.to_string(),
            target: target.to_string(),
        }
    }

    fn build_request(&self, text: &str) -> MessageRequest {
        MessageRequest {
            model: MODEL.to_string(),
            max_tokens: MAX_TOKENS,
            system: format!(
                "You are a translation engine. Translate the user's text from '{}' to '{}'. \
                 Reply with the translation only, no commentary.",
                self.source, self.target
            ),
            messages: vec![Message {
                role: "user".to_string(),
                content: truncate_chars(text, MAX_INPUT_CHARS).to_string(),
            }],
        }
    }

    pub async fn translate(&self, text: &str) -> std::result::Result<String, TranslateError> {
        let Some(api_key) = &self.api_key else {
            return Err(TranslateError::NotConfigured("cloud translation API key"));
        };

        let response = self
            .client
            .post(API_URL)
            .header("x-api-key", api_key)
            .header("anthropic-version", API_VERSION)
            .json(&self.build_request(text))
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

        let message: MessageResponse = response.json().await?;
        let translated: Vec<String> = message
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect();
        Ok(translated.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn translator() -> CloudTranslator {
        CloudTranslator::new(Some("key".to_string()), "en", "zh")
    }

    #[test]
    fn request_carries_prompt_and_user_text() {
        let request = translator().build_request("good morning");

        assert_eq!(request.model, MODEL);
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].role, "user");
        assert_eq!(request.messages[0].content, "good morning");
        assert!(request.system.contains("'en'"));
        assert!(request.system.contains("'zh'"));
    }

    #[test]
    fn oversized_input_is_truncated_on_a_char_boundary() {
        let text = "汉".repeat(MAX_INPUT_CHARS + 50);
        let request = translator().build_request(&text);

        let sent = &request.messages[0].content;
        assert_eq!(sent.chars().count(), MAX_INPUT_CHARS);
        assert!(sent.chars().all(|c| c == '汉'));
    }

    #[test]
    fn short_input_is_sent_verbatim() {
        let request = translator().build_request("short");
        assert_eq!(request.messages[0].content, "short");
    }

    #[test]
    fn response_text_blocks_are_joined() {
        let raw = r#"{
            "id": "msg_01",
            "content": [
                {"type": "text", "text": "你好"},
                {"type": "tool_use"},
                {"type": "text", "text": "世界"}
            ]
        }"#;
        let response: MessageResponse = serde_json::from_str(raw).expect("parse");
        let translated: Vec<String> = response
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect();
        assert_eq!(translated.join("\n"), "你好\n世界");
    }
}
