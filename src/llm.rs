//! HTTP client for the external LLM service: chat completion with optional
//! image input, used for keyframe OCR/scene description.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::LlmConfig;
use crate::error::{CoreError, Result};

const LLM_TIMEOUT: Duration = Duration::from_secs(60);
const RETRY_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: MessageContent<'a>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent<'a> {
    Text(&'a str),
    Parts(Vec<ContentPart<'a>>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrlRef<'a> },
}

#[derive(Debug, Serialize)]
struct ImageUrlRef<'a> {
    url: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

pub struct LlmClient {
    client: reqwest::Client,
    config: LlmConfig,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Self {
        Self { client: reqwest::Client::new(), config }
    }

    fn auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) if !key.is_empty() => builder.bearer_auth(key),
            _ => builder,
        }
    }

    /// Plain text chat completion, single retry after a 500ms delay.
    pub async fn complete(&self, prompt: &str) -> Result<String> {
        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage { role: "user", content: MessageContent::Text(prompt) }],
        };
        self.send_with_single_retry(&body).await
    }

    /// Vision-capable chat completion: a prompt plus an image (typically a
    /// `data:image/jpeg;base64,...` URL), used for keyframe OCR and scene
    /// description.
    pub async fn complete_with_image(&self, prompt: &str, image_url: &str) -> Result<String> {
        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: MessageContent::Parts(vec![
                    ContentPart::Text { text: prompt },
                    ContentPart::ImageUrl { image_url: ImageUrlRef { url: image_url } },
                ]),
            }],
        };
        self.send_with_single_retry(&body).await
    }

    async fn send_with_single_retry<B: Serialize>(&self, body: &B) -> Result<String> {
        let url = format!("{}/chat/completions", self.config.endpoint.trim_end_matches('/'));

        match self.try_once(&url, body).await {
            Ok(text) => Ok(text),
            Err(_) => {
                tokio::time::sleep(RETRY_DELAY).await;
                self.try_once(&url, body).await
            }
        }
    }

    async fn try_once<B: Serialize>(&self, url: &str, body: &B) -> Result<String> {
        let response = self
            .auth(self.client.post(url).timeout(LLM_TIMEOUT).json(body))
            .send()
            .await
            .map_err(|e| CoreError::Other(anyhow::anyhow!("llm request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(CoreError::Other(anyhow::anyhow!("llm returned status {}", response.status())));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| CoreError::Other(anyhow::anyhow!("failed to parse llm response: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| CoreError::Other(anyhow::anyhow!("llm response had no choices")))
    }
}
