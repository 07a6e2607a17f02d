//! HTTP client for the external embedding service: text batches, single
//! text, and image-URL embedding, with retry/backoff on transient failures.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::error::{CoreError, Result};

const TEXT_TIMEOUT: Duration = Duration::from_secs(30);
const MULTIMODAL_TIMEOUT: Duration = Duration::from_secs(120);
const MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: EmbeddingInput<'a>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum EmbeddingInput<'a> {
    Single(&'a str),
    Batch(&'a [String]),
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Serialize)]
struct MultimodalRequest<'a> {
    model: &'a str,
    input: Vec<MultimodalPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum MultimodalPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrlRef<'a> },
}

#[derive(Debug, Serialize)]
struct ImageUrlRef<'a> {
    url: &'a str,
}

#[derive(Debug, Deserialize)]
struct MultimodalResponse {
    data: MultimodalDatum,
}

#[derive(Debug, Deserialize)]
struct MultimodalDatum {
    embedding: Vec<f32>,
}

pub struct EmbeddingClient {
    client: reqwest::Client,
    config: EmbeddingConfig,
}

impl EmbeddingClient {
    pub fn new(config: EmbeddingConfig) -> Self {
        Self { client: reqwest::Client::new(), config }
    }

    fn auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) if !key.is_empty() => {
                if !self.config.endpoint.starts_with("https://") {
                    tracing::warn!(endpoint = %self.config.endpoint, "sending embedding api_key over a non-HTTPS endpoint");
                }
                builder.bearer_auth(key)
            }
            _ => builder,
        }
    }

    /// Embeds a single string of text.
    pub async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let vectors = self.embed_batch(std::slice::from_ref(&text.to_string())).await?;
        vectors.into_iter().next().ok_or_else(|| CoreError::Embedding("empty response for single text".to_string()))
    }

    /// Embeds a batch of texts with retry on transient failure. The
    /// returned vector order corresponds one-to-one to `texts`. Groups
    /// larger than `batch_cap` are split into multiple requests, issued
    /// sequentially and concatenated in order.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let cap = self.config.batch_cap.max(1);
        let mut ordered = Vec::with_capacity(texts.len());
        for group in texts.chunks(cap) {
            ordered.extend(self.embed_batch_one_request(group).await?);
        }
        Ok(ordered)
    }

    /// Sends a single `/embeddings` request for a group already known to be
    /// within the batch cap.
    async fn embed_batch_one_request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.config.endpoint.trim_end_matches('/'));
        let body = EmbeddingRequest { model: &self.config.model, input: EmbeddingInput::Batch(texts) };

        let response = self.send_with_retry(&url, &body, TEXT_TIMEOUT).await?;
        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| CoreError::Embedding(format!("failed to parse embedding response: {e}")))?;

        let mut ordered = vec![Vec::new(); texts.len()];
        for datum in parsed.data {
            if datum.index < ordered.len() {
                ordered[datum.index] = datum.embedding;
            }
        }
        Ok(ordered)
    }

    /// Embeds an image referenced by URL (a `data:` URL or an externally
    /// reachable one) via the multimodal endpoint.
    pub async fn embed_image_url(&self, image_url: &str) -> Result<Vec<f32>> {
        let url = format!("{}/embeddings/multimodal", self.config.endpoint.trim_end_matches('/'));
        let body = MultimodalRequest {
            model: &self.config.model,
            input: vec![MultimodalPart::ImageUrl { image_url: ImageUrlRef { url: image_url } }],
        };

        let response = self.send_with_retry(&url, &body, MULTIMODAL_TIMEOUT).await?;
        let parsed: MultimodalResponse = response
            .json()
            .await
            .map_err(|e| CoreError::Embedding(format!("failed to parse multimodal response: {e}")))?;
        Ok(parsed.data.embedding)
    }

    #[allow(dead_code)]
    async fn embed_multimodal_text(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/embeddings/multimodal", self.config.endpoint.trim_end_matches('/'));
        let body = MultimodalRequest { model: &self.config.model, input: vec![MultimodalPart::Text { text }] };
        let response = self.send_with_retry(&url, &body, MULTIMODAL_TIMEOUT).await?;
        let parsed: MultimodalResponse = response.json().await.map_err(|e| CoreError::Embedding(e.to_string()))?;
        Ok(parsed.data.embedding)
    }

    /// Exponential-ish backoff: `attempt * 5s`, 3 attempts total. Retries
    /// only on network failure or HTTP 429/5xx; other 4xx are terminal.
    async fn send_with_retry<B: Serialize>(
        &self,
        url: &str,
        body: &B,
        timeout: Duration,
    ) -> Result<reqwest::Response> {
        let mut last_err = None;

        for attempt in 1..=MAX_ATTEMPTS {
            let request = self.auth(self.client.post(url).timeout(timeout).json(body));

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }
                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                        last_err = Some(CoreError::Embedding(format!("retryable status {status}")));
                    } else {
                        return Err(CoreError::Embedding(format!("terminal status {status}")));
                    }
                }
                Err(e) => last_err = Some(CoreError::Embedding(format!("network error: {e}"))),
            }

            if attempt < MAX_ATTEMPTS {
                tokio::time::sleep(Duration::from_secs(5 * attempt as u64)).await;
            }
        }

        Err(last_err.unwrap_or_else(|| CoreError::Embedding("exhausted retries".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embed_batch_of_empty_input_short_circuits() {
        let config = EmbeddingConfig::default();
        let client = EmbeddingClient::new(config);
        let rt = tokio::runtime::Runtime::new().unwrap();
        let result = rt.block_on(client.embed_batch(&[])).unwrap();
        assert!(result.is_empty());
    }
}
