//! Classification through an OpenAI-compatible chat-completions endpoint

use crate::harvest::{Classifier, TitledUrl};
use crate::{HarvestError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeSet;
use std::time::Duration;

const SYSTEM_PROMPT: &str = "You classify pages of an online shop. You receive numbered page \
titles with their URLs. A product page presents one specific purchasable item; category \
listings, search results, carts, account pages, blog posts and help pages are not product \
pages. Reply with a JSON object of the form {\"product_indices\": [1, 4]} listing the numbers \
of the product pages, or an empty list if there are none.";

const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProductIndices {
    product_indices: Vec<i64>,
}

/// Failure of one classification call
#[derive(Debug)]
enum CallError {
    /// Worth another attempt (transport, 429/5xx, unreadable reply)
    Transient(String),
    /// Retrying cannot help (authentication, bad request)
    Fatal(String),
}

/// Asks a language model which titled URLs are product pages
pub struct LlmClassifier {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
    max_retries: u32,
    retry_delay: Duration,
}

impl LlmClassifier {
    /// Creates a classifier for `endpoint`
    ///
    /// # Arguments
    ///
    /// * `client` - HTTP client used for the API calls
    /// * `endpoint` - Full chat-completions URL
    /// * `model` - Model name sent with every request
    /// * `api_key` - Bearer token
    /// * `max_retries` - Extra attempts per chunk after a transient failure
    pub fn new(
        client: Client,
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        max_retries: u32,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: api_key.into(),
            max_retries,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    /// Sets the base delay; attempt `n` waits `n` times this long
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Classifies one chunk, retrying transient failures with linear backoff
    async fn classify_chunk(&self, chunk: &[TitledUrl]) -> Result<Vec<usize>> {
        let attempts = self.max_retries + 1;
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match self.request(chunk).await {
                Ok(indices) => return Ok(indices),
                Err(CallError::Fatal(message)) => {
                    return Err(HarvestError::Classifier(message));
                }
                Err(CallError::Transient(message)) => {
                    tracing::warn!(
                        "Classification attempt {}/{} failed: {}",
                        attempt,
                        attempts,
                        message
                    );
                    last_error = message;
                    if attempt < attempts {
                        tokio::time::sleep(self.retry_delay * attempt).await;
                    }
                }
            }
        }

        Err(HarvestError::Classifier(format!(
            "giving up after {} attempts: {}",
            attempts, last_error
        )))
    }

    async fn request(&self, chunk: &[TitledUrl]) -> std::result::Result<Vec<usize>, CallError> {
        let body = json!({
            "model": self.model,
            "temperature": 0,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": build_prompt(chunk) },
            ],
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| CallError::Transient(format!("request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| CallError::Transient(format!("response read failed: {}", e)))?;

        if !status.is_success() {
            let message = format!("HTTP {}: {}", status.as_u16(), truncate(&text, 200));
            return Err(
                if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                    CallError::Transient(message)
                } else {
                    CallError::Fatal(message)
                },
            );
        }

        let reply: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| CallError::Transient(format!("unexpected response body: {}", e)))?;
        let content = reply
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| CallError::Transient("response has no message content".to_string()))?;

        parse_indices(&content, chunk.len()).map_err(CallError::Transient)
    }
}

/// Numbers each page from 1 as `N. title | url`
fn build_prompt(chunk: &[TitledUrl]) -> String {
    let mut prompt = String::from("Which of these pages are product pages?\n\n");
    for (i, page) in chunk.iter().enumerate() {
        prompt.push_str(&format!("{}. {} | {}\n", i + 1, page.title, page.url));
    }
    prompt
}

/// Reads `{"product_indices": [...]}` from a model reply
///
/// The object may be wrapped in prose or a code fence. Numbers are 1-based;
/// out-of-range and repeated numbers are dropped. Returns 0-based positions
/// in ascending order.
fn parse_indices(content: &str, len: usize) -> std::result::Result<Vec<usize>, String> {
    let start = content.find('{');
    let end = content.rfind('}');
    let json = match (start, end) {
        (Some(start), Some(end)) if start < end => &content[start..=end],
        _ => return Err(format!("no JSON object in reply: {}", truncate(content, 200))),
    };

    let parsed: ProductIndices =
        serde_json::from_str(json).map_err(|e| format!("malformed product_indices: {}", e))?;

    let positions: BTreeSet<usize> = parsed
        .product_indices
        .into_iter()
        .filter(|&n| n >= 1 && (n as usize) <= len)
        .map(|n| n as usize - 1)
        .collect();

    Ok(positions.into_iter().collect())
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[async_trait]
impl Classifier for LlmClassifier {
    async fn select_products(
        &self,
        pages: Vec<TitledUrl>,
        batch_size: usize,
    ) -> Result<Vec<TitledUrl>> {
        let mut selected = Vec::new();

        for chunk in pages.chunks(batch_size.max(1)) {
            let positions = self.classify_chunk(chunk).await?;
            tracing::debug!(
                "Classifier picked {} of {} titles",
                positions.len(),
                chunk.len()
            );
            selected.extend(positions.into_iter().map(|i| chunk[i].clone()));
        }

        Ok(selected)
    }
}
