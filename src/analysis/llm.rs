use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

/// Upper bound on model output per reviewed file.
const MAX_COMPLETION_TOKENS: u32 = 1000;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Completion API request failed: {0}")]
    ApiRequest(#[from] reqwest::Error),

    #[error("Completion API returned an unexpected payload: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Seam between the review engine and the completion endpoint, so the
/// engine can be exercised with a scripted model in tests.
#[async_trait]
pub trait CompletionApi: Send + Sync {
    /// Send a single user-role prompt and return the raw text content of
    /// the model's reply.
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Client for an OpenAI-compatible chat-completions endpoint
/// (OpenRouter by default).
pub struct CompletionClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl CompletionClient {
    pub fn new(base_url: &str, api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
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

#[async_trait]
impl CompletionApi for CompletionClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(model = %self.model, prompt_bytes = prompt.len(), "requesting completion");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("HTTP-Referer", "https://github.com/actions")
            .header("X-Title", "AI Code Reviewer")
            .json(&json!({
                "model": self.model,
                "messages": [{"role": "user", "content": prompt}],
                "max_tokens": MAX_COMPLETION_TOKENS,
            }))
            .send()
            .await?
            .error_for_status()?;

        let body = response.text().await?;
        let parsed: ChatCompletionResponse = serde_json::from_str(&body)?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        debug!(content_bytes = content.len(), "received completion");
        Ok(content)
    }
}
