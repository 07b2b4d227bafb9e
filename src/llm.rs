use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

/// Single-shot text completion. Implementations hold no per-task state, so one
/// model can be shared by every step of every task.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// OpenAI-compatible chat-completions client.
pub struct OpenAiModel {
    client: Client,
    api_key: String,
    model: String,
    endpoint: String,
    temperature: f32,
}

impl OpenAiModel {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            temperature: 0.2,
        }
    }

    /// Reads `OPENAI_API_KEY`, and `OPENAI_MODEL` / `OPENAI_ENDPOINT` when set.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow!("OPENAI_API_KEY not set in environment"))?;
        let mut model = Self::new(api_key);
        if let Ok(name) = std::env::var("OPENAI_MODEL") {
            model.model = name;
        }
        if let Ok(endpoint) = std::env::var("OPENAI_ENDPOINT") {
            model.endpoint = endpoint;
        }
        Ok(model)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl LanguageModel for OpenAiModel {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&json!({
                "model": self.model,
                "messages": [{"role": "user", "content": prompt}],
                "temperature": self.temperature,
            }))
            .send()
            .await
            .context("chat completion request failed")?;

        let status = response.status();
        let body: serde_json::Value = response
            .json()
            .await
            .context("chat completion response is not JSON")?;

        if !status.is_success() {
            let message = body["error"]["message"]
                .as_str()
                .unwrap_or("Unknown API error");
            tracing::error!(target: "llm", %status, error = message, "chat completion rejected");
            return Err(anyhow!("OpenAI API error ({status}): {message}"));
        }

        let content = body["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| anyhow!("No content in LLM response: {body}"))?;

        tracing::debug!(target: "llm", chars = content.len(), "chat completion received");
        Ok(content.to_string())
    }
}
