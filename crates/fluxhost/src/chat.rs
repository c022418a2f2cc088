use crate::api::{AiApi, ChatMessage};
use crate::error::HostError;
use serde_json::json;

/// Chat-completion client for any OpenAI-compatible endpoint.
///
/// Hosts that expose a real model wire this in as their `ai` group; the
/// engine only sees the [`AiApi`] contract.
pub struct HttpChatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl HttpChatClient {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: None,
            model: model.into(),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Read endpoint, key and model from `FLUX_AI_BASE_URL`,
    /// `FLUX_AI_API_KEY` and `FLUX_AI_MODEL`. Returns None when no endpoint
    /// is configured.
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("FLUX_AI_BASE_URL").ok()?;
        let model =
            std::env::var("FLUX_AI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        let mut client = Self::new(base_url, model);
        if let Ok(key) = std::env::var("FLUX_AI_API_KEY") {
            client = client.with_api_key(key);
        }
        Some(client)
    }
}

#[async_trait::async_trait]
impl AiApi for HttpChatClient {
    async fn chat(&self, prompt: &str) -> Result<String, HostError> {
        self.chat_messages(&[ChatMessage::user(prompt)]).await
    }

    async fn chat_messages(&self, messages: &[ChatMessage]) -> Result<String, HostError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));

        let mut request = self.client.post(&url).json(&json!({
            "model": self.model,
            "messages": messages,
        }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| HostError::Http(format!("chat request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HostError::Http(format!("chat endpoint returned {}", status)));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| HostError::Http(format!("invalid chat response: {}", e)))?;

        body["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| HostError::Http("chat response had no content".to_string()))
    }

    fn is_configured(&self) -> bool {
        true
    }
}
