/// OpenRouter (or any OpenAI-compatible) provider using `/chat/completions`.
use std::time::Duration;

use {
    async_trait::async_trait,
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
    tracing::{debug, warn},
};

use nexus_config::ChatConfig;

use crate::{
    backend::BackendError,
    model::{ChatMessage, LlmProvider},
};

pub struct OpenRouterProvider {
    client: reqwest::Client,
    api_key: Secret<String>,
    base_url: String,
    model: String,
    temperature: f32,
}

impl OpenRouterProvider {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: Secret::new(api_key),
            base_url: "https://openrouter.ai/api/v1".to_string(),
            model,
            temperature: 0.7,
        }
    }

    /// Build from the chat config section; `None` when no API key is set.
    pub fn from_config(config: &ChatConfig) -> Option<Self> {
        let key = config.effective_api_key()?;
        Some(
            Self::new(key.to_string(), config.model.clone())
                .with_base_url(config.base_url.clone())
                .with_temperature(config.temperature)
                .with_timeout(Duration::from_secs(config.timeout_secs)),
        )
    }

    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        match reqwest::Client::builder().timeout(timeout).build() {
            Ok(client) => self.client = client,
            Err(e) => warn!(error = %e, "failed to build http client with timeout, keeping default"),
        }
        self
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl LlmProvider for OpenRouterProvider {
    fn name(&self) -> &str {
        "openrouter"
    }

    fn id(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, BackendError> {
        let req = CompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
        };

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&req)
            .send()
            .await?
            .error_for_status()?
            .json::<CompletionResponse>()
            .await?;

        let reply = resp
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or(BackendError::EmptyReply)?;
        debug!(model = %self.model, chars = reply.len(), "chat completion received");
        Ok(reply)
    }
}
