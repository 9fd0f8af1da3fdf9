//! Ollama provider.
//!
//! Talks to a local (or remote) Ollama server through its `/api/chat`
//! endpoint in non-streaming mode. No authentication is required; the base URL
//! defaults to `http://localhost:11434`.

use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::{CompletionRequest, CompletionResponse, LLMProvider, Message, MessageRole, Usage};

const DEFAULT_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_TIMEOUT_SECS: u64 = 600;
const HEALTH_TIMEOUT_SECS: u64 = 5;

pub const OLLAMA_DEFAULT_MODEL: &str = "qwen2.5-coder";

#[derive(Debug, Clone)]
pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
    max_tokens: Option<u32>,
    temperature: f32,
}

impl OllamaProvider {
    pub fn new(
        model: String,
        base_url: Option<String>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| anyhow!("Failed to create HTTP client: {}", e))?;

        let base_url = base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        info!(
            "Initialized Ollama provider with model: {} at {}",
            model, base_url
        );

        Ok(Self {
            client,
            base_url,
            model,
            max_tokens,
            temperature: temperature.unwrap_or(0.2),
        })
    }

    fn convert_messages(&self, messages: &[Message]) -> Result<Vec<OllamaMessage>> {
        if messages.is_empty() {
            return Err(anyhow!("At least one message is required"));
        }

        Ok(messages
            .iter()
            .map(|message| OllamaMessage {
                role: match message.role {
                    MessageRole::System => "system",
                    MessageRole::User => "user",
                    MessageRole::Assistant => "assistant",
                }
                .to_string(),
                content: message.content.clone(),
            })
            .collect())
    }

    fn create_request_body(&self, request: &CompletionRequest) -> Result<OllamaRequest> {
        Ok(OllamaRequest {
            model: self.model.clone(),
            messages: self.convert_messages(&request.messages)?,
            stream: false,
            options: OllamaOptions {
                temperature: request.temperature.unwrap_or(self.temperature),
                num_predict: request.max_tokens.or(self.max_tokens),
            },
        })
    }

    /// Names of the models the server has pulled.
    pub async fn fetch_available_models(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(Duration::from_secs(HEALTH_TIMEOUT_SECS))
            .send()
            .await
            .map_err(|e| anyhow!("Failed to fetch Ollama models: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow!(
                "Failed to fetch Ollama models: {} - {}",
                status,
                error_text
            ));
        }

        let tags: OllamaTags = response.json().await?;
        let model_names: Vec<String> = tags.models.into_iter().map(|m| m.name).collect();
        debug!("Found {} models in Ollama", model_names.len());
        Ok(model_names)
    }
}

#[async_trait::async_trait]
impl LLMProvider for OllamaProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        debug!(
            "Processing Ollama completion request with {} messages",
            request.messages.len()
        );

        let request_body = self.create_request_body(&request)?;

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request_body)
            .send()
            .await
            .map_err(|e| anyhow!("Failed to send request to Ollama API: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow!("Ollama API error {}: {}", status, error_text));
        }

        let response_text = response.text().await?;
        debug!("Raw Ollama API response: {}", response_text);

        let ollama_response: OllamaResponse =
            serde_json::from_str(&response_text).map_err(|e| {
                anyhow!(
                    "Failed to parse Ollama response: {} - Response: {}",
                    e,
                    response_text
                )
            })?;

        let prompt_tokens = ollama_response.prompt_eval_count.unwrap_or(0);
        let completion_tokens = ollama_response.eval_count.unwrap_or(0);

        Ok(CompletionResponse {
            content: ollama_response.message.content,
            usage: Usage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            },
            model: self.model.clone(),
        })
    }

    async fn health_check(&self) -> Result<()> {
        let models = self.fetch_available_models().await?;
        let wanted = self.model.split(':').next().unwrap_or(&self.model);
        if !models.iter().any(|m| m.split(':').next() == Some(wanted)) {
            return Err(anyhow!(
                "Model '{}' is not available on the Ollama server at {}",
                self.model,
                self.base_url
            ));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>, // Ollama's equivalent of max_tokens
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: OllamaMessage,
    prompt_eval_count: Option<u32>,
    eval_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct OllamaTags {
    #[serde(default)]
    models: Vec<OllamaModel>,
}

#[derive(Debug, Deserialize)]
struct OllamaModel {
    name: String,
}
