//! Completion providers for mend.
//!
//! The code generator only depends on "submit prompt text, receive completion
//! text, or receive a failure". That capability is the [`LLMProvider`] trait,
//! with remote implementations ([`OpenAIProvider`], [`OllamaProvider`]) and
//! the deterministic [`FallbackProvider`] used when no service is reachable.

pub mod fallback;
pub mod ollama;
pub mod openai;

pub use fallback::FallbackProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAIProvider;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    /// Text of the last user message, which carries the prompt.
    pub fn prompt(&self) -> &str {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
            .map(|m| m.content.as_str())
            .unwrap_or("")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub content: String,
    pub usage: Usage,
    pub model: String,
}

#[async_trait]
pub trait LLMProvider: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Cheap reachability check used once at startup to pick a provider.
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str;

    fn model(&self) -> &str;

    /// True for providers that never leave the process.
    fn is_local(&self) -> bool {
        false
    }
}

/// Named providers with one default.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn LLMProvider>>,
    default_provider: Option<String>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<P: LLMProvider + 'static>(&mut self, provider: P) {
        let name = provider.name().to_string();
        if self.default_provider.is_none() {
            self.default_provider = Some(name.clone());
        }
        self.providers.insert(name, Arc::new(provider));
    }

    pub fn set_default(&mut self, name: &str) -> Result<()> {
        if !self.providers.contains_key(name) {
            return Err(anyhow!("Provider '{}' is not registered", name));
        }
        self.default_provider = Some(name.to_string());
        Ok(())
    }

    /// Provider by name, or the default one when `name` is `None`.
    pub fn get(&self, name: Option<&str>) -> Result<Arc<dyn LLMProvider>> {
        let name = match name {
            Some(name) => name,
            None => self
                .default_provider
                .as_deref()
                .ok_or_else(|| anyhow!("No default provider configured"))?,
        };
        self.providers
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow!("Provider '{}' not found", name))
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
