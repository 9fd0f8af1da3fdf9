use anyhow::Result;
use mend_config::Config;
use mend_providers::{FallbackProvider, LLMProvider, OllamaProvider, OpenAIProvider, ProviderRegistry};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Pick the completion provider for this run.
///
/// Never fails: an unconfigured, unreachable or misconfigured remote provider
/// degrades to the deterministic fallback with a warning.
pub async fn select_provider(config: &Config) -> Arc<dyn LLMProvider> {
    if config.providers.offline || config.providers.default_provider == "fallback" {
        info!("Using deterministic fallback generator");
        return Arc::new(FallbackProvider::new());
    }

    match remote_provider(config).await {
        Ok(provider) => provider,
        Err(e) => {
            warn!("{:#}; using fallback generator", e);
            Arc::new(FallbackProvider::new())
        }
    }
}

async fn remote_provider(config: &Config) -> Result<Arc<dyn LLMProvider>> {
    let mut providers = ProviderRegistry::new();
    let selected = config.providers.default_provider.as_str();
    let max_tokens = config.assistant.max_tokens;

    // Only the selected provider is constructed
    if let Some(openai_config) = &config.providers.openai {
        if selected == "openai" {
            info!("Initializing OpenAI provider (selected as default)");
            let provider = OpenAIProvider::new(
                openai_config.api_key.clone(),
                Some(openai_config.model.clone()),
                openai_config.base_url.clone(),
                openai_config.max_tokens.or(Some(max_tokens)),
                openai_config.temperature,
            )?;
            providers.register(provider);
        } else {
            debug!("OpenAI provider configured but not selected, skipping initialization");
        }
    }

    if selected == "ollama" {
        let ollama_config = config.providers.ollama.clone().unwrap_or_default();
        info!("Initializing Ollama provider (selected as default)");
        let provider = OllamaProvider::new(
            ollama_config.model,
            ollama_config.base_url,
            ollama_config.max_tokens.or(Some(max_tokens)),
            ollama_config.temperature,
        )?;
        providers.register(provider);
    }

    providers.set_default(selected).map_err(|e| {
        e.context(format!(
            "provider '{}' is selected but not configured (set OPENAI_API_KEY or a [providers.{}] section)",
            selected, selected
        ))
    })?;

    let provider = providers.get(None)?;
    provider.health_check().await?;
    info!(
        "Using {} provider with model {}",
        provider.name(),
        provider.model()
    );
    Ok(provider)
}
