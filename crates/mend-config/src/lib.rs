use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

#[cfg(test)]
mod config_tests;

/// Providers that can be named in `providers.default_provider`.
pub const KNOWN_PROVIDERS: &[&str] = &["openai", "ollama", "fallback"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("failed to write configuration to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub providers: ProvidersConfig,
    pub assistant: AssistantConfig,
    pub toolchains: ToolchainConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub default_provider: String,
    /// Skip every remote provider and use the deterministic fallback.
    pub offline: bool,
    pub openai: Option<OpenAIConfig>,
    pub ollama: Option<OllamaConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAIConfig {
    pub api_key: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_openai_model")]
    pub model: String,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_model")]
    pub model: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// Attempt ceiling for the generate/test loop.
    pub max_attempts: u32,
    /// Token budget of each generation request.
    pub max_tokens: u32,
    /// Where `<slug>_attempt_<n>` files are written.
    pub output_dir: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainConfig {
    pub cargo: String,
    /// Interpreters tried in order; the first that answers `--version` wins.
    pub python_candidates: Vec<String>,
    pub build_timeout_secs: u64,
    pub test_timeout_secs: u64,
    pub syntax_timeout_secs: u64,
    pub run_timeout_secs: u64,
}

fn default_openai_model() -> String {
    "gpt-4".to_string()
}

fn default_ollama_model() -> String {
    "qwen2.5-coder".to_string()
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            default_provider: "openai".to_string(),
            offline: false,
            openai: None,
            ollama: None,
        }
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            model: default_ollama_model(),
            base_url: None,
            max_tokens: None,
            temperature: None,
        }
    }
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            max_tokens: 1500,
            output_dir: ".".to_string(),
        }
    }
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            cargo: "cargo".to_string(),
            python_candidates: vec!["python3".to_string(), "python".to_string()],
            build_timeout_secs: 30,
            test_timeout_secs: 30,
            syntax_timeout_secs: 10,
            run_timeout_secs: 30,
        }
    }
}

impl ToolchainConfig {
    pub fn build_timeout(&self) -> Duration {
        Duration::from_secs(self.build_timeout_secs)
    }

    pub fn test_timeout(&self) -> Duration {
        Duration::from_secs(self.test_timeout_secs)
    }

    pub fn syntax_timeout(&self) -> Duration {
        Duration::from_secs(self.syntax_timeout_secs)
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }
}

impl AssistantConfig {
    /// `output_dir` with `~` expanded.
    pub fn output_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.output_dir).as_ref())
    }
}

impl Config {
    /// `~/.config/mend/config.toml` (platform equivalent).
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("mend").join("config.toml"))
    }

    /// Load defaults, then the config file, then `MEND_*` environment
    /// variables, then the legacy `OPENAI_*`/`MODEL_NAME` variables.
    ///
    /// An explicit `config_path` must exist; the default location is optional.
    pub fn load(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();

        match config_path {
            Some(path) => {
                let expanded = PathBuf::from(shellexpand::tilde(path).as_ref());
                info!("Loading configuration from {}", expanded.display());
                builder = builder.add_source(config::File::from(expanded).required(true));
            }
            None => {
                if let Some(path) = Self::default_path() {
                    debug!("Looking for configuration at {}", path.display());
                    builder = builder.add_source(config::File::from(path).required(false));
                }
            }
        }

        builder = builder.add_source(
            config::Environment::with_prefix("MEND")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let mut config: Config = builder.build()?.try_deserialize()?;
        config.apply_legacy_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// [`Config::load`] followed by CLI overrides of provider and model.
    pub fn load_with_overrides(
        config_path: Option<&str>,
        provider_override: Option<String>,
        model_override: Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::load(config_path)?;
        config.apply_overrides(provider_override, model_override)?;
        Ok(config)
    }

    pub fn apply_overrides(
        &mut self,
        provider_override: Option<String>,
        model_override: Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(provider) = provider_override {
            self.providers.default_provider = provider;
        }

        if let Some(model) = model_override {
            match self.providers.default_provider.as_str() {
                "openai" => match self.providers.openai.as_mut() {
                    Some(openai) => openai.model = model,
                    None => {
                        return Err(ConfigError::Invalid(
                            "cannot override the OpenAI model: no OpenAI API key configured"
                                .to_string(),
                        ))
                    }
                },
                "ollama" => {
                    self.providers
                        .ollama
                        .get_or_insert_with(OllamaConfig::default)
                        .model = model;
                }
                other => {
                    return Err(ConfigError::Invalid(format!(
                        "provider '{}' has no model to override",
                        other
                    )))
                }
            }
        }

        self.validate()
    }

    /// Honour the variables the original demo scripts used.
    pub fn apply_legacy_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("OPENAI_API_KEY").filter(|k| !k.trim().is_empty());
        let base_url = lookup("OPENAI_BASE_URL").filter(|u| !u.trim().is_empty());
        let model = lookup("MODEL_NAME").filter(|m| !m.trim().is_empty());

        match self.providers.openai.as_mut() {
            Some(openai) => {
                if openai.base_url.is_none() {
                    openai.base_url = base_url;
                }
                if let Some(model) = model {
                    openai.model = model;
                }
            }
            None => {
                if let Some(api_key) = api_key {
                    debug!("Configuring OpenAI provider from OPENAI_API_KEY");
                    self.providers.openai = Some(OpenAIConfig {
                        api_key,
                        base_url,
                        model: model.unwrap_or_else(default_openai_model),
                        max_tokens: None,
                        temperature: None,
                    });
                }
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.assistant.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "assistant.max_attempts must be at least 1".to_string(),
            ));
        }
        if !KNOWN_PROVIDERS.contains(&self.providers.default_provider.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "unknown provider '{}'. Valid options: {:?}",
                self.providers.default_provider, KNOWN_PROVIDERS
            )));
        }
        if self.toolchains.python_candidates.is_empty() {
            return Err(ConfigError::Invalid(
                "toolchains.python_candidates must name at least one interpreter".to_string(),
            ));
        }
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Write the configuration as TOML, creating parent directories.
    pub fn write_to(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = self.to_toml()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, contents).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}
