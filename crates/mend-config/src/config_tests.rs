use crate::{Config, ConfigError, OpenAIConfig};
use serial_test::serial;
use std::collections::HashMap;
use std::io::Write;

const LEGACY_VARS: &[&str] = &["OPENAI_API_KEY", "OPENAI_BASE_URL", "MODEL_NAME"];

fn clear_env() {
    for key in LEGACY_VARS {
        std::env::remove_var(key);
    }
    std::env::remove_var("MEND_ASSISTANT__MAX_ATTEMPTS");
}

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn test_defaults_match_reference_behaviour() {
    let config = Config::default();
    assert_eq!(config.assistant.max_attempts, 3);
    assert_eq!(config.assistant.max_tokens, 1500);
    assert_eq!(config.toolchains.build_timeout_secs, 30);
    assert_eq!(config.toolchains.test_timeout_secs, 30);
    assert_eq!(config.toolchains.syntax_timeout_secs, 10);
    assert_eq!(config.toolchains.run_timeout_secs, 30);
    assert_eq!(config.toolchains.python_candidates, vec!["python3", "python"]);
    assert!(config.providers.openai.is_none());
    assert!(config.validate().is_ok());
}

#[test]
#[serial]
fn test_load_from_file() {
    clear_env();
    let file = write_config(
        r#"
[providers]
default_provider = "ollama"

[providers.ollama]
model = "codellama"
base_url = "http://gpu-box:11434"

[assistant]
max_attempts = 5
output_dir = "generated"
"#,
    );

    let config = Config::load(Some(file.path().to_str().unwrap())).unwrap();
    assert_eq!(config.providers.default_provider, "ollama");
    let ollama = config.providers.ollama.as_ref().unwrap();
    assert_eq!(ollama.model, "codellama");
    assert_eq!(ollama.base_url.as_deref(), Some("http://gpu-box:11434"));
    assert_eq!(config.assistant.max_attempts, 5);
    // untouched sections keep their defaults
    assert_eq!(config.assistant.max_tokens, 1500);
    assert_eq!(config.toolchains.cargo, "cargo");
}

#[test]
#[serial]
fn test_env_overrides_file() {
    clear_env();
    let file = write_config("[assistant]\nmax_attempts = 5\n");
    std::env::set_var("MEND_ASSISTANT__MAX_ATTEMPTS", "2");

    let config = Config::load(Some(file.path().to_str().unwrap()));
    std::env::remove_var("MEND_ASSISTANT__MAX_ATTEMPTS");

    assert_eq!(config.unwrap().assistant.max_attempts, 2);
}

#[test]
#[serial]
fn test_missing_explicit_file_is_an_error() {
    clear_env();
    let result = Config::load(Some("/definitely/not/here/mend.toml"));
    assert!(matches!(result, Err(ConfigError::Load(_))));
}

#[test]
#[serial]
fn test_zero_attempts_rejected() {
    clear_env();
    let file = write_config("[assistant]\nmax_attempts = 0\n");
    let result = Config::load(Some(file.path().to_str().unwrap()));
    assert!(matches!(result, Err(ConfigError::Invalid(_))));
}

#[test]
fn test_legacy_env_creates_openai_provider() {
    let mut config = Config::default();
    config.apply_legacy_env(lookup(&[
        ("OPENAI_API_KEY", "sk-test"),
        ("OPENAI_BASE_URL", "http://localhost:8000/v1"),
        ("MODEL_NAME", "gpt-4o-mini"),
    ]));

    let openai = config.providers.openai.unwrap();
    assert_eq!(openai.api_key, "sk-test");
    assert_eq!(openai.base_url.as_deref(), Some("http://localhost:8000/v1"));
    assert_eq!(openai.model, "gpt-4o-mini");
}

#[test]
fn test_legacy_env_without_key_leaves_openai_unset() {
    let mut config = Config::default();
    config.apply_legacy_env(lookup(&[("MODEL_NAME", "gpt-4o-mini"), ("OPENAI_API_KEY", "")]));
    assert!(config.providers.openai.is_none());
}

#[test]
fn test_legacy_env_does_not_replace_configured_key() {
    let mut config = Config::default();
    config.providers.openai = Some(OpenAIConfig {
        api_key: "from-file".to_string(),
        base_url: None,
        model: "gpt-4".to_string(),
        max_tokens: Some(2000),
        temperature: None,
    });
    config.apply_legacy_env(lookup(&[("OPENAI_API_KEY", "from-env")]));
    let openai = config.providers.openai.unwrap();
    assert_eq!(openai.api_key, "from-file");
    assert_eq!(openai.max_tokens, Some(2000));
}

#[test]
fn test_provider_and_model_overrides() {
    let mut config = Config::default();
    config
        .apply_overrides(Some("ollama".to_string()), Some("llama3.2".to_string()))
        .unwrap();
    assert_eq!(config.providers.default_provider, "ollama");
    assert_eq!(config.providers.ollama.unwrap().model, "llama3.2");
}

#[test]
fn test_unknown_provider_rejected() {
    let mut config = Config::default();
    let result = config.apply_overrides(Some("databricks".to_string()), None);
    assert!(matches!(result, Err(ConfigError::Invalid(_))));
}

#[test]
fn test_model_override_for_fallback_rejected() {
    let mut config = Config::default();
    let result = config.apply_overrides(Some("fallback".to_string()), Some("x".to_string()));
    assert!(result.is_err());
}

#[test]
fn test_toml_round_trip_through_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");
    let config = Config::default();
    config.write_to(&path).unwrap();

    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains("max_attempts = 3"));
    assert!(written.contains("[toolchains]"));
}
