use crate::error_handling::GenerationError;
use mend_execution::Language;
use mend_providers::fallback::TaskShape;
use mend_providers::{CompletionRequest, FallbackProvider, LLMProvider, Message};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Turns a task (and the previous attempt's diagnostic) into source code.
///
/// Generation never fails from the caller's point of view: if the active
/// provider errors, the generator switches to the deterministic fallback for
/// the rest of its lifetime and answers from there.
pub struct CodeGenerator {
    provider: Arc<dyn LLMProvider>,
    fallback: FallbackProvider,
    max_tokens: u32,
    degraded: bool,
}

impl CodeGenerator {
    pub fn new(provider: Arc<dyn LLMProvider>, max_tokens: u32) -> Self {
        Self {
            provider,
            fallback: FallbackProvider::new(),
            max_tokens,
            degraded: false,
        }
    }

    /// `(name, model)` of the provider answering requests right now.
    pub fn provider_info(&self) -> (String, String) {
        if self.degraded {
            (self.fallback.name().to_string(), self.fallback.model().to_string())
        } else {
            (self.provider.name().to_string(), self.provider.model().to_string())
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub async fn generate(
        &mut self,
        task: &str,
        language: Language,
        previous_diagnostic: Option<&str>,
    ) -> String {
        let prompt = build_prompt(task, language, previous_diagnostic);
        debug!("Generation prompt:\n{}", prompt);

        if !self.degraded {
            let request = CompletionRequest {
                messages: vec![Message::user(prompt.clone())],
                max_tokens: Some(self.max_tokens),
                temperature: None,
            };
            match self.provider.complete(request).await {
                Ok(response) => {
                    info!(
                        "Generated {} chars with {} ({} completion tokens)",
                        response.content.len(),
                        response.model,
                        response.usage.completion_tokens
                    );
                    return extract_code(&response.content, language);
                }
                Err(e) => {
                    let err = GenerationError::unavailable(self.provider.name(), &e);
                    warn!("{}; switching to fallback generation", err);
                    self.degraded = true;
                }
            }
        }

        self.fallback
            .program(TaskShape::detect(task), language == Language::Rust)
            .to_string()
    }
}

/// Instruction sent to the completion service.
///
/// A previous diagnostic is quoted verbatim so the next attempt can correct it.
pub fn build_prompt(task: &str, language: Language, previous_diagnostic: Option<&str>) -> String {
    let mut prompt = match language {
        Language::Rust => format!(
            "\nWrite a complete Rust program for: {task}\n\n\
             Requirements:\n\
             - Declare any dependencies as Cargo.toml lines in comments at the top, e.g. // serde = \"1.0\"\n\
             - Include comprehensive tests using #[cfg(test)]\n\
             - Make sure the code compiles and all tests pass\n\
             - Use proper error handling\n"
        ),
        Language::Python => format!(
            "\nWrite a complete Python program for: {task}\n\n\
             Requirements:\n\
             - Include all necessary imports\n\
             - Include comprehensive tests using pytest or unittest\n\
             - Make sure the code runs without errors\n\
             - Use proper error handling\n"
        ),
    };

    if let Some(diagnostic) = previous_diagnostic {
        prompt.push_str(&format!(
            "\n\nIMPORTANT: The previous attempt failed with this error:\n{diagnostic}\n\n\
             Please fix this error in your new implementation.\n"
        ));
    }

    prompt
}

/// Source code from a completion reply.
///
/// Prefers the first fenced block tagged with `language` (replies often put a
/// `toml` manifest block before the program), then the first untagged block,
/// then the whole reply.
pub fn extract_code(reply: &str, language: Language) -> String {
    let blocks = fenced_blocks(reply);
    let tags: &[&str] = match language {
        Language::Rust => &["rust", "rs"],
        Language::Python => &["python", "py", "python3"],
    };

    blocks
        .iter()
        .find(|(info, _)| tags.iter().any(|tag| info.eq_ignore_ascii_case(tag)))
        .or_else(|| blocks.iter().find(|(info, _)| info.is_empty()))
        .map(|(_, body)| body.to_string())
        .unwrap_or_else(|| reply.to_string())
}

/// `(info word, body)` of every fenced block. An unclosed final block runs to
/// the end of the reply.
fn fenced_blocks(reply: &str) -> Vec<(&str, &str)> {
    let mut blocks = Vec::new();
    let mut rest = reply;
    while let Some(open) = rest.find("```") {
        let after_fence = &rest[open + 3..];
        let (info, body_start) = match after_fence.find('\n') {
            Some(i) => (&after_fence[..i], i + 1),
            None => (after_fence, after_fence.len()),
        };
        // first word only: ```rust,ignore or ```python title="x"
        let info = info
            .trim()
            .split(|c: char| c.is_whitespace() || c == ',')
            .next()
            .unwrap_or("");
        let body = &after_fence[body_start..];
        match body.find("```") {
            Some(close) => {
                blocks.push((info, &body[..close]));
                rest = &body[close + 3..];
            }
            None => {
                blocks.push((info, body));
                break;
            }
        }
    }
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use mend_providers::{CompletionResponse, Usage};
    use std::sync::Mutex;

    struct Scripted {
        reply: Result<String, String>,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LLMProvider for Scripted {
        async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
            self.prompts.lock().unwrap().push(request.prompt().to_string());
            assert_eq!(request.max_tokens, Some(1500));
            match &self.reply {
                Ok(content) => Ok(CompletionResponse {
                    content: content.clone(),
                    usage: Usage::default(),
                    model: "scripted".to_string(),
                }),
                Err(message) => Err(anyhow!(message.clone())),
            }
        }

        fn name(&self) -> &str {
            "scripted"
        }

        fn model(&self) -> &str {
            "scripted"
        }
    }

    #[test]
    fn rust_prompt_lists_rust_requirements() {
        let prompt = build_prompt("write quicksort in Rust", Language::Rust, None);
        assert!(prompt.contains("Write a complete Rust program for: write quicksort in Rust"));
        assert!(prompt.contains("#[cfg(test)]"));
        assert!(!prompt.contains("IMPORTANT"));
    }

    #[test]
    fn python_prompt_mentions_test_frameworks() {
        let prompt = build_prompt("hello world", Language::Python, None);
        assert!(prompt.contains("Write a complete Python program for: hello world"));
        assert!(prompt.contains("pytest or unittest"));
    }

    #[test]
    fn previous_diagnostic_is_quoted_verbatim() {
        let diagnostic = "Build failed:\nerror[E0308]: mismatched types";
        let prompt = build_prompt("hello", Language::Rust, Some(diagnostic));
        assert!(prompt.contains("IMPORTANT: The previous attempt failed with this error:"));
        assert!(prompt.contains(diagnostic));
    }

    #[test]
    fn extracts_fenced_code() {
        let reply = "Here you go:\n```rust\nfn main() {}\n```\nEnjoy!";
        assert_eq!(extract_code(reply, Language::Rust), "fn main() {}\n");
        assert_eq!(extract_code("print(1)\n", Language::Python), "print(1)\n");
        assert_eq!(extract_code("```\nprint(2)\n", Language::Python), "print(2)\n");
    }

    #[test]
    fn skips_manifest_block_before_program() {
        let reply = "Cargo.toml:\n```toml\n[dependencies]\nrand = \"0.8\"\n```\n\n\
                     src/main.rs:\n```rust\nfn main() {}\n```\n";
        assert_eq!(extract_code(reply, Language::Rust), "fn main() {}\n");
    }

    #[test]
    fn prefers_language_tag_then_untagged_block() {
        let reply = "```bash\npip install pytest\n```\n```py\nprint('tagged')\n```\n";
        assert_eq!(extract_code(reply, Language::Python), "print('tagged')\n");

        let reply = "```toml\n[dependencies]\n```\n```\nfn main() {}\n```\n";
        assert_eq!(extract_code(reply, Language::Rust), "fn main() {}\n");

        let reply = "```rust,ignore\nfn main() {}\n```";
        assert_eq!(extract_code(reply, Language::Rust), "fn main() {}\n");
    }

    #[test]
    fn reply_without_matching_block_is_kept_whole() {
        let reply = "```toml\n[dependencies]\n```\n";
        assert_eq!(extract_code(reply, Language::Rust), reply);
    }

    #[tokio::test]
    async fn uses_provider_reply() {
        let provider = Arc::new(Scripted {
            reply: Ok("```python\nprint('hi')\n```".to_string()),
            prompts: Mutex::new(Vec::new()),
        });
        let mut generator = CodeGenerator::new(provider.clone(), 1500);
        let code = generator.generate("say hi", Language::Python, Some("boom")).await;
        assert_eq!(code, "print('hi')\n");
        assert!(provider.prompts.lock().unwrap()[0].contains("boom"));
        assert!(!generator.is_degraded());
    }

    #[tokio::test]
    async fn switches_to_fallback_when_service_fails() {
        let provider = Arc::new(Scripted {
            reply: Err("connection refused".to_string()),
            prompts: Mutex::new(Vec::new()),
        });
        let mut generator = CodeGenerator::new(provider.clone(), 1500);

        let code = generator
            .generate("write quicksort in Rust", Language::Rust, None)
            .await;
        assert!(code.contains("fn quicksort"));
        assert!(generator.is_degraded());
        assert_eq!(generator.provider_info().0, "fallback");

        // the failed service is not asked again
        generator
            .generate("write quicksort in Rust", Language::Rust, Some("err"))
            .await;
        assert_eq!(provider.prompts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn fallback_ignores_words_in_the_diagnostic() {
        let provider = Arc::new(Scripted {
            reply: Err("connection refused".to_string()),
            prompts: Mutex::new(Vec::new()),
        });
        let mut generator = CodeGenerator::new(provider, 1500);

        let diagnostic = "Runtime error:\nquicksort failed; rewrite it in Rust";
        let code = generator
            .generate("create a binary search tree", Language::Python, Some(diagnostic))
            .await;
        assert!(code.contains("class BST"));
        assert!(!code.contains("fn "));
    }
}
