//! Picks the target language of a task.
//!
//! Rust is chosen when the task names it as a word; everything else resolves
//! to Python. When Rust is requested but cargo is missing, the task silently
//! falls back to Python and its text is rewritten so the generator is not asked
//! for Rust code.

use crate::task::Task;
use async_trait::async_trait;
use mend_execution::Language;
use regex::{Captures, Regex};
use std::sync::OnceLock;
use tracing::warn;

#[async_trait]
pub trait ToolchainProbe: Send + Sync {
    async fn has_toolchain(&self, language: Language) -> bool;
}

fn rust_word() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\brust\b").expect("rust keyword pattern is valid"))
}

pub fn detect_language(text: &str) -> Language {
    if rust_word().is_match(text) {
        Language::Rust
    } else {
        Language::default()
    }
}

/// Replace whole-word mentions of Rust with Python, keeping the casing style.
///
/// Only whole words are touched, so "trust" or "rustic" survive. The text is
/// still mutated, which can change the meaning of sentences that mention Rust
/// for another reason ("port this Rust code").
pub fn rewrite_for_default(text: &str) -> String {
    rust_word()
        .replace_all(text, |caps: &Captures| {
            let word = &caps[0];
            if word.chars().all(|c| c.is_ascii_uppercase()) {
                "PYTHON"
            } else if word.starts_with(|c: char| c.is_ascii_uppercase()) {
                "Python"
            } else {
                "python"
            }
        })
        .into_owned()
}

pub async fn resolve_task(description: &str, probe: &dyn ToolchainProbe) -> Task {
    let requested = detect_language(description);
    if requested == Language::Rust && !probe.has_toolchain(Language::Rust).await {
        warn!("Rust toolchain not available, switching to Python implementation");
        return Task::downgraded(rewrite_for_default(description), requested, Language::default());
    }
    Task::new(description, requested)
}
