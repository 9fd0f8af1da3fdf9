use serde::{Deserialize, Serialize};
use std::fmt;

/// Target language of a generated program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Rust,
    #[default]
    Python,
}

impl Language {
    /// File extension used for archived attempts.
    pub fn extension(self) -> &'static str {
        match self {
            Language::Rust => "rs",
            Language::Python => "py",
        }
    }

    /// Human readable name, as it appears in prompts.
    pub fn display_name(self) -> &'static str {
        match self {
            Language::Rust => "Rust",
            Language::Python => "Python",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_language_is_python() {
        assert_eq!(Language::default(), Language::Python);
    }

    #[test]
    fn extensions() {
        assert_eq!(Language::Rust.extension(), "rs");
        assert_eq!(Language::Python.extension(), "py");
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Language::Rust).unwrap(), "\"rust\"");
    }
}
