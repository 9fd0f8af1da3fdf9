use mend_execution::Language;

/// One user request as it moves through the generate/test loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// Task text sent to the generator (rewritten on a language downgrade).
    pub description: String,
    pub language: Language,
    /// Language the user asked for, before any downgrade.
    pub requested: Language,
    attempt: u32,
}

impl Task {
    pub fn new(description: impl Into<String>, language: Language) -> Self {
        Self {
            description: description.into(),
            language,
            requested: language,
            attempt: 1,
        }
    }

    pub(crate) fn downgraded(
        description: impl Into<String>,
        requested: Language,
        language: Language,
    ) -> Self {
        Self {
            requested,
            ..Self::new(description, language)
        }
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub(crate) fn next_attempt(&mut self) {
        self.attempt += 1;
    }

    pub fn was_downgraded(&self) -> bool {
        self.requested != self.language
    }
}
