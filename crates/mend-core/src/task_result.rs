use mend_execution::{FailureKind, Language, RunReport};
use serde::Serialize;
use std::path::PathBuf;

/// One generate/test round. Never changed after it is recorded.
#[derive(Debug, Clone, Serialize)]
pub struct Attempt {
    pub number: u32,
    pub source: String,
    /// `None` when the archive write failed.
    pub filename: Option<PathBuf>,
    pub report: RunReport,
}

/// Terminal outcome of a task: exactly one per call to `solve`.
#[derive(Debug, Clone, Serialize)]
pub struct TaskResult {
    pub task: String,
    pub language: Language,
    /// Set when the task asked for a language whose toolchain was missing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_language: Option<Language>,
    pub success: bool,
    pub attempts: u32,
    pub final_code: String,
    pub filename: Option<PathBuf>,
    /// Success message, or the last diagnostic verbatim.
    pub message: String,
    pub failure: Option<FailureKind>,
    pub history: Vec<Attempt>,
}

impl TaskResult {
    pub(crate) fn from_history(
        task: String,
        language: Language,
        requested_language: Option<Language>,
        history: Vec<Attempt>,
    ) -> Self {
        let last = history.last();
        Self {
            task,
            language,
            requested_language,
            success: last.map(|a| a.report.passed).unwrap_or(false),
            attempts: history.len() as u32,
            final_code: last.map(|a| a.source.clone()).unwrap_or_default(),
            filename: last.and_then(|a| a.filename.clone()),
            message: last.map(|a| a.report.diagnostic.clone()).unwrap_or_default(),
            failure: last.and_then(|a| a.report.failure),
            history,
        }
    }

    /// Diagnostic of the last attempt when the task failed.
    pub fn final_error(&self) -> Option<&str> {
        if self.success {
            None
        } else {
            Some(&self.message)
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
