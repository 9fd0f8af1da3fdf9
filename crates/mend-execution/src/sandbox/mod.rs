//! Language sandboxes: materialize generated source, run the toolchain's
//! build/run/test steps as bounded child processes and classify the result.
//!
//! Sandboxes never return an error. Every failure, including a missing
//! toolchain, is folded into a [`RunReport`] whose diagnostic is meant to be
//! quoted back to the code generator.

pub mod python;
pub mod rust;

use crate::process::{ExecutionError, ProcessOutcome};
use crate::Language;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use tracing::{debug, warn};

/// Why a run did not pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    ToolchainUnavailable,
    BuildFailure,
    TestFailure,
    SyntaxError,
    RuntimeError,
    Timeout,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FailureKind::ToolchainUnavailable => "toolchain unavailable",
            FailureKind::BuildFailure => "build failure",
            FailureKind::TestFailure => "test failure",
            FailureKind::SyntaxError => "syntax error",
            FailureKind::RuntimeError => "runtime error",
            FailureKind::Timeout => "timeout",
        };
        f.write_str(label)
    }
}

/// Outcome of running one generated program through its sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub passed: bool,
    pub failure: Option<FailureKind>,
    /// Success message, or the diagnostic text of the failing step.
    pub diagnostic: String,
}

impl RunReport {
    pub fn pass(message: impl Into<String>) -> Self {
        Self {
            passed: true,
            failure: None,
            diagnostic: message.into(),
        }
    }

    pub fn fail(kind: FailureKind, diagnostic: impl Into<String>) -> Self {
        Self {
            passed: false,
            failure: Some(kind),
            diagnostic: diagnostic.into(),
        }
    }

    pub fn timed_out(step: &str, after: Duration) -> Self {
        Self::fail(
            FailureKind::Timeout,
            format!("Timed out: `{}` did not finish within {}s", step, after.as_secs_f32()),
        )
    }

    /// Fold an error raised while preparing or spawning a step into a report.
    pub(crate) fn from_execution_error(err: ExecutionError, missing_hint: &str) -> Self {
        if err.is_missing_program() {
            Self::fail(FailureKind::ToolchainUnavailable, missing_hint.to_string())
        } else {
            Self::fail(FailureKind::RuntimeError, format!("Error: {}", err))
        }
    }
}

/// Per-step wall-clock limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepTimeouts {
    pub build: Duration,
    pub test: Duration,
    pub syntax: Duration,
    pub run: Duration,
}

impl Default for StepTimeouts {
    fn default() -> Self {
        Self {
            build: Duration::from_secs(30),
            test: Duration::from_secs(30),
            syntax: Duration::from_secs(10),
            run: Duration::from_secs(30),
        }
    }
}

#[async_trait]
pub trait Sandbox: Send + Sync {
    fn language(&self) -> Language;

    /// Whether the toolchain this sandbox drives is installed on the host.
    async fn is_available(&self) -> bool;

    async fn run(&self, source: &str) -> RunReport;
}

/// Fresh scratch directory, under `root` when given, else the system temp dir.
pub(crate) fn scratch_dir(prefix: &str, root: Option<&Path>) -> std::io::Result<TempDir> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(prefix);
    match root {
        Some(root) => builder.tempdir_in(root),
        None => builder.tempdir(),
    }
}

/// Remove a scratch directory once its attempt is over.
///
/// A toolchain killed on timeout may still be tearing down when the first
/// removal runs, so a failed removal is retried once.
pub(crate) async fn release(dir: TempDir) {
    let path = dir.path().to_path_buf();
    if let Err(e) = dir.close() {
        debug!("Retrying removal of {}: {}", path.display(), e);
        tokio::time::sleep(Duration::from_millis(100)).await;
        if let Err(e) = std::fs::remove_dir_all(&path) {
            warn!("Failed to remove scratch directory {}: {}", path.display(), e);
        }
    }
}

/// stderr first, then stdout if the process wrote anything there.
///
/// Test harnesses (libtest, unittest) print assertion details to different
/// streams, so a failing step keeps both.
pub(crate) fn failure_output(outcome: &ProcessOutcome) -> String {
    match outcome {
        ProcessOutcome::Failed { stdout, stderr, .. } => {
            let mut text = stderr.trim_end().to_string();
            if !stdout.trim().is_empty() {
                if !text.is_empty() {
                    text.push_str("\n\n");
                }
                text.push_str(stdout.trim_end());
            }
            text
        }
        _ => String::new(),
    }
}
