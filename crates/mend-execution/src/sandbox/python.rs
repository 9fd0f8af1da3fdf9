use super::{failure_output, release, scratch_dir, FailureKind, RunReport, Sandbox, StepTimeouts};
use crate::process::{is_available, run_bounded, BoundedCommand, ExecutionError, ProcessOutcome};
use crate::Language;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const SCRIPT_NAME: &str = "solution.py";
const MISSING_PYTHON: &str = "Python interpreter not found (tried python3 and python)";

/// Syntax-checks, runs and (when it embeds tests) tests generated Python code.
#[derive(Debug, Clone)]
pub struct PythonSandbox {
    candidates: Vec<String>,
    timeouts: StepTimeouts,
    temp_root: Option<PathBuf>,
}

enum Step {
    Passed,
    Stopped(RunReport),
}

impl PythonSandbox {
    pub fn new(candidates: Vec<String>, timeouts: StepTimeouts) -> Self {
        Self {
            candidates,
            timeouts,
            temp_root: None,
        }
    }

    /// Create scratch directories under `root` instead of the system temp dir.
    pub fn with_temp_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.temp_root = Some(root.into());
        self
    }

    /// First interpreter candidate that answers `--version`.
    pub async fn interpreter(&self) -> Option<String> {
        for candidate in &self.candidates {
            if is_available(candidate, &["--version"]).await {
                return Some(candidate.clone());
            }
        }
        None
    }

    async fn check_and_run(
        &self,
        python: &str,
        dir: &Path,
        source: &str,
    ) -> Result<RunReport, ExecutionError> {
        // The script is addressed relative to its directory, which is what
        // `python -m unittest` needs to import it as a module.
        std::fs::write(dir.join(SCRIPT_NAME), source)?;

        let syntax = self.command(python, dir, self.timeouts.syntax, &["-m", "py_compile", SCRIPT_NAME]);
        if let Step::Stopped(report) = step(&syntax, FailureKind::SyntaxError, "Syntax error").await? {
            return Ok(report);
        }

        let run = self.command(python, dir, self.timeouts.run, &[SCRIPT_NAME]);
        if let Step::Stopped(report) = step(&run, FailureKind::RuntimeError, "Runtime error").await? {
            return Ok(report);
        }

        if has_test_markers(source) {
            let pytest = self.command(python, dir, self.timeouts.test, &["-m", "pytest", SCRIPT_NAME, "-v"]);
            match run_bounded(&pytest).await? {
                ProcessOutcome::Succeeded { .. } => debug!("pytest passed"),
                ProcessOutcome::TimedOut { after } => {
                    return Ok(RunReport::timed_out(&pytest.display(), after))
                }
                ProcessOutcome::Failed { .. } => {
                    debug!("pytest failed or is not installed, falling back to unittest");
                    let unittest =
                        self.command(python, dir, self.timeouts.test, &["-m", "unittest", SCRIPT_NAME]);
                    if let Step::Stopped(report) =
                        step(&unittest, FailureKind::TestFailure, "Tests failed").await?
                    {
                        return Ok(report);
                    }
                }
            }
        }

        Ok(RunReport::pass("Code executed successfully!"))
    }

    fn command(
        &self,
        python: &str,
        dir: &Path,
        timeout: std::time::Duration,
        args: &[&str],
    ) -> BoundedCommand {
        BoundedCommand::new(python, timeout)
            .args(args.iter().copied())
            .current_dir(dir)
    }
}

impl Default for PythonSandbox {
    fn default() -> Self {
        Self::new(
            vec!["python3".to_string(), "python".to_string()],
            StepTimeouts::default(),
        )
    }
}

async fn step(
    command: &BoundedCommand,
    kind: FailureKind,
    label: &str,
) -> Result<Step, ExecutionError> {
    Ok(match run_bounded(command).await? {
        ProcessOutcome::Succeeded { .. } => Step::Passed,
        ProcessOutcome::TimedOut { after } => {
            Step::Stopped(RunReport::timed_out(&command.display(), after))
        }
        failed => Step::Stopped(RunReport::fail(
            kind,
            format!("{}:\n{}", label, failure_output(&failed)),
        )),
    })
}

/// Test-runner passes only run when the source references a test framework.
pub fn has_test_markers(source: &str) -> bool {
    source.contains("pytest") || source.contains("unittest")
}

#[async_trait]
impl Sandbox for PythonSandbox {
    fn language(&self) -> Language {
        Language::Python
    }

    async fn is_available(&self) -> bool {
        self.interpreter().await.is_some()
    }

    async fn run(&self, source: &str) -> RunReport {
        let Some(python) = self.interpreter().await else {
            return RunReport::fail(FailureKind::ToolchainUnavailable, MISSING_PYTHON);
        };
        info!("Running generated Python code with {}", python);
        let workspace = match scratch_dir("mend-python-", self.temp_root.as_deref()) {
            Ok(dir) => dir,
            Err(e) => return RunReport::from_execution_error(e.into(), MISSING_PYTHON),
        };
        let report = match self.check_and_run(&python, workspace.path(), source).await {
            Ok(report) => report,
            Err(e) => RunReport::from_execution_error(e, MISSING_PYTHON),
        };
        release(workspace).await;
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn sandbox() -> Option<PythonSandbox> {
        let sandbox = PythonSandbox::default();
        sandbox.is_available().await.then_some(sandbox)
    }

    #[test]
    fn detects_test_markers() {
        assert!(has_test_markers("import unittest\n"));
        assert!(has_test_markers("import pytest\n"));
        assert!(!has_test_markers("print('hi')\n"));
    }

    #[tokio::test]
    async fn plain_script_passes() {
        let Some(sandbox) = sandbox().await else { return };
        let report = sandbox.run("print('Hello, world!')\n").await;
        assert!(report.passed, "{}", report.diagnostic);
        assert_eq!(report.diagnostic, "Code executed successfully!");
    }

    #[tokio::test]
    async fn syntax_error_is_classified() {
        let Some(sandbox) = sandbox().await else { return };
        let report = sandbox.run("print('unclosed string\n").await;
        assert_eq!(report.failure, Some(FailureKind::SyntaxError));
        assert!(report.diagnostic.starts_with("Syntax error:"));
    }

    #[tokio::test]
    async fn runtime_error_carries_traceback() {
        let Some(sandbox) = sandbox().await else { return };
        let report = sandbox.run("raise ValueError('boom')\n").await;
        assert_eq!(report.failure, Some(FailureKind::RuntimeError));
        assert!(report.diagnostic.contains("ValueError: boom"));
    }

    #[tokio::test]
    async fn failing_unittest_is_a_test_failure() {
        let Some(sandbox) = sandbox().await else { return };
        let source = r#"import unittest

def add(a, b):
    return a - b

class TestAdd(unittest.TestCase):
    def test_add(self):
        self.assertEqual(add(2, 3), 5)
"#;
        let report = sandbox.run(source).await;
        assert_eq!(report.failure, Some(FailureKind::TestFailure));
        assert!(report.diagnostic.contains("AssertionError"));
    }

    #[tokio::test]
    async fn slow_program_times_out() {
        let timeouts = StepTimeouts {
            run: Duration::from_millis(300),
            ..StepTimeouts::default()
        };
        let sandbox = PythonSandbox::new(vec!["python3".to_string(), "python".to_string()], timeouts);
        if !sandbox.is_available().await {
            return;
        }
        let report = sandbox.run("import time\ntime.sleep(10)\n").await;
        assert_eq!(report.failure, Some(FailureKind::Timeout));
    }

    #[tokio::test]
    async fn scratch_directory_is_removed_after_every_outcome() {
        if sandbox().await.is_none() {
            return;
        }
        let root = tempfile::TempDir::new().unwrap();
        let is_empty = || std::fs::read_dir(root.path()).unwrap().next().is_none();

        let sandbox = PythonSandbox::default().with_temp_root(root.path());
        assert!(sandbox.run("print('hi')\n").await.passed);
        assert!(is_empty());

        let report = sandbox.run("def broken(:\n").await;
        assert_eq!(report.failure, Some(FailureKind::SyntaxError));
        assert!(is_empty());

        let timeouts = StepTimeouts {
            run: Duration::from_millis(300),
            ..StepTimeouts::default()
        };
        let hurried = PythonSandbox::new(vec!["python3".to_string(), "python".to_string()], timeouts)
            .with_temp_root(root.path());
        let report = hurried.run("import time\ntime.sleep(10)\n").await;
        assert_eq!(report.failure, Some(FailureKind::Timeout));
        assert!(is_empty());
    }

    #[tokio::test]
    async fn no_interpreter_is_toolchain_unavailable() {
        let sandbox = PythonSandbox::new(vec!["mend-no-such-python".to_string()], StepTimeouts::default());
        let report = sandbox.run("print(1)\n").await;
        assert_eq!(report.failure, Some(FailureKind::ToolchainUnavailable));
    }
}
