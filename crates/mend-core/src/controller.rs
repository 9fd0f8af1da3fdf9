//! The generate → archive → test → retry loop.

use crate::archive::AttemptArchive;
use crate::classifier::{resolve_task, ToolchainProbe};
use crate::generator::CodeGenerator;
use crate::provider_setup::select_provider;
use crate::task::Task;
use crate::task_result::{Attempt, TaskResult};
use crate::ui_writer::UiWriter;
use async_trait::async_trait;
use mend_config::{Config, ToolchainConfig};
use mend_execution::{Language, PythonSandbox, RustSandbox, Sandbox, StepTimeouts};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Generating,
    Testing,
    Succeeded,
    Failed,
}

impl LoopState {
    pub fn is_terminal(self) -> bool {
        matches!(self, LoopState::Succeeded | LoopState::Failed)
    }

    /// Transition taken after a step of `attempt` finishes. `passed` is only
    /// read when leaving `Testing`.
    pub fn next(self, passed: bool, attempt: u32, max_attempts: u32) -> LoopState {
        match self {
            LoopState::Generating => LoopState::Testing,
            LoopState::Testing if passed => LoopState::Succeeded,
            LoopState::Testing if attempt < max_attempts => LoopState::Generating,
            LoopState::Testing => LoopState::Failed,
            terminal => terminal,
        }
    }
}

/// One sandbox per supported language.
pub struct Sandboxes {
    rust: Box<dyn Sandbox>,
    python: Box<dyn Sandbox>,
}

impl Sandboxes {
    pub fn new(rust: Box<dyn Sandbox>, python: Box<dyn Sandbox>) -> Self {
        Self { rust, python }
    }

    pub fn from_config(config: &ToolchainConfig) -> Self {
        let timeouts = StepTimeouts {
            build: config.build_timeout(),
            test: config.test_timeout(),
            syntax: config.syntax_timeout(),
            run: config.run_timeout(),
        };
        Self::new(
            Box::new(RustSandbox::new(config.cargo.clone(), timeouts.clone())),
            Box::new(PythonSandbox::new(
                config.python_candidates.clone(),
                timeouts,
            )),
        )
    }

    pub fn get(&self, language: Language) -> &dyn Sandbox {
        match language {
            Language::Rust => self.rust.as_ref(),
            Language::Python => self.python.as_ref(),
        }
    }
}

#[async_trait]
impl ToolchainProbe for Sandboxes {
    async fn has_toolchain(&self, language: Language) -> bool {
        self.get(language).is_available().await
    }
}

/// Drives tasks through generation and testing until one attempt passes or
/// the attempt ceiling is reached.
pub struct SelfHealingAssistant<W: UiWriter> {
    generator: CodeGenerator,
    sandboxes: Sandboxes,
    archive: AttemptArchive,
    max_attempts: u32,
    ui_writer: W,
}

impl<W: UiWriter> SelfHealingAssistant<W> {
    pub fn new(
        generator: CodeGenerator,
        sandboxes: Sandboxes,
        archive: AttemptArchive,
        max_attempts: u32,
        ui_writer: W,
    ) -> Self {
        Self {
            generator,
            sandboxes,
            archive,
            max_attempts: max_attempts.max(1),
            ui_writer,
        }
    }

    pub async fn from_config(config: &Config, ui_writer: W) -> Self {
        let provider = select_provider(config).await;
        Self::new(
            CodeGenerator::new(provider, config.assistant.max_tokens),
            Sandboxes::from_config(&config.toolchains),
            AttemptArchive::new(config.assistant.output_path()),
            config.assistant.max_attempts,
            ui_writer,
        )
    }

    /// `(name, model)` of the provider currently generating code.
    pub fn provider_info(&self) -> (String, String) {
        self.generator.provider_info()
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn ui_writer(&self) -> &W {
        &self.ui_writer
    }

    pub async fn solve(&mut self, description: &str) -> TaskResult {
        let mut task = resolve_task(description, &self.sandboxes).await;
        info!(
            "Solving task '{}' in {} (max {} attempts)",
            task.description, task.language, self.max_attempts
        );
        self.ui_writer.print_task_header(&task, self.max_attempts);

        let mut history: Vec<Attempt> = Vec::new();
        let mut previous_diagnostic: Option<String> = None;
        let mut source = String::new();
        let mut filename: Option<PathBuf> = None;
        let mut state = LoopState::Generating;

        loop {
            match state {
                LoopState::Generating => {
                    self.ui_writer
                        .print_attempt_header(task.attempt(), self.max_attempts);
                    source = self
                        .generator
                        .generate(
                            &task.description,
                            task.language,
                            previous_diagnostic.as_deref(),
                        )
                        .await;
                    filename = self.archive_attempt(&task, &source);
                    state = state.next(false, task.attempt(), self.max_attempts);
                }
                LoopState::Testing => {
                    let report = self.sandboxes.get(task.language).run(&source).await;
                    self.ui_writer.print_attempt_outcome(task.attempt(), &report);
                    state = state.next(report.passed, task.attempt(), self.max_attempts);

                    previous_diagnostic = (!report.passed).then(|| report.diagnostic.clone());
                    history.push(Attempt {
                        number: task.attempt(),
                        source: std::mem::take(&mut source),
                        filename: filename.take(),
                        report,
                    });

                    if state == LoopState::Generating {
                        task.next_attempt();
                    }
                }
                LoopState::Succeeded | LoopState::Failed => break,
            }
        }

        let requested = task.was_downgraded().then_some(task.requested);
        let result = TaskResult::from_history(task.description, task.language, requested, history);
        if result.success {
            info!("Task succeeded after {} attempt(s)", result.attempts);
        } else {
            warn!("Task failed after {} attempt(s)", result.attempts);
        }
        self.ui_writer.print_task_summary(&result);
        result
    }

    fn archive_attempt(&self, task: &Task, source: &str) -> Option<PathBuf> {
        match self
            .archive
            .write(&task.description, task.attempt(), task.language, source)
        {
            Ok(path) => {
                self.ui_writer.print_code_saved(&path);
                Some(path)
            }
            Err(e) => {
                warn!(
                    "Failed to archive attempt {} in {}: {}",
                    task.attempt(),
                    self.archive.dir().display(),
                    e
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generating_always_moves_to_testing() {
        assert_eq!(LoopState::Generating.next(false, 1, 3), LoopState::Testing);
        assert_eq!(LoopState::Generating.next(true, 3, 3), LoopState::Testing);
    }

    #[test]
    fn testing_transitions() {
        assert_eq!(LoopState::Testing.next(true, 1, 3), LoopState::Succeeded);
        assert_eq!(LoopState::Testing.next(true, 3, 3), LoopState::Succeeded);
        assert_eq!(LoopState::Testing.next(false, 1, 3), LoopState::Generating);
        assert_eq!(LoopState::Testing.next(false, 2, 3), LoopState::Generating);
        assert_eq!(LoopState::Testing.next(false, 3, 3), LoopState::Failed);
        assert_eq!(LoopState::Testing.next(false, 1, 1), LoopState::Failed);
    }

    #[test]
    fn terminal_states_stay_put() {
        assert!(LoopState::Succeeded.is_terminal());
        assert_eq!(LoopState::Failed.next(true, 1, 3), LoopState::Failed);
        assert_eq!(LoopState::Succeeded.next(false, 1, 3), LoopState::Succeeded);
    }
}
