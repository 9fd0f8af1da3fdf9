use crate::tui::SimpleOutput;
use mend_core::{RunReport, Task, TaskResult, UiWriter};
use std::path::Path;

/// Prints loop progress to stdout. Silent when `quiet` (JSON output).
pub struct ConsoleUiWriter {
    output: SimpleOutput,
    show_code: bool,
    quiet: bool,
}

impl ConsoleUiWriter {
    pub fn new(show_code: bool, quiet: bool) -> Self {
        Self {
            output: SimpleOutput::new(),
            show_code,
            quiet,
        }
    }
}

impl UiWriter for ConsoleUiWriter {
    fn print_task_header(&self, task: &Task, max_attempts: u32) {
        if self.quiet {
            return;
        }
        self.output.print("");
        self.output.print(&format!("🎯 Task: {}", task.description));
        if task.was_downgraded() {
            self.output.print(&format!(
                "⚠️  {} toolchain not found, using {} instead",
                task.requested.display_name(),
                task.language.display_name()
            ));
        }
        self.output.print(&format!(
            "🔤 Language: {} | up to {} attempts",
            task.language.display_name(),
            max_attempts
        ));
    }

    fn print_attempt_header(&self, attempt: u32, max_attempts: u32) {
        if self.quiet {
            return;
        }
        self.output.print("");
        self.output.print_attempts(attempt, max_attempts);
        self.output.print("🤔 Generating code...");
    }

    fn print_code_saved(&self, path: &Path) {
        if self.quiet {
            return;
        }
        self.output.print(&format!("💾 Saved {}", path.display()));
    }

    fn print_attempt_outcome(&self, attempt: u32, report: &RunReport) {
        if self.quiet {
            return;
        }
        if report.passed {
            self.output
                .print_status(true, &format!("Attempt {}: {}", attempt, report.diagnostic));
        } else {
            let kind = report
                .failure
                .map(|k| k.to_string())
                .unwrap_or_else(|| "failure".to_string());
            self.output
                .print_status(false, &format!("Attempt {} failed ({})", attempt, kind));
            self.output.print(&report.diagnostic);
        }
    }

    fn print_task_summary(&self, result: &TaskResult) {
        if self.quiet {
            return;
        }
        self.output.print("");
        if result.success {
            self.output.print_status(
                true,
                &format!("Solved in {} attempt(s)", result.attempts),
            );
        } else {
            self.output.print_status(
                false,
                &format!("Gave up after {} attempt(s)", result.attempts),
            );
        }
        if let Some(filename) = &result.filename {
            self.output.print(&format!("📄 Final code: {}", filename.display()));
        }
        if self.show_code {
            self.output
                .print_code(result.language.extension(), &result.final_code);
        }
    }

    fn println(&self, text: &str) {
        if !self.quiet {
            self.output.print(text);
        }
    }
}
