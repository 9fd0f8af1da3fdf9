use crate::task::Task;
use crate::task_result::TaskResult;
use mend_execution::RunReport;
use std::path::Path;

/// Progress output of the retry loop. The CLI prints to the console; tests and
/// `--json` runs use [`NullUiWriter`].
pub trait UiWriter: Send + Sync {
    fn print_task_header(&self, task: &Task, max_attempts: u32);
    fn print_attempt_header(&self, attempt: u32, max_attempts: u32);
    fn print_code_saved(&self, path: &Path);
    fn print_attempt_outcome(&self, attempt: u32, report: &RunReport);
    fn print_task_summary(&self, result: &TaskResult);
    fn println(&self, text: &str);
}

pub struct NullUiWriter;

impl UiWriter for NullUiWriter {
    fn print_task_header(&self, _task: &Task, _max_attempts: u32) {}
    fn print_attempt_header(&self, _attempt: u32, _max_attempts: u32) {}
    fn print_code_saved(&self, _path: &Path) {}
    fn print_attempt_outcome(&self, _attempt: u32, _report: &RunReport) {}
    fn print_task_summary(&self, _result: &TaskResult) {}
    fn println(&self, _text: &str) {}
}
