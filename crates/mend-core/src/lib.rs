pub mod archive;
pub mod classifier;
pub mod controller;
pub mod error_handling;
pub mod generator;
pub mod provider_setup;
pub mod task;
pub mod task_result;
pub mod ui_writer;

pub use archive::AttemptArchive;
pub use classifier::{detect_language, resolve_task, ToolchainProbe};
pub use controller::{LoopState, Sandboxes, SelfHealingAssistant};
pub use error_handling::GenerationError;
pub use generator::CodeGenerator;
pub use provider_setup::select_provider;
pub use task::Task;
pub use task_result::{Attempt, TaskResult};
pub use ui_writer::{NullUiWriter, UiWriter};

pub use mend_execution::{FailureKind, Language, RunReport};
