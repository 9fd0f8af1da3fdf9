//! Code execution engine for mend.
//!
//! Everything that touches a toolchain goes through [`run_bounded`], which
//! spawns one child process, waits for it with a wall-clock limit and reports a
//! tagged [`ProcessOutcome`]. The [`sandbox`] module builds the per-language
//! build/run/test pipelines on top of it.

pub mod language;
pub mod process;
pub mod sandbox;

pub use language::Language;
pub use process::{is_available, run_bounded, BoundedCommand, ExecutionError, ProcessOutcome};
pub use sandbox::{
    python::PythonSandbox, rust::RustSandbox, FailureKind, RunReport, Sandbox, StepTimeouts,
};
