use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// A child-process invocation with a fixed argument vector and a wall-clock limit.
#[derive(Debug, Clone)]
pub struct BoundedCommand {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub timeout: Duration,
}

impl BoundedCommand {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            timeout,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.working_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// `program arg1 arg2`, for logs and diagnostics.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// How a bounded child process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    Succeeded {
        stdout: String,
        stderr: String,
    },
    Failed {
        /// `None` when the process was terminated by a signal.
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },
    TimedOut {
        after: Duration,
    },
}

impl ProcessOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ProcessOutcome::Succeeded { .. })
    }
}

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed while waiting for `{program}`: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("sandbox I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExecutionError {
    /// True when the executable itself could not be found.
    pub fn is_missing_program(&self) -> bool {
        matches!(
            self,
            ExecutionError::Spawn { source, .. } if source.kind() == std::io::ErrorKind::NotFound
        )
    }
}

/// Run one child process to completion or until its timeout expires.
///
/// stdin is closed and both output streams are captured. On timeout the child
/// is killed (it is spawned with `kill_on_drop`) and `TimedOut` is returned
/// without any partial output.
///
/// On unix the child leads its own process group, and the whole group is
/// killed once the step ends, so toolchain grandchildren (`rustc` under
/// `cargo build`, background jobs of a generated program) never outlive it.
pub async fn run_bounded(command: &BoundedCommand) -> Result<ProcessOutcome, ExecutionError> {
    debug!(
        "Running `{}` (timeout {:?}, cwd {:?})",
        command.display(),
        command.timeout,
        command.working_dir
    );

    let mut cmd = Command::new(&command.program);
    cmd.args(&command.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if let Some(dir) = &command.working_dir {
        cmd.current_dir(dir);
    }

    #[cfg(unix)]
    cmd.process_group(0);

    let child = cmd.spawn().map_err(|source| ExecutionError::Spawn {
        program: command.program.clone(),
        source,
    })?;
    let group = ProcessGroup::of(child.id());

    let waited = tokio::time::timeout(command.timeout, child.wait_with_output()).await;
    group.kill();

    match waited {
        Ok(Ok(output)) => {
            let stdout = String::from_utf8_lossy(&output.stdout).to_string();
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            if output.status.success() {
                Ok(ProcessOutcome::Succeeded { stdout, stderr })
            } else {
                debug!(
                    "`{}` exited with {:?}",
                    command.display(),
                    output.status.code()
                );
                Ok(ProcessOutcome::Failed {
                    exit_code: output.status.code(),
                    stdout,
                    stderr,
                })
            }
        }
        Ok(Err(source)) => Err(ExecutionError::Wait {
            program: command.program.clone(),
            source,
        }),
        Err(_) => {
            debug!(
                "`{}` timed out after {:?}",
                command.display(),
                command.timeout
            );
            Ok(ProcessOutcome::TimedOut {
                after: command.timeout,
            })
        }
    }
}

/// Process group led by a spawned child; the group id is the child's pid.
struct ProcessGroup(Option<u32>);

impl ProcessGroup {
    fn of(pid: Option<u32>) -> Self {
        Self(pid)
    }

    #[cfg(unix)]
    fn kill(&self) {
        let Some(pgid) = self.0.and_then(|pid| libc::pid_t::try_from(pid).ok()) else {
            return;
        };
        // ESRCH just means every member has already exited
        let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
        if rc == 0 {
            debug!("Killed leftover processes in group {}", pgid);
        }
    }

    #[cfg(not(unix))]
    fn kill(&self) {}
}

/// Check that `program` can be spawned and exits successfully with `args`.
pub async fn is_available(program: &str, args: &[&str]) -> bool {
    let probe = BoundedCommand::new(program, PROBE_TIMEOUT).args(args.iter().copied());
    matches!(run_bounded(&probe).await, Ok(ProcessOutcome::Succeeded { .. }))
}
