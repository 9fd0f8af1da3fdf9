use super::{failure_output, release, scratch_dir, FailureKind, RunReport, Sandbox, StepTimeouts};
use crate::process::{is_available, run_bounded, BoundedCommand, ExecutionError, ProcessOutcome};
use crate::Language;
use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info};

const PROJECT_NAME: &str = "test_project";
const MISSING_CARGO: &str = "Rust/Cargo not installed. Install with: curl --proto '=https' --tlsv1.2 -sSf https://sh.rustup.rs | sh";

/// Builds and tests generated Rust code inside a throwaway cargo project.
#[derive(Debug, Clone)]
pub struct RustSandbox {
    cargo: String,
    timeouts: StepTimeouts,
    temp_root: Option<PathBuf>,
}

impl RustSandbox {
    pub fn new(cargo: impl Into<String>, timeouts: StepTimeouts) -> Self {
        Self {
            cargo: cargo.into(),
            timeouts,
            temp_root: None,
        }
    }

    /// Create throwaway projects under `root` instead of the system temp dir.
    pub fn with_temp_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.temp_root = Some(root.into());
        self
    }

    async fn build_and_test(&self, workspace: &Path, source: &str) -> Result<RunReport, ExecutionError> {
        let project_dir = write_project(workspace, source)?;

        let build = BoundedCommand::new(&self.cargo, self.timeouts.build)
            .arg("build")
            .current_dir(&project_dir);
        match run_bounded(&build).await? {
            ProcessOutcome::Succeeded { .. } => debug!("Build succeeded"),
            ProcessOutcome::TimedOut { after } => {
                return Ok(RunReport::timed_out(&build.display(), after))
            }
            failed => {
                return Ok(RunReport::fail(
                    FailureKind::BuildFailure,
                    format!("Build failed:\n{}", failure_output(&failed)),
                ))
            }
        }

        let test = BoundedCommand::new(&self.cargo, self.timeouts.test)
            .arg("test")
            .current_dir(&project_dir);
        match run_bounded(&test).await? {
            ProcessOutcome::Succeeded { .. } => Ok(RunReport::pass("All tests passed!")),
            ProcessOutcome::TimedOut { after } => Ok(RunReport::timed_out(&test.display(), after)),
            failed => Ok(RunReport::fail(
                FailureKind::TestFailure,
                format!("Tests failed:\n{}", failure_output(&failed)),
            )),
        }
    }
}

impl Default for RustSandbox {
    fn default() -> Self {
        Self::new("cargo", StepTimeouts::default())
    }
}

#[async_trait]
impl Sandbox for RustSandbox {
    fn language(&self) -> Language {
        Language::Rust
    }

    async fn is_available(&self) -> bool {
        is_available(&self.cargo, &["--version"]).await
    }

    async fn run(&self, source: &str) -> RunReport {
        info!("Building generated Rust code with {}", self.cargo);
        let workspace = match scratch_dir("mend-rust-", self.temp_root.as_deref()) {
            Ok(dir) => dir,
            Err(e) => return RunReport::from_execution_error(e.into(), MISSING_CARGO),
        };
        let report = match self.build_and_test(workspace.path(), source).await {
            Ok(report) => report,
            Err(e) => RunReport::from_execution_error(e, MISSING_CARGO),
        };
        release(workspace).await;
        report
    }
}

/// Generated source split into the manifest and the cleaned `main.rs`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectFiles {
    pub manifest: String,
    pub main_rs: String,
}

fn dependency_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^//\s*([A-Za-z0-9_-]+\s*=\s*(?:".*"|\{.*\}))\s*$"#)
            .expect("dependency pattern is valid")
    })
}

fn table_header() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^//\s*\[([^\]]+)\]\s*$").expect("table header pattern is valid"))
}

/// Move `// name = "version"` dependency comments into a cargo manifest.
///
/// Generated programs are asked to declare dependencies as comments at the top
/// of the file. Commented table headers are dropped; entries under a commented
/// table other than `[dependencies]` are dropped too, so a commented
/// `[package]` section never leaks into the dependency list.
pub fn split_project_files(source: &str) -> ProjectFiles {
    let mut dependencies = Vec::new();
    let mut kept = Vec::new();
    let mut current_table: Option<String> = None;

    for line in source.lines() {
        let trimmed = line.trim();
        if let Some(caps) = table_header().captures(trimmed) {
            current_table = Some(caps[1].trim().to_string());
            continue;
        }
        if let Some(caps) = dependency_line().captures(trimmed) {
            let in_dependencies = current_table
                .as_deref()
                .map_or(true, |table| table == "dependencies");
            if in_dependencies {
                dependencies.push(caps[1].to_string());
            }
            continue;
        }
        kept.push(line);
    }

    let mut manifest = format!(
        "[package]\nname = \"{}\"\nversion = \"0.1.0\"\nedition = \"2021\"\n\n[dependencies]\n",
        PROJECT_NAME
    );
    for dependency in &dependencies {
        manifest.push_str(dependency);
        manifest.push('\n');
    }

    let mut main_rs = kept.join("\n");
    main_rs.push('\n');

    ProjectFiles { manifest, main_rs }
}

fn write_project(root: &Path, source: &str) -> Result<PathBuf, ExecutionError> {
    let files = split_project_files(source);
    let project_dir = root.join(PROJECT_NAME);
    let src_dir = project_dir.join("src");
    std::fs::create_dir_all(&src_dir)?;
    std::fs::write(project_dir.join("Cargo.toml"), &files.manifest)?;
    std::fs::write(src_dir.join("main.rs"), &files.main_rs)?;
    debug!("Wrote cargo project to {}", project_dir.display());
    Ok(project_dir)
}
