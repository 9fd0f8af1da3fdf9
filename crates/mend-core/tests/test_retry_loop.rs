use anyhow::{anyhow, Result};
use async_trait::async_trait;
use mend_core::{
    AttemptArchive, CodeGenerator, FailureKind, Language, NullUiWriter, RunReport, Sandboxes,
    SelfHealingAssistant,
};
use mend_execution::Sandbox;
use mend_providers::{CompletionRequest, CompletionResponse, LLMProvider, Usage};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Provider that answers with numbered programs and remembers every prompt.
#[derive(Default)]
struct ScriptedProvider {
    prompts: Mutex<Vec<String>>,
    fail: bool,
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        if self.fail {
            return Err(anyhow!("Failed to send request to scripted API"));
        }
        let mut prompts = self.prompts.lock().unwrap();
        prompts.push(request.prompt().to_string());
        Ok(CompletionResponse {
            content: format!("```\nprogram {}\n```", prompts.len()),
            usage: Usage::default(),
            model: "scripted".to_string(),
        })
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-1"
    }
}

/// Sandbox that replays queued reports; once the queue is empty every run passes.
struct ScriptedSandbox {
    language: Language,
    available: bool,
    reports: Mutex<VecDeque<RunReport>>,
    sources: Arc<Mutex<Vec<String>>>,
}

impl ScriptedSandbox {
    fn new(language: Language, available: bool, reports: Vec<RunReport>) -> Self {
        Self {
            language,
            available,
            reports: Mutex::new(reports.into()),
            sources: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl Sandbox for ScriptedSandbox {
    fn language(&self) -> Language {
        self.language
    }

    async fn is_available(&self) -> bool {
        self.available
    }

    async fn run(&self, source: &str) -> RunReport {
        self.sources.lock().unwrap().push(source.to_string());
        self.reports
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| RunReport::pass("All tests passed!"))
    }
}

fn build_failure(n: u32) -> RunReport {
    RunReport::fail(
        FailureKind::BuildFailure,
        format!("Build failed:\nerror[E0308]: mismatched types (attempt {})", n),
    )
}

struct Harness {
    assistant: SelfHealingAssistant<NullUiWriter>,
    provider: Arc<ScriptedProvider>,
    rust_sources: Arc<Mutex<Vec<String>>>,
    python_sources: Arc<Mutex<Vec<String>>>,
    output: TempDir,
}

fn harness(cargo_present: bool, rust_reports: Vec<RunReport>, python_reports: Vec<RunReport>) -> Harness {
    harness_with(Arc::new(ScriptedProvider::default()), cargo_present, rust_reports, python_reports)
}

fn harness_with(
    provider: Arc<ScriptedProvider>,
    cargo_present: bool,
    rust_reports: Vec<RunReport>,
    python_reports: Vec<RunReport>,
) -> Harness {
    let rust = ScriptedSandbox::new(Language::Rust, cargo_present, rust_reports);
    let python = ScriptedSandbox::new(Language::Python, true, python_reports);
    let rust_sources = rust.sources.clone();
    let python_sources = python.sources.clone();
    let output = TempDir::new().unwrap();

    let assistant = SelfHealingAssistant::new(
        CodeGenerator::new(provider.clone(), 1500),
        Sandboxes::new(Box::new(rust), Box::new(python)),
        AttemptArchive::new(output.path()),
        3,
        NullUiWriter,
    );

    Harness {
        assistant,
        provider,
        rust_sources,
        python_sources,
        output,
    }
}

#[tokio::test]
async fn passes_on_first_attempt() {
    let mut h = harness(true, vec![], vec![]);
    let result = h.assistant.solve("write quicksort in Rust").await;

    assert!(result.success);
    assert_eq!(result.attempts, 1);
    assert_eq!(result.language, Language::Rust);
    assert_eq!(result.message, "All tests passed!");
    assert_eq!(result.final_code, "program 1\n");
    assert_eq!(h.rust_sources.lock().unwrap().len(), 1);

    let archived = h.output.path().join("write_quicksort_in_rust_attempt_1.rs");
    assert_eq!(result.filename.as_deref(), Some(archived.as_path()));
    assert_eq!(std::fs::read_to_string(archived).unwrap(), "program 1\n");
}

#[tokio::test]
async fn missing_cargo_downgrades_to_python() {
    let mut h = harness(false, vec![], vec![]);
    let result = h.assistant.solve("write quicksort in Rust").await;

    assert!(result.success);
    assert_eq!(result.language, Language::Python);
    assert_eq!(result.requested_language, Some(Language::Rust));
    assert_eq!(result.task, "write quicksort in Python");
    assert!(h.rust_sources.lock().unwrap().is_empty());
    assert_eq!(h.python_sources.lock().unwrap().len(), 1);

    let prompts = h.provider.prompts.lock().unwrap();
    assert!(prompts[0].contains("Write a complete Python program for: write quicksort in Python"));
    assert!(h
        .output
        .path()
        .join("write_quicksort_in_python_attempt_1.py")
        .exists());
}

#[tokio::test]
async fn recovers_on_third_attempt() {
    let mut h = harness(true, vec![build_failure(1), build_failure(2)], vec![]);
    let result = h.assistant.solve("write quicksort in Rust").await;

    assert!(result.success);
    assert_eq!(result.attempts, 3);
    assert_eq!(result.final_code, "program 3\n");
    assert_eq!(result.history.len(), 3);
    assert_eq!(result.history[0].report.failure, Some(FailureKind::BuildFailure));
    assert!(result.history[2].report.passed);
    for n in 1..=3 {
        let name = format!("write_quicksort_in_rust_attempt_{}.rs", n);
        assert!(h.output.path().join(name).exists());
    }
}

#[tokio::test]
async fn diagnostic_is_fed_into_next_prompt() {
    let mut h = harness(true, vec![build_failure(1), build_failure(2)], vec![]);
    h.assistant.solve("write quicksort in Rust").await;

    let prompts = h.provider.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 3);
    assert!(!prompts[0].contains("IMPORTANT"));
    assert!(prompts[1].contains(&build_failure(1).diagnostic));
    assert!(prompts[2].contains(&build_failure(2).diagnostic));
    assert!(!prompts[2].contains(&build_failure(1).diagnostic));
}

#[tokio::test]
async fn gives_up_at_the_ceiling() {
    let mut h = harness(
        true,
        vec![build_failure(1), build_failure(2), build_failure(3), build_failure(4)],
        vec![],
    );
    let result = h.assistant.solve("write quicksort in Rust").await;

    assert!(!result.success);
    assert_eq!(result.attempts, 3);
    assert_eq!(result.message, build_failure(3).diagnostic);
    assert_eq!(result.final_error(), Some(build_failure(3).diagnostic.as_str()));
    assert_eq!(result.failure, Some(FailureKind::BuildFailure));
    assert_eq!(h.rust_sources.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn timeout_counts_as_an_attempt() {
    let timeout = RunReport::timed_out("cargo build", Duration::from_secs(30));
    let mut h = harness(true, vec![timeout.clone(), timeout.clone(), timeout], vec![]);
    let result = h.assistant.solve("write quicksort in Rust").await;

    assert!(!result.success);
    assert_eq!(result.attempts, 3);
    assert_eq!(result.failure, Some(FailureKind::Timeout));
    assert!(result
        .history
        .iter()
        .all(|a| a.report.failure == Some(FailureKind::Timeout)));
}

#[tokio::test]
async fn attempts_stay_within_ceiling() {
    for failures in 0..6 {
        let reports = (1..=failures)
            .map(|n| RunReport::fail(FailureKind::RuntimeError, format!("Runtime error: {}", n)))
            .collect();
        let mut h = harness(true, vec![], reports);
        let result = h.assistant.solve("implement fibonacci with memoization").await;

        assert!(result.attempts >= 1 && result.attempts <= 3);
        assert_eq!(result.success, failures < 3);
        assert_eq!(result.history.len() as u32, result.attempts);
        let numbers: Vec<u32> = result.history.iter().map(|a| a.number).collect();
        assert_eq!(numbers, (1..=result.attempts).collect::<Vec<_>>());
    }
}

#[tokio::test]
async fn archive_failure_does_not_stop_the_loop() {
    let blocker = TempDir::new().unwrap();
    let file = blocker.path().join("not-a-dir");
    std::fs::write(&file, "").unwrap();

    let rust = ScriptedSandbox::new(Language::Rust, true, vec![]);
    let python = ScriptedSandbox::new(Language::Python, true, vec![build_failure(1)]);
    let mut assistant = SelfHealingAssistant::new(
        CodeGenerator::new(Arc::new(ScriptedProvider::default()), 1500),
        Sandboxes::new(Box::new(rust), Box::new(python)),
        AttemptArchive::new(&file),
        3,
        NullUiWriter,
    );

    let result = assistant.solve("hello world").await;
    assert!(result.success);
    assert_eq!(result.attempts, 2);
    assert!(result.filename.is_none());
}

#[tokio::test]
async fn unavailable_service_falls_back_to_templates() {
    let provider = Arc::new(ScriptedProvider {
        fail: true,
        ..Default::default()
    });
    let mut h = harness_with(provider, true, vec![], vec![]);
    let result = h.assistant.solve("write quicksort in Rust").await;

    assert!(result.success);
    assert!(result.final_code.contains("fn quicksort"));
    assert_eq!(h.assistant.provider_info().0, "fallback");
}
