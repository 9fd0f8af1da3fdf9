use anyhow::{anyhow, Context, Result};
use clap::Parser;
use mend_config::Config;
use mend_core::{SelfHealingAssistant, TaskResult, UiWriter};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::{error, info};

mod tui;
mod ui_writer_impl;
use tui::SimpleOutput;
use ui_writer_impl::ConsoleUiWriter;

/// Tasks run by `--demo`.
pub const DEMO_TASKS: [&str; 3] = [
    "write quicksort in Rust",
    "create a binary search tree in Python",
    "implement fibonacci with memoization in Python",
];

#[derive(Parser, Debug)]
#[command(name = "mend")]
#[command(about = "Self-healing code generator: generate, test, feed errors back, retry")]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Override the configured provider (openai, ollama, fallback)
    #[arg(long, value_name = "PROVIDER")]
    pub provider: Option<String>,

    /// Override the model for the selected provider
    #[arg(long, value_name = "MODEL")]
    pub model: Option<String>,

    /// Maximum generate/test attempts per task
    #[arg(long, value_name = "N")]
    pub max_attempts: Option<u32>,

    /// Directory for the archived `<task>_attempt_<n>` files
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<String>,

    /// Never call a remote completion service
    #[arg(long)]
    pub offline: bool,

    /// Run the built-in example tasks and print a summary
    #[arg(long, conflicts_with = "task")]
    pub demo: bool,

    /// Print results as JSON instead of progress output
    #[arg(long)]
    pub json: bool,

    /// Print the final source code after each task
    #[arg(long)]
    pub show_code: bool,

    /// Write the effective configuration to the default config path and exit
    #[arg(long)]
    pub init_config: bool,

    /// Task to solve (if omitted, starts interactive mode)
    pub task: Option<String>,
}

impl Cli {
    /// Fold the command-line overrides into a loaded configuration.
    pub fn apply_to(&self, config: &mut Config) -> Result<()> {
        if let Some(max_attempts) = self.max_attempts {
            config.assistant.max_attempts = max_attempts;
        }
        if let Some(output_dir) = &self.output_dir {
            config.assistant.output_dir = output_dir.clone();
        }
        if self.offline {
            config.providers.offline = true;
        }
        config.validate()?;
        Ok(())
    }
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    info!("Starting mend");

    let mut config = Config::load_with_overrides(
        cli.config.as_deref(),
        cli.provider.clone(),
        cli.model.clone(),
    )?;
    cli.apply_to(&mut config)?;

    if cli.init_config {
        return init_config(&config);
    }

    let ui_writer = ConsoleUiWriter::new(cli.show_code, cli.json);
    let mut assistant = SelfHealingAssistant::from_config(&config, ui_writer).await;

    if cli.demo {
        info!("Running demo tasks");
        run_demo(&mut assistant, cli.json).await
    } else if let Some(task) = cli.task {
        info!("Executing task: {}", task);
        let result = assistant.solve(&task).await;
        if cli.json {
            println!("{}", result.to_json()?);
        }
        if result.success {
            Ok(())
        } else {
            Err(anyhow!("Task failed after {} attempt(s)", result.attempts))
        }
    } else {
        info!("Starting interactive mode");
        run_interactive(&mut assistant, cli.json).await
    }
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let level = if verbose { "debug" } else { "info" };
    let mut filter = EnvFilter::from_default_env();
    for target in [
        "mend",
        "mend_cli",
        "mend_core",
        "mend_config",
        "mend_execution",
        "mend_providers",
    ] {
        match format!("{}={}", target, level).parse() {
            Ok(directive) => filter = filter.add_directive(directive),
            Err(e) => eprintln!("Ignoring log directive for {}: {}", target, e),
        }
    }

    // stdout is reserved for program output (JSON results, listings)
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}

fn init_config(config: &Config) -> Result<()> {
    let path = Config::default_path()
        .ok_or_else(|| anyhow!("Could not determine the user configuration directory"))?;
    if path.exists() {
        return Err(anyhow!(
            "Configuration already exists at {}; not overwriting",
            path.display()
        ));
    }
    config
        .write_to(&path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Wrote configuration to {}", path.display());
    Ok(())
}

async fn run_demo(assistant: &mut SelfHealingAssistant<ConsoleUiWriter>, json: bool) -> Result<()> {
    let output = SimpleOutput::new();
    if !json {
        print_banner(assistant, &output);
    }

    let mut results = Vec::with_capacity(DEMO_TASKS.len());
    for task in DEMO_TASKS {
        results.push(assistant.solve(task).await);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        output.print("");
        output.print_markdown(&demo_summary(&results));
    }
    Ok(())
}

/// Markdown table of the demo outcomes.
fn demo_summary(results: &[TaskResult]) -> String {
    let mut summary = String::from("# Summary\n\n|Task|Language|Result|Attempts|\n|-|-|-|-|\n");
    for result in results {
        summary.push_str(&format!(
            "|{}|{}|{}|{}|\n",
            result.task,
            result.language.display_name(),
            if result.success { "✅ passed" } else { "❌ failed" },
            result.attempts
        ));
    }
    let solved = results.iter().filter(|r| r.success).count();
    summary.push_str(&format!("\n**{}/{}** tasks solved\n", solved, results.len()));
    summary
}

fn print_banner(assistant: &SelfHealingAssistant<ConsoleUiWriter>, output: &SimpleOutput) {
    let (provider, model) = assistant.provider_info();
    output.print("");
    output.print("🩹 mend: self-healing code generator");
    output.print(&format!(
        "🔧 {} | {} | up to {} attempts per task",
        provider,
        model,
        assistant.max_attempts()
    ));
}

async fn run_interactive(
    assistant: &mut SelfHealingAssistant<ConsoleUiWriter>,
    json: bool,
) -> Result<()> {
    let output = SimpleOutput::new();
    print_banner(assistant, &output);
    output.print("      >> describe a program, or 'quit' to exit");
    output.print("");

    let mut rl = DefaultEditor::new()?;
    let history_file = dirs::home_dir().map(|mut path| {
        path.push(".mend_history");
        path
    });
    if let Some(ref history_path) = history_file {
        let _ = rl.load_history(history_path);
    }

    loop {
        match rl.readline("mend> ") {
            Ok(line) => {
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                if is_exit_command(input) {
                    break;
                }
                rl.add_history_entry(input)?;

                let result = assistant.solve(input).await;
                if json {
                    println!("{}", result.to_json()?);
                }
            }
            Err(ReadlineError::Interrupted) => {
                output.print("CTRL-C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                output.print("CTRL-D");
                break;
            }
            Err(err) => {
                error!("Error: {:?}", err);
                break;
            }
        }
    }

    if let Some(ref history_path) = history_file {
        let _ = rl.save_history(history_path);
    }

    assistant.ui_writer().println("👋 Goodbye!");
    Ok(())
}

fn is_exit_command(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}
