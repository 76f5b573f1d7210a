//! CLI binary for autonotes.
//!
//! A thin shim over the library crate: maps flags to an agent catalog, a
//! model target and a `PipelineConfig`, renders progress, prints the result.

use anyhow::{bail, Context, Result};
use autonotes::progress::{NoopObserver, Observer};
use autonotes::{
    convert_file, write_markdown, AgentCatalog, CancelFlag, ModelProvider, ModelTarget,
    PipelineConfig, PipelineError, ProgressObserver, ProgressUpdate, RunOutcome, RunState,
    RunStatus, StageStatus,
};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress observer using indicatif ────────────────────────────────────

/// Renders overall percent as a bar and logs one line per finished stage.
struct CliObserver {
    bar: ProgressBar,
    stage_started: std::sync::Mutex<Option<Instant>>,
}

impl CliObserver {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(100);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}%  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);
        bar.set_style(style);
        bar.set_prefix("Extracting");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self {
            bar,
            stage_started: std::sync::Mutex::new(None),
        })
    }

    fn stage_elapsed(&self) -> String {
        let secs = self
            .stage_started
            .lock()
            .ok()
            .and_then(|s| *s)
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        format!("{secs:.1}s")
    }
}

impl ProgressObserver for CliObserver {
    fn on_run_start(&self, total_stages: usize) {
        self.bar.set_prefix("Running");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Running {total_stages} agents…"))
        ));
    }

    fn on_progress(&self, update: &ProgressUpdate) {
        if update.chunk_index.is_none() && update.overall_percent < 100 {
            // Stage boundary.
            if let Ok(mut started) = self.stage_started.lock() {
                *started = Some(Instant::now());
            }
        }
        self.bar.set_position(u64::from(update.overall_percent));
        self.bar.set_message(update.stage_message.clone());
    }

    fn on_state(&self, state: &RunState) {
        if state.status != RunStatus::Running {
            return;
        }
        if let Some(step) = state
            .steps
            .get(state.current_stage_index)
            .filter(|s| s.status == StageStatus::Success)
        {
            self.bar.println(format!(
                "  {} {:<24} {}",
                green("✓"),
                step.agent_name,
                dim(&self.stage_elapsed()),
            ));
        }
    }

    fn on_stage_error(&self, stage_index: usize, agent_name: &str, error: &str) {
        self.bar.println(format!(
            "  {} {} {:<24} {}",
            red("✗"),
            stage_index + 1,
            agent_name,
            red(error),
        ));
    }

    fn on_run_finish(&self, _state: &RunState) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Lecture transcript to notes (stdout)
  autonotes lecture.txt

  # Slides to a Markdown file, with the optional Synthesizer agent
  autonotes --with Synthesizer slides.pptx -o notes.md

  # OpenRouter model
  autonotes --provider openrouter --model openai/gpt-4o paper.pdf -o paper.md

  # Custom agent chain
  autonotes --dump-agents > agents.json      # edit, then:
  autonotes --agents agents.json report.docx

SUPPORTED INPUTS:
  .pdf .docx .pptx .xlsx .txt .md

ENVIRONMENT VARIABLES:
  AUTONOTES_API_KEY     API key for the selected provider
  AUTONOTES_PROVIDER    google (default) or openrouter
  AUTONOTES_MODEL       Model ID (default: gemini-2.5-flash)
  PDFIUM_LIB_PATH       Path to libpdfium for PDF input
  RUST_LOG              Log filter, e.g. autonotes=debug
"#;

/// Turn documents into structured Markdown notes with a chain of LLM agents.
#[derive(Parser, Debug)]
#[command(
    name = "autonotes",
    version,
    about = "Turn documents into structured Markdown notes with a chain of LLM agents",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Input document (.pdf, .docx, .pptx, .xlsx, .txt, .md).
    #[arg(required_unless_present_any = ["list_agents", "dump_agents"])]
    input: Option<PathBuf>,

    /// Write Markdown to this file instead of stdout.
    #[arg(short, long, env = "AUTONOTES_OUTPUT")]
    output: Option<PathBuf>,

    /// LLM provider: google or openrouter.
    #[arg(long, env = "AUTONOTES_PROVIDER", default_value = "google")]
    provider: ModelProvider,

    /// Model ID (e.g. gemini-2.5-flash, openai/gpt-4o).
    #[arg(long, env = "AUTONOTES_MODEL", default_value = "gemini-2.5-flash")]
    model: String,

    /// API key for the provider.
    #[arg(long, env = "AUTONOTES_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Agent catalog (JSON). Defaults to the built-in agents.
    #[arg(long, env = "AUTONOTES_AGENTS")]
    agents: Option<PathBuf>,

    /// Also run this optional agent (repeatable).
    #[arg(long = "with", value_name = "AGENT")]
    with: Vec<String>,

    /// Maximum chunk size in characters.
    #[arg(long, env = "AUTONOTES_CHUNK_SIZE", default_value_t = 15_000,
          value_parser = clap::value_parser!(u64).range(1..))]
    chunk_size: u64,

    /// Retries per chunk on transient model errors.
    #[arg(long, env = "AUTONOTES_MAX_RETRIES", default_value_t = 0)]
    max_retries: u32,

    /// Per model call timeout in seconds.
    #[arg(long, env = "AUTONOTES_TIMEOUT", default_value_t = 300)]
    timeout: u64,

    /// Print the agent chain and exit.
    #[arg(long)]
    list_agents: bool,

    /// Print the agent catalog as JSON and exit.
    #[arg(long)]
    dump_agents: bool,

    /// Disable progress bar.
    #[arg(long, env = "AUTONOTES_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "AUTONOTES_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "AUTONOTES_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs; verbose always wins.
    let show_progress = !cli.quiet && !cli.no_progress;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Agent catalog ────────────────────────────────────────────────────
    let mut catalog = match &cli.agents {
        Some(path) => AgentCatalog::load(path)
            .with_context(|| format!("Failed to load agents from {}", path.display()))?,
        None => AgentCatalog::builtin(),
    };
    for name in &cli.with {
        let id = match catalog.find_by_name(name) {
            Some(agent) => agent.id,
            None => bail!("Unknown agent '{name}' (see --list-agents)"),
        };
        catalog.promote(id);
    }

    if cli.dump_agents {
        let json = serde_json::to_string_pretty(&catalog).context("Failed to serialise agents")?;
        println!("{json}");
        return Ok(());
    }
    if cli.list_agents {
        print_agents(&catalog);
        return Ok(());
    }

    let Some(input) = cli.input.as_ref() else {
        bail!("No input document given");
    };

    // ── Build config ─────────────────────────────────────────────────────
    let config = PipelineConfig::builder()
        .max_chunk_size(usize::try_from(cli.chunk_size).context("Chunk size too large")?)
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.timeout)
        .build()?;
    let target = ModelTarget::new(
        cli.provider,
        cli.model.clone(),
        cli.api_key.clone().unwrap_or_default(),
    );
    debug!("{:?} {:?}", config, target);

    // ── Ctrl-C requests a cooperative stop; a second one exits ───────────
    let cancel = CancelFlag::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                if cancel.is_cancelled() {
                    eprintln!("\n{} aborted", red("✘"));
                    std::process::exit(130);
                }
                eprintln!(
                    "\n{} stopping after the current model call… (Ctrl-C again to abort)",
                    cyan("◆")
                );
                cancel.cancel();
            }
        });
    }

    // ── Run ──────────────────────────────────────────────────────────────
    let start = Instant::now();
    let bar_observer = show_progress.then(CliObserver::new);
    let observer: Observer = match &bar_observer {
        Some(bar) => Arc::clone(bar) as Observer,
        None => Arc::new(NoopObserver),
    };
    let outcome = match convert_file(
        input,
        &catalog.agents,
        &target,
        &config,
        &cancel,
        observer.as_ref(),
    )
    .await
    {
        Ok(outcome) => outcome,
        Err(error) => {
            // The run never started, so nothing else stops the spinner.
            if let Some(bar) = &bar_observer {
                bar.bar.finish_and_clear();
            }
            print_report(&error);
            return Err(error.into());
        }
    };

    match outcome {
        RunOutcome::Completed(state) => {
            let markdown = state.final_artifact.unwrap_or_default();
            if let Some(ref output_path) = cli.output {
                write_markdown(output_path, &markdown).await?;
                if !cli.quiet {
                    eprintln!(
                        "{}  {} agents  {:.1}s  →  {}",
                        green("✔"),
                        state.steps.len(),
                        start.elapsed().as_secs_f64(),
                        bold(&output_path.display().to_string()),
                    );
                }
            } else {
                let stdout = io::stdout();
                let mut handle = stdout.lock();
                handle
                    .write_all(markdown.as_bytes())
                    .context("Failed to write to stdout")?;
                if !markdown.ends_with('\n') {
                    handle.write_all(b"\n").ok();
                }
            }
            Ok(())
        }
        RunOutcome::Cancelled(state) => {
            if !cli.quiet {
                eprintln!(
                    "{} Cancelled during '{}'",
                    cyan("⚠"),
                    state
                        .steps
                        .get(state.current_stage_index)
                        .map_or("", |s| s.agent_name.as_str())
                );
            }
            std::process::exit(130);
        }
        RunOutcome::Failed(failure) => {
            print_report(&failure.error);
            Err(failure.error.into())
        }
    }
}

fn print_report(error: &PipelineError) {
    let report = error.report();
    eprintln!("{} {}", red("✘"), bold(&report.title));
    eprintln!("  {}", report.message);
    if let Some(details) = report.details {
        eprintln!("  {}", dim(&details));
    }
    if report.retryable {
        eprintln!("  {}", dim("This error may be transient; run the command again to retry."));
    }
}

fn print_agents(catalog: &AgentCatalog) {
    for (position, agent) in catalog.core_agents().iter().enumerate() {
        println!(
            "{:>2}. {:<24} {}  {}",
            position + 1,
            bold(&agent.name),
            dim(&format!("t={:.2}", agent.temperature)),
            agent.description
        );
    }
    let optional = catalog.optional_agents();
    if !optional.is_empty() {
        println!("{}", dim("optional (enable with --with <name>):"));
        for agent in optional {
            println!(
                "    {:<24} {}  {}",
                agent.name,
                dim(&format!("t={:.2}", agent.temperature)),
                agent.description
            );
        }
    }
}
