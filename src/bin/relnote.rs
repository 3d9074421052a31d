//! CLI binary for relnote-synth.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `SynthesisConfig` and prints the document.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use relnote_synth::preview::to_markdown;
use relnote_synth::{
    synthesize, write_output, Category, ImageSource, ProgressCallback, SynthesisConfig,
    SynthesisProgressCallback, SynthesisRequest,
};
use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar for the whole synthesis and one log
/// line per category. Categories may complete out of order when
/// `--concurrency` is above 1.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<Category, Instant>>,
}

impl CliProgressCallback {
    /// Spinner only until `on_synthesis_start` tells us the category count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Classifying…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>2}/{len} categories  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Writing");
    }

    fn elapsed_secs(&self, category: Category) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut times| times.remove(&category))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl SynthesisProgressCallback for CliProgressCallback {
    fn on_synthesis_start(&self, total_categories: usize) {
        self.activate_bar(total_categories);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Rewriting {total_categories} categories…"))
        ));
    }

    fn on_category_start(&self, category: Category) {
        if let Ok(mut times) = self.start_times.lock() {
            times.insert(category, Instant::now());
        }
        self.bar.set_message(category.tag().to_string());
    }

    fn on_category_complete(&self, category: Category, lines: usize, fell_back: bool) {
        let elapsed = self.elapsed_secs(category);
        let (mark, note) = if fell_back {
            (yellow("⚠"), yellow("fallback"))
        } else {
            (green("✓"), String::new())
        };
        self.bar.println(format!(
            "  {} {:<12} {}  {}  {}",
            mark,
            category.tag(),
            dim(&format!("{lines:>3} lines")),
            dim(&format!("{elapsed:.1}s")),
            note,
        ));
        self.bar.inc(1);
    }

    fn on_synthesis_complete(&self, total_categories: usize, fallbacks: usize) {
        self.bar.finish_and_clear();
        if fallbacks == 0 {
            eprintln!(
                "{} {} categories rewritten",
                green("✔"),
                bold(&total_categories.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} categories rewritten  ({} used fallback text)",
                yellow("⚠"),
                bold(&(total_categories - fallbacks).to_string()),
                total_categories,
                yellow(&fallbacks.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Markdown preview on stdout
  relnote changes.txt --title "Release 2.4"

  # Description from stdin, JSON document to a file
  git log --format=%s v2.3..v2.4 | relnote - --title "Release 2.4" -o release.json

  # Logo, figures and an explicit release date
  relnote changes.txt --title "Release 2.4" --logo logo.png \
      --image dashboard.png --image https://example.com/export.png --date 2026-03-07

INPUT FORMAT:
  One change per line. A leading [tag] forces the category, e.g.
    [feature] Exportação em CSV
    [bug] Login travava no Safari
  Untagged lines are classified by keywords. Blank lines are ignored.

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  MAX_RETRIES             Attempts per category (default 3)
  RETRY_DELAY             Delay between attempts in ms (default 2000)
  GENERATION_TIMEOUT      Per-attempt timeout in ms (default 30000)
  CAPTION_TIMEOUT         Per-attempt caption timeout in ms (default 10000)
  MAX_DESCRIPTION_LENGTH  Description cut-off in characters (default 5000)
  MAX_IMAGES              Figures used per document (default 5)
  DOCUMENT_VERSION        Version shown in the metadata table (default 1.0.0)
"#;

/// Turn change descriptions into categorized release-notes documents.
#[derive(Parser, Debug)]
#[command(
    name = "relnote",
    version,
    about = "Turn change descriptions into categorized release-notes documents",
    long_about = "Classify each line of a change description, rewrite every category with an \
LLM (OpenAI, Anthropic, Google Gemini, Ollama or any OpenAI-compatible endpoint) and assemble \
a release-notes document. Provider failures never abort the document: a category whose calls \
all fail keeps its original text.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Description file, or `-` to read stdin.
    input: String,

    /// Release title.
    #[arg(short, long, env = "RELNOTE_TITLE")]
    title: String,

    /// Author shown in the metadata table.
    #[arg(short, long, env = "RELNOTE_AUTHOR")]
    author: Option<String>,

    /// Release date (YYYY-MM-DD). Default: today.
    #[arg(long, value_parser = parse_date)]
    date: Option<NaiveDate>,

    /// Header logo: path, URL or data URI.
    #[arg(long, env = "RELNOTE_LOGO")]
    logo: Option<String>,

    /// Figure image: path, URL or data URI. Repeatable.
    #[arg(long = "image", value_name = "IMAGE")]
    images: Vec<String>,

    /// Write the document as JSON to this file instead of printing it.
    #[arg(short, long, env = "RELNOTE_OUTPUT")]
    output: Option<PathBuf>,

    /// LLM model ID (e.g. gpt-4.1-nano, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Attempts per category (overrides MAX_RETRIES).
    #[arg(long)]
    max_retries: Option<u32>,

    /// Delay between attempts in milliseconds (overrides RETRY_DELAY).
    #[arg(long)]
    retry_delay: Option<u64>,

    /// Per-attempt timeout in milliseconds (overrides GENERATION_TIMEOUT).
    #[arg(long)]
    timeout: Option<u64>,

    /// Categories rewritten at once.
    #[arg(short, long, env = "RELNOTE_CONCURRENCY")]
    concurrency: Option<usize>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "RELNOTE_TEMPERATURE")]
    temperature: Option<f32>,

    /// Version shown in the metadata table (overrides DOCUMENT_VERSION).
    #[arg(long = "version-string", value_name = "VERSION")]
    version_string: Option<String>,

    /// Print the full output (document, content stream, stats) as JSON.
    #[arg(long, env = "RELNOTE_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "RELNOTE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "RELNOTE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "RELNOTE_QUIET")]
    quiet: bool,
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| format!("expected YYYY-MM-DD: {e}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs unless --verbose is set.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    // ── Read description ─────────────────────────────────────────────────
    let description = read_description(&cli.input).await?;

    // ── Build config + request ───────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn SynthesisProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;
    let request = build_request(&cli, description);

    // ── Run synthesis ────────────────────────────────────────────────────
    let output = synthesize(&request, &config)
        .await
        .context("Synthesis failed")?;

    if let Some(ref output_path) = cli.output {
        write_output(&output, output_path)
            .await
            .context("Failed to write output")?;
        if !cli.quiet {
            eprintln!(
                "{}  {} sections  {} figures  {}ms  →  {}",
                if output.stats.fallbacks == 0 {
                    green("✔")
                } else {
                    yellow("⚠")
                },
                output.document.sections.len(),
                output.stats.figures,
                output.stats.total_duration_ms,
                bold(&output_path.display().to_string()),
            );
        }
    } else if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else {
        let markdown = to_markdown(&output.document);
        io::stdout()
            .lock()
            .write_all(markdown.as_bytes())
            .context("Failed to write to stdout")?;

        if !cli.quiet && !show_progress {
            eprintln!(
                "Synthesised {} categories ({} fallback) in {}ms",
                output.stats.categories, output.stats.fallbacks, output.stats.total_duration_ms
            );
        }
    }

    if output.stats.truncated_description && !cli.quiet {
        eprintln!(
            "{} description was longer than {} characters and was truncated",
            yellow("⚠"),
            config.max_description_length
        );
    }

    Ok(())
}

async fn read_description(input: &str) -> Result<String> {
    if input == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read description from stdin")?;
        Ok(buf)
    } else {
        tokio::fs::read_to_string(input)
            .await
            .with_context(|| format!("Failed to read description from {:?}", input))
    }
}

/// Environment first, then CLI flags on top.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<SynthesisConfig> {
    let mut builder = SynthesisConfig::from_env()
        .context("Invalid environment configuration")?
        .to_builder();

    if let Some(n) = cli.max_retries {
        builder = builder.max_retries(n);
    }
    if let Some(ms) = cli.retry_delay {
        builder = builder.retry_delay_ms(ms);
    }
    if let Some(ms) = cli.timeout {
        builder = builder.generation_timeout_ms(ms);
    }
    if let Some(n) = cli.concurrency {
        builder = builder.concurrency(n);
    }
    if let Some(t) = cli.temperature {
        builder = builder.temperature(t);
    }
    if let Some(ref v) = cli.version_string {
        builder = builder.document_version(v.clone());
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn build_request(cli: &Cli, description: String) -> SynthesisRequest {
    let mut request = SynthesisRequest::new(cli.title.clone(), description);
    request.author = cli.author.clone();
    request.date = cli.date;
    request.logo = cli.logo.as_deref().map(ImageSource::parse);
    request.images = cli.images.iter().map(|s| ImageSource::parse(s)).collect();
    request
}
