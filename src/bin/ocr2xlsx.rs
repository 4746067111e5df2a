//! CLI binary for edgequake-ocr2xlsx.
//!
//! A thin shim over the library crate that maps CLI flags to `BatchConfig`,
//! runs the batch and writes the resulting workbooks.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_ocr2xlsx::config::{DEFAULT_API_BASE_URL, DEFAULT_API_VERSION, DEFAULT_MODEL};
use edgequake_ocr2xlsx::export::{write_workbooks, WorkbookSelection, WriteReport};
use edgequake_ocr2xlsx::{
    collect_sources, BatchConfig, BatchOrchestrator, BatchProgressCallback, ProcessingOutcome,
    ProgressCallback, ProgressState,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
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

/// Shorten long messages to one terminal line.
fn clip(msg: &str, max: usize) -> String {
    if msg.chars().count() > max {
        let head: String = msg.chars().take(max - 1).collect();
        format!("{head}\u{2026}")
    } else {
        msg.to_string()
    }
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a bar anchored at the bottom of the terminal
/// with one log line per finished file above it.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Start of the file currently in flight.
    started: Mutex<Option<Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} files  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        bar.set_style(style);
        bar.set_prefix("Reading");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            started: Mutex::new(None),
            errors: AtomicUsize::new(0),
        })
    }

    fn elapsed_secs(&self) -> f64 {
        self.started
            .lock()
            .ok()
            .and_then(|mut s| s.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_files: usize) {
        self.bar.set_length(total_files as u64);
        self.bar.reset_eta();
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Extracting data from {total_files} files…"))
        ));
    }

    fn on_file_start(&self, state: &ProgressState) {
        if let Ok(mut s) = self.started.lock() {
            *s = Some(Instant::now());
        }
        self.bar.set_message(clip(&state.file_name, 40));
    }

    fn on_file_complete(&self, state: &ProgressState, outcome: &ProcessingOutcome) {
        let secs = dim(&format!("{:.1}s", self.elapsed_secs()));
        if outcome.is_success() {
            self.bar.println(format!(
                "  {} {:>3}/{:<3}  {}  {}  {}",
                green("✓"),
                state.current,
                state.total,
                state.file_name,
                dim(&outcome.describe()),
                secs,
            ));
        } else {
            self.errors.fetch_add(1, Ordering::SeqCst);
            self.bar.println(format!(
                "  {} {:>3}/{:<3}  {}  {}  {}",
                red("✗"),
                state.current,
                state.total,
                state.file_name,
                red(&clip(&outcome.describe(), 80)),
                secs,
            ));
        }
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total_files: usize, success_count: usize) {
        self.bar.finish_and_clear();
        let failed = self.errors.load(Ordering::SeqCst);
        if failed == 0 {
            eprintln!(
                "{} {} files extracted successfully",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {} succeeded of {}  ({} failed)",
                if success_count == 0 { red("✘") } else { cyan("⚠") },
                bold(&success_count.to_string()),
                total_files,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # One workbook per file, next to the current directory
  ocr2xlsx receipt.pdf scan.png

  # Every supported file in a folder, into ./out
  ocr2xlsx receipts/ -o out

  # Per-file workbooks plus one merged workbook (one sheet per file)
  ocr2xlsx receipts/ --merge

  # Only the merged workbook
  ocr2xlsx receipts/ --merge --no-individual

  # Machine-readable results on stdout
  ocr2xlsx --json --no-progress invoice.pdf > results.json

SUPPORTED INPUT:
  PDF, JPG/JPEG, PNG, GIF, WEBP, BMP, TIF/TIFF
  Folders are searched recursively; other files are skipped.

OUTPUT:
  <name>_OCR.xlsx      one sheet "OCR extracted data" per successful file
  all_ocr_data.xlsx    with --merge: one sheet per successful file

ENVIRONMENT VARIABLES:
  ANTHROPIC_API_KEY       API key sent as x-api-key
  OCR2XLSX_MODEL          Override model ID
  OCR2XLSX_BASE_URL       Messages API root (e.g. a local gateway)
  OCR2XLSX_OUTPUT_DIR     Where workbooks are written
  RUST_LOG                Log filter, overrides -v/-q (e.g. edgequake_ocr2xlsx=debug)
"#;

/// Extract tables from PDFs and images into Excel workbooks using a vision LLM.
#[derive(Parser, Debug)]
#[command(
    name = "ocr2xlsx",
    version,
    about = "Extract tables from PDFs and images into Excel workbooks using a vision LLM",
    long_about = "Send each PDF or image to the Anthropic Messages API, turn the extracted \
text and numbers into a table, and write it to an .xlsx workbook. Files are processed one at a \
time; a file that fails is reported and the rest of the batch continues.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Files or folders to process.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Directory for the generated workbooks.
    #[arg(short, long, env = "OCR2XLSX_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Also write all successful results into one workbook (all_ocr_data.xlsx).
    #[arg(long, env = "OCR2XLSX_MERGE")]
    merge: bool,

    /// Skip the per-file workbooks (requires --merge).
    #[arg(long, requires = "merge")]
    no_individual: bool,

    /// Model ID sent with each request.
    #[arg(long, env = "OCR2XLSX_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// Max output tokens per file.
    #[arg(long, env = "OCR2XLSX_MAX_TOKENS", default_value_t = 4000,
          value_parser = clap::value_parser!(u32).range(1..))]
    max_tokens: u32,

    /// API key. Not required when the base URL points at a gateway that adds it.
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Messages API root URL.
    #[arg(long, env = "OCR2XLSX_BASE_URL", default_value = DEFAULT_API_BASE_URL)]
    base_url: String,

    /// Value of the anthropic-version header.
    #[arg(long, env = "OCR2XLSX_API_VERSION", default_value = DEFAULT_API_VERSION)]
    api_version: String,

    /// Per-request timeout in seconds.
    #[arg(long, env = "OCR2XLSX_TIMEOUT", default_value_t = 120,
          value_parser = clap::value_parser!(u64).range(1..))]
    timeout: u64,

    /// Text file with a custom instruction ({file_kind} and {file_name} are substituted).
    #[arg(long, env = "OCR2XLSX_PROMPT_FILE")]
    prompt_file: Option<PathBuf>,

    /// Print the batch ledger as JSON on stdout.
    #[arg(long, env = "OCR2XLSX_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "OCR2XLSX_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "OCR2XLSX_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "OCR2XLSX_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar gives the per-file feedback, so library INFO logs are
    // hidden while it is shown.
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

    // ── Collect inputs ───────────────────────────────────────────────────
    let files = collect_sources(&cli.inputs).context("Failed to collect input files")?;

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn BatchProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb).await?;

    // ── Run batch ────────────────────────────────────────────────────────
    let mut batch =
        BatchOrchestrator::from_config(&config).context("Failed to set up OCR client")?;
    batch.submit(files).context("Failed to submit files")?;
    let ledger = batch.run().await.context("Batch failed")?;
    let summary = ledger.summary();

    // ── Write workbooks ──────────────────────────────────────────────────
    // A workbook that fails to write is reported below; the others are
    // still written.
    let report = if summary.succeeded > 0 {
        let selection = WorkbookSelection {
            individual: !cli.no_individual,
            merged: cli.merge,
        };
        write_workbooks(ledger, &cli.output_dir, selection).await
    } else {
        WriteReport::default()
    };
    let write_failures: Vec<serde_json::Value> = report
        .failed
        .iter()
        .map(|(name, e)| serde_json::json!({ "file_name": name, "error": e.to_string() }))
        .collect();

    // ── Report ───────────────────────────────────────────────────────────
    if cli.json {
        let json = serde_json::json!({
            "summary": summary,
            "outcomes": ledger,
            "written": report.written,
            "write_failures": write_failures,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&json).context("Failed to serialise results")?
        );
    } else if !cli.quiet {
        if !show_progress {
            // Without the bar nothing has listed the files yet.
            for outcome in ledger {
                if outcome.is_success() {
                    eprintln!("  {} {}  {}", green("✓"), outcome.file_name, dim(&outcome.describe()));
                } else {
                    eprintln!("  {} {}  {}", red("✗"), outcome.file_name, red(&outcome.describe()));
                }
            }
            eprintln!("{summary}");
        }
        for path in &report.written {
            eprintln!("   {} {}", dim("→"), bold(&path.display().to_string()));
        }
    }
    // Write failures are shown even with --quiet.
    if !cli.json {
        for (name, e) in &report.failed {
            eprintln!("   {} {}  {}", red("✗"), name, red(&clip(&e.to_string(), 80)));
        }
    }

    if summary.succeeded == 0 {
        anyhow::bail!("No file was processed successfully ({} failed)", summary.failed);
    }
    if !report.failed.is_empty() {
        anyhow::bail!("{} workbooks could not be written", report.failed.len());
    }
    Ok(())
}

/// Map CLI args to `BatchConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<BatchConfig> {
    let mut builder = BatchConfig::builder()
        .model(&cli.model)
        .max_tokens(cli.max_tokens)
        .api_base_url(&cli.base_url)
        .api_version(&cli.api_version)
        .request_timeout_secs(cli.timeout);

    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key);
    }
    if let Some(ref path) = cli.prompt_file {
        let template = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read instruction from {:?}", path))?;
        builder = builder.instruction(template);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
