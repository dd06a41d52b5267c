//! CLI binary for challan-reader.
//!
//! A thin shim over the library crate: `extract` runs the pipeline locally,
//! `serve` runs the HTTP endpoint, `batch` uploads files to a running
//! endpoint and writes the collected records as CSV.

use anyhow::{Context, Result};
use challan_reader::server;
use challan_reader::{
    build_table, default_output_name, write_csv_file, BatchClient, ExtractionConfig,
    ExtractionProgressCallback, Extractor, PageSelection, ProgressCallback, SuccessEnvelope,
};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress bar plus one log line per page.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Start of the page currently in flight.
    page_start: Mutex<Option<Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until `on_extraction_start` reports the page count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Rendering");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            page_start: Mutex::new(None),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Extracting");
        self.bar.reset_eta();
    }

    fn page_elapsed_secs(&self) -> f64 {
        self.page_start
            .lock()
            .ok()
            .and_then(|mut s| s.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_extraction_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Extracting {total_pages} pages…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        if let Ok(mut s) = self.page_start.lock() {
            *s = Some(Instant::now());
        }
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, reply_len: usize) {
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<8}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{reply_len:>5} chars")),
            dim(&format!("{:.1}s", self.page_elapsed_secs())),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg: String = if error.chars().count() > 80 {
            error.chars().take(79).chain(['…']).collect()
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg),
            dim(&format!("{:.1}s", self.page_elapsed_secs())),
        ));
        self.bar.inc(1);
    }

    fn on_extraction_complete(&self, total_pages: usize, replied: usize) {
        let failed = total_pages.saturating_sub(replied);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!("{} {} pages read", green("✔"), bold(&replied.to_string()));
        } else {
            eprintln!(
                "{} {}/{} pages read  ({} failed)",
                if failed == total_pages {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&replied.to_string()),
                total_pages,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract records from one challan (stdout)
  challan extract challan.pdf

  # Full per-page report
  challan extract --report challan.pdf > report.json

  # Only the first two pages
  challan extract --pages 1-2 challan.pdf

  # Run the HTTP endpoint
  challan serve --addr 0.0.0.0:5000

  # Upload a folder of challans to the endpoint and write a CSV
  challan batch scans/*.pdf --endpoint http://127.0.0.1:5000/extract

ENVIRONMENT VARIABLES:
  GOOGLE_API_KEY         Gemini API key (required for the default model)
  CHALLAN_MODEL          Override the model ID
  CHALLAN_PROVIDER       Use an edgequake-llm provider instead of Gemini
  CHALLAN_PDFIUM_LIB     Directory containing libpdfium
  CHALLAN_ADDR           Listen address for `serve`
  CHALLAN_ENDPOINT       Extract URL for `batch`
  RUST_LOG               Log filter (overrides -v / -q)
"#;

/// Extract shipment records from delivery-challan PDFs.
#[derive(Parser, Debug)]
#[command(
    name = "challan",
    version,
    about = "Extract shipment records from delivery-challan PDFs using a vision model",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "CHALLAN_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "CHALLAN_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the pipeline on a local PDF and print the records.
    Extract(ExtractArgs),
    /// Serve the `/extract` HTTP endpoint.
    Serve(ServeArgs),
    /// Upload PDFs to a running endpoint and write the records as CSV.
    Batch(BatchArgs),
}

/// Options shared by `extract` and `serve`.
#[derive(Args, Debug)]
struct PipelineArgs {
    /// Model ID.
    #[arg(long, env = "CHALLAN_MODEL")]
    model: Option<String>,

    /// edgequake-llm provider (openai, anthropic, ollama, ...). Default: native Gemini.
    #[arg(long, env = "CHALLAN_PROVIDER")]
    provider: Option<String>,

    /// Rendering DPI (72–600).
    #[arg(long, env = "CHALLAN_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// Directory containing the pdfium shared library.
    #[arg(long, env = "CHALLAN_PDFIUM_LIB")]
    pdfium_lib: Option<PathBuf>,

    /// Per-page model call timeout in seconds.
    #[arg(long, env = "CHALLAN_API_TIMEOUT")]
    api_timeout: Option<u64>,
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// Local PDF file.
    input: PathBuf,

    #[command(flatten)]
    pipeline: PipelineArgs,

    /// Page selection: all, 5, 3-15, or 1,3,5,7.
    #[arg(long, env = "CHALLAN_PAGES", default_value = "all")]
    pages: String,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "CHALLAN_PASSWORD")]
    password: Option<String>,

    /// Print compact JSON instead of pretty-printed.
    #[arg(long)]
    json: bool,

    /// Print the full report (records, per-page dispositions, stats).
    #[arg(long)]
    report: bool,

    /// Disable progress bar.
    #[arg(long, env = "CHALLAN_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Listen address.
    #[arg(long, env = "CHALLAN_ADDR", default_value = "127.0.0.1:5000")]
    addr: SocketAddr,

    #[command(flatten)]
    pipeline: PipelineArgs,
}

#[derive(Args, Debug)]
struct BatchArgs {
    /// PDF files to upload, in order.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Full URL of the extract route.
    #[arg(long, env = "CHALLAN_ENDPOINT", default_value = "http://127.0.0.1:5000/extract")]
    endpoint: String,

    /// CSV output path. Default: challan_output_YYYYMMDD_HHMMSS.csv
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs for `extract`.
    let show_progress = match &cli.command {
        Command::Extract(a) => !cli.quiet && !a.no_progress,
        _ => false,
    };
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

    match cli.command {
        Command::Extract(args) => run_extract(args, show_progress, cli.quiet).await,
        Command::Serve(args) => run_serve(args).await,
        Command::Batch(args) => run_batch(args, cli.quiet).await,
    }
}

async fn run_extract(args: ExtractArgs, show_progress: bool, quiet: bool) -> Result<()> {
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new_dynamic() as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };

    let pages: PageSelection = args.pages.parse().context("Invalid --pages")?;
    let mut builder = ExtractionConfig::builder().pages(pages);
    if let Some(pwd) = args.password.as_deref() {
        builder = builder.password(pwd);
    }
    if let Some(cb) = progress_cb {
        builder = builder.progress_callback(cb);
    }
    let config = apply_pipeline_args(builder, &args.pipeline)
        .build()
        .context("Invalid configuration")?;

    let extractor = Extractor::new(config).context("Failed to set up the vision model")?;
    let output = extractor
        .extract(&args.input)
        .await
        .with_context(|| format!("Extraction failed for {}", args.input.display()))?;

    let json = if args.report {
        to_json(&output, args.json)?
    } else {
        to_json(&SuccessEnvelope::new(output.records.clone()), args.json)?
    };
    println!("{json}");

    if !quiet {
        eprintln!(
            "{} records from {}/{} pages in {}ms",
            bold(&output.stats.total_records.to_string()),
            output.stats.extracted_pages,
            output.stats.processed_pages,
            output.stats.total_duration_ms,
        );
        if output.stats.failed_pages > 0 {
            eprintln!("  {} pages failed", red(&output.stats.failed_pages.to_string()));
        }
    }
    Ok(())
}

async fn run_serve(args: ServeArgs) -> Result<()> {
    let config = apply_pipeline_args(ExtractionConfig::builder(), &args.pipeline)
        .build()
        .context("Invalid configuration")?;
    let extractor = Extractor::new(config).context("Failed to set up the vision model")?;
    server::serve(args.addr, Arc::new(extractor))
        .await
        .with_context(|| format!("Server on {} failed", args.addr))
}

async fn run_batch(args: BatchArgs, quiet: bool) -> Result<()> {
    let client = BatchClient::new(&args.endpoint);
    let result = client.extract_files(&args.inputs).await;

    for (name, err) in &result.failures {
        eprintln!("{} {}: {}", red("✗"), name, err);
    }
    if result.records.is_empty() {
        tracing::warn!("No data extracted");
        return Ok(());
    }

    let output = args
        .output
        .unwrap_or_else(|| PathBuf::from(default_output_name(&chrono::Local::now())));
    let table = build_table(&result.records);
    write_csv_file(&table, &output)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    if !quiet {
        eprintln!(
            "{} {} rows from {}/{} files  →  {}",
            if result.failures.is_empty() {
                green("✔")
            } else {
                cyan("⚠")
            },
            table.rows.len(),
            args.inputs.len() - result.failures.len(),
            args.inputs.len(),
            bold(&output.display().to_string()),
        );
    }
    Ok(())
}

/// Map the shared pipeline flags onto the builder. The API key comes from
/// `GOOGLE_API_KEY`.
fn apply_pipeline_args(
    builder: challan_reader::ExtractionConfigBuilder,
    args: &PipelineArgs,
) -> challan_reader::ExtractionConfigBuilder {
    let mut builder = builder.dpi(args.dpi).api_key_from_env();
    if let Some(ref model) = args.model {
        builder = builder.model_name(model);
    }
    if let Some(ref provider) = args.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref dir) = args.pdfium_lib {
        builder = builder.pdfium_lib_path(dir);
    }
    if let Some(secs) = args.api_timeout {
        builder = builder.api_timeout_secs(secs);
    }
    builder
}

fn to_json<T: serde::Serialize>(value: &T, compact: bool) -> Result<String> {
    if compact {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    }
    .context("Failed to serialise output")
}
