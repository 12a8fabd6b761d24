//! CLI binary for url2vault.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ImportConfig`, runs single or batch imports, and prints results.

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use url2vault::{
    extract, import_batch, import_bytes, import_to_file, parse_url_input, save_note,
    BatchProgressCallback, BatchResult, ImportConfig, ImportContext, ImportOutcome, ImportedNote,
    PdfMode, ProgressCallback, UrlEntry,
};

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress for batch runs: one bar plus a log line per URL.
struct CliBatchProgress {
    bar: ProgressBar,
}

impl CliBatchProgress {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} urls  \
             ⏱ {elapsed_precise}  {wide_msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        bar.set_style(style);
        bar.set_prefix("Importing");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl BatchProgressCallback for CliBatchProgress {
    fn on_batch_start(&self, total: usize) {
        self.bar.set_length(total as u64);
    }

    fn on_item_start(&self, _index: usize, _total: usize, url: &str) {
        self.bar.set_message(url.to_string());
    }

    fn on_item_complete(&self, index: usize, total: usize, url: &str) {
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}",
            green("✓"),
            index + 1,
            total,
            dim(url)
        ));
        self.bar.inc(1);
    }

    fn on_item_error(&self, index: usize, total: usize, url: &str, error: &str) {
        // Only the first line of long, multi-line errors.
        let first = error.lines().next().unwrap_or_default();
        let msg: String = if first.chars().count() > 80 {
            format!("{}\u{2026}", first.chars().take(79).collect::<String>())
        } else {
            first.to_string()
        };
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}",
            red("✗"),
            index + 1,
            total,
            url,
            red(&msg)
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, _result: &BatchResult) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Import one article into the current directory
  url2vault https://example.com/article

  # Import into a vault folder with default tags
  url2vault https://example.com/article -o ~/vault/Inbox --tags "news, drones"

  # Batch import from a text or CSV file
  url2vault --batch urls.csv -o ~/vault/Inbox

  # Stop a batch at the first failure, no error report
  url2vault --batch urls.txt --stop-on-error --no-error-report

  # Site refuses the download: supply the saved file instead
  url2vault https://example.com/paper.pdf --file ~/Downloads/paper.pdf

  # Send PDFs to the model as files instead of extracted text
  url2vault --pdf-mode vision --model gpt-4.1 https://example.com/report.pdf

  # Local OpenAI-compatible server
  url2vault --base-url http://localhost:11434/v1 --model llama3.1 https://example.com/a

  # Show what would be sent to the model (no API key needed)
  url2vault --extract-only https://example.com/article

BATCH INPUT:
  Either one URL per line (blank lines ignored), or CSV with a header row
  whose columns include url/link/href/source/uri/address and optionally
  label/title/name/description. Rows that are not valid http(s) URLs are
  reported and skipped.

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium (otherwise the system library is used)
  URL2VAULT_*             Any flag, e.g. URL2VAULT_OUTPUT_DIR, URL2VAULT_TAGS

  Variables are also read from a .env file in the working directory.
"#;

/// Import web articles and PDFs as structured Markdown notes using LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "url2vault",
    version,
    about = "Import web articles and PDFs as structured Markdown notes using LLMs",
    long_about = "Fetch a web article or PDF, extract its text and metadata, and have an LLM \
write an Obsidian note with validated YAML frontmatter. Supports OpenAI, Anthropic, Google \
Gemini, Ollama, and any OpenAI-compatible endpoint.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Article or PDF URL to import.
    #[arg(required_unless_present = "batch", conflicts_with = "batch")]
    url: Option<String>,

    /// File with URLs (one per line, or CSV with a header row).
    #[arg(short, long, env = "URL2VAULT_BATCH")]
    batch: Option<PathBuf>,

    /// Local copy of the document, used when the site blocks the download.
    #[arg(short, long, conflicts_with = "batch")]
    file: Option<PathBuf>,

    /// Directory notes and error reports are written to.
    #[arg(short, long, env = "URL2VAULT_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// LLM provider: openai, anthropic, gemini, ollama, openai-compatible.
    #[arg(long, env = "URL2VAULT_PROVIDER")]
    provider: Option<String>,

    /// LLM model ID (e.g. gpt-4.1-mini, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "URL2VAULT_MODEL")]
    model: Option<String>,

    /// Base URL of an OpenAI-compatible endpoint.
    #[arg(long, env = "URL2VAULT_BASE_URL")]
    base_url: Option<String>,

    /// API key for the OpenAI-compatible endpoint (falls back to OPENAI_API_KEY).
    #[arg(long, env = "URL2VAULT_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Comma-separated tags suggested for every note.
    #[arg(short, long, env = "URL2VAULT_TAGS", default_value = "")]
    tags: String,

    /// Maximum characters of extracted text sent to the model.
    #[arg(long, env = "URL2VAULT_MAX_CHARS", default_value_t = 40_000)]
    max_chars: usize,

    /// Retries for rate-limited or failed model calls.
    #[arg(long, env = "URL2VAULT_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Initial retry delay in milliseconds (doubles each attempt).
    #[arg(long, env = "URL2VAULT_RETRY_BACKOFF_MS", default_value_t = 500)]
    retry_backoff_ms: u64,

    /// Pause between batch items in milliseconds.
    #[arg(long, env = "URL2VAULT_BATCH_DELAY_MS", default_value_t = 1500)]
    batch_delay_ms: u64,

    /// Stop a batch at the first failed URL.
    #[arg(long, env = "URL2VAULT_STOP_ON_ERROR")]
    stop_on_error: bool,

    /// Do not write an error report after a batch with failures.
    #[arg(long, env = "URL2VAULT_NO_ERROR_REPORT")]
    no_error_report: bool,

    /// Read at most this many PDF pages.
    #[arg(long, env = "URL2VAULT_PDF_MAX_PAGES")]
    pdf_max_pages: Option<usize>,

    /// How PDFs reach the model: extracted text, or the file itself.
    #[arg(long, env = "URL2VAULT_PDF_MODE", value_enum, default_value = "text")]
    pdf_mode: PdfModeArg,

    /// Path to a text file with a custom note template.
    #[arg(long, env = "URL2VAULT_TEMPLATE")]
    template: Option<PathBuf>,

    /// LLM temperature (0.0 to 2.0).
    #[arg(long, env = "URL2VAULT_TEMPERATURE")]
    temperature: Option<f32>,

    /// Print the extracted content as JSON and exit without calling a model.
    #[arg(long)]
    extract_only: bool,

    /// Disable progress bar.
    #[arg(long, env = "URL2VAULT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "URL2VAULT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "URL2VAULT_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum PdfModeArg {
    Text,
    Vision,
}

impl From<PdfModeArg> for PdfMode {
    fn from(v: PdfModeArg) -> Self {
        match v {
            PdfModeArg::Text => PdfMode::TextExtraction,
            PdfModeArg::Vision => PdfMode::NativeVision,
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Existing variables win over .env entries.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The batch progress bar already reports each URL; keep library logs to
    // errors while it is on screen.
    let show_progress = cli.batch.is_some() && !cli.quiet && !cli.no_progress;
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

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliBatchProgress::new() as Arc<dyn BatchProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb).await?;
    let ctx = ImportContext::new(&config).context("Failed to set up HTTP client")?;

    if let Some(ref path) = cli.batch {
        return run_batch_file(&cli, &ctx, &config, path).await;
    }

    let raw_url = cli
        .url
        .as_deref()
        .context("A URL or --batch FILE is required")?;
    let entry = UrlEntry::parse(raw_url).map_err(|reason| anyhow!("{reason}"))?;
    let url = entry.url.as_str();

    // ── Extract-only mode ────────────────────────────────────────────────
    if cli.extract_only {
        let content = extract(&ctx, url, &config)
            .await
            .context("Extraction failed")?;
        println!(
            "{}",
            serde_json::to_string_pretty(&content).context("Failed to serialise content")?
        );
        return Ok(ExitCode::SUCCESS);
    }

    // ── Single import ────────────────────────────────────────────────────
    if let Some(ref path) = cli.file {
        let note = import_local_file(&ctx, url, path, &config).await?;
        report_note(&cli, &note);
        return Ok(ExitCode::SUCCESS);
    }

    match import_to_file(&ctx, url, &config)
        .await
        .context("Import failed")?
    {
        ImportOutcome::Imported(note) => report_note(&cli, &note),
        ImportOutcome::Blocked(blocked) => {
            eprintln!(
                "{} {}",
                yellow("⚠"),
                bold(&format!("The site blocked the download of {}", blocked.url))
            );
            eprintln!("   {}", dim(&blocked.reason));

            let Some(path) = ask_for_local_copy()? else {
                bail!(
                    "Download blocked. Save the document in a browser and re-run with --file PATH"
                );
            };
            let note = import_local_file(&ctx, url, &path, &config).await?;
            report_note(&cli, &note);
        }
    }

    Ok(ExitCode::SUCCESS)
}

async fn run_batch_file(
    cli: &Cli,
    ctx: &ImportContext,
    config: &ImportConfig,
    path: &Path,
) -> Result<ExitCode> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read URL list from {}", path.display()))?;
    let parsed = parse_url_input(&text);

    for err in &parsed.errors {
        eprintln!("{} skipped {}", yellow("⚠"), err);
    }
    if parsed.entries.is_empty() {
        bail!("No valid URLs found in {}", path.display());
    }

    let result = import_batch(ctx, &parsed.entries, config).await;

    if !cli.quiet {
        let mark = if result.failed_count == 0 {
            green("✔")
        } else if result.success_count == 0 {
            red("✘")
        } else {
            yellow("⚠")
        };
        eprintln!(
            "{} {}/{} imported  ({} failed)",
            mark,
            bold(&result.success_count.to_string()),
            result.total,
            result.failed_count
        );
        if result.stopped_early() {
            eprintln!(
                "   stopped early, {} not attempted",
                result.total - result.attempted()
            );
        }
        if let Some(ref report) = result.report_path {
            eprintln!("   error report: {}", bold(&report.display().to_string()));
        }
    }

    if batch_failed(&result) {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn batch_failed(result: &BatchResult) -> bool {
    result.failed_count > 0
}

/// Import a document the user saved themselves and write the note.
async fn import_local_file(
    ctx: &ImportContext,
    url: &str,
    path: &Path,
    config: &ImportConfig,
) -> Result<ImportedNote> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let filename = path.file_name().map(|n| n.to_string_lossy().into_owned());

    let note = import_bytes(ctx, url, bytes, filename.as_deref(), config)
        .await
        .context("Import from local file failed")?;
    save_note(note, config)
        .await
        .context("Failed to write note")
}

/// Ask for a local file path on an interactive terminal; None otherwise.
fn ask_for_local_copy() -> Result<Option<PathBuf>> {
    if !io::stdin().is_terminal() {
        return Ok(None);
    }

    eprint!("Path to a saved copy (empty to cancel): ");
    io::stderr().flush().ok();

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;

    let trimmed = line.trim().trim_matches(|c| c == '"' || c == '\'');
    Ok((!trimmed.is_empty()).then(|| PathBuf::from(trimmed)))
}

fn report_note(cli: &Cli, note: &ImportedNote) {
    if cli.quiet {
        return;
    }
    let path = note
        .path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    eprintln!("{} {}  →  {}", green("✔"), note.title, bold(&path));
}

/// Map CLI args to `ImportConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ImportConfig> {
    let template = if let Some(ref path) = cli.template {
        Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read template from {:?}", path))?,
        )
    } else {
        None
    };

    let mut builder = ImportConfig::builder()
        .output_dir(cli.output_dir.clone())
        .default_tags(cli.tags.clone())
        .max_chars(cli.max_chars)
        .max_retries(cli.max_retries)
        .retry_backoff_ms(cli.retry_backoff_ms)
        .batch_delay_ms(cli.batch_delay_ms)
        .continue_on_error(!cli.stop_on_error)
        .write_error_report(!cli.no_error_report)
        .pdf_mode(cli.pdf_mode.clone().into());

    if let Some(ref name) = cli.provider {
        builder = builder.provider_name(name.clone());
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref base_url) = cli.base_url {
        builder = builder.base_url(base_url.clone());
    }
    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key.clone());
    }
    if let Some(pages) = cli.pdf_max_pages {
        builder = builder.pdf_max_pages(pages);
    }
    if let Some(template) = template {
        builder = builder.template(template);
    }
    if let Some(t) = cli.temperature {
        builder = builder.temperature(t);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_with_failures_exits_non_zero() {
        let clean = BatchResult {
            total: 2,
            success_count: 2,
            ..BatchResult::default()
        };
        let failed = BatchResult {
            failed_count: 1,
            ..clean.clone()
        };
        assert!(!batch_failed(&clean));
        assert!(batch_failed(&failed));
    }

    #[test]
    fn url_and_batch_are_exclusive() {
        assert!(Cli::try_parse_from(["url2vault", "https://a.com", "--batch", "l.txt"]).is_err());
        let cli = Cli::try_parse_from(["url2vault", "--batch", "l.txt", "--stop-on-error"]).unwrap();
        assert!(cli.url.is_none());
        assert!(cli.stop_on_error);
    }

    #[test]
    fn single_url_is_normalised_before_import() {
        let entry = UrlEntry::parse("example.com/article").unwrap();
        assert_eq!(entry.url, "https://example.com/article");
        assert!(UrlEntry::parse("ftp://example.com/file").is_err());
    }
}
