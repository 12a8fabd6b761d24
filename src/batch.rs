//! Batch orchestration: import a URL list one entry at a time.
//!
//! Entries run strictly in input order with `batch_delay_ms` between
//! consecutive items (never after the last). A failure is recorded and,
//! unless `continue_on_error` is off, the run moves on. After the loop an
//! error report is written when enabled and anything failed.

use crate::config::ImportConfig;
use crate::error::ImportError;
use crate::import::{import_and_save, ImportContext};
use crate::output::{BatchError, BatchResult};
use crate::pipeline::writer;
use crate::urls::UrlEntry;
use chrono::{DateTime, Local};
use std::fmt::{Display, Write as _};
use std::future::Future;
use std::time::Duration;
use tracing::{error, info, warn};

/// File-name prefix of error reports.
pub const REPORT_PREFIX: &str = "import-errors";

/// Import and save every entry with the full single-item pipeline.
pub async fn import_batch(
    ctx: &ImportContext,
    entries: &[UrlEntry],
    config: &ImportConfig,
) -> BatchResult {
    run_batch(entries, config, move |entry| async move {
        import_and_save(ctx, &entry.url, config).await.map(|_| ())
    })
    .await
}

/// Run `item_fn` over `entries` sequentially and account for the results.
pub async fn run_batch<F, Fut, T, E>(entries: &[UrlEntry], config: &ImportConfig, item_fn: F) -> BatchResult
where
    F: FnMut(UrlEntry) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    run_batch_with_sleep(entries, config, tokio::time::sleep, item_fn).await
}

/// [`run_batch`] with an injectable sleeper for the inter-item delay.
pub async fn run_batch_with_sleep<F, Fut, T, E, S, SFut>(
    entries: &[UrlEntry],
    config: &ImportConfig,
    mut sleep: S,
    mut item_fn: F,
) -> BatchResult
where
    F: FnMut(UrlEntry) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
    S: FnMut(Duration) -> SFut,
    SFut: Future<Output = ()>,
{
    let total = entries.len();
    let progress = config.progress_callback.as_deref();
    let delay = Duration::from_millis(config.batch_delay_ms);
    let mut result = BatchResult {
        total,
        ..BatchResult::default()
    };

    if let Some(cb) = progress {
        cb.on_batch_start(total);
    }
    info!(total, "batch started");

    for (index, entry) in entries.iter().enumerate() {
        if index > 0 && !delay.is_zero() {
            sleep(delay).await;
        }

        let url = entry.url.clone();
        info!("[{}/{}] {}", index + 1, total, url);
        if let Some(cb) = progress {
            cb.on_item_start(index, total, &url);
        }

        match item_fn(entry.clone()).await {
            Ok(_) => {
                result.success_count += 1;
                if let Some(cb) = progress {
                    cb.on_item_complete(index, total, &url);
                }
            }
            Err(e) => {
                let message = e.to_string();
                warn!(%url, error = %message, "batch item failed");
                result.failed_count += 1;
                if let Some(cb) = progress {
                    cb.on_item_error(index, total, &url, &message);
                }
                result.errors.push(BatchError { url, message });

                if !config.continue_on_error {
                    warn!(
                        remaining = total - index - 1,
                        "stopping batch after failure (continue_on_error is off)"
                    );
                    break;
                }
            }
        }
    }

    if config.write_error_report && !result.errors.is_empty() {
        match write_error_report(&result, config, Local::now()).await {
            Ok(path) => result.report_path = Some(path),
            Err(e) => error!(error = %e, "could not write batch error report"),
        }
    }

    info!(
        succeeded = result.success_count,
        failed = result.failed_count,
        skipped = total - result.attempted(),
        "batch finished"
    );
    if let Some(cb) = progress {
        cb.on_batch_complete(&result);
    }
    result
}

/// Render the Markdown error report for `result`.
pub fn render_error_report(result: &BatchResult, generated: DateTime<Local>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Import error report\n");
    let _ = writeln!(out, "- Generated: {}", generated.format("%Y-%m-%d %H:%M:%S"));
    let _ = writeln!(out, "- Total: {}", result.total);
    let _ = writeln!(out, "- Succeeded: {}", result.success_count);
    let _ = writeln!(out, "- Failed: {}", result.failed_count);
    if result.stopped_early() {
        let _ = writeln!(out, "- Not attempted: {}", result.total - result.attempted());
    }
    let _ = writeln!(out, "\n## Failures\n");
    for (i, err) in result.errors.iter().enumerate() {
        let message = err.message.split_whitespace().collect::<Vec<_>>().join(" ");
        let _ = writeln!(out, "{}. <{}>", i + 1, err.url);
        let _ = writeln!(out, "   - Error: {message}");
    }
    out
}

async fn write_error_report(
    result: &BatchResult,
    config: &ImportConfig,
    now: DateTime<Local>,
) -> Result<std::path::PathBuf, ImportError> {
    let stem = format!("{REPORT_PREFIX}-{}", now.format("%Y%m%d-%H%M%S"));
    let path = writer::write_unique(
        &config.output_dir,
        &stem,
        "md",
        render_error_report(result, now),
    )
    .await?;
    info!("Error report written to {}", path.display());
    Ok(path)
}
