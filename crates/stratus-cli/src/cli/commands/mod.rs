//! CLI command handlers, one file per command, plus the wiring they share.

mod get;
mod put;
mod stat;

pub use get::run_get;
pub use put::run_put;
pub use stat::run_stat;

use anyhow::{Context as _, Result};
use std::io::Write as _;
use std::sync::Arc;
use std::time::{Duration, Instant};
use stratus_core::config::StratusConfig;
use stratus_core::http::{CurlTransport, Pipeline};
use stratus_core::{Context, ObjectClient, TransferOptions, TransferProgress};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::TransferArgs;

const PROGRESS_INTERVAL_MS: u64 = 500;

/// Client for `url` with the configured retry/transport settings and CLI overrides.
fn build_client(cfg: &StratusConfig, args: &TransferArgs, url: &str) -> Result<ObjectClient> {
    let url = url::Url::parse(url).with_context(|| format!("invalid object URL: {}", url))?;
    let mut retry = cfg.retry.to_options();
    if let Some(host) = &args.secondary_host {
        retry.secondary_host_for_reads = Some(host.clone());
    }
    let pipeline = Pipeline::builder()
        .application_id("stratus-cli")
        .retry_options(retry)
        .transport(Arc::new(CurlTransport::new(cfg.transport.to_options())))
        .build();
    Ok(ObjectClient::new(url, args.kind.into(), Arc::new(pipeline)))
}

/// Config transfer defaults with CLI overrides applied.
fn transfer_options(
    cfg: &StratusConfig,
    args: &TransferArgs,
    progress: Option<mpsc::Sender<TransferProgress>>,
) -> TransferOptions {
    let mut opts = cfg.transfer.to_options();
    if args.chunk_size.is_some() {
        opts.chunk_size = args.chunk_size;
    }
    if args.concurrency.is_some() {
        opts.concurrency = args.concurrency;
    }
    opts.progress = progress;
    opts
}

/// Cancel `ctx` on Ctrl-C. Abort the returned handle once the transfer is done.
fn cancel_on_ctrl_c(ctx: &Context) -> JoinHandle<()> {
    let ctx = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, cancelling transfer");
            ctx.cancel();
        }
    })
}

/// One in-place status line: carriage return, no newline.
pub(crate) fn progress_line(p: TransferProgress, elapsed: Duration) -> String {
    let done_mib = p.bytes_done as f64 / 1_048_576.0;
    let total_mib = p.total_bytes as f64 / 1_048_576.0;
    let pct = if p.total_bytes > 0 {
        p.bytes_done as f64 / p.total_bytes as f64 * 100.0
    } else {
        100.0
    };
    let secs = elapsed.as_secs_f64();
    let rate_mib = if secs > 0.0 { done_mib / secs } else { 0.0 };
    format!(
        "\r  {:.1} / {:.1} MiB ({:.1}%)  {:.2} MiB/s  ",
        done_mib, total_mib, pct, rate_mib
    )
}

/// Print throughput while progress arrives; ends when every sender is dropped.
fn spawn_progress_printer(mut rx: mpsc::Receiver<TransferProgress>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let started = Instant::now();
        let mut last_print = started;
        let mut printed = false;
        while let Some(p) = rx.recv().await {
            let now = Instant::now();
            if now.duration_since(last_print).as_millis() as u64 >= PROGRESS_INTERVAL_MS
                || p.bytes_done >= p.total_bytes
            {
                // Redraw in place; the closing newline comes after the loop.
                print!("{}", progress_line(p, started.elapsed()));
                let _ = std::io::stdout().flush();
                last_print = now;
                printed = true;
            }
        }
        if printed {
            println!();
        }
    })
}
