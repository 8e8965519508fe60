//! `stratus get <url> <path>` – download an object into a local file.

use anyhow::{Context as _, Result};
use std::path::Path;
use stratus_core::config::StratusConfig;
use stratus_core::{Context, DownloadOptions};
use tokio::sync::mpsc;

use super::{build_client, cancel_on_ctrl_c, spawn_progress_printer, transfer_options};
use crate::cli::TransferArgs;

pub async fn run_get(cfg: &StratusConfig, args: &TransferArgs, url: &str, path: &Path) -> Result<()> {
    let client = build_client(cfg, args, url)?;
    let ctx = Context::new();
    let interrupt = cancel_on_ctrl_c(&ctx);
    let (tx, rx) = mpsc::channel(64);
    let printer = spawn_progress_printer(rx);

    let options = DownloadOptions {
        range: None,
        initial_chunk_size: args.initial_chunk_size.or(cfg.transfer.initial_chunk_size),
        transfer: transfer_options(cfg, args, Some(tx)),
    };
    let dest = path.to_path_buf();
    let result = tokio::task::spawn_blocking(move || client.download_to_file(&ctx, &dest, &options))
        .await
        .context("download task join")?;
    interrupt.abort();
    let _ = printer.await;

    let outcome = result.with_context(|| format!("download of {} failed", url))?;
    println!(
        "Downloaded {} bytes to {} ({} requests)",
        outcome.bytes_transferred,
        path.display(),
        outcome.requests
    );
    Ok(())
}
