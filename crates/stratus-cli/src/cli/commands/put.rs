//! `stratus put <path> <url>` – upload a local file.

use anyhow::{Context as _, Result};
use std::path::Path;
use stratus_core::config::StratusConfig;
use stratus_core::{Context, UploadOptions};
use tokio::sync::mpsc;

use super::{build_client, cancel_on_ctrl_c, spawn_progress_printer, transfer_options};
use crate::cli::TransferArgs;

pub async fn run_put(
    cfg: &StratusConfig,
    args: &TransferArgs,
    path: &Path,
    url: &str,
    content_type: Option<String>,
) -> Result<()> {
    let client = build_client(cfg, args, url)?;
    let ctx = Context::new();
    let interrupt = cancel_on_ctrl_c(&ctx);
    let (tx, rx) = mpsc::channel(64);
    let printer = spawn_progress_printer(rx);

    let options = UploadOptions {
        content_type,
        transfer: transfer_options(cfg, args, Some(tx)),
    };
    let src = path.to_path_buf();
    let result = tokio::task::spawn_blocking(move || client.upload_from_file(&ctx, &src, &options))
        .await
        .context("upload task join")?;
    interrupt.abort();
    let _ = printer.await;

    let outcome = result.with_context(|| format!("upload of {} failed", path.display()))?;
    println!(
        "Uploaded {} bytes to {} ({} requests)",
        outcome.bytes_transferred, url, outcome.requests
    );
    if let Some(etag) = &outcome.properties.etag {
        println!("ETag: {}", etag);
    }
    Ok(())
}
