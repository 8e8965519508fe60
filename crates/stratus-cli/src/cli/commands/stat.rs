//! `stratus stat <url>` – print object metadata.

use anyhow::{Context as _, Result};
use stratus_core::config::StratusConfig;
use stratus_core::Context;

use super::build_client;
use crate::cli::TransferArgs;

pub async fn run_stat(cfg: &StratusConfig, args: &TransferArgs, url: &str) -> Result<()> {
    let client = build_client(cfg, args, url)?;
    let props = tokio::task::spawn_blocking(move || client.get_properties(&Context::new()))
        .await
        .context("stat task join")?
        .with_context(|| format!("stat of {} failed", url))?;

    println!("Size:          {}", props.size);
    println!("ETag:          {}", props.etag.as_deref().unwrap_or("-"));
    println!("Last-Modified: {}", props.last_modified.as_deref().unwrap_or("-"));
    println!("Content-Type:  {}", props.content_type.as_deref().unwrap_or("-"));
    Ok(())
}
