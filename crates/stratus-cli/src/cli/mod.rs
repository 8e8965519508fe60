//! CLI for the stratus object transfer engine.

mod commands;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use stratus_core::config;
use stratus_core::ObjectKind;

use commands::{run_get, run_put, run_stat};

/// Top-level CLI for stratus.
#[derive(Debug, Parser)]
#[command(name = "stratus")]
#[command(about = "stratus: chunked, retrying transfers to and from cloud object storage", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,

    #[command(flatten)]
    pub transfer: TransferArgs,
}

/// Flags shared by every command; they override `config.toml`.
#[derive(Debug, Clone, Default, Args)]
pub struct TransferArgs {
    /// Parallel chunk requests (default: available CPUs).
    #[arg(long, global = true, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Chunk size in bytes (default: derived from the object size).
    #[arg(long, global = true, value_name = "BYTES")]
    pub chunk_size: Option<u64>,

    /// Bytes fetched by the first (probe) request of a download.
    #[arg(long, global = true, value_name = "BYTES")]
    pub initial_chunk_size: Option<u64>,

    /// Read replica host that GET/HEAD retries may fail over to.
    #[arg(long, global = true, value_name = "HOST")]
    pub secondary_host: Option<String>,

    /// Remote object type.
    #[arg(long, global = true, value_enum, default_value_t = KindArg::BlockBlob)]
    pub kind: KindArg,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    #[default]
    BlockBlob,
    File,
}

impl From<KindArg> for ObjectKind {
    fn from(k: KindArg) -> Self {
        match k {
            KindArg::BlockBlob => ObjectKind::BlockBlob,
            KindArg::File => ObjectKind::File,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download an object to a local file.
    Get {
        /// Object URL (may carry a SAS query string).
        url: String,
        /// Destination file.
        path: PathBuf,
    },

    /// Upload a local file as an object.
    Put {
        /// Source file.
        path: PathBuf,
        /// Object URL (may carry a SAS query string).
        url: String,
        /// Content type stored with the object.
        #[arg(long, value_name = "MIME")]
        content_type: Option<String>,
    },

    /// Show object size, ETag and content type.
    Stat {
        /// Object URL.
        url: String,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Get { url, path } => run_get(&cfg, &cli.transfer, &url, &path).await?,
            CliCommand::Put {
                path,
                url,
                content_type,
            } => run_put(&cfg, &cli.transfer, &path, &url, content_type).await?,
            CliCommand::Stat { url } => run_stat(&cfg, &cli.transfer, &url).await?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
