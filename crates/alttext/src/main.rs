mod config;
mod error;
mod report;

use std::io::Write;
use std::path::{Path, PathBuf};

use alttext_engine::discovery::discover_files;
use alttext_engine::model::AssetDeficiency;
use alttext_engine::patcher::{apply_resolutions, ApplyOptions};
use alttext_engine::queue::{load_resolutions, write_queue};
use alttext_engine::scanner::{scan_file, MARKDOWN_EXTENSIONS};
use clap::Parser;
use futures::future::join_all;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::{Cli, Config};
use error::AppError;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries the queue and the report; logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let config = Config::from_cli(Cli::parse())?;
    match config {
        Config::Scan {
            root,
            output,
            respect_ignore,
        } => {
            info!(root = %root.display(), respect_ignore, "scanning");
            let queue = scan(&root, respect_ignore).await?;
            info!("Found {} assets without meaningful alt text", queue.len());
            emit_queue(output.as_deref(), &queue)?;
        }
        Config::Apply { captions, dry_run } => {
            let resolutions = load_resolutions(&captions)?;
            info!(captions = %captions.display(), records = resolutions.len(), dry_run, "applying");
            let options = ApplyOptions { dry_run };
            let report =
                tokio::task::spawn_blocking(move || apply_resolutions(&resolutions, &options)).await?;
            let mut stdout = std::io::stdout().lock();
            report::write_report(&mut stdout, &report, &captions)?;
        }
    }
    Ok(())
}

/// Scan every document on the blocking pool. A document that fails is
/// logged and left out; discovery order is kept.
async fn scan(root: &Path, respect_ignore: bool) -> Result<Vec<AssetDeficiency>, AppError> {
    let files = discover_files(root, MARKDOWN_EXTENSIONS, respect_ignore)?;
    let tasks = files.into_iter().map(|path| {
        tokio::task::spawn_blocking(move || {
            let result = scan_file(&path);
            (path, result)
        })
    });

    let mut queue = Vec::new();
    for joined in join_all(tasks).await {
        let (path, result): (PathBuf, _) = joined?;
        match result {
            Ok(items) => queue.extend(items),
            Err(e) => warn!(document = %path.display(), error = %e, "skipping document"),
        }
    }
    Ok(queue)
}

fn emit_queue(output: Option<&Path>, queue: &[AssetDeficiency]) -> Result<(), AppError> {
    match output {
        Some(path) => write_queue(path, queue)?,
        None => {
            let json = serde_json::to_string_pretty(queue)?;
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{json}")?;
        }
    }
    Ok(())
}
