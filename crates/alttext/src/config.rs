use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::error::AppError;

/// Command line, with environment variable fallbacks.
#[derive(Debug, Parser)]
#[command(name = "alttext", version, about = "Find and fill missing alt text in markdown documents")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Scan markdown files for assets without meaningful alt text
    Scan {
        /// Directory (or single markdown file) to scan
        #[arg(env = "ALTTEXT_ROOT", value_name = "ROOT")]
        root: PathBuf,

        /// Write the queue here instead of stdout
        #[arg(long, short, env = "ALTTEXT_QUEUE", value_name = "PATH")]
        output: Option<PathBuf>,

        /// Also scan hidden directories and node_modules
        #[arg(long)]
        no_ignore: bool,
    },
    /// Apply reviewed captions to the markdown files they reference
    Apply {
        /// Captions JSON: queue records with `final_alt` filled in
        #[arg(env = "ALTTEXT_CAPTIONS", value_name = "CAPTIONS")]
        captions: PathBuf,

        /// Report what would change without writing files
        #[arg(long)]
        dry_run: bool,
    },
}

/// Validated run configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Config {
    Scan {
        root: PathBuf,
        output: Option<PathBuf>,
        respect_ignore: bool,
    },
    Apply {
        captions: PathBuf,
        dry_run: bool,
    },
}

impl Config {
    /// Check the parsed arguments before any work starts.
    ///
    /// The scan root and the captions file must exist; a queue output path
    /// must be in an existing directory.
    pub fn from_cli(cli: Cli) -> Result<Self, AppError> {
        match cli.command {
            Command::Scan {
                root,
                output,
                no_ignore,
            } => {
                if !root.exists() {
                    return Err(AppError::Config(format!("scan root not found: {}", root.display())));
                }
                if let Some(parent) = output.as_deref().and_then(|p| p.parent()) {
                    if !parent.as_os_str().is_empty() && !parent.is_dir() {
                        return Err(AppError::Config(format!(
                            "output directory not found: {}",
                            parent.display()
                        )));
                    }
                }
                Ok(Self::Scan {
                    root,
                    output,
                    respect_ignore: !no_ignore,
                })
            }
            Command::Apply { captions, dry_run } => {
                if !captions.is_file() {
                    return Err(AppError::Config(format!(
                        "captions file not found: {}",
                        captions.display()
                    )));
                }
                Ok(Self::Apply { captions, dry_run })
            }
        }
    }
}
