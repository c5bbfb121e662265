use clap::Parser;
use std::path::PathBuf;

use crate::download::{FetchFailurePolicy, DEFAULT_OUTPUT_DIR};

#[derive(Parser, Debug)]
#[clap(name = "source-mirror")]
#[clap(about = "Mirror a list of project files into a local download directory")]
#[clap(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Files to mirror, relative to the source (overrides --manifest)
    pub paths: Vec<String>,

    /// Manifest file or URL listing the files to mirror (default: built-in list)
    #[clap(short, long)]
    pub manifest: Option<String>,

    /// Directory or base URL to read files from
    #[clap(short, long, default_value = ".")]
    pub source: String,

    /// Directory the mirrored tree is written to
    #[clap(short, long, default_value = DEFAULT_OUTPUT_DIR)]
    pub output: PathBuf,

    /// Do not write an empty file when a file cannot be read
    #[clap(long)]
    pub skip_failed: bool,

    /// Exit with a non-zero status if any file failed
    #[clap(long)]
    pub strict: bool,

    /// Show what would be written without reading or writing anything
    #[clap(long)]
    pub dry_run: bool,

    /// Write a JSON summary of the run to this file
    #[clap(long)]
    pub report: Option<PathBuf>,

    /// Directory for log files
    #[clap(long)]
    pub log_dir: Option<PathBuf>,

    /// Log debug output to the log file
    #[clap(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn policy(&self) -> FetchFailurePolicy {
        if self.skip_failed {
            FetchFailurePolicy::Skip
        } else {
            FetchFailurePolicy::WriteEmpty
        }
    }
}
