use anyhow::{Context, Result};
use log::{error, info};
use simplelog::{ConfigBuilder, LevelFilter, WriteLogger};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::cli::Cli;
use crate::download::{Downloader, RunSummary};
use crate::manifest::Manifest;
use crate::source::{is_url, source_for};

fn default_log_dir() -> Result<PathBuf> {
    Ok(directories::BaseDirs::new()
        .ok_or_else(|| anyhow::anyhow!("Failed to get base directories"))?
        .data_local_dir()
        .join("source-mirror")
        .join("logs"))
}

pub fn setup_logging(log_dir: Option<&Path>, verbose: bool) -> Result<()> {
    let log_dir = match log_dir {
        Some(dir) => dir.to_path_buf(),
        None => default_log_dir()?,
    };

    fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    let log_file = log_dir.join(format!(
        "source_mirror_{}.log",
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    ));

    let config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Error)
        .set_location_level(LevelFilter::Debug)
        .build();

    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    WriteLogger::init(level, config, fs::File::create(log_file)?)?;

    Ok(())
}

/// Explicit paths win over the manifest; no manifest means the built-in list.
pub fn load_paths(cli: &Cli) -> Result<Vec<String>> {
    if !cli.paths.is_empty() {
        return Ok(cli.paths.clone());
    }

    let manifest = match cli.manifest.as_deref() {
        Some(location) if is_url(location) => Manifest::from_url(location)?,
        Some(location) => Manifest::from_path(Path::new(location))?,
        None => {
            info!("Using built-in file list");
            Manifest::embedded()
        }
    };

    manifest.warn_duplicates();
    Ok(manifest.files)
}

pub fn write_report(path: &Path, summary: &RunSummary) -> Result<()> {
    let json = serde_json::to_string_pretty(summary).context("Failed to serialize summary")?;
    fs::write(path, json).with_context(|| format!("Failed to write report {}", path.display()))?;
    info!("Report written to {:?}", path);
    Ok(())
}

pub fn exit_code(summary: &RunSummary, strict: bool) -> i32 {
    if strict && summary.has_failures() {
        1
    } else {
        0
    }
}

/// Runs the whole command and returns the process exit code. Only a manifest
/// that cannot be loaded or an unusable source is fatal; a broken log file
/// location or report path is reported and the run goes on.
pub fn run<W: Write>(cli: &Cli, out: &mut W) -> Result<i32> {
    if let Err(e) = setup_logging(cli.log_dir.as_deref(), cli.verbose) {
        eprintln!("warning: file logging disabled: {e:#}");
    }

    info!("source-mirror starting");
    info!("Source: {}", cli.source);
    info!("Output directory: {:?}", cli.output);

    let paths = load_paths(cli)?;
    let source = source_for(&cli.source).context("Failed to set up content source")?;

    let downloader = Downloader::new(&*source, &cli.output)
        .with_policy(cli.policy())
        .with_dry_run(cli.dry_run);

    let summary = downloader.run(&paths, out);

    if let Some(report) = &cli.report {
        if let Err(e) = write_report(report, &summary) {
            error!("{:#}", e);
            eprintln!("warning: {e:#}");
        }
    }

    let code = exit_code(&summary, cli.strict);
    if code != 0 {
        error!(
            "{} failures across {} files",
            summary.fetch_failures.len() + summary.write_failures.len(),
            summary.processed
        );
    } else {
        info!("Run completed");
    }

    Ok(code)
}
