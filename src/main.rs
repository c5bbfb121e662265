use anyhow::Result;
use clap::Parser;
use std::io;

use source_mirror::app;
use source_mirror::cli::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let code = app::run(&cli, &mut io::stdout().lock())?;
    if code != 0 {
        std::process::exit(code);
    }

    Ok(())
}
