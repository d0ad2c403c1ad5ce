//! Docnag CLI: mail the authors of undocumented public declarations; use --dry-run to only list them.

use anyhow::Result;
use clap::Parser;
use docnag::engine::arg_parser::Cli;
use docnag::engine::handle_run;
use std::time::Instant;

fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();
    handle_run(&cli)?;
    log::debug!("Total time: {:?}", start_time.elapsed());
    Ok(())
}
