mod cli;
mod config;
mod runner;

use clap::Parser;
use engine_logging::engine_warn;

use crate::cli::{Cli, Command};
use crate::config::load_config;
use crate::runner::Runner;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let loaded = load_config(cli.config.as_deref());
    let config = loaded.config;

    engine_logging::initialize_with_file(
        config.log_destination.into(),
        config.level_filter(),
        &config.log_file,
    );
    if let Some(warning) = loaded.warning {
        engine_warn!("{}; using defaults", warning);
    }

    let runner = Runner::new(&config)?;
    match cli.command {
        Command::Scan { url } => runner.scan(&url),
        Command::Download { url, output, file } => runner.download(&url, output, file),
        Command::Probe { url } => runner.probe(&url),
    }
}
