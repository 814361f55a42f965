//! PagePitch CLI: score lead websites, render PageSpeed reports, email them.

mod commands;
mod logging;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    let log_file = logging::init_tracing(&cli)?;
    commands::run(cli, log_file).await
}
