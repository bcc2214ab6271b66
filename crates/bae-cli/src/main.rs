//! bae-authctl entry point

#![warn(clippy::all)]

mod cli;
mod commands;

use clap::Parser;

use crate::cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = commands::load_config(cli.config.as_deref())?;

    let mut logging = config.logging.clone();
    if let Some(level) = cli.log_level() {
        logging = logging.with_level(level);
    } else if cli.config.is_none() {
        logging = logging.with_level("warn");
    }
    logging.init()?;

    let mut stdout = std::io::stdout().lock();
    commands::execute(cli.command, &config, cli.config.is_some(), &mut stdout).await
}
