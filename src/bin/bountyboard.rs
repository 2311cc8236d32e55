//! Bountyboard CLI Binary
//!
//! Command-line entry point for the bounty marketplace core.

use anyhow::Context;
use bountyboard::cli::{Cli, CliContext};
use bountyboard::logging;
use clap::Parser;
use std::process;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = run(&cli).await;
    match result {
        Ok(output) => {
            if !output.is_empty() {
                println!("{}", output);
            }
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

async fn run(cli: &Cli) -> anyhow::Result<String> {
    let settings = CliContext::load_settings(cli).context("loading configuration")?;
    logging::init_logging(Some(&settings.logging)).context("initializing logging")?;

    let data_dir = cli.data_dir.clone();
    let context = CliContext::new(settings, data_dir).context("initializing marketplace")?;
    let output = context.execute(&cli.command).await?;
    Ok(output)
}
