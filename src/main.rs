use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;

use pulsewatch::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    init_tracing();

    match args.command {
        cli::Commands::Watch { file, initial_scan } => {
            commands::watch::execute(file, initial_scan, args.db, args.config).await?;
        }
        cli::Commands::Replay { file, speed } => {
            commands::replay::execute(file, speed, args.db, args.config).await?;
        }
    }

    Ok(())
}
