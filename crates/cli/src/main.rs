// folio CLI entry point.

use clap::Parser;

mod client;
mod commands;

#[derive(Parser)]
#[command(name = "folio", about = "Operation client for the folio daemon")]
struct Cli {
    #[command(subcommand)]
    command: commands::Command,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    commands::run(cli.command).await
}
