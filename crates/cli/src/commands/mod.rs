// CLI subcommands.

pub mod call;
pub mod job;
pub mod ping;

use clap::Subcommand;

use crate::client::DaemonUnavailable;

#[derive(Subcommand)]
pub enum Command {
    /// Check that the daemon is reachable.
    Ping,
    /// Execute a named operation with JSON params.
    Call(call::CallArgs),
    /// Inspect or cancel asynchronous jobs.
    #[command(subcommand)]
    Job(job::JobCommand),
}

pub async fn run(command: Command) -> anyhow::Result<()> {
    let result = dispatch(command).await;

    if let Err(error) = &result {
        // A missing daemon is an expected condition with its own exit
        // code, not a stack trace.
        if let Some(unavailable) = error.downcast_ref::<DaemonUnavailable>() {
            eprintln!("{unavailable}");
            std::process::exit(unavailable.exit_code());
        }
    }

    result
}

async fn dispatch(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Ping => ping::run().await,
        Command::Call(args) => call::run(args).await,
        Command::Job(command) => job::run(command).await,
    }
}
