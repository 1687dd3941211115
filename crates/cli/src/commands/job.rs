use anyhow::Result;
use clap::Subcommand;
use folio_common::protocol::operations::{JOB_CANCEL, JOB_STATUS};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::client::DaemonClient;

#[derive(Subcommand)]
pub enum JobCommand {
    /// Show a job's current snapshot.
    Status { job_id: Uuid },
    /// Request cancellation of a job.
    Cancel { job_id: Uuid },
}

pub async fn run(command: JobCommand) -> Result<()> {
    let client = DaemonClient::default();

    let response: Value = match command {
        JobCommand::Status { job_id } => {
            client.call(JOB_STATUS, json!({ "job_id": job_id })).await?
        }
        JobCommand::Cancel { job_id } => {
            client.call(JOB_CANCEL, json!({ "job_id": job_id })).await?
        }
    };

    println!("{}", serde_json::to_string_pretty(&response["job"])?);
    Ok(())
}
