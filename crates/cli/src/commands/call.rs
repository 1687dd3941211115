use anyhow::{Context, Result};
use clap::Args;
use folio_common::command::build_operation_command;
use folio_common::protocol::operations::EXECUTE_OPERATION;
use serde_json::{json, Value};

use crate::client::DaemonClient;

#[derive(Args)]
pub struct CallArgs {
    /// Operation id, e.g. `doc.create`.
    pub operation: String,
    /// Operation params as a JSON object. Defaults to `{}`.
    #[arg(default_value = "{}")]
    pub params: String,
}

pub async fn run(args: CallArgs) -> Result<()> {
    let params: Value = serde_json::from_str(&args.params)
        .with_context(|| format!("params are not valid JSON: `{}`", args.params))?;

    let command = build_operation_command(&args.operation, &params);
    let client = DaemonClient::default();
    let outcome: Value =
        client.call(EXECUTE_OPERATION, json!({ "command": command })).await?;

    match outcome["kind"].as_str() {
        Some("result") => {
            println!("{}", serde_json::to_string_pretty(&outcome["value"])?);
        }
        Some("job") => {
            let job_id = outcome["job_id"].as_str().unwrap_or_default();
            println!("scheduled as job {job_id}");
            println!("poll with: folio job status {job_id}");
        }
        _ => println!("{}", serde_json::to_string_pretty(&outcome)?),
    }
    Ok(())
}
