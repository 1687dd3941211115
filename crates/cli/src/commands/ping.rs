use anyhow::Result;
use folio_common::protocol::operations::RPC_PING;
use serde_json::{json, Value};

use crate::client::DaemonClient;

pub async fn run() -> Result<()> {
    let client = DaemonClient::default();
    let response: Value = client.call(RPC_PING, json!({})).await?;

    if response["ok"] == json!(true) {
        println!("daemon is up");
    } else {
        println!("unexpected ping response: {response}");
    }
    Ok(())
}
