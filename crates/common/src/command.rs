// Reversible codec for the editor command channel.
//
// The channel carries only a command id plus flat string arguments, so a
// structured operation call `(operation_id, params)` is flattened into a
// single opaque string: a version prefix followed by url-safe base64 of
// a JSON envelope. Anything not produced by a compatible encoder fails
// closed with `MalformedCommand` rather than misparsing.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::OperationError;

pub const COMMAND_VERSION: &str = "folio-cmd.v1";
const COMMAND_SEPARATOR: char = ':';

#[derive(Debug, Serialize, Deserialize)]
struct CommandEnvelope {
    operation: String,
    params: Value,
}

/// Serialize `(operation_id, params)` into the command's sole argument.
pub fn build_operation_command(operation_id: &str, params: &Value) -> String {
    let envelope = CommandEnvelope {
        operation: operation_id.to_string(),
        params: params.clone(),
    };
    // Serializing a name + Value pair cannot fail.
    let payload = serde_json::to_vec(&envelope).expect("command envelope should serialize");
    format!("{COMMAND_VERSION}{COMMAND_SEPARATOR}{}", URL_SAFE_NO_PAD.encode(payload))
}

/// Exact inverse of `build_operation_command` for all of its outputs.
pub fn parse_operation_command(command: &str) -> Result<(String, Value), OperationError> {
    let (version, encoded) = command
        .split_once(COMMAND_SEPARATOR)
        .ok_or_else(|| OperationError::malformed_command("missing version prefix"))?;

    if version != COMMAND_VERSION {
        return Err(OperationError::malformed_command(format!(
            "unsupported command version `{version}`"
        )));
    }

    let payload = URL_SAFE_NO_PAD
        .decode(encoded.as_bytes())
        .map_err(|_| OperationError::malformed_command("payload is not valid base64"))?;

    let envelope: CommandEnvelope = serde_json::from_slice(&payload)
        .map_err(|error| OperationError::malformed_command(format!("invalid envelope: {error}")))?;

    if envelope.operation.is_empty() {
        return Err(OperationError::malformed_command("operation id is empty"));
    }

    Ok((envelope.operation, envelope.params))
}
