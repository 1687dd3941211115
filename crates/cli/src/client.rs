// JSON-RPC client for the daemon socket.
//
// Newline-delimited JSON over `~/.folio/daemon.sock`; one retry for
// transient socket drops across daemon restarts.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use folio_common::protocol::jsonrpc::{Request, RequestId, Response, RpcError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[cfg(unix)]
use tokio::net::UnixStream;
#[cfg(unix)]
use tokio::time::timeout;

pub const DAEMON_NOT_RUNNING_EXIT_CODE: i32 = 10;

const SOCKET_RELATIVE_PATH: &str = ".folio/daemon.sock";
const DEFAULT_TIMEOUT_SECS: u64 = 5;

#[derive(Debug)]
pub struct DaemonUnavailable {
    socket_path: PathBuf,
    source: io::Error,
}

impl DaemonUnavailable {
    fn new(socket_path: PathBuf, source: io::Error) -> Self {
        Self { socket_path, source }
    }

    pub fn exit_code(&self) -> i32 {
        DAEMON_NOT_RUNNING_EXIT_CODE
    }
}

impl fmt::Display for DaemonUnavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "daemon is not running (socket `{}`)", self.socket_path.display())
    }
}

impl std::error::Error for DaemonUnavailable {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

#[derive(Debug)]
pub struct DaemonClient {
    socket_path: PathBuf,
    timeout: Duration,
    next_request_id: AtomicI64,
}

impl Default for DaemonClient {
    fn default() -> Self {
        Self::new(default_socket_path())
    }
}

impl DaemonClient {
    pub fn new(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            next_request_id: AtomicI64::new(1),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn call<P, R>(&self, method: &str, params: P) -> Result<R>
    where
        P: Serialize + Clone,
        R: DeserializeOwned,
    {
        let id = self.next_request_id.fetch_add(1, Ordering::SeqCst);

        match self.call_once(id, method, params.clone()).await {
            Ok(response) => Ok(response),
            Err(first_error) => {
                // Retry once for transient socket drops / daemon restarts.
                self.call_once(id, method, params).await.map_err(|second_error| {
                    second_error.context(format!(
                        "json-rpc call failed after retry; first error: {first_error:#}"
                    ))
                })
            }
        }
    }

    #[cfg(unix)]
    async fn call_once<P, R>(&self, id: i64, method: &str, params: P) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let params =
            serde_json::to_value(params).context("failed to serialize json-rpc params")?;
        let request = Request::new(method, Some(params), RequestId::Number(id));
        let mut payload =
            serde_json::to_vec(&request).context("failed to serialize json-rpc request")?;
        payload.push(b'\n');

        let stream = timeout(self.timeout, UnixStream::connect(&self.socket_path))
            .await
            .map_err(|_| anyhow!("timed out connecting to `{}`", self.socket_path.display()))?
            .map_err(|error| {
                anyhow::Error::new(DaemonUnavailable::new(self.socket_path.clone(), error))
            })?;

        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        timeout(self.timeout, write_half.write_all(&payload))
            .await
            .map_err(|_| anyhow!("timed out writing json-rpc request"))?
            .context("failed to write json-rpc request")?;

        let mut response_line = Vec::new();
        timeout(self.timeout, reader.read_until(b'\n', &mut response_line))
            .await
            .map_err(|_| anyhow!("timed out waiting for json-rpc response"))?
            .context("failed to read json-rpc response")?;

        let response: Response = serde_json::from_slice(&response_line)
            .context("failed to decode json-rpc response")?;

        if let Some(error) = response.error {
            return Err(render_rpc_error(method, error));
        }

        let result = response.result.context("json-rpc response carried no result")?;
        serde_json::from_value(result).context("failed to decode json-rpc result")
    }

    #[cfg(not(unix))]
    async fn call_once<P, R>(&self, _id: i64, _method: &str, _params: P) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        Err(anyhow!("the folio CLI requires unix domain sockets"))
    }
}

fn render_rpc_error(method: &str, error: RpcError) -> anyhow::Error {
    let code = error
        .data
        .as_ref()
        .and_then(|data| data.get("code"))
        .and_then(|code| code.as_str())
        .map(|code| format!(" [{code}]"))
        .unwrap_or_default();
    anyhow!("`{method}` failed{code}: {}", error.message)
}

pub fn default_socket_path() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(SOCKET_RELATIVE_PATH))
        .unwrap_or_else(|| std::env::temp_dir().join("folio-daemon.sock"))
}
