//! JSON-RPC 2.0 client plumbing for MCP servers.
//!
//! Two concrete connections exist: a spawned child process speaking
//! line-delimited JSON-RPC over stdio, and a streamable-HTTP endpoint
//! answering each POSTed request with a JSON response. SSE-declared servers
//! are driven through their message POST endpoint.

use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use crate::mcp::transport::TransportDescriptor;

/// Protocol revision sent in the initialize handshake.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

#[derive(Debug, thiserror::Error)]
pub enum McpClientError {
    #[error("Failed to spawn server process: {0}")]
    SpawnFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server returned HTTP {0}")]
    HttpStatus(u16),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Timeout waiting for server response")]
    Timeout,

    #[error("Server returned error: code={code}, message={message}")]
    Server { code: i64, message: String },
}

/// JSON-RPC 2.0 request.
#[derive(Debug, Serialize)]
struct JsonRpcRequest {
    jsonrpc: &'static str,
    id: u64,
    method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

/// JSON-RPC 2.0 response.
#[derive(Debug, Deserialize)]
#[allow(dead_code)] // Fields required by serde deserialization
struct JsonRpcResponse {
    jsonrpc: String,
    id: Option<u64>,
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
    #[serde(rename = "data")]
    _data: Option<Value>,
}

/// One tool advertised by a server via `tools/list`.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "inputSchema")]
    pub input_schema: Option<Value>,
}

/// Result of a `tools/call` invocation.
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub content: Value,
    pub is_error: bool,
}

fn unwrap_result(response: JsonRpcResponse) -> Result<Value, McpClientError> {
    if let Some(error) = response.error {
        return Err(McpClientError::Server {
            code: error.code,
            message: error.message,
        });
    }
    response
        .result
        .ok_or_else(|| McpClientError::Protocol("missing result in response".to_string()))
}

fn initialize_params() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "clientInfo": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION")
        },
        "capabilities": {}
    })
}

/// An initialized session with one server, over whichever transport the
/// descriptor declared.
#[derive(Debug)]
pub(crate) enum RpcConnection {
    Stdio(StdioConnection),
    Http(HttpConnection),
}

impl RpcConnection {
    pub(crate) async fn open(
        descriptor: &TransportDescriptor,
        timeout: Duration,
    ) -> Result<Self, McpClientError> {
        match descriptor {
            TransportDescriptor::Stdio { command, args, env } => {
                let mut connection = StdioConnection::spawn(command, args, env)?;
                connection.initialize(timeout).await?;
                Ok(Self::Stdio(connection))
            }
            TransportDescriptor::Http { url, headers } => {
                let mut connection = HttpConnection::new(url.clone(), headers, timeout)?;
                connection.initialize().await?;
                Ok(Self::Http(connection))
            }
            TransportDescriptor::Sse { url, headers } => {
                let mut connection =
                    HttpConnection::new(message_endpoint(url), headers, timeout)?;
                connection.initialize().await?;
                Ok(Self::Http(connection))
            }
        }
    }

    pub(crate) async fn request(
        &mut self,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<Value, McpClientError> {
        match self {
            Self::Stdio(connection) => connection.request(method, params, timeout).await,
            Self::Http(connection) => connection.request(method, params).await,
        }
    }

    pub(crate) async fn list_tools(
        &mut self,
        timeout: Duration,
    ) -> Result<Vec<ToolDescriptor>, McpClientError> {
        let result = self.request("tools/list", None, timeout).await?;
        let tools = result.get("tools").cloned().unwrap_or_else(|| json!([]));
        Ok(serde_json::from_value(tools)?)
    }

    pub(crate) async fn call_tool(
        &mut self,
        name: &str,
        arguments: HashMap<String, Value>,
        timeout: Duration,
    ) -> Result<ToolOutcome, McpClientError> {
        let params = json!({ "name": name, "arguments": arguments });
        let result = self.request("tools/call", Some(params), timeout).await?;

        let content = result.get("content").cloned().unwrap_or_else(|| json!([]));
        let is_error = result
            .get("isError")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        Ok(ToolOutcome { content, is_error })
    }

    pub(crate) fn close(&mut self) {
        if let Self::Stdio(connection) = self {
            connection.close();
        }
    }
}

/// Child process speaking line-delimited JSON-RPC on stdin/stdout.
#[derive(Debug)]
pub(crate) struct StdioConnection {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    next_id: u64,
}

impl StdioConnection {
    fn spawn(
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
    ) -> Result<Self, McpClientError> {
        let mut cmd = Command::new(command);
        cmd.args(args)
            .envs(env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| McpClientError::SpawnFailed(format!("'{}': {}", command, e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpClientError::SpawnFailed("no stdin pipe".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpClientError::SpawnFailed("no stdout pipe".to_string()))?;

        Ok(Self {
            child,
            stdin,
            reader: BufReader::new(stdout),
            next_id: 1,
        })
    }

    async fn initialize(&mut self, timeout: Duration) -> Result<(), McpClientError> {
        self.request("initialize", Some(initialize_params()), timeout)
            .await?;
        self.notify("notifications/initialized", None).await
    }

    async fn request(
        &mut self,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<Value, McpClientError> {
        let id = self.next_id;
        self.next_id += 1;

        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method: method.to_string(),
            params,
        };
        let mut line = serde_json::to_string(&request)?;
        line.push('\n');

        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.flush().await?;

        let response = tokio::time::timeout(timeout, self.read_response())
            .await
            .map_err(|_| McpClientError::Timeout)??;

        unwrap_result(response)
    }

    async fn read_response(&mut self) -> Result<JsonRpcResponse, McpClientError> {
        // Skip blank lines and any non-protocol startup noise.
        for _ in 0..16 {
            let mut line = String::new();
            let read = self.reader.read_line(&mut line).await?;
            if read == 0 {
                return Err(McpClientError::Protocol(
                    "server closed stdout".to_string(),
                ));
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if let Ok(response) = serde_json::from_str::<JsonRpcResponse>(trimmed) {
                return Ok(response);
            }
            tracing::debug!(line = trimmed, "skipping non-JSON-RPC output");
        }
        Err(McpClientError::Protocol(
            "no valid JSON-RPC response received".to_string(),
        ))
    }

    async fn notify(&mut self, method: &str, params: Option<Value>) -> Result<(), McpClientError> {
        let notification = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params.unwrap_or_else(|| json!({}))
        });
        let mut line = serde_json::to_string(&notification)?;
        line.push('\n');

        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.flush().await?;
        Ok(())
    }

    fn close(&mut self) {
        let _ = self.child.start_kill();
    }
}

/// Streamable-HTTP session: every JSON-RPC request is one POST.
#[derive(Debug)]
pub(crate) struct HttpConnection {
    url: reqwest::Url,
    client: reqwest::Client,
    headers: reqwest::header::HeaderMap,
    next_id: u64,
}

impl HttpConnection {
    fn new(
        url: reqwest::Url,
        headers: &[(String, String)],
        timeout: Duration,
    ) -> Result<Self, McpClientError> {
        use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

        let mut header_map = HeaderMap::new();
        for (key, value) in headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| McpClientError::Protocol(format!("invalid header '{}': {}", key, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| McpClientError::Protocol(format!("invalid header value: {}", e)))?;
            header_map.insert(name, value);
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            url,
            client,
            headers: header_map,
            next_id: 1,
        })
    }

    async fn initialize(&mut self) -> Result<(), McpClientError> {
        self.request("initialize", Some(initialize_params())).await?;
        self.notify("notifications/initialized").await;
        Ok(())
    }

    async fn request(
        &mut self,
        method: &str,
        params: Option<Value>,
    ) -> Result<Value, McpClientError> {
        let id = self.next_id;
        self.next_id += 1;

        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method: method.to_string(),
            params,
        };

        let response = self
            .client
            .post(self.url.clone())
            .headers(self.headers.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    McpClientError::Timeout
                } else {
                    McpClientError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(McpClientError::HttpStatus(status.as_u16()));
        }

        let response: JsonRpcResponse = response.json().await?;
        unwrap_result(response)
    }

    async fn notify(&mut self, method: &str) {
        // Best-effort: servers commonly answer notifications with 202 and
        // an empty body.
        let notification = json!({ "jsonrpc": "2.0", "method": method, "params": {} });
        if let Err(e) = self
            .client
            .post(self.url.clone())
            .headers(self.headers.clone())
            .json(&notification)
            .send()
            .await
        {
            tracing::debug!(error = %e, "initialized notification not delivered");
        }
    }
}

/// SSE servers take protocol messages on a sibling message endpoint.
fn message_endpoint(url: &reqwest::Url) -> reqwest::Url {
    let mut endpoint = url.clone();
    let path = format!("{}/message", endpoint.path().trim_end_matches('/'));
    endpoint.set_path(&path);
    endpoint
}
