//! JSON-RPC 2.0 stdio transport for the shell tool surface.
//!
//! One request per line on stdin, one response per line on stdout. The loop
//! winds down on stdin EOF and the caller tears the executor down afterwards.
//! SIGINT/SIGTERM are not handled here: the supervisor's signal watcher
//! terminates every live child and re-raises the signal.

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info};

use bgs_executor::ShellExecutor;

use crate::tools;

#[derive(Deserialize)]
struct JsonRpcRequest {
    #[allow(dead_code)]
    jsonrpc: String,
    method: String,
    #[serde(default)]
    params: Option<Value>,
    id: Option<Value>,
}

#[derive(Serialize)]
struct JsonRpcResponse {
    jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
    id: Option<Value>,
}

#[derive(Serialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

impl JsonRpcResponse {
    fn result(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    fn error(id: Option<Value>, code: i32, message: String) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(JsonRpcError { code, message }),
            id,
        }
    }
}

pub async fn run_stdio_server(executor: Arc<ShellExecutor>) -> Result<()> {
    info!("serving tool API on stdio");

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    while let Some(line) = lines
        .next_line()
        .await
        .context("failed to read request line from stdin")?
    {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        debug!(frame = trimmed, "received request");

        let request: JsonRpcRequest = match serde_json::from_str(trimmed) {
            Ok(request) => request,
            Err(e) => {
                error!(error = %e, "failed to parse JSON-RPC request");
                write_response(&JsonRpcResponse::error(
                    None,
                    -32700,
                    format!("Parse error: {e}"),
                ))?;
                continue;
            }
        };

        let is_notification = request.id.is_none();
        let response = handle_request(&executor, request).await;
        // Notifications get no response frame.
        if !(is_notification && response.result.is_none() && response.error.is_none()) {
            write_response(&response)?;
        }
    }

    debug!("stdin closed");
    info!("stdio server stopped");
    Ok(())
}

async fn handle_request(executor: &ShellExecutor, request: JsonRpcRequest) -> JsonRpcResponse {
    let id = request.id.clone();

    match request.method.as_str() {
        "initialize" => JsonRpcResponse::result(
            id,
            serde_json::json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {
                    "tools": {}
                },
                "serverInfo": {
                    "name": "bgshell",
                    "version": env!("CARGO_PKG_VERSION")
                }
            }),
        ),
        "notifications/initialized" => JsonRpcResponse {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: None,
            id: None,
        },
        "tools/list" => JsonRpcResponse::result(
            id,
            serde_json::json!({ "tools": tools::tool_definitions(executor) }),
        ),
        "tools/call" => match handle_tool_call(executor, request.params).await {
            Ok(result) => JsonRpcResponse::result(id, result),
            Err(e) => JsonRpcResponse::error(id, -32603, e.to_string()),
        },
        "shutdown" => JsonRpcResponse::result(id, serde_json::json!({})),
        other => JsonRpcResponse::error(id, -32601, format!("Method not found: {other}")),
    }
}

async fn handle_tool_call(executor: &ShellExecutor, params: Option<Value>) -> Result<Value> {
    let params = params.context("Missing params for tools/call")?;
    let name = params
        .get("name")
        .and_then(|v| v.as_str())
        .context("Missing tool name")?;
    let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);

    debug!(tool = name, "tool call");
    tools::dispatch(executor, name, arguments).await
}

fn write_response(response: &JsonRpcResponse) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer(&mut out, response).context("Failed to serialize response")?;
    out.write_all(b"\n")
        .context("Failed to write newline to stdout")?;
    out.flush().context("Failed to flush stdout")?;
    Ok(())
}
