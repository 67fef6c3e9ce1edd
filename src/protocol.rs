//! Stdio transport: newline-delimited JSON-RPC 2.0.
//!
//! One request per line in, one response per line out. Requests without an
//! `id` member are notifications and never get a reply; `"id": null` is
//! still answered. Supported methods:
//!
//! | Method | Result |
//! |---|---|
//! | `initialize` | protocol version, `tools` capability, server name and version |
//! | `ping` | `{}` |
//! | `tools/list` | the operation catalog with JSON input schemas |
//! | `tools/call` | `{content: [{type: "text", text}], isError?}` |
//!
//! A failed `tools/call` becomes a JSON-RPC error whose code is the
//! dispatch error's class, with `data.kind` telling engine failures apart
//! from filesystem failures.

use crate::dispatch::{Dispatcher, OperationRequest};
use crate::error::DispatchError;
use crate::imaging::ImageBackend;
use serde::Deserialize;
use serde_json::{Value, json};
use std::io::{self, BufRead, Write};

pub const PROTOCOL_VERSION: &str = "2024-11-05";
pub const SERVER_NAME: &str = "imagician";

const PARSE_ERROR: i64 = -32700;
const INVALID_REQUEST: i64 = -32600;
const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;

#[derive(Debug, Deserialize)]
struct RpcRequest {
    /// `None` only when the member is absent; `"id": null` is `Some(Null)`.
    #[serde(default, deserialize_with = "present")]
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Option<Value>,
}

fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Serve requests from `input` until it is closed.
pub fn serve<B, R, W>(dispatcher: &Dispatcher<B>, input: R, mut output: W) -> io::Result<()>
where
    B: ImageBackend,
    R: BufRead,
    W: Write,
{
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "serving on stdio");
    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        if let Some(response) = handle_line(dispatcher, &line) {
            serde_json::to_writer(&mut output, &response)?;
            output.write_all(b"\n")?;
            output.flush()?;
        }
    }
    tracing::info!("input closed, shutting down");
    Ok(())
}

/// Handle one raw message. Returns `None` for notifications.
pub fn handle_line<B: ImageBackend>(dispatcher: &Dispatcher<B>, line: &str) -> Option<Value> {
    let message: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => {
            return Some(error_response(
                Value::Null,
                PARSE_ERROR,
                format!("Parse error: {e}"),
                None,
            ));
        }
    };
    let request: RpcRequest = match serde_json::from_value(message) {
        Ok(r) => r,
        Err(e) => {
            return Some(error_response(
                Value::Null,
                INVALID_REQUEST,
                format!("Invalid request: {e}"),
                None,
            ));
        }
    };

    let Some(id) = request.id else {
        tracing::debug!(method = %request.method, "notification");
        return None;
    };

    let response = match request.method.as_str() {
        "initialize" => success_response(
            id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": { "tools": {} },
                "serverInfo": {
                    "name": SERVER_NAME,
                    "version": env!("CARGO_PKG_VERSION"),
                }
            }),
        ),
        "ping" => success_response(id, json!({})),
        "tools/list" => success_response(id, json!({ "tools": dispatcher.tools() })),
        "tools/call" => call_tool(dispatcher, id, request.params),
        other => error_response(
            id,
            METHOD_NOT_FOUND,
            format!("Method not found: {other}"),
            None,
        ),
    };
    Some(response)
}

fn call_tool<B: ImageBackend>(dispatcher: &Dispatcher<B>, id: Value, params: Option<Value>) -> Value {
    let request: OperationRequest = match serde_json::from_value(params.unwrap_or(Value::Null)) {
        Ok(r) => r,
        Err(e) => {
            return error_response(id, INVALID_PARAMS, format!("Invalid params: {e}"), None);
        }
    };

    match dispatcher.dispatch(&request) {
        Ok(outcome) => {
            let mut result = json!({
                "content": [{ "type": "text", "text": outcome.message }],
            });
            if !outcome.success {
                result["isError"] = Value::Bool(true);
            }
            success_response(id, result)
        }
        Err(e) => dispatch_error_response(id, &e),
    }
}

fn dispatch_error_response(id: Value, err: &DispatchError) -> Value {
    let data = match err {
        DispatchError::Validation { field, .. } => json!({ "kind": err.kind(), "field": field }),
        _ => json!({ "kind": err.kind() }),
    };
    error_response(id, err.class().code(), err.to_string(), Some(data))
}

fn success_response(id: Value, result: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "result": result })
}

fn error_response(id: Value, code: i64, message: String, data: Option<Value>) -> Value {
    let mut error = json!({ "code": code, "message": message });
    if let Some(data) = data {
        error["data"] = data;
    }
    json!({ "jsonrpc": "2.0", "id": id, "error": error })
}
