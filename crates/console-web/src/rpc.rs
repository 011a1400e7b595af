//! JSON-RPC 2.0 envelope and method registry

use crate::AppState;
use axum::{
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Service prefix of every method name on the wire
pub const SERVICE_PREFIX: &str = "Web.";

/// Error code for application-level failures
pub const APPLICATION_ERROR: i64 = -32000;
/// Unparseable request envelope
pub const PARSE_ERROR: i64 = -32700;
/// Request is not a valid JSON-RPC call
pub const INVALID_REQUEST: i64 = -32600;
/// Unknown method
pub const METHOD_NOT_FOUND: i64 = -32601;
/// Arguments did not match the method
pub const INVALID_PARAMS: i64 = -32602;

/// Message returned when the bearer token is missing or invalid
pub const UNAUTHORIZED_MESSAGE: &str = "Unauthorized request";

/// Every RPC method the console exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    ServerInfo,
    DiskInfo,
    MakeBucket,
    ListBuckets,
    ListObjects,
    RemoveObject,
    Login,
    GenerateAuth,
    SetAuth,
    GetAuth,
}

impl Method {
    pub const ALL: [Method; 10] = [
        Self::ServerInfo,
        Self::DiskInfo,
        Self::MakeBucket,
        Self::ListBuckets,
        Self::ListObjects,
        Self::RemoveObject,
        Self::Login,
        Self::GenerateAuth,
        Self::SetAuth,
        Self::GetAuth,
    ];

    /// Method name without the service prefix
    pub fn name(&self) -> &'static str {
        match self {
            Self::ServerInfo => "ServerInfo",
            Self::DiskInfo => "DiskInfo",
            Self::MakeBucket => "MakeBucket",
            Self::ListBuckets => "ListBuckets",
            Self::ListObjects => "ListObjects",
            Self::RemoveObject => "RemoveObject",
            Self::Login => "Login",
            Self::GenerateAuth => "GenerateAuth",
            Self::SetAuth => "SetAuth",
            Self::GetAuth => "GetAuth",
        }
    }

    /// Resolve a wire name such as `Web.ListBuckets`
    pub fn from_wire(name: &str) -> Option<Self> {
        let bare = name.strip_prefix(SERVICE_PREFIX)?;
        Self::ALL.into_iter().find(|m| m.name() == bare)
    }

    /// Whether a valid bearer token is required before anything else runs
    pub fn requires_auth(&self) -> bool {
        !matches!(self, Self::Login)
    }
}

/// An RPC failure: message-only, the HTTP status stays 200
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcError {
    /// Application failure carrying `message`
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            code: APPLICATION_ERROR,
            message: message.into(),
        }
    }

    /// Fixed rejection for a missing or invalid token
    pub fn unauthorized() -> Self {
        Self::message(UNAUTHORIZED_MESSAGE)
    }

    pub fn invalid_params(detail: impl std::fmt::Display) -> Self {
        Self {
            code: INVALID_PARAMS,
            message: format!("invalid params: {}", detail),
        }
    }

    pub fn method_not_found(name: &str) -> Self {
        Self {
            code: METHOD_NOT_FOUND,
            message: format!("rpc: can't find method {}", name),
        }
    }
}

/// Result type of RPC methods
pub type RpcResult<T> = Result<T, RpcError>;

/// Incoming call
#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub id: Value,
}

/// Outgoing reply; exactly one of `result` / `error` is set
#[derive(Debug, Serialize)]
pub struct RpcResponse {
    pub jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    pub id: Value,
}

impl RpcResponse {
    pub fn from_result(id: Value, outcome: RpcResult<Value>) -> Self {
        let (result, error) = match outcome {
            Ok(value) => (Some(value), None),
            Err(err) => (None, Some(err)),
        };
        Self {
            jsonrpc: "2.0",
            result,
            error,
            id,
        }
    }
}

impl IntoResponse for RpcResponse {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// Decode method arguments.
///
/// Accepts the positional form `[{...}]`, a bare object, or nothing at all
/// (treated as `{}`).
pub fn decode_params<T: DeserializeOwned>(params: Value) -> RpcResult<T> {
    let args = match params {
        Value::Array(mut items) if items.len() <= 1 => items.pop().unwrap_or(Value::Null),
        Value::Array(_) => return Err(RpcError::invalid_params("expected a single argument")),
        other => other,
    };
    let args = match args {
        Value::Null => Value::Object(serde_json::Map::new()),
        other => other,
    };
    serde_json::from_value(args).map_err(RpcError::invalid_params)
}

/// Encode a reply struct
pub fn encode_reply<T: Serialize>(reply: T) -> RpcResult<Value> {
    serde_json::to_value(reply).map_err(|e| RpcError::message(e.to_string()))
}

/// POST /rpc - JSON-RPC entry point
pub async fn rpc_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> RpcResponse {
    let request: RpcRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            return RpcResponse::from_result(
                Value::Null,
                Err(RpcError {
                    code: PARSE_ERROR,
                    message: format!("parse error: {}", e),
                }),
            )
        }
    };

    if request.jsonrpc.as_deref().is_some_and(|v| v != "2.0") {
        return RpcResponse::from_result(
            request.id,
            Err(RpcError {
                code: INVALID_REQUEST,
                message: "jsonrpc must be \"2.0\"".to_string(),
            }),
        );
    }

    let Some(method) = Method::from_wire(&request.method) else {
        debug!(method = %request.method, "Unknown RPC method");
        return RpcResponse::from_result(request.id, Err(RpcError::method_not_found(&request.method)));
    };

    let outcome = state.web.call(&headers, method, request.params).await;
    if let Err(err) = &outcome {
        debug!(method = method.name(), error = %err.message, "RPC call failed");
    }
    RpcResponse::from_result(request.id, outcome)
}
