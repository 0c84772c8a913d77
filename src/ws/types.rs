use serde::{Deserialize, Serialize};
use serde_json::Value;

const JSONRPC_VERSION: &str = "2.0";

#[derive(Debug, Serialize)]
pub(crate) struct RpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Value,
    id: u64,
}

impl<'a> RpcRequest<'a> {
    pub(crate) fn new(id: u64, method: &'a str, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            method,
            params,
            id,
        }
    }
}

/// Anything the server sends: a response to one of our requests or a pushed notification.
#[derive(Debug, Deserialize)]
pub(crate) struct RpcFrame {
    #[serde(default)]
    pub(crate) id: Option<u64>,
    #[serde(default)]
    pub(crate) method: Option<String>,
    #[serde(default)]
    pub(crate) params: Option<Value>,
    #[serde(default)]
    pub(crate) error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RpcError {
    pub(crate) code: Option<i64>,
    pub(crate) message: String,
}

/// Payload pushed on a subscribed channel.
#[non_exhaustive]
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct SubscriptionMessage {
    pub channel: String,
    #[serde(default)]
    pub data: Value,
}
