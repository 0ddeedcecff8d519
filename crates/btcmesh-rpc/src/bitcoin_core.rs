//! Bitcoin Core JSON-RPC client over HTTP.
//!
//! Calls `sendrawtransaction` and nothing else — transaction parsing and
//! validation are Bitcoin Core's job, not ours.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::adapter::{RpcAdapter, RpcError};

pub struct BitcoinCoreRpc {
    client: reqwest::Client,
    url: String,
    auth: Option<(String, String)>,
    next_id: AtomicU64,
}

#[derive(Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    result: Option<serde_json::Value>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    message: String,
}

impl BitcoinCoreRpc {
    pub fn new(host: &str, port: u16, user: &str, password: &str) -> Self {
        let url = format!("http://{host}:{port}/");
        let auth = if user.is_empty() {
            None
        } else {
            Some((user.to_string(), password.to_string()))
        };

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("reqwest client builder uses valid static config");

        Self {
            client,
            url,
            auth,
            next_id: AtomicU64::new(1),
        }
    }

    async fn call(
        &self,
        method: &str,
        params: Vec<serde_json::Value>,
    ) -> Result<serde_json::Value, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(rpc.id = id, rpc.method = method, "rpc call");

        let req = JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };

        let mut builder = self.client.post(&self.url).json(&req);
        if let Some((user, pass)) = &self.auth {
            builder = builder.basic_auth(user, Some(pass));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| RpcError::Connection(e.to_string()))?;

        let body = response
            .text()
            .await
            .map_err(|e| RpcError::Connection(e.to_string()))?;

        let decoded: JsonRpcResponse = serde_json::from_str(&body)
            .map_err(|e| RpcError::Connection(format!("invalid rpc response: {e}")))?;

        if let Some(err) = decoded.error {
            return Err(RpcError::Rejected(err.message));
        }

        decoded
            .result
            .ok_or_else(|| RpcError::Connection("rpc response had no result".to_string()))
    }
}

#[async_trait]
impl RpcAdapter for BitcoinCoreRpc {
    async fn broadcast(&self, tx_hex: &str) -> Result<String, RpcError> {
        let result = self
            .call("sendrawtransaction", vec![serde_json::Value::from(tx_hex)])
            .await?;

        result
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| RpcError::Connection("sendrawtransaction did not return a txid".to_string()))
    }
}
