use crate::api::REQUEST_TIMEOUT;
use crate::error::{ConsoleError, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

/// Minimal Ethereum JSON-RPC client for balance lookups.
#[derive(Debug)]
pub struct EthClient {
    client: reqwest::Client,
    rpc_url: String,
    next_id: AtomicU64,
}

impl EthClient {
    pub fn new(rpc_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            rpc_url: rpc_url.to_string(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    /// Balance of `address` at the latest block, in wei.
    pub async fn get_balance(&self, address: &str) -> Result<u128> {
        let result = self
            .call("eth_getBalance", json!([address, "latest"]))
            .await?;
        let quantity = result.as_str().ok_or_else(|| ConsoleError::RpcError {
            code: 0,
            message: format!("unexpected eth_getBalance result: {}", result),
        })?;
        parse_quantity(quantity)
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };
        debug!("JSON-RPC {} -> {}", method, self.rpc_url);

        let response: RpcResponse = self
            .client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(error) = response.error {
            return Err(ConsoleError::RpcError {
                code: error.code,
                message: error.message,
            });
        }
        response.result.ok_or_else(|| ConsoleError::RpcError {
            code: 0,
            message: format!("{} returned neither result nor error", method),
        })
    }
}

/// Provider endpoint for `network` (e.g. `goerli`) under `project_id`.
pub fn infura_url(network: &str, project_id: &str) -> String {
    format!("https://{}.infura.io/v3/{}", network, project_id)
}

/// Block explorer link for a transaction on `network`.
pub fn tx_link(network: &str, tx_id: &str) -> String {
    format!("https://{}.etherscan.io/tx/{}", network, tx_id)
}

/// Parses a JSON-RPC hex quantity such as `0x1bc16d674ec80000`.
pub fn parse_quantity(text: &str) -> Result<u128> {
    let hex = text
        .strip_prefix("0x")
        .ok_or_else(|| ConsoleError::AmountError(format!("'{}' is not a hex quantity", text)))?;
    if hex.is_empty() {
        return Ok(0);
    }
    u128::from_str_radix(hex, 16)
        .map_err(|e| ConsoleError::AmountError(format!("'{}': {}", text, e)))
}
