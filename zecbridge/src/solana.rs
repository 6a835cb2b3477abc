use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{BridgeError, Result};
use crate::rest::HttpClient;

pub const LAMPORTS_PER_SOL: f64 = 1_000_000_000.0;

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct BalanceResult {
    #[serde(default)]
    value: Option<u64>,
}

#[derive(Debug, Serialize)]
struct RpcRequest {
    jsonrpc: &'static str,
    id: u64,
    method: &'static str,
    params: serde_json::Value,
}

/// Minimal Solana JSON-RPC client (balance queries only).
#[derive(Debug, Clone)]
pub struct SolanaRpc {
    http: HttpClient,
}

impl SolanaRpc {
    pub fn new(rpc_url: &str) -> Self {
        Self {
            http: HttpClient::new(rpc_url),
        }
    }

    /// `getBalance` in lamports. A response without `result.value` counts as 0.
    pub async fn get_balance_lamports(&self, pubkey: &str) -> Result<u64> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method: "getBalance",
            params: json!([pubkey]),
        };

        let resp: RpcResponse<BalanceResult> = self.http.post_json(&request).await?;
        if let Some(err) = resp.error {
            return Err(BridgeError::Rpc {
                code: err.code,
                message: err.message,
            });
        }

        Ok(resp.result.and_then(|r| r.value).unwrap_or(0))
    }

    /// `getBalance` converted to SOL.
    pub async fn get_balance(&self, pubkey: &str) -> Result<f64> {
        let lamports = self.get_balance_lamports(pubkey).await?;
        Ok(lamports_to_sol(lamports))
    }
}

pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL
}
