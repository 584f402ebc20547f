//! Ledger JSON-RPC client
//!
//! The contract surface is logical, not wire-exact: the registry node exposes
//! the complaint-registry contract over JSON-RPC 2.0 and requires every
//! mutating call to carry an Ed25519 signature from the configured signer.
//! Everything behind the `LedgerClient` trait so tests can substitute a mock.

use async_trait::async_trait;
use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

use super::hashing::canonical_json;
use crate::types::{Error, Result};

/// Receipt for a confirmed ledger transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    pub transaction_id: String,
    #[serde(default)]
    pub block_number: Option<u64>,
}

/// Operations the complaint-registry contract exposes
///
/// Mutating calls block until the ledger confirms the transaction; they either
/// fully succeed with a receipt or fail with no partial effect. Read calls
/// never mutate ledger state.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn register_complaint(&self, id: &str, hash: &str) -> Result<TxReceipt>;
    async fn update_complaint_status(&self, id: &str, status_code: u8) -> Result<TxReceipt>;
    async fn resolve_complaint(&self, id: &str, resolution_hash: &str) -> Result<TxReceipt>;
    async fn verify_complaint(&self, id: &str, hash: &str) -> Result<bool>;
    async fn complaint_exists(&self, id: &str) -> Result<bool>;
    async fn total_complaints(&self) -> Result<u64>;
    async fn signer_balance(&self) -> Result<u128>;
    async fn chain_id(&self) -> Result<u64>;
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcError>,
}

/// JSON-RPC implementation of [`LedgerClient`]
pub struct JsonRpcLedgerClient {
    http: reqwest::Client,
    rpc_url: String,
    contract_address: String,
    signer: SigningKey,
    next_id: AtomicU64,
}

impl JsonRpcLedgerClient {
    pub fn new(rpc_url: &str, contract_address: &str, signer_key: [u8; 32]) -> Result<Self> {
        let http = reqwest::Client::builder()
            // Transport-level cap; the gateway applies the per-call deadline
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            rpc_url: rpc_url.to_string(),
            contract_address: contract_address.to_string(),
            signer: SigningKey::from_bytes(&signer_key),
            next_id: AtomicU64::new(1),
        })
    }

    /// Public half of the signer credential
    pub fn signer_public_key(&self) -> VerifyingKey {
        self.signer.verifying_key()
    }

    async fn call(&self, method: &str, args: Value) -> Result<Value> {
        // Sign over the canonical form of (method, contract, args) so the
        // registry node can verify the request independent of JSON key order
        let signed_over = json!({
            "method": method,
            "contract": self.contract_address,
            "args": args,
        });
        let signature = self.signer.sign(canonical_json(&signed_over).as_bytes());

        let request = json!({
            "jsonrpc": "2.0",
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
            "method": method,
            "params": {
                "contract": self.contract_address,
                "args": args,
                "signer": hex::encode(self.signer.verifying_key().as_bytes()),
                "signature": hex::encode(signature.to_bytes()),
            },
        });

        debug!(method = method, "Ledger RPC call");

        let response = self
            .http
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::LedgerUnavailable(format!("RPC request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::LedgerUnavailable(format!(
                "RPC endpoint returned HTTP {}",
                response.status()
            )));
        }

        let rpc: RpcResponse = response
            .json()
            .await
            .map_err(|e| Error::LedgerUnavailable(format!("Malformed RPC response: {}", e)))?;

        if let Some(err) = rpc.error {
            return Err(Error::LedgerUnavailable(format!(
                "RPC error {}: {}",
                err.code, err.message
            )));
        }

        rpc.result
            .ok_or_else(|| Error::LedgerUnavailable("RPC response had no result".to_string()))
    }

    fn parse_receipt(result: Value) -> Result<TxReceipt> {
        serde_json::from_value(result)
            .map_err(|e| Error::LedgerUnavailable(format!("Malformed transaction receipt: {}", e)))
    }

    fn parse_bool(result: Value) -> Result<bool> {
        result
            .as_bool()
            .ok_or_else(|| Error::LedgerUnavailable("Expected boolean RPC result".to_string()))
    }

    fn parse_u64(result: Value) -> Result<u64> {
        if let Some(n) = result.as_u64() {
            return Ok(n);
        }
        if let Some(s) = result.as_str() {
            if let Ok(n) = s.parse::<u64>() {
                return Ok(n);
            }
        }
        Err(Error::LedgerUnavailable(
            "Expected numeric RPC result".to_string(),
        ))
    }

    fn parse_u128(result: Value) -> Result<u128> {
        if let Some(n) = result.as_u64() {
            return Ok(n as u128);
        }
        if let Some(s) = result.as_str() {
            if let Ok(n) = s.parse::<u128>() {
                return Ok(n);
            }
        }
        Err(Error::LedgerUnavailable(
            "Expected numeric RPC result".to_string(),
        ))
    }
}

#[async_trait]
impl LedgerClient for JsonRpcLedgerClient {
    async fn register_complaint(&self, id: &str, hash: &str) -> Result<TxReceipt> {
        let result = self
            .call(
                "civic_registerComplaint",
                json!({ "complaintId": id, "complaintHash": hash }),
            )
            .await?;
        Self::parse_receipt(result)
    }

    async fn update_complaint_status(&self, id: &str, status_code: u8) -> Result<TxReceipt> {
        let result = self
            .call(
                "civic_updateComplaintStatus",
                json!({ "complaintId": id, "status": status_code }),
            )
            .await?;
        Self::parse_receipt(result)
    }

    async fn resolve_complaint(&self, id: &str, resolution_hash: &str) -> Result<TxReceipt> {
        let result = self
            .call(
                "civic_resolveComplaint",
                json!({ "complaintId": id, "resolutionHash": resolution_hash }),
            )
            .await?;
        Self::parse_receipt(result)
    }

    async fn verify_complaint(&self, id: &str, hash: &str) -> Result<bool> {
        let result = self
            .call(
                "civic_verifyComplaint",
                json!({ "complaintId": id, "complaintHash": hash }),
            )
            .await?;
        Self::parse_bool(result)
    }

    async fn complaint_exists(&self, id: &str) -> Result<bool> {
        let result = self
            .call("civic_complaintExists", json!({ "complaintId": id }))
            .await?;
        Self::parse_bool(result)
    }

    async fn total_complaints(&self) -> Result<u64> {
        let result = self.call("civic_getTotalComplaints", json!({})).await?;
        Self::parse_u64(result)
    }

    async fn signer_balance(&self) -> Result<u128> {
        let result = self.call("civic_getSignerBalance", json!({})).await?;
        Self::parse_u128(result)
    }

    async fn chain_id(&self) -> Result<u64> {
        let result = self.call("civic_chainId", json!({})).await?;
        Self::parse_u64(result)
    }
}
