//! Ledger Gateway
//!
//! The only component allowed to talk to the external immutable ledger. It
//! knows nothing about complaint semantics beyond opaque IDs and hashes.
//!
//! Every call carries an explicit deadline: a hung confirmation is treated as
//! a failure, never as success, even if the underlying transaction might still
//! confirm later. Assuming success without confirmation could create an
//! off-chain record with no verifiable ledger counterpart.

pub mod client;
pub mod hashing;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::model::Status;
use crate::types::{Error, Result};

pub use client::{JsonRpcLedgerClient, LedgerClient, TxReceipt};
pub use hashing::{canonical_json, compute_content_hash};

/// Gateway wrapping all ledger communication
pub struct LedgerGateway {
    client: Arc<dyn LedgerClient>,
    timeout: Duration,
}

impl LedgerGateway {
    pub fn new(client: Arc<dyn LedgerClient>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Fail-fast startup gate
    ///
    /// Must pass before the service accepts any request: network reachable,
    /// contract responding, signer funded. This is not a per-request retry
    /// path; any failure here is fatal.
    pub async fn verify_connection(&self) -> Result<()> {
        let chain_id = self
            .bounded("chain id query", self.client.chain_id())
            .await?;
        info!(chain_id = chain_id, "Connected to ledger");

        let total = self
            .bounded("total complaints query", self.client.total_complaints())
            .await?;
        info!(total = total, "Complaint registry contract verified");

        let balance = self
            .bounded("signer balance query", self.client.signer_balance())
            .await?;
        if balance == 0 {
            return Err(Error::Config(
                "Signer has zero ledger-native balance; transactions would fail".to_string(),
            ));
        }
        info!(balance = %balance, "Signer funded");

        Ok(())
    }

    /// Register a new complaint's content hash; blocks until confirmed
    pub async fn submit_registration(&self, id: &str, hash: &str) -> Result<TxReceipt> {
        let receipt = self
            .bounded("registration", self.client.register_complaint(id, hash))
            .await?;
        info!(
            complaint_id = id,
            tx = %receipt.transaction_id,
            block = ?receipt.block_number,
            "Complaint registered on ledger"
        );
        Ok(receipt)
    }

    /// Record a status transition; blocks until confirmed
    pub async fn submit_status_transition(&self, id: &str, status: Status) -> Result<TxReceipt> {
        let receipt = self
            .bounded(
                "status transition",
                self.client.update_complaint_status(id, status.code()),
            )
            .await?;
        info!(
            complaint_id = id,
            status = %status,
            tx = %receipt.transaction_id,
            "Status transition recorded on ledger"
        );
        Ok(receipt)
    }

    /// Record the terminal resolution with its proof hash; blocks until confirmed
    pub async fn submit_resolution(&self, id: &str, resolution_hash: &str) -> Result<TxReceipt> {
        let receipt = self
            .bounded(
                "resolution",
                self.client.resolve_complaint(id, resolution_hash),
            )
            .await?;
        info!(
            complaint_id = id,
            tx = %receipt.transaction_id,
            "Resolution recorded on ledger"
        );
        Ok(receipt)
    }

    /// Read-only existence check, used by the reconciliation auditor
    pub async fn exists(&self, id: &str) -> Result<bool> {
        self.bounded("existence query", self.client.complaint_exists(id))
            .await
    }

    /// Read-only: compare a recomputed hash against the one stored on ledger
    pub async fn verify_integrity(&self, id: &str, hash: &str) -> Result<bool> {
        self.bounded("integrity query", self.client.verify_complaint(id, hash))
            .await
    }

    /// Apply the configured deadline; elapse is a failure, never a success
    async fn bounded<T, F>(&self, what: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(Error::LedgerUnavailable(format!(
                "Ledger {} timed out after {}ms",
                what,
                self.timeout.as_millis()
            ))),
        }
    }
}
