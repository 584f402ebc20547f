//! Reconciliation auditor
//!
//! Sweeps all off-chain complaint IDs against the ledger's existence check
//! and reports every ID the ledger does not know about. This is the only
//! mechanism that surfaces orphaned ledger entries' counterparts: off-chain
//! deletions and persistence failures after ledger success are detected
//! here, not prevented.
//!
//! Read-only and safe to run concurrently with other operations.

use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;
use tracing::{info, warn};

use crate::ledger::LedgerGateway;
use crate::model::{AnomalyKind, AnomalyRecord};
use crate::store::ComplaintStore;
use crate::types::Result;

pub struct ReconciliationAuditor {
    store: Arc<dyn ComplaintStore>,
    ledger: Arc<LedgerGateway>,
    /// Concurrent existence queries in flight
    concurrency: usize,
}

impl ReconciliationAuditor {
    pub fn new(
        store: Arc<dyn ComplaintStore>,
        ledger: Arc<LedgerGateway>,
        concurrency: usize,
    ) -> Self {
        Self {
            store,
            ledger,
            concurrency: concurrency.max(1),
        }
    }

    /// Compare every off-chain ID against the ledger
    ///
    /// IDs are checked through a bounded-concurrency buffered stream; results
    /// keep the sorted input order so repeated runs over the same data are
    /// deterministic. A ledger read failure aborts the sweep: a partial
    /// anomaly report would be indistinguishable from a clean one.
    pub async fn detect_anomalies(&self) -> Result<Vec<AnomalyRecord>> {
        let mut ids = self.store.all_ids().await?;
        ids.sort();
        let total = ids.len();

        let checks: Vec<(String, bool)> = stream::iter(ids.into_iter().map(|id| {
            let ledger = Arc::clone(&self.ledger);
            async move {
                let exists = ledger.exists(&id).await?;
                Ok::<_, crate::types::Error>((id, exists))
            }
        }))
        .buffered(self.concurrency)
        .try_collect()
        .await?;

        let anomalies: Vec<AnomalyRecord> = checks
            .into_iter()
            .filter(|(_, exists)| !exists)
            .map(|(id, _)| AnomalyRecord {
                message: format!("Complaint {} exists off-chain but not on the ledger", id),
                complaint_id: id,
                kind: AnomalyKind::MissingOnChain,
            })
            .collect();

        if anomalies.is_empty() {
            info!(scanned = total, "Reconciliation sweep clean");
        } else {
            warn!(
                scanned = total,
                anomalies = anomalies.len(),
                "Reconciliation sweep found divergence between stores"
            );
        }

        Ok(anomalies)
    }
}
