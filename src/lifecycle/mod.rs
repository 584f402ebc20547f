//! Complaint lifecycle manager
//!
//! Owns the complaint state machine. Every state-changing operation follows
//! the ledger-first protocol: the ledger write must succeed before any
//! off-chain mutation is committed. On ledger failure the off-chain record is
//! untouched and the caller gets a retryable `LedgerUnavailable`; the system
//! performs no automatic retry.
//!
//! Transition ordering is permissive at the API level: any of the four
//! statuses is an acceptable target from any current status, matching the
//! authority model of the original system. The nominal path is
//! Reported -> Verified -> InProgress -> Resolved.

pub mod locks;

use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::ledger::{compute_content_hash, LedgerGateway, TxReceipt};
use crate::model::{Complaint, GeoLocation, NewComplaint, Status, StatusEntry};
use crate::store::{ComplaintFilter, ComplaintStore, ListQuery};
use crate::types::{Error, Result};

pub use locks::KeyedLocks;

pub struct LifecycleManager {
    store: Arc<dyn ComplaintStore>,
    ledger: Arc<LedgerGateway>,
    /// Spans the full ledger-then-persist sequence per complaint ID.
    ///
    /// Must be the same instance the vote engine uses: transitions persist
    /// the whole document, so a voter mutation sneaking in during the ledger
    /// confirmation wait would be overwritten by the snapshot.
    locks: KeyedLocks,
}

impl LifecycleManager {
    pub fn new(store: Arc<dyn ComplaintStore>, ledger: Arc<LedgerGateway>, locks: KeyedLocks) -> Self {
        Self {
            store,
            ledger,
            locks,
        }
    }

    /// File a new complaint: hash content, register on ledger, then persist
    ///
    /// If the ledger rejects or times out, nothing is saved. If persistence
    /// fails after ledger success, the orphaned ledger entry is left for the
    /// reconciliation auditor to surface.
    pub async fn create(&self, input: NewComplaint, reporter: &str) -> Result<(Complaint, TxReceipt)> {
        validate_new_complaint(&input)?;
        if reporter.trim().is_empty() {
            return Err(Error::Validation("Reporter ID is required".to_string()));
        }

        let category = crate::model::Category::parse(&input.category)?;
        let id = Uuid::new_v4().to_string();
        let now = bson::DateTime::now();

        let mut complaint = Complaint {
            id: id.clone(),
            title: input.title.trim().to_string(),
            description: input.description.trim().to_string(),
            category,
            location: GeoLocation::new(input.longitude, input.latitude, input.address.trim()),
            images: input.images,
            reporter: reporter.to_string(),
            status: Status::Reported,
            status_history: vec![StatusEntry {
                status: Status::Reported,
                timestamp: now,
                updated_by: reporter.to_string(),
            }],
            voters: Vec::new(),
            content_hash: String::new(),
            transaction_id: String::new(),
            resolution_images: Vec::new(),
            resolution_hash: None,
            resolution_transaction_id: None,
            verified_by: None,
            verified_at: None,
            resolved_at: None,
            created_at: now,
        };

        let hash = compute_content_hash(&complaint.content_payload());

        // Ledger first; no off-chain record exists until this confirms
        let receipt = self.ledger.submit_registration(&id, &hash).await?;

        complaint.content_hash = hash;
        complaint.transaction_id = receipt.transaction_id.clone();

        if let Err(e) = self.store.insert(&complaint).await {
            warn!(
                complaint_id = %id,
                tx = %receipt.transaction_id,
                error = %e,
                "Persistence failed after ledger registration; orphaned ledger entry left for audit"
            );
            return Err(e);
        }

        info!(complaint_id = %id, reporter = reporter, "Complaint created");
        Ok((complaint, receipt))
    }

    /// Move a complaint to `target`, ledger first, under its keyed lock
    pub async fn transition(
        &self,
        id: &str,
        target: Status,
        actor: &str,
    ) -> Result<(Complaint, TxReceipt)> {
        if actor.trim().is_empty() {
            return Err(Error::Validation("Actor ID is required".to_string()));
        }

        let _guard = self.locks.acquire(id).await;

        let mut complaint = self
            .store
            .find_by_id(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Complaint {} not found", id)))?;

        let receipt = self.ledger.submit_status_transition(id, target).await?;

        let now = bson::DateTime::now();
        complaint.status = target;
        complaint.status_history.push(StatusEntry {
            status: target,
            timestamp: now,
            updated_by: actor.to_string(),
        });
        if target == Status::Verified && complaint.verified_at.is_none() {
            complaint.verified_by = Some(actor.to_string());
            complaint.verified_at = Some(now);
        }

        if let Err(e) = self.store.replace(&complaint).await {
            warn!(
                complaint_id = id,
                tx = %receipt.transaction_id,
                error = %e,
                "Persistence failed after ledger transition; stores have diverged until next audit"
            );
            return Err(e);
        }

        info!(complaint_id = id, status = %target, actor = actor, "Status transition applied");
        Ok((complaint, receipt))
    }

    /// Terminal transition: anchor the resolution proof, then persist
    pub async fn resolve(
        &self,
        id: &str,
        resolution_images: Vec<String>,
        actor: &str,
    ) -> Result<(Complaint, TxReceipt)> {
        if actor.trim().is_empty() {
            return Err(Error::Validation("Actor ID is required".to_string()));
        }

        let _guard = self.locks.acquire(id).await;

        let mut complaint = self
            .store
            .find_by_id(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Complaint {} not found", id)))?;

        let now = bson::DateTime::now();
        let resolution_payload = json!({
            "complaintId": id,
            "resolutionImages": resolution_images,
            "resolvedAt": now.timestamp_millis(),
            "resolvedBy": actor,
        });
        let resolution_hash = compute_content_hash(&resolution_payload);

        let receipt = self.ledger.submit_resolution(id, &resolution_hash).await?;

        complaint.status = Status::Resolved;
        complaint.resolved_at = Some(now);
        complaint.resolution_images = resolution_images;
        complaint.resolution_hash = Some(resolution_hash);
        complaint.resolution_transaction_id = Some(receipt.transaction_id.clone());
        complaint.status_history.push(StatusEntry {
            status: Status::Resolved,
            timestamp: now,
            updated_by: actor.to_string(),
        });

        if let Err(e) = self.store.replace(&complaint).await {
            warn!(
                complaint_id = id,
                tx = %receipt.transaction_id,
                error = %e,
                "Persistence failed after ledger resolution; stores have diverged until next audit"
            );
            return Err(e);
        }

        info!(complaint_id = id, actor = actor, "Complaint resolved");
        Ok((complaint, receipt))
    }

    /// Remove the off-chain record only
    ///
    /// The ledger entry persists forever; the next reconciliation sweep will
    /// report this complaint as missing on chain. That is intentional.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let _guard = self.locks.acquire(id).await;

        if !self.store.delete(id).await? {
            return Err(Error::NotFound(format!("Complaint {} not found", id)));
        }
        warn!(
            complaint_id = id,
            "Off-chain record deleted; permanent ledger entry becomes a detectable anomaly"
        );
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Complaint> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Complaint {} not found", id)))
    }

    pub async fn list(&self, query: &ListQuery) -> Result<(Vec<Complaint>, u64)> {
        let complaints = self.store.list(query).await?;
        let total = self.store.count(&query.filter).await?;
        Ok((complaints, total))
    }

    pub async fn nearby(
        &self,
        longitude: f64,
        latitude: f64,
        max_distance_m: f64,
        limit: i64,
    ) -> Result<Vec<Complaint>> {
        validate_coordinates(longitude, latitude)?;
        self.store
            .find_nearby(longitude, latitude, max_distance_m, limit)
            .await
    }

    /// Recompute the content hash and compare it against the ledger's copy
    pub async fn check_integrity(&self, id: &str) -> Result<bool> {
        let complaint = self.get(id).await?;
        let hash = compute_content_hash(&complaint.content_payload());
        self.ledger.verify_integrity(id, &hash).await
    }

    /// Count matching a bare filter, for dashboards and health detail
    pub async fn count(&self, filter: &ComplaintFilter) -> Result<u64> {
        self.store.count(filter).await
    }
}

fn validate_new_complaint(input: &NewComplaint) -> Result<()> {
    if input.title.trim().is_empty() {
        return Err(Error::Validation("Title is required".to_string()));
    }
    if input.description.trim().is_empty() {
        return Err(Error::Validation("Description is required".to_string()));
    }
    if input.address.trim().is_empty() {
        return Err(Error::Validation("Address is required".to_string()));
    }
    validate_coordinates(input.longitude, input.latitude)
}

fn validate_coordinates(longitude: f64, latitude: f64) -> Result<()> {
    if !(-180.0..=180.0).contains(&longitude) || !longitude.is_finite() {
        return Err(Error::Validation(format!(
            "Longitude out of range: {}",
            longitude
        )));
    }
    if !(-90.0..=90.0).contains(&latitude) || !latitude.is_finite() {
        return Err(Error::Validation(format!(
            "Latitude out of range: {}",
            latitude
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> NewComplaint {
        NewComplaint {
            title: "Pothole on 5th Ave".to_string(),
            description: "Deep pothole near the crossing".to_string(),
            category: "pothole".to_string(),
            longitude: 77.59,
            latitude: 12.97,
            address: "5th Ave".to_string(),
            images: vec![],
        }
    }

    #[test]
    fn test_validation_rejects_blank_title() {
        let mut bad = input();
        bad.title = "   ".to_string();
        assert!(matches!(
            validate_new_complaint(&bad).unwrap_err(),
            Error::Validation(_)
        ));
    }

    #[test]
    fn test_validation_rejects_out_of_range_coordinates() {
        let mut bad = input();
        bad.latitude = 123.0;
        assert!(validate_new_complaint(&bad).is_err());

        let mut bad = input();
        bad.longitude = -200.0;
        assert!(validate_new_complaint(&bad).is_err());
    }

    #[test]
    fn test_validation_accepts_good_input() {
        assert!(validate_new_complaint(&input()).is_ok());
    }
}
