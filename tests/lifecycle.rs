//! End-to-end lifecycle tests over the in-memory store and a mock ledger
//!
//! Exercises the ledger-first protocol from the service layer: creation
//! atomicity, transition ordering, vote toggling, integrity checks, and the
//! reconciliation sweep.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

use civic_mirror::audit::ReconciliationAuditor;
use civic_mirror::comments::CommentEngine;
use civic_mirror::ledger::{LedgerClient, LedgerGateway, TxReceipt};
use civic_mirror::lifecycle::{KeyedLocks, LifecycleManager};
use civic_mirror::model::{
    AnomalyKind, Category, Complaint, GeoLocation, NewComplaint, Status, StatusEntry,
};
use civic_mirror::store::{ComplaintStore, ListQuery, MemoryCommentStore, MemoryComplaintStore};
use civic_mirror::types::{Error, Result};
use civic_mirror::votes::VoteEngine;

/// Pauses one status update mid-flight so a test can interleave other calls
struct StatusGate {
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

/// Mock ledger: tracks registered complaints and their hashes in memory
#[derive(Default)]
struct MockLedger {
    fail_register: AtomicBool,
    fail_status: AtomicBool,
    fail_resolve: AtomicBool,
    hashes: Mutex<HashMap<String, String>>,
    tx_counter: AtomicU64,
    status_gate: Mutex<Option<StatusGate>>,
}

impl MockLedger {
    fn next_receipt(&self) -> TxReceipt {
        let n = self.tx_counter.fetch_add(1, Ordering::SeqCst) + 1;
        TxReceipt {
            transaction_id: format!("0xtx{}", n),
            block_number: Some(99 + n),
        }
    }

    fn unavailable() -> Error {
        Error::LedgerUnavailable("mock ledger down".to_string())
    }

    /// Make the next status update signal `entered` and block until `release`
    fn hold_next_status_update(&self, entered: Arc<Notify>, release: Arc<Notify>) {
        *self.status_gate.lock().unwrap() = Some(StatusGate { entered, release });
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn register_complaint(&self, id: &str, hash: &str) -> Result<TxReceipt> {
        if self.fail_register.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        self.hashes
            .lock()
            .unwrap()
            .insert(id.to_string(), hash.to_string());
        Ok(self.next_receipt())
    }

    async fn update_complaint_status(&self, id: &str, _status_code: u8) -> Result<TxReceipt> {
        let gate = self.status_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        if self.fail_status.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        if !self.hashes.lock().unwrap().contains_key(id) {
            return Err(Error::LedgerUnavailable(format!("unknown complaint {}", id)));
        }
        Ok(self.next_receipt())
    }

    async fn resolve_complaint(&self, id: &str, _resolution_hash: &str) -> Result<TxReceipt> {
        if self.fail_resolve.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        if !self.hashes.lock().unwrap().contains_key(id) {
            return Err(Error::LedgerUnavailable(format!("unknown complaint {}", id)));
        }
        Ok(self.next_receipt())
    }

    async fn verify_complaint(&self, id: &str, hash: &str) -> Result<bool> {
        Ok(self
            .hashes
            .lock()
            .unwrap()
            .get(id)
            .map(|stored| stored == hash)
            .unwrap_or(false))
    }

    async fn complaint_exists(&self, id: &str) -> Result<bool> {
        Ok(self.hashes.lock().unwrap().contains_key(id))
    }

    async fn total_complaints(&self) -> Result<u64> {
        Ok(self.hashes.lock().unwrap().len() as u64)
    }

    async fn signer_balance(&self) -> Result<u128> {
        Ok(1_000_000)
    }

    async fn chain_id(&self) -> Result<u64> {
        Ok(1337)
    }
}

struct Harness {
    store: Arc<MemoryComplaintStore>,
    ledger_client: Arc<MockLedger>,
    lifecycle: Arc<LifecycleManager>,
    votes: Arc<VoteEngine>,
    comments: CommentEngine,
    auditor: ReconciliationAuditor,
}

fn harness() -> Harness {
    let store = Arc::new(MemoryComplaintStore::new());
    let ledger_client = Arc::new(MockLedger::default());
    let client: Arc<dyn LedgerClient> = ledger_client.clone();
    let gateway = Arc::new(LedgerGateway::new(client, Duration::from_secs(5)));
    let dyn_store: Arc<dyn ComplaintStore> = store.clone();
    // Same lock map for both engines, exactly as the server wires them
    let locks = KeyedLocks::new();

    Harness {
        lifecycle: Arc::new(LifecycleManager::new(
            dyn_store.clone(),
            gateway.clone(),
            locks.clone(),
        )),
        votes: Arc::new(VoteEngine::new(dyn_store.clone(), locks)),
        comments: CommentEngine::new(dyn_store.clone(), Arc::new(MemoryCommentStore::new())),
        auditor: ReconciliationAuditor::new(dyn_store, gateway, 4),
        store,
        ledger_client,
    }
}

fn pothole_input() -> NewComplaint {
    NewComplaint {
        title: "Pothole on 5th Ave".to_string(),
        description: "Deep pothole near the pedestrian crossing".to_string(),
        category: "pothole".to_string(),
        longitude: 77.59,
        latitude: 12.97,
        address: "5th Ave".to_string(),
        images: vec![],
    }
}

/// Off-chain record inserted without going through the ledger
fn rogue_complaint(id: &str) -> Complaint {
    let now = bson::DateTime::now();
    Complaint {
        id: id.to_string(),
        title: "Never registered".to_string(),
        description: "Inserted behind the gateway's back".to_string(),
        category: Category::Other,
        location: GeoLocation::new(0.0, 0.0, "nowhere"),
        images: vec![],
        reporter: "rogue".to_string(),
        status: Status::Reported,
        status_history: vec![StatusEntry {
            status: Status::Reported,
            timestamp: now,
            updated_by: "rogue".to_string(),
        }],
        voters: vec![],
        content_hash: "deadbeef".to_string(),
        transaction_id: "0xmissing".to_string(),
        resolution_images: vec![],
        resolution_hash: None,
        resolution_transaction_id: None,
        verified_by: None,
        verified_at: None,
        resolved_at: None,
        created_at: now,
    }
}

#[tokio::test]
async fn test_creation_is_ledger_first() {
    let h = harness();

    let (complaint, receipt) = h.lifecycle.create(pothole_input(), "citizen-1").await.unwrap();

    assert_eq!(complaint.status, Status::Reported);
    assert_eq!(complaint.status_history.len(), 1);
    assert!(!complaint.content_hash.is_empty());
    assert_eq!(complaint.transaction_id, receipt.transaction_id);

    // Both stores agree
    let stored = h.store.find_by_id(&complaint.id).await.unwrap().unwrap();
    assert_eq!(stored.content_hash, complaint.content_hash);
    assert!(h
        .ledger_client
        .complaint_exists(&complaint.id)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_failed_registration_leaves_store_untouched() {
    let h = harness();
    h.ledger_client.fail_register.store(true, Ordering::SeqCst);

    let err = h.lifecycle.create(pothole_input(), "citizen-1").await.unwrap_err();
    assert!(matches!(err, Error::LedgerUnavailable(_)));

    let (all, total) = h.lifecycle.list(&ListQuery::default()).await.unwrap();
    assert!(all.is_empty());
    assert_eq!(total, 0);
}

#[tokio::test]
async fn test_failed_transition_leaves_status_unchanged() {
    let h = harness();
    let (complaint, _) = h.lifecycle.create(pothole_input(), "citizen-1").await.unwrap();

    h.ledger_client.fail_status.store(true, Ordering::SeqCst);
    let err = h
        .lifecycle
        .transition(&complaint.id, Status::Verified, "admin-1")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::LedgerUnavailable(_)));

    let stored = h.store.find_by_id(&complaint.id).await.unwrap().unwrap();
    assert_eq!(stored.status, Status::Reported);
    assert_eq!(stored.status_history.len(), 1);

    // Retry after the ledger recovers succeeds
    h.ledger_client.fail_status.store(false, Ordering::SeqCst);
    let (updated, _) = h
        .lifecycle
        .transition(&complaint.id, Status::Verified, "admin-1")
        .await
        .unwrap();
    assert_eq!(updated.status, Status::Verified);
    assert_eq!(updated.status_history.len(), 2);
}

#[tokio::test]
async fn test_history_is_append_only() {
    let h = harness();
    let (complaint, _) = h.lifecycle.create(pothole_input(), "citizen-1").await.unwrap();

    h.lifecycle
        .transition(&complaint.id, Status::Verified, "admin-1")
        .await
        .unwrap();
    h.lifecycle
        .transition(&complaint.id, Status::InProgress, "admin-2")
        .await
        .unwrap();
    let (resolved, _) = h
        .lifecycle
        .resolve(&complaint.id, vec!["after.jpg".to_string()], "admin-2")
        .await
        .unwrap();

    let statuses: Vec<Status> = resolved.status_history.iter().map(|e| e.status).collect();
    assert_eq!(
        statuses,
        vec![
            Status::Reported,
            Status::Verified,
            Status::InProgress,
            Status::Resolved
        ]
    );
    // The original entry is still first and unchanged
    assert_eq!(resolved.status_history[0].updated_by, "citizen-1");
    assert_eq!(resolved.verified_by.as_deref(), Some("admin-1"));
    assert!(resolved.resolved_at.is_some());
    assert!(resolved.resolution_hash.is_some());
    assert!(resolved.resolution_transaction_id.is_some());
}

#[tokio::test]
async fn test_vote_toggle_and_impact() {
    let h = harness();
    let (complaint, _) = h.lifecycle.create(pothole_input(), "citizen-1").await.unwrap();

    let outcome = h.votes.toggle(&complaint.id, "citizen-2").await.unwrap();
    assert!(outcome.voted);
    assert_eq!(outcome.votes, 1);
    // Same-day complaint: impact = votes * (0 days + 1)
    assert_eq!(outcome.impact_score, 1);

    let outcome = h.votes.toggle(&complaint.id, "citizen-2").await.unwrap();
    assert!(!outcome.voted);
    assert_eq!(outcome.votes, 0);
    assert_eq!(outcome.impact_score, 0);
}

#[tokio::test]
async fn test_vote_during_transition_survives_the_persist() {
    let h = harness();
    let (complaint, _) = h.lifecycle.create(pothole_input(), "citizen-1").await.unwrap();

    // Freeze the transition inside its ledger confirmation wait
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    h.ledger_client
        .hold_next_status_update(entered.clone(), release.clone());

    let lifecycle = h.lifecycle.clone();
    let id = complaint.id.clone();
    let transition =
        tokio::spawn(async move { lifecycle.transition(&id, Status::Verified, "admin-1").await });

    entered.notified().await;

    // A vote lands while the transition holds the complaint's lock; it must
    // queue behind the transition instead of being clobbered by its persist
    let votes = h.votes.clone();
    let id = complaint.id.clone();
    let vote = tokio::spawn(async move { votes.toggle(&id, "citizen-2").await });
    tokio::task::yield_now().await;

    release.notify_one();

    let (updated, _) = transition.await.unwrap().unwrap();
    assert_eq!(updated.status, Status::Verified);
    let outcome = vote.await.unwrap().unwrap();
    assert!(outcome.voted);
    assert_eq!(outcome.votes, 1);

    // Both effects are in the stored record
    let stored = h.store.find_by_id(&complaint.id).await.unwrap().unwrap();
    assert_eq!(stored.status, Status::Verified);
    assert_eq!(stored.voters, vec!["citizen-2".to_string()]);
}

#[tokio::test]
async fn test_comment_thread_follows_complaint() {
    let h = harness();
    let (complaint, _) = h.lifecycle.create(pothole_input(), "citizen-1").await.unwrap();

    h.comments
        .add(&complaint.id, "citizen-2", "Same here, my bike hit it")
        .await
        .unwrap();
    h.comments
        .add(&complaint.id, "citizen-3", "Reported last month too")
        .await
        .unwrap();

    let thread = h.comments.list(&complaint.id).await.unwrap();
    assert_eq!(thread.len(), 2);
    assert_eq!(thread[0].user, "citizen-2");
    assert_eq!(thread[1].user, "citizen-3");

    // No thread without a complaint
    assert!(matches!(
        h.comments.add("ghost", "citizen-2", "hello").await.unwrap_err(),
        Error::NotFound(_)
    ));
}

#[tokio::test]
async fn test_integrity_detects_tampering() {
    let h = harness();
    let (complaint, _) = h.lifecycle.create(pothole_input(), "citizen-1").await.unwrap();

    assert!(h.lifecycle.check_integrity(&complaint.id).await.unwrap());

    // Tamper with the stored content behind the gateway's back
    let mut tampered = h.store.find_by_id(&complaint.id).await.unwrap().unwrap();
    tampered.title = "Nothing to see here".to_string();
    h.store.replace(&tampered).await.unwrap();

    assert!(!h.lifecycle.check_integrity(&complaint.id).await.unwrap());
}

#[tokio::test]
async fn test_audit_reports_missing_on_chain() {
    let h = harness();
    let (a, _) = h.lifecycle.create(pothole_input(), "citizen-1").await.unwrap();

    let mut second = pothole_input();
    second.title = "Streetlight out".to_string();
    second.category = "streetlight".to_string();
    let (b, _) = h.lifecycle.create(second, "citizen-2").await.unwrap();

    // Clean sweep first
    assert!(h.auditor.detect_anomalies().await.unwrap().is_empty());

    // A record the ledger never saw
    h.store.insert(&rogue_complaint("rogue-1")).await.unwrap();

    let anomalies = h.auditor.detect_anomalies().await.unwrap();
    assert_eq!(anomalies.len(), 1);
    assert_eq!(anomalies[0].complaint_id, "rogue-1");
    assert_eq!(anomalies[0].kind, AnomalyKind::MissingOnChain);
    assert_ne!(anomalies[0].complaint_id, a.id);
    assert_ne!(anomalies[0].complaint_id, b.id);
}

#[tokio::test]
async fn test_audit_reports_deleted_records_gone_from_store_only() {
    let h = harness();
    let (complaint, _) = h.lifecycle.create(pothole_input(), "citizen-1").await.unwrap();

    // Deleting removes the off-chain record; the ledger entry is permanent
    h.lifecycle.delete(&complaint.id).await.unwrap();
    assert!(h.store.find_by_id(&complaint.id).await.unwrap().is_none());
    assert!(h
        .ledger_client
        .complaint_exists(&complaint.id)
        .await
        .unwrap());

    // The sweep only covers off-chain records, so nothing to report
    assert!(h.auditor.detect_anomalies().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_full_lifecycle_scenario() {
    let h = harness();

    // File
    let (complaint, receipt) = h.lifecycle.create(pothole_input(), "citizen-1").await.unwrap();
    assert_eq!(complaint.status, Status::Reported);
    assert!(receipt.block_number.is_some());

    // Moderator verifies
    let (verified, _) = h
        .lifecycle
        .transition(&complaint.id, Status::Verified, "admin-1")
        .await
        .unwrap();
    assert_eq!(verified.status, Status::Verified);
    assert_eq!(verified.status_history.len(), 2);

    // A neighbor votes
    let outcome = h.votes.toggle(&complaint.id, "citizen-2").await.unwrap();
    assert_eq!(outcome.votes, 1);

    // Resolution attempt while the ledger is down changes nothing
    h.ledger_client.fail_resolve.store(true, Ordering::SeqCst);
    let err = h
        .lifecycle
        .resolve(&complaint.id, vec!["fixed.jpg".to_string()], "admin-1")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::LedgerUnavailable(_)));
    let stored = h.store.find_by_id(&complaint.id).await.unwrap().unwrap();
    assert_eq!(stored.status, Status::Verified);
    assert!(stored.resolution_hash.is_none());

    // Ledger recovers, the same call succeeds
    h.ledger_client.fail_resolve.store(false, Ordering::SeqCst);
    let (resolved, _) = h
        .lifecycle
        .resolve(&complaint.id, vec!["fixed.jpg".to_string()], "admin-1")
        .await
        .unwrap();
    assert_eq!(resolved.status, Status::Resolved);
    assert_eq!(resolved.resolution_images, vec!["fixed.jpg".to_string()]);

    // The content hash still matches what was anchored at creation
    assert!(h.lifecycle.check_integrity(&complaint.id).await.unwrap());
    assert!(h.auditor.detect_anomalies().await.unwrap().is_empty());
}
