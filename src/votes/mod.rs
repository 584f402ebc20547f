//! Vote and impact-score engine
//!
//! Pure off-chain: no ledger interaction. Toggles are serialized per
//! complaint, which also covers the required per-(complaint, user) scope, so
//! a racing double-click from the same user never double-applies.

use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::lifecycle::KeyedLocks;
use crate::store::ComplaintStore;
use crate::types::{Error, Result};

/// Result of a vote toggle
#[derive(Debug, Clone, Serialize)]
pub struct VoteOutcome {
    /// Whether the user is a voter after the toggle
    pub voted: bool,
    pub votes: usize,
    pub impact_score: i64,
}

pub struct VoteEngine {
    store: Arc<dyn ComplaintStore>,
    /// Shared with the lifecycle manager: a toggle must not interleave with
    /// a transition's ledger-then-persist sequence on the same complaint,
    /// or the transition's full-document write would erase the vote.
    locks: KeyedLocks,
}

impl VoteEngine {
    pub fn new(store: Arc<dyn ComplaintStore>, locks: KeyedLocks) -> Self {
        Self { store, locks }
    }

    /// Toggle `user_id`'s vote on a complaint
    ///
    /// Membership toggle on the voters set: present removes, absent adds.
    /// The count is always the set cardinality and the impact score is
    /// recomputed from it, never stored.
    pub async fn toggle(&self, complaint_id: &str, user_id: &str) -> Result<VoteOutcome> {
        if user_id.trim().is_empty() {
            return Err(Error::Validation("User ID is required".to_string()));
        }

        let _guard = self.locks.acquire(complaint_id).await;

        let complaint = self
            .store
            .find_by_id(complaint_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Complaint {} not found", complaint_id)))?;

        let mut voters = complaint.voters.clone();
        let voted = if let Some(pos) = voters.iter().position(|v| v == user_id) {
            voters.remove(pos);
            false
        } else {
            voters.push(user_id.to_string());
            true
        };

        self.store.set_voters(complaint_id, &voters).await?;

        let mut updated = complaint;
        updated.voters = voters;
        let now = bson::DateTime::now();

        debug!(
            complaint_id = complaint_id,
            user_id = user_id,
            voted = voted,
            votes = updated.votes(),
            "Vote toggled"
        );

        Ok(VoteOutcome {
            voted,
            votes: updated.votes(),
            impact_score: updated.impact_score(now),
        })
    }
}
