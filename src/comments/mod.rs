//! Complaint comment threads
//!
//! Pure off-chain: comments never touch the ledger. Text is trimmed and
//! capped; posting requires the complaint to exist, listing does not (an
//! unknown complaint simply has an empty thread).

use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::model::{Comment, MAX_COMMENT_LEN};
use crate::store::{CommentStore, ComplaintStore};
use crate::types::{Error, Result};

pub struct CommentEngine {
    complaints: Arc<dyn ComplaintStore>,
    store: Arc<dyn CommentStore>,
}

impl CommentEngine {
    pub fn new(complaints: Arc<dyn ComplaintStore>, store: Arc<dyn CommentStore>) -> Self {
        Self { complaints, store }
    }

    /// Append a comment to a complaint's thread
    pub async fn add(&self, complaint_id: &str, user: &str, text: &str) -> Result<Comment> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::Validation("Comment text is required".to_string()));
        }
        if text.chars().count() > MAX_COMMENT_LEN {
            return Err(Error::Validation(format!(
                "Comment text exceeds {} characters",
                MAX_COMMENT_LEN
            )));
        }

        if self.complaints.find_by_id(complaint_id).await?.is_none() {
            return Err(Error::NotFound(format!(
                "Complaint {} not found",
                complaint_id
            )));
        }

        let comment = Comment {
            id: Uuid::new_v4().to_string(),
            complaint_id: complaint_id.to_string(),
            user: user.to_string(),
            text: text.to_string(),
            created_at: bson::DateTime::now(),
        };
        self.store.insert(&comment).await?;

        debug!(complaint_id = complaint_id, user = user, "Comment added");
        Ok(comment)
    }

    /// A complaint's thread, oldest first
    pub async fn list(&self, complaint_id: &str) -> Result<Vec<Comment>> {
        self.store.list_for_complaint(complaint_id).await
    }
}
