//! Off-chain store capability interface
//!
//! The core treats the mutable, queryable primary store as a capability, not
//! a specific product: MongoDB in production, in-memory in dev mode and tests.

pub mod memory;
pub mod mongo;

use async_trait::async_trait;

use crate::model::{Comment, Complaint};
use crate::types::Result;

pub use memory::{MemoryCommentStore, MemoryComplaintStore};
pub use mongo::{MongoCommentStore, MongoComplaintStore};

/// Filter for list/count queries
#[derive(Debug, Clone, Default)]
pub struct ComplaintFilter {
    pub status: Option<crate::model::Status>,
    pub category: Option<crate::model::Category>,
    /// Case-insensitive substring match across title, description and address
    pub search: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    CreatedAt,
    Title,
}

impl SortField {
    pub fn parse(s: &str) -> Self {
        match s {
            "title" => SortField::Title,
            _ => SortField::CreatedAt,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn parse(s: &str) -> Self {
        match s {
            "asc" => SortOrder::Asc,
            _ => SortOrder::Desc,
        }
    }
}

/// Paginated list query
#[derive(Debug, Clone)]
pub struct ListQuery {
    pub filter: ComplaintFilter,
    pub sort_by: SortField,
    pub order: SortOrder,
    /// 1-based page number
    pub page: u64,
    pub limit: i64,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            filter: ComplaintFilter::default(),
            sort_by: SortField::CreatedAt,
            order: SortOrder::Desc,
            page: 1,
            limit: 20,
        }
    }
}

impl ListQuery {
    pub fn skip(&self) -> u64 {
        self.page.saturating_sub(1) * self.limit.max(0) as u64
    }
}

/// Operations the core needs from the off-chain store
///
/// Only the lifecycle manager and the vote engine mutate through this
/// interface; the auditor reads IDs only.
#[async_trait]
pub trait ComplaintStore: Send + Sync {
    /// Insert a freshly created complaint; the ID must be new
    async fn insert(&self, complaint: &Complaint) -> Result<()>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Complaint>>;

    /// Filtered, sorted, paginated listing
    async fn list(&self, query: &ListQuery) -> Result<Vec<Complaint>>;

    async fn count(&self, filter: &ComplaintFilter) -> Result<u64>;

    /// Nearest complaints within `max_distance_m` meters of the point
    async fn find_nearby(
        &self,
        longitude: f64,
        latitude: f64,
        max_distance_m: f64,
        limit: i64,
    ) -> Result<Vec<Complaint>>;

    /// Replace the stored document for an existing complaint
    async fn replace(&self, complaint: &Complaint) -> Result<()>;

    /// Atomic update of the voters field only
    async fn set_voters(&self, id: &str, voters: &[String]) -> Result<()>;

    /// Hard delete; returns whether a record was removed. The ledger entry
    /// persists forever, so this is a deliberate anomaly source.
    async fn delete(&self, id: &str) -> Result<bool>;

    /// All complaint IDs, for the reconciliation sweep
    async fn all_ids(&self) -> Result<Vec<String>>;
}

/// Storage for complaint comments; append and list only
#[async_trait]
pub trait CommentStore: Send + Sync {
    async fn insert(&self, comment: &Comment) -> Result<()>;

    /// All comments on a complaint, oldest first
    async fn list_for_complaint(&self, complaint_id: &str) -> Result<Vec<Comment>>;
}
