//! In-memory complaint store
//!
//! Backs dev mode (no MongoDB required) and the test suite. Semantics match
//! the MongoDB implementation for everything the core relies on.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{CommentStore, ComplaintFilter, ComplaintStore, ListQuery, SortField, SortOrder};
use crate::model::{Comment, Complaint};
use crate::types::{Error, Result};

#[derive(Default)]
pub struct MemoryComplaintStore {
    complaints: RwLock<HashMap<String, Complaint>>,
}

impl MemoryComplaintStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn matches(complaint: &Complaint, filter: &ComplaintFilter) -> bool {
        if let Some(status) = filter.status {
            if complaint.status != status {
                return false;
            }
        }
        if let Some(category) = filter.category {
            if complaint.category != category {
                return false;
            }
        }
        if let Some(ref search) = filter.search {
            let needle = search.to_lowercase();
            let haystacks = [
                complaint.title.to_lowercase(),
                complaint.description.to_lowercase(),
                complaint.location.address.to_lowercase(),
            ];
            if !haystacks.iter().any(|h| h.contains(&needle)) {
                return false;
            }
        }
        true
    }
}

#[async_trait]
impl ComplaintStore for MemoryComplaintStore {
    async fn insert(&self, complaint: &Complaint) -> Result<()> {
        let mut complaints = self.complaints.write().await;
        if complaints.contains_key(&complaint.id) {
            return Err(Error::Database(format!(
                "Duplicate complaint ID {}",
                complaint.id
            )));
        }
        complaints.insert(complaint.id.clone(), complaint.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Complaint>> {
        Ok(self.complaints.read().await.get(id).cloned())
    }

    async fn list(&self, query: &ListQuery) -> Result<Vec<Complaint>> {
        let complaints = self.complaints.read().await;
        let mut matched: Vec<Complaint> = complaints
            .values()
            .filter(|c| Self::matches(c, &query.filter))
            .cloned()
            .collect();

        matched.sort_by(|a, b| {
            let ord = match query.sort_by {
                SortField::CreatedAt => a.created_at.cmp(&b.created_at),
                SortField::Title => a.title.cmp(&b.title),
            };
            match query.order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });

        let skip = query.skip() as usize;
        let limit = query.limit.max(0) as usize;
        Ok(matched.into_iter().skip(skip).take(limit).collect())
    }

    async fn count(&self, filter: &ComplaintFilter) -> Result<u64> {
        let complaints = self.complaints.read().await;
        Ok(complaints
            .values()
            .filter(|c| Self::matches(c, filter))
            .count() as u64)
    }

    async fn find_nearby(
        &self,
        longitude: f64,
        latitude: f64,
        max_distance_m: f64,
        limit: i64,
    ) -> Result<Vec<Complaint>> {
        let complaints = self.complaints.read().await;
        let mut with_distance: Vec<(f64, Complaint)> = complaints
            .values()
            .map(|c| {
                (
                    haversine_m(
                        latitude,
                        longitude,
                        c.location.latitude(),
                        c.location.longitude(),
                    ),
                    c.clone(),
                )
            })
            .filter(|(d, _)| *d <= max_distance_m)
            .collect();

        with_distance.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        Ok(with_distance
            .into_iter()
            .take(limit.max(0) as usize)
            .map(|(_, c)| c)
            .collect())
    }

    async fn replace(&self, complaint: &Complaint) -> Result<()> {
        let mut complaints = self.complaints.write().await;
        match complaints.get_mut(&complaint.id) {
            Some(existing) => {
                *existing = complaint.clone();
                Ok(())
            }
            None => Err(Error::NotFound(format!(
                "Complaint {} not found",
                complaint.id
            ))),
        }
    }

    async fn set_voters(&self, id: &str, voters: &[String]) -> Result<()> {
        let mut complaints = self.complaints.write().await;
        match complaints.get_mut(id) {
            Some(existing) => {
                existing.voters = voters.to_vec();
                Ok(())
            }
            None => Err(Error::NotFound(format!("Complaint {} not found", id))),
        }
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.complaints.write().await.remove(id).is_some())
    }

    async fn all_ids(&self) -> Result<Vec<String>> {
        Ok(self.complaints.read().await.keys().cloned().collect())
    }
}

#[derive(Default)]
pub struct MemoryCommentStore {
    comments: RwLock<Vec<Comment>>,
}

impl MemoryCommentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CommentStore for MemoryCommentStore {
    async fn insert(&self, comment: &Comment) -> Result<()> {
        self.comments.write().await.push(comment.clone());
        Ok(())
    }

    async fn list_for_complaint(&self, complaint_id: &str) -> Result<Vec<Comment>> {
        let comments = self.comments.read().await;
        let mut matched: Vec<Comment> = comments
            .iter()
            .filter(|c| c.complaint_id == complaint_id)
            .cloned()
            .collect();
        matched.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(matched)
    }
}

/// Great-circle distance in meters
fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    const EARTH_RADIUS_M: f64 = 6_371_000.0;
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().asin()
}
