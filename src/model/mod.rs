//! Complaint data model
//!
//! `Complaint` is the stored document shape. `votes` and `impact_score` are
//! deliberately not fields: they are derived from `voters` and `created_at`
//! so the stored record can never drift from the ground truth.

use bson::{doc, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::db::IntoIndexes;
use crate::types::{Error, Result};

pub const MS_PER_DAY: i64 = 86_400_000;

/// Complaint lifecycle status
///
/// Ledger status codes are fixed: Reported=0, Verified=1, InProgress=2,
/// Resolved=3. Transition ordering is permissive at the API level; any
/// authorized actor may request any of the four targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Reported,
    Verified,
    InProgress,
    Resolved,
}

impl Status {
    /// On-ledger status code
    pub fn code(&self) -> u8 {
        match self {
            Status::Reported => 0,
            Status::Verified => 1,
            Status::InProgress => 2,
            Status::Resolved => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Reported => "Reported",
            Status::Verified => "Verified",
            Status::InProgress => "InProgress",
            Status::Resolved => "Resolved",
        }
    }

    /// Parse a status name, rejecting anything outside the four valid values
    ///
    /// Case-insensitive; "in_progress" is accepted alongside "InProgress".
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "reported" => Ok(Status::Reported),
            "verified" => Ok(Status::Verified),
            "inprogress" | "in_progress" => Ok(Status::InProgress),
            "resolved" => Ok(Status::Resolved),
            _ => Err(Error::Validation(format!("Invalid status '{}'", s))),
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Complaint category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Pothole,
    Garbage,
    WaterLeakage,
    Streetlight,
    Drainage,
    RoadDamage,
    Other,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Pothole,
        Category::Garbage,
        Category::WaterLeakage,
        Category::Streetlight,
        Category::Drainage,
        Category::RoadDamage,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Pothole => "pothole",
            Category::Garbage => "garbage",
            Category::WaterLeakage => "water_leakage",
            Category::Streetlight => "streetlight",
            Category::Drainage => "drainage",
            Category::RoadDamage => "road_damage",
            Category::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| Error::Validation(format!("Invalid category '{}'", s)))
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// GeoJSON point plus a free-text address, indexed 2dsphere in MongoDB
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoLocation {
    /// Always "Point"
    #[serde(rename = "type", default = "point_type")]
    pub kind: String,
    /// [longitude, latitude]
    pub coordinates: [f64; 2],
    pub address: String,
}

fn point_type() -> String {
    "Point".to_string()
}

impl GeoLocation {
    pub fn new(longitude: f64, latitude: f64, address: impl Into<String>) -> Self {
        Self {
            kind: point_type(),
            coordinates: [longitude, latitude],
            address: address.into(),
        }
    }

    pub fn longitude(&self) -> f64 {
        self.coordinates[0]
    }

    pub fn latitude(&self) -> f64 {
        self.coordinates[1]
    }
}

/// One accepted transition, appended per status change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusEntry {
    pub status: Status,
    pub timestamp: bson::DateTime,
    pub updated_by: String,
}

/// The central entity: a citizen-filed civic issue report
///
/// Exists off-chain iff its creation was already confirmed on the ledger.
/// Content fields are immutable after creation; lifecycle fields change only
/// through the lifecycle manager, voters only through the vote engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Complaint {
    /// Opaque unique ID, assigned at creation
    #[serde(rename = "_id")]
    pub id: String,

    pub title: String,
    pub description: String,
    pub category: Category,
    pub location: GeoLocation,
    #[serde(default)]
    pub images: Vec<String>,
    pub reporter: String,

    pub status: Status,
    /// Append-only; first entry is always Reported at creation time
    pub status_history: Vec<StatusEntry>,

    /// Set of user IDs; a user appears at most once
    #[serde(default)]
    pub voters: Vec<String>,

    /// Ledger linkage, populated together at creation
    pub content_hash: String,
    pub transaction_id: String,

    /// Ledger linkage, populated together at resolution
    #[serde(default)]
    pub resolution_images: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution_transaction_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<bson::DateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<bson::DateTime>,

    pub created_at: bson::DateTime,
}

impl Complaint {
    /// Vote count, always the cardinality of `voters`
    pub fn votes(&self) -> usize {
        self.voters.len()
    }

    /// Whole days the complaint has been pending as of `now`
    pub fn days_pending(&self, now: bson::DateTime) -> i64 {
        let elapsed_ms = now.timestamp_millis() - self.created_at.timestamp_millis();
        if elapsed_ms <= 0 {
            return 0;
        }
        elapsed_ms / MS_PER_DAY
    }

    /// Derived priority metric: `votes * (days_pending + 1)`
    ///
    /// Recomputed lazily on read; never persisted as ground truth.
    pub fn impact_score(&self, now: bson::DateTime) -> i64 {
        self.votes() as i64 * (self.days_pending(now) + 1)
    }

    /// Canonical payload over the immutable content fields
    ///
    /// This is the input to the ledger content hash and to later integrity
    /// verification, so it must reproduce the same value for the same logical
    /// content regardless of field insertion order.
    pub fn content_payload(&self) -> serde_json::Value {
        json!({
            "title": self.title,
            "description": self.description,
            "category": self.category.as_str(),
            "location": {
                "type": self.location.kind,
                "coordinates": self.location.coordinates,
            },
            "address": self.location.address,
        })
    }
}

impl IntoIndexes for Complaint {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (doc! { "location": "2dsphere" }, None),
            (doc! { "status": 1 }, None),
            (doc! { "category": 1 }, None),
            (doc! { "created_at": -1 }, None),
        ]
    }
}

/// Longest accepted comment text, matching the stored field limit
pub const MAX_COMMENT_LEN: usize = 1000;

/// A public remark attached to a complaint
///
/// Pure off-chain discussion: comments are append-only through the API and
/// have no ledger footprint, so deleting a complaint orphans nothing on chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    #[serde(rename = "_id")]
    pub id: String,
    pub complaint_id: String,
    pub user: String,
    /// Trimmed, at most `MAX_COMMENT_LEN` characters
    pub text: String,
    pub created_at: bson::DateTime,
}

impl IntoIndexes for Comment {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(doc! { "complaint_id": 1, "created_at": -1 }, None)]
    }
}

/// API view of a comment with an RFC 3339 timestamp
#[derive(Debug, Clone, Serialize)]
pub struct CommentView {
    pub id: String,
    pub complaint_id: String,
    pub user: String,
    pub text: String,
    pub created_at: String,
}

impl CommentView {
    pub fn from_comment(c: &Comment) -> Self {
        Self {
            id: c.id.clone(),
            complaint_id: c.complaint_id.clone(),
            user: c.user.clone(),
            text: c.text.clone(),
            created_at: rfc3339(c.created_at),
        }
    }
}

/// Input for filing a new complaint; everything here is immutable afterwards
#[derive(Debug, Clone, Deserialize)]
pub struct NewComplaint {
    pub title: String,
    pub description: String,
    pub category: String,
    pub longitude: f64,
    pub latitude: f64,
    pub address: String,
    #[serde(default)]
    pub images: Vec<String>,
}

/// A divergence between the two stores, found by the reconciliation auditor
///
/// Ephemeral: regenerated on each audit run, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnomalyRecord {
    pub complaint_id: String,
    pub kind: AnomalyKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    /// Off-chain record with no corresponding ledger entry
    MissingOnChain,
}

/// API view of a complaint: adds the derived fields and RFC 3339 timestamps
#[derive(Debug, Clone, Serialize)]
pub struct ComplaintView {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub location: GeoLocation,
    pub images: Vec<String>,
    pub reporter: String,
    pub status: Status,
    pub status_history: Vec<StatusEntryView>,
    pub votes: usize,
    pub impact_score: i64,
    pub content_hash: String,
    pub transaction_id: String,
    pub resolution_images: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution_transaction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusEntryView {
    pub status: Status,
    pub timestamp: String,
    pub updated_by: String,
}

impl ComplaintView {
    /// Build the view, recomputing the derived fields as of `now`
    pub fn from_complaint(c: &Complaint, now: bson::DateTime) -> Self {
        Self {
            id: c.id.clone(),
            title: c.title.clone(),
            description: c.description.clone(),
            category: c.category,
            location: c.location.clone(),
            images: c.images.clone(),
            reporter: c.reporter.clone(),
            status: c.status,
            status_history: c
                .status_history
                .iter()
                .map(|e| StatusEntryView {
                    status: e.status,
                    timestamp: rfc3339(e.timestamp),
                    updated_by: e.updated_by.clone(),
                })
                .collect(),
            votes: c.votes(),
            impact_score: c.impact_score(now),
            content_hash: c.content_hash.clone(),
            transaction_id: c.transaction_id.clone(),
            resolution_images: c.resolution_images.clone(),
            resolution_hash: c.resolution_hash.clone(),
            resolution_transaction_id: c.resolution_transaction_id.clone(),
            verified_by: c.verified_by.clone(),
            verified_at: c.verified_at.map(rfc3339),
            resolved_at: c.resolved_at.map(rfc3339),
            created_at: rfc3339(c.created_at),
        }
    }
}

fn rfc3339(dt: bson::DateTime) -> String {
    dt.try_to_rfc3339_string()
        .unwrap_or_else(|_| dt.timestamp_millis().to_string())
}
