//! MongoDB-backed complaint store

use async_trait::async_trait;
use bson::{doc, Document};
use futures::TryStreamExt;

use super::{CommentStore, ComplaintFilter, ComplaintStore, ListQuery, SortField, SortOrder};
use crate::db::{MongoClient, MongoCollection};
use crate::model::{Comment, Complaint};
use crate::types::{Error, Result};

const COLLECTION: &str = "complaints";
const COMMENT_COLLECTION: &str = "comments";

pub struct MongoComplaintStore {
    collection: MongoCollection<Complaint>,
}

impl MongoComplaintStore {
    /// Open the complaints collection and apply its indexes (2dsphere on
    /// location, plus status/category/created_at)
    pub async fn new(client: &MongoClient) -> Result<Self> {
        let collection = client.collection::<Complaint>(COLLECTION).await?;
        Ok(Self { collection })
    }

    fn filter_doc(filter: &ComplaintFilter) -> Result<Document> {
        let mut doc = Document::new();

        if let Some(status) = filter.status {
            doc.insert(
                "status",
                bson::to_bson(&status)
                    .map_err(|e| Error::Database(format!("Status encode failed: {}", e)))?,
            );
        }
        if let Some(category) = filter.category {
            doc.insert(
                "category",
                bson::to_bson(&category)
                    .map_err(|e| Error::Database(format!("Category encode failed: {}", e)))?,
            );
        }
        if let Some(ref search) = filter.search {
            let trimmed = search.trim();
            if !trimmed.is_empty() {
                let pattern = regex_escape(trimmed);
                let regex = bson::Regex {
                    pattern,
                    options: "i".to_string(),
                };
                doc.insert(
                    "$or",
                    vec![
                        doc! { "title": regex.clone() },
                        doc! { "description": regex.clone() },
                        doc! { "location.address": regex },
                    ],
                );
            }
        }

        Ok(doc)
    }

    fn sort_doc(query: &ListQuery) -> Document {
        let direction = match query.order {
            SortOrder::Asc => 1,
            SortOrder::Desc => -1,
        };
        match query.sort_by {
            SortField::CreatedAt => doc! { "created_at": direction },
            SortField::Title => doc! { "title": direction },
        }
    }
}

#[async_trait]
impl ComplaintStore for MongoComplaintStore {
    async fn insert(&self, complaint: &Complaint) -> Result<()> {
        self.collection
            .inner()
            .insert_one(complaint)
            .await
            .map_err(|e| Error::Database(format!("Insert failed: {}", e)))?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Complaint>> {
        self.collection
            .inner()
            .find_one(doc! { "_id": id })
            .await
            .map_err(|e| Error::Database(format!("Find failed: {}", e)))
    }

    async fn list(&self, query: &ListQuery) -> Result<Vec<Complaint>> {
        let filter = Self::filter_doc(&query.filter)?;

        let cursor = self
            .collection
            .inner()
            .find(filter)
            .sort(Self::sort_doc(query))
            .skip(query.skip())
            .limit(query.limit)
            .await
            .map_err(|e| Error::Database(format!("Find failed: {}", e)))?;

        cursor
            .try_collect()
            .await
            .map_err(|e| Error::Database(format!("Cursor read failed: {}", e)))
    }

    async fn count(&self, filter: &ComplaintFilter) -> Result<u64> {
        let filter = Self::filter_doc(filter)?;
        self.collection
            .inner()
            .count_documents(filter)
            .await
            .map_err(|e| Error::Database(format!("Count failed: {}", e)))
    }

    async fn find_nearby(
        &self,
        longitude: f64,
        latitude: f64,
        max_distance_m: f64,
        limit: i64,
    ) -> Result<Vec<Complaint>> {
        // $near sorts by distance and requires the 2dsphere index
        let filter = doc! {
            "location": {
                "$near": {
                    "$geometry": {
                        "type": "Point",
                        "coordinates": [longitude, latitude],
                    },
                    "$maxDistance": max_distance_m,
                }
            }
        };

        let cursor = self
            .collection
            .inner()
            .find(filter)
            .limit(limit)
            .await
            .map_err(|e| Error::Database(format!("Geo query failed: {}", e)))?;

        cursor
            .try_collect()
            .await
            .map_err(|e| Error::Database(format!("Cursor read failed: {}", e)))
    }

    async fn replace(&self, complaint: &Complaint) -> Result<()> {
        let result = self
            .collection
            .inner()
            .replace_one(doc! { "_id": &complaint.id }, complaint)
            .await
            .map_err(|e| Error::Database(format!("Replace failed: {}", e)))?;

        if result.matched_count == 0 {
            return Err(Error::NotFound(format!(
                "Complaint {} not found",
                complaint.id
            )));
        }
        Ok(())
    }

    async fn set_voters(&self, id: &str, voters: &[String]) -> Result<()> {
        let result = self
            .collection
            .inner()
            .update_one(
                doc! { "_id": id },
                doc! { "$set": { "voters": voters.to_vec() } },
            )
            .await
            .map_err(|e| Error::Database(format!("Voter update failed: {}", e)))?;

        if result.matched_count == 0 {
            return Err(Error::NotFound(format!("Complaint {} not found", id)));
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let result = self
            .collection
            .inner()
            .delete_one(doc! { "_id": id })
            .await
            .map_err(|e| Error::Database(format!("Delete failed: {}", e)))?;
        Ok(result.deleted_count > 0)
    }

    async fn all_ids(&self) -> Result<Vec<String>> {
        let values = self
            .collection
            .inner()
            .distinct("_id", Document::new())
            .await
            .map_err(|e| Error::Database(format!("ID enumeration failed: {}", e)))?;

        Ok(values
            .into_iter()
            .filter_map(|v| v.as_str().map(|s| s.to_string()))
            .collect())
    }
}

pub struct MongoCommentStore {
    collection: MongoCollection<Comment>,
}

impl MongoCommentStore {
    /// Open the comments collection and apply its compound index
    pub async fn new(client: &MongoClient) -> Result<Self> {
        let collection = client.collection::<Comment>(COMMENT_COLLECTION).await?;
        Ok(Self { collection })
    }
}

#[async_trait]
impl CommentStore for MongoCommentStore {
    async fn insert(&self, comment: &Comment) -> Result<()> {
        self.collection
            .inner()
            .insert_one(comment)
            .await
            .map_err(|e| Error::Database(format!("Comment insert failed: {}", e)))?;
        Ok(())
    }

    async fn list_for_complaint(&self, complaint_id: &str) -> Result<Vec<Comment>> {
        let cursor = self
            .collection
            .inner()
            .find(doc! { "complaint_id": complaint_id })
            .sort(doc! { "created_at": 1 })
            .await
            .map_err(|e| Error::Database(format!("Comment find failed: {}", e)))?;

        cursor
            .try_collect()
            .await
            .map_err(|e| Error::Database(format!("Cursor read failed: {}", e)))
    }
}

/// Escape regex metacharacters so user search input is matched literally
fn regex_escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if ".^$*+?()[]{}|\\".contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
