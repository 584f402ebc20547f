//! Text similarity and draft scoring
//!
//! Local implementation of the narrow scoring interface: word-set similarity
//! in [0, 1], keyword-based category/severity suggestion, and duplicate
//! detection for draft reports. Pure UX assistance; no consistency
//! requirements anywhere in here.

use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

use crate::model::Category;
use crate::store::{ComplaintStore, ListQuery, SortField, SortOrder};
use crate::types::Result;

/// Jaccard similarity over lowercase words longer than two characters
pub fn similarity(text_a: &str, text_b: &str) -> f64 {
    let words_a = word_set(text_a);
    let words_b = word_set(text_b);
    if words_a.is_empty() && words_b.is_empty() {
        return 0.0;
    }

    let intersection = words_a.intersection(&words_b).count();
    let union = words_a.union(&words_b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

fn word_set(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split_whitespace()
        .filter(|w| w.len() > 2)
        .map(|w| w.to_string())
        .collect()
}

const CATEGORY_KEYWORDS: &[(Category, &[&str])] = &[
    (
        Category::Pothole,
        &["pothole", "pot hole", "hole in road", "crater", "ditch", "bump", "uneven road"],
    ),
    (
        Category::Garbage,
        &["garbage", "trash", "waste", "litter", "dump", "rubbish", "dustbin", "rotting"],
    ),
    (
        Category::WaterLeakage,
        &["water leak", "leakage", "pipe burst", "flooding", "waterlog", "sewage", "leaking"],
    ),
    (
        Category::Streetlight,
        &["streetlight", "street light", "lamp", "bulb", "no light", "broken light", "flickering"],
    ),
    (
        Category::Drainage,
        &["drain", "drainage", "sewer", "gutter", "clogged", "blocked", "manhole", "stagnant water"],
    ),
    (
        Category::RoadDamage,
        &["road damage", "broken road", "crack", "road repair", "footpath", "speed breaker", "sinkhole"],
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

const SEVERITY_KEYWORDS: &[(Severity, f64, &[&str])] = &[
    (
        Severity::Critical,
        10.0,
        &["urgent", "emergency", "danger", "accident", "collapse", "flood", "fire", "injury"],
    ),
    (
        Severity::High,
        7.0,
        &["major", "severe", "big", "large", "deep", "massive", "children", "school", "daily"],
    ),
    (
        Severity::Medium,
        4.0,
        &["moderate", "growing", "several", "frequent", "problem", "issue"],
    ),
    (
        Severity::Low,
        2.0,
        &["minor", "small", "slight", "cosmetic", "occasional", "rare"],
    ),
];

/// Category/severity suggestion for a draft report
#[derive(Debug, Clone, Serialize)]
pub struct Suggestion {
    pub category: Category,
    /// 0-100
    pub confidence: u32,
    pub all_suggestions: Vec<CategoryScore>,
    pub severity: Severity,
    pub severity_score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryScore {
    pub category: Category,
    pub score: u32,
}

/// Suggest a category and severity from the draft text
///
/// Keyword scores weigh multi-word phrases higher; defaults to Other/Medium
/// when nothing matches.
pub fn suggest(title: &str, description: &str) -> Suggestion {
    let text = format!("{} {}", title, description).to_lowercase();

    let mut scores: Vec<CategoryScore> = Vec::new();
    let mut best = Category::Other;
    let mut best_score = 0u32;

    for (category, keywords) in CATEGORY_KEYWORDS {
        let mut score = 0u32;
        for keyword in *keywords {
            if text.contains(keyword) {
                score += keyword.split(' ').count() as u32;
            }
        }
        if score > 0 {
            scores.push(CategoryScore {
                category: *category,
                score,
            });
        }
        if score > best_score {
            best_score = score;
            best = *category;
        }
    }
    scores.sort_by(|a, b| b.score.cmp(&a.score));

    let mut total = 0.0;
    let mut hits = 0u32;
    for (_, weight, keywords) in SEVERITY_KEYWORDS {
        for keyword in *keywords {
            if text.contains(keyword) {
                total += weight;
                hits += 1;
            }
        }
    }
    let severity_score = if hits > 0 { total / hits as f64 } else { 4.0 };
    let severity = if severity_score >= 8.0 {
        Severity::Critical
    } else if severity_score >= 6.0 {
        Severity::High
    } else if severity_score >= 3.0 {
        Severity::Medium
    } else {
        Severity::Low
    };

    Suggestion {
        category: best,
        confidence: ((best_score as f64 / 3.0) * 100.0).min(100.0) as u32,
        all_suggestions: scores,
        severity,
        severity_score,
    }
}

/// A recent complaint scored as a likely duplicate of a draft
#[derive(Debug, Clone, Serialize)]
pub struct DuplicateMatch {
    pub complaint_id: String,
    pub title: String,
    pub score: f64,
}

/// Duplicate detection over recent complaints
pub struct SimilarityEngine {
    /// Matches below this score are not reported
    pub threshold: f64,
    /// How many recent complaints to compare against
    pub recent_limit: i64,
}

impl Default for SimilarityEngine {
    fn default() -> Self {
        Self {
            threshold: 0.4,
            recent_limit: 100,
        }
    }
}

impl SimilarityEngine {
    /// Score a draft against the most recent complaints, best match first
    pub async fn find_duplicates(
        &self,
        store: &Arc<dyn ComplaintStore>,
        title: &str,
        description: &str,
    ) -> Result<Vec<DuplicateMatch>> {
        let draft = format!("{} {}", title, description);

        let query = ListQuery {
            sort_by: SortField::CreatedAt,
            order: SortOrder::Desc,
            page: 1,
            limit: self.recent_limit,
            ..Default::default()
        };
        let recent = store.list(&query).await?;

        let mut matches: Vec<DuplicateMatch> = recent
            .into_iter()
            .filter_map(|c| {
                let existing = format!("{} {}", c.title, c.description);
                let score = similarity(&draft, &existing);
                if score >= self.threshold {
                    Some(DuplicateMatch {
                        complaint_id: c.id,
                        title: c.title,
                        score,
                    })
                } else {
                    None
                }
            })
            .collect();

        matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Complaint, GeoLocation, Status, StatusEntry};
    use crate::store::MemoryComplaintStore;

    #[test]
    fn test_similarity_identical_texts() {
        let score = similarity("deep pothole near crossing", "deep pothole near crossing");
        assert!((score - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_similarity_disjoint_texts() {
        assert_eq!(similarity("garbage pile rotting", "flickering lamp bulb"), 0.0);
    }

    #[test]
    fn test_similarity_empty_inputs() {
        assert_eq!(similarity("", ""), 0.0);
        assert_eq!(similarity("pothole", ""), 0.0);
    }

    #[test]
    fn test_similarity_is_symmetric_and_bounded() {
        let a = "deep pothole on the main road";
        let b = "pothole near the main crossing";
        let ab = similarity(a, b);
        assert_eq!(ab, similarity(b, a));
        assert!(ab > 0.0 && ab < 1.0);
    }

    #[test]
    fn test_suggest_detects_pothole() {
        let s = suggest("Pothole on 5th Ave", "Deep crater in the road, very dangerous");
        assert_eq!(s.category, Category::Pothole);
        assert!(s.confidence > 0);
    }

    #[test]
    fn test_suggest_defaults_to_other() {
        let s = suggest("Something odd", "Completely unrelated text");
        assert_eq!(s.category, Category::Other);
        assert_eq!(s.confidence, 0);
        assert_eq!(s.severity, Severity::Medium);
    }

    #[test]
    fn test_suggest_severity_escalates() {
        let s = suggest("Urgent", "Emergency danger of collapse, accident waiting");
        assert_eq!(s.severity, Severity::Critical);
    }

    fn stored(id: &str, title: &str, description: &str) -> Complaint {
        let now = bson::DateTime::now();
        Complaint {
            id: id.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            category: Category::Pothole,
            location: GeoLocation::new(0.0, 0.0, "somewhere"),
            images: vec![],
            reporter: "user-1".to_string(),
            status: Status::Reported,
            status_history: vec![StatusEntry {
                status: Status::Reported,
                timestamp: now,
                updated_by: "user-1".to_string(),
            }],
            voters: vec![],
            content_hash: "hash".to_string(),
            transaction_id: "tx".to_string(),
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
    async fn test_find_duplicates_surfaces_only_close_matches() {
        let store = Arc::new(MemoryComplaintStore::new());
        store
            .insert(&stored(
                "c-1",
                "Deep pothole near main crossing",
                "Large deep pothole near the main pedestrian crossing",
            ))
            .await
            .unwrap();
        store
            .insert(&stored(
                "c-2",
                "Streetlight flickering",
                "Lamp keeps flickering all night",
            ))
            .await
            .unwrap();

        let engine = SimilarityEngine::default();
        let dyn_store: Arc<dyn ComplaintStore> = store;
        let matches = engine
            .find_duplicates(
                &dyn_store,
                "Deep pothole near the crossing",
                "There is a large deep pothole near the main crossing",
            )
            .await
            .unwrap();

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].complaint_id, "c-1");
        assert!(matches[0].score >= engine.threshold);
    }
}
