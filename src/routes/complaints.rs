//! Public complaint endpoints
//!
//! Thin HTTP layer: parse the request, call the lifecycle/vote services,
//! translate the result. All ledger-first semantics live in the services,
//! never here.

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;

use super::{error_response, json_response, parse_query_params, read_json, require_user_id};
use crate::model::{Category, CommentView, ComplaintView, NewComplaint, Status};
use crate::server::AppState;
use crate::store::{ComplaintFilter, ListQuery, SortField, SortOrder};
use crate::types::{Error, Result};

/// Response for a newly filed complaint
#[derive(Serialize)]
struct CreateResponse {
    complaint: ComplaintView,
    transaction_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    block_number: Option<u64>,
}

/// Paginated listing
#[derive(Serialize)]
struct ListResponse {
    complaints: Vec<ComplaintView>,
    total: u64,
    page: u64,
    limit: i64,
}

#[derive(Serialize)]
struct IntegrityResponse {
    complaint_id: String,
    intact: bool,
}

/// A complaint's comment thread
#[derive(Serialize)]
struct CommentListResponse {
    comments: Vec<CommentView>,
    count: usize,
}

#[derive(serde::Deserialize)]
struct CommentBody {
    text: String,
}

/// POST /api/v1/complaints
pub async fn handle_create(req: Request<Incoming>, state: Arc<AppState>) -> Response<Full<Bytes>> {
    let reporter = match require_user_id(&req) {
        Ok(id) => id,
        Err(e) => return error_response(&e),
    };
    let input: NewComplaint = match read_json(req).await {
        Ok(v) => v,
        Err(e) => return error_response(&e),
    };

    match state.lifecycle.create(input, &reporter).await {
        Ok((complaint, receipt)) => {
            let view = ComplaintView::from_complaint(&complaint, bson::DateTime::now());
            json_response(
                StatusCode::CREATED,
                &CreateResponse {
                    complaint: view,
                    transaction_id: receipt.transaction_id,
                    block_number: receipt.block_number,
                },
            )
        }
        Err(e) => error_response(&e),
    }
}

/// GET /api/v1/complaints
pub async fn handle_list(req: Request<Incoming>, state: Arc<AppState>) -> Response<Full<Bytes>> {
    let query = match parse_list_query(req.uri().query().unwrap_or("")) {
        Ok(q) => q,
        Err(e) => return error_response(&e),
    };

    match state.lifecycle.list(&query).await {
        Ok((complaints, total)) => {
            let now = bson::DateTime::now();
            let views: Vec<ComplaintView> = complaints
                .iter()
                .map(|c| ComplaintView::from_complaint(c, now))
                .collect();
            json_response(
                StatusCode::OK,
                &ListResponse {
                    complaints: views,
                    total,
                    page: query.page,
                    limit: query.limit,
                },
            )
        }
        Err(e) => error_response(&e),
    }
}

/// GET /api/v1/complaints/nearby
pub async fn handle_nearby(req: Request<Incoming>, state: Arc<AppState>) -> Response<Full<Bytes>> {
    let params = parse_query_params(req.uri().query().unwrap_or(""));

    let longitude = match require_f64(&params, "lng") {
        Ok(v) => v,
        Err(e) => return error_response(&e),
    };
    let latitude = match require_f64(&params, "lat") {
        Ok(v) => v,
        Err(e) => return error_response(&e),
    };
    let max_distance = params
        .get("max_distance")
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or(5000.0);
    let limit = params
        .get("limit")
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(50)
        .clamp(1, 200);

    match state
        .lifecycle
        .nearby(longitude, latitude, max_distance, limit)
        .await
    {
        Ok(complaints) => {
            let now = bson::DateTime::now();
            let views: Vec<ComplaintView> = complaints
                .iter()
                .map(|c| ComplaintView::from_complaint(c, now))
                .collect();
            json_response(StatusCode::OK, &views)
        }
        Err(e) => error_response(&e),
    }
}

/// GET /api/v1/complaints/{id}
pub async fn handle_get(state: Arc<AppState>, id: &str) -> Response<Full<Bytes>> {
    match state.lifecycle.get(id).await {
        Ok(complaint) => json_response(
            StatusCode::OK,
            &ComplaintView::from_complaint(&complaint, bson::DateTime::now()),
        ),
        Err(e) => error_response(&e),
    }
}

/// GET /api/v1/complaints/{id}/integrity
pub async fn handle_integrity(state: Arc<AppState>, id: &str) -> Response<Full<Bytes>> {
    match state.lifecycle.check_integrity(id).await {
        Ok(intact) => json_response(
            StatusCode::OK,
            &IntegrityResponse {
                complaint_id: id.to_string(),
                intact,
            },
        ),
        Err(e) => error_response(&e),
    }
}

/// POST /api/v1/complaints/{id}/vote
pub async fn handle_vote(
    req: Request<Incoming>,
    state: Arc<AppState>,
    id: &str,
) -> Response<Full<Bytes>> {
    let user = match require_user_id(&req) {
        Ok(u) => u,
        Err(e) => return error_response(&e),
    };

    match state.votes.toggle(id, &user).await {
        Ok(outcome) => json_response(StatusCode::OK, &outcome),
        Err(e) => error_response(&e),
    }
}

/// GET /api/v1/complaints/{id}/comments
pub async fn handle_comments_list(state: Arc<AppState>, id: &str) -> Response<Full<Bytes>> {
    match state.comments.list(id).await {
        Ok(comments) => {
            let views: Vec<CommentView> = comments.iter().map(CommentView::from_comment).collect();
            json_response(
                StatusCode::OK,
                &CommentListResponse {
                    count: views.len(),
                    comments: views,
                },
            )
        }
        Err(e) => error_response(&e),
    }
}

/// POST /api/v1/complaints/{id}/comments
pub async fn handle_comment_add(
    req: Request<Incoming>,
    state: Arc<AppState>,
    id: &str,
) -> Response<Full<Bytes>> {
    let user = match require_user_id(&req) {
        Ok(u) => u,
        Err(e) => return error_response(&e),
    };
    let body: CommentBody = match read_json(req).await {
        Ok(b) => b,
        Err(e) => return error_response(&e),
    };

    match state.comments.add(id, &user, &body.text).await {
        Ok(comment) => json_response(StatusCode::CREATED, &CommentView::from_comment(&comment)),
        Err(e) => error_response(&e),
    }
}

fn require_f64(
    params: &std::collections::HashMap<String, String>,
    key: &str,
) -> Result<f64> {
    params
        .get(key)
        .and_then(|v| v.parse::<f64>().ok())
        .ok_or_else(|| Error::Validation(format!("Query parameter '{}' must be a number", key)))
}

/// Build a ListQuery from raw query parameters
///
/// Unknown status/category values are a 400, not silently ignored; unknown
/// sort fields fall back to created_at like the store does.
fn parse_list_query(raw: &str) -> Result<ListQuery> {
    let params = parse_query_params(raw);

    let status = match params.get("status") {
        Some(s) => Some(Status::parse(s)?),
        None => None,
    };
    let category = match params.get("category") {
        Some(c) => Some(Category::parse(c)?),
        None => None,
    };
    let search = params
        .get("search")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    let defaults = ListQuery::default();
    let page = params
        .get("page")
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(defaults.page)
        .max(1);
    let limit = params
        .get("limit")
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(defaults.limit)
        .clamp(1, 100);

    Ok(ListQuery {
        filter: ComplaintFilter {
            status,
            category,
            search,
        },
        sort_by: params
            .get("sort_by")
            .map(|s| SortField::parse(s))
            .unwrap_or(defaults.sort_by),
        order: params
            .get("order")
            .map(|s| SortOrder::parse(s))
            .unwrap_or(defaults.order),
        page,
        limit,
    })
}
