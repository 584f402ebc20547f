//! Admin endpoints: moderation transitions, deletion, reconciliation report
//!
//! Authorization is delegated to the fronting proxy; these handlers only
//! require the acting user's identity header so transitions are attributable
//! in the status history.

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{error_response, json_response, read_json, require_user_id};
use crate::model::{ComplaintView, Status};
use crate::server::AppState;

#[derive(Serialize)]
struct TransitionResponse {
    complaint: ComplaintView,
    transaction_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    block_number: Option<u64>,
}

#[derive(Deserialize)]
struct StatusBody {
    status: String,
}

#[derive(Deserialize)]
struct ResolveBody {
    #[serde(default, alias = "resolutionImages")]
    resolution_images: Vec<String>,
}

#[derive(Serialize)]
struct DeleteResponse {
    deleted: bool,
    complaint_id: String,
}

/// PATCH /api/v1/admin/complaints/{id}/verify
pub async fn handle_verify(
    req: Request<Incoming>,
    state: Arc<AppState>,
    id: &str,
) -> Response<Full<Bytes>> {
    let actor = match require_user_id(&req) {
        Ok(a) => a,
        Err(e) => return error_response(&e),
    };

    match state.lifecycle.transition(id, Status::Verified, &actor).await {
        Ok((complaint, receipt)) => json_response(
            StatusCode::OK,
            &TransitionResponse {
                complaint: ComplaintView::from_complaint(&complaint, bson::DateTime::now()),
                transaction_id: receipt.transaction_id,
                block_number: receipt.block_number,
            },
        ),
        Err(e) => error_response(&e),
    }
}

/// PATCH /api/v1/admin/complaints/{id}/status
pub async fn handle_status_update(
    req: Request<Incoming>,
    state: Arc<AppState>,
    id: &str,
) -> Response<Full<Bytes>> {
    let actor = match require_user_id(&req) {
        Ok(a) => a,
        Err(e) => return error_response(&e),
    };
    let body: StatusBody = match read_json(req).await {
        Ok(b) => b,
        Err(e) => return error_response(&e),
    };
    let target = match Status::parse(&body.status) {
        Ok(s) => s,
        Err(e) => return error_response(&e),
    };

    match state.lifecycle.transition(id, target, &actor).await {
        Ok((complaint, receipt)) => json_response(
            StatusCode::OK,
            &TransitionResponse {
                complaint: ComplaintView::from_complaint(&complaint, bson::DateTime::now()),
                transaction_id: receipt.transaction_id,
                block_number: receipt.block_number,
            },
        ),
        Err(e) => error_response(&e),
    }
}

/// PATCH /api/v1/admin/complaints/{id}/resolve
pub async fn handle_resolve(
    req: Request<Incoming>,
    state: Arc<AppState>,
    id: &str,
) -> Response<Full<Bytes>> {
    let actor = match require_user_id(&req) {
        Ok(a) => a,
        Err(e) => return error_response(&e),
    };
    let body: ResolveBody = match read_json(req).await {
        Ok(b) => b,
        Err(e) => return error_response(&e),
    };

    match state
        .lifecycle
        .resolve(id, body.resolution_images, &actor)
        .await
    {
        Ok((complaint, receipt)) => json_response(
            StatusCode::OK,
            &TransitionResponse {
                complaint: ComplaintView::from_complaint(&complaint, bson::DateTime::now()),
                transaction_id: receipt.transaction_id,
                block_number: receipt.block_number,
            },
        ),
        Err(e) => error_response(&e),
    }
}

/// DELETE /api/v1/admin/complaints/{id}
pub async fn handle_delete(state: Arc<AppState>, id: &str) -> Response<Full<Bytes>> {
    match state.lifecycle.delete(id).await {
        Ok(()) => json_response(
            StatusCode::OK,
            &DeleteResponse {
                deleted: true,
                complaint_id: id.to_string(),
            },
        ),
        Err(e) => error_response(&e),
    }
}

/// GET /api/v1/admin/anomalies
///
/// Runs a full reconciliation sweep synchronously. A ledger read failure
/// surfaces as 503 rather than a partial report.
pub async fn handle_anomalies(state: Arc<AppState>) -> Response<Full<Bytes>> {
    match state.auditor.detect_anomalies().await {
        Ok(anomalies) => json_response(StatusCode::OK, &anomalies),
        Err(e) => error_response(&e),
    }
}
