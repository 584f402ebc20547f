//! Draft assistance endpoints
//!
//! Category/severity suggestion and duplicate detection for a complaint
//! draft. Everything is computed locally from keyword tables and word-set
//! similarity; nothing leaves the process.

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::Deserialize;
use std::sync::Arc;

use super::{error_response, json_response, read_json};
use crate::server::AppState;
use crate::similarity;
use crate::types::Error;

#[derive(Deserialize)]
struct DraftBody {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
}

impl DraftBody {
    fn validate(&self) -> Result<(), Error> {
        if self.title.trim().is_empty() && self.description.trim().is_empty() {
            return Err(Error::Validation(
                "Either title or description is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// POST /api/v1/ai/analyze
pub async fn handle_analyze(req: Request<Incoming>, _state: Arc<AppState>) -> Response<Full<Bytes>> {
    let body: DraftBody = match read_json(req).await {
        Ok(b) => b,
        Err(e) => return error_response(&e),
    };
    if let Err(e) = body.validate() {
        return error_response(&e);
    }

    let suggestion = similarity::suggest(&body.title, &body.description);
    json_response(StatusCode::OK, &suggestion)
}

/// POST /api/v1/ai/duplicates
pub async fn handle_duplicates(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Response<Full<Bytes>> {
    let body: DraftBody = match read_json(req).await {
        Ok(b) => b,
        Err(e) => return error_response(&e),
    };
    if let Err(e) = body.validate() {
        return error_response(&e);
    }

    match state
        .similarity
        .find_duplicates(&state.store, &body.title, &body.description)
        .await
    {
        Ok(matches) => json_response(StatusCode::OK, &matches),
        Err(e) => error_response(&e),
    }
}
