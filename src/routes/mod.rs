//! HTTP route handlers

pub mod admin;
pub mod ai;
pub mod complaints;
pub mod health;

pub use admin::{
    handle_anomalies, handle_delete, handle_resolve, handle_status_update, handle_verify,
};
pub use ai::{handle_analyze, handle_duplicates};
pub use complaints::{
    handle_comment_add, handle_comments_list, handle_create, handle_get, handle_integrity,
    handle_list, handle_nearby, handle_vote,
};
pub use health::{health_check, readiness_check, version_info};

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;

use crate::server::status_for;
use crate::types::{Error, Result};

/// API error response body
#[derive(Debug, Serialize)]
struct ApiError {
    error: String,
    code: &'static str,
}

/// Build successful JSON response
pub(crate) fn json_response<T: Serialize>(status: StatusCode, data: &T) -> Response<Full<Bytes>> {
    let body = match serde_json::to_vec(data) {
        Ok(b) => b,
        Err(_) => return error_response(&Error::Internal("Serialization failed".to_string())),
    };

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Cache-Control", "no-cache")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body)))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::new())))
}

/// Build a JSON error response from a service error
pub(crate) fn error_response(error: &Error) -> Response<Full<Bytes>> {
    let payload = ApiError {
        error: error.to_string(),
        code: error.code(),
    };
    let body = serde_json::to_vec(&payload).unwrap_or_default();

    Response::builder()
        .status(status_for(error))
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body)))
        .unwrap_or_else(|_| {
            Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(Full::new(Bytes::from(r#"{"error":"Internal error"}"#)))
                .unwrap_or_else(|_| Response::new(Full::new(Bytes::new())))
        })
}

/// Read and deserialize a JSON request body
pub(crate) async fn read_json<T: DeserializeOwned>(req: Request<Incoming>) -> Result<T> {
    let body = req
        .collect()
        .await
        .map_err(|e| Error::Validation(format!("Failed to read request body: {}", e)))?
        .to_bytes();

    serde_json::from_slice(&body).map_err(|e| Error::Validation(format!("Invalid JSON: {}", e)))
}

/// Extract the acting user from the X-User-Id header
pub(crate) fn require_user_id(req: &Request<Incoming>) -> Result<String> {
    req.headers()
        .get("x-user-id")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::Validation("X-User-Id header is required".to_string()))
}

/// Parse query string into key-value map
pub(crate) fn parse_query_params(query: &str) -> HashMap<String, String> {
    if query.is_empty() {
        return HashMap::new();
    }

    query
        .split('&')
        .filter_map(|pair| {
            let mut parts = pair.splitn(2, '=');
            let key = parts.next()?;
            let value = parts.next().unwrap_or("");
            Some((key.to_string(), decode_value(value)))
        })
        .collect()
}

/// Decode a query value: '+' means space, then percent escapes
fn decode_value(value: &str) -> String {
    let spaced = value.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        // Decoding only fails on invalid UTF-8; keep the raw value
        Err(_) => spaced,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query_params() {
        let params = parse_query_params("status=verified&page=2&limit=10");
        assert_eq!(params.get("status"), Some(&"verified".to_string()));
        assert_eq!(params.get("page"), Some(&"2".to_string()));
        assert_eq!(params.get("limit"), Some(&"10".to_string()));
    }

    #[test]
    fn test_parse_query_params_empty() {
        assert!(parse_query_params("").is_empty());
    }

    #[test]
    fn test_parse_query_decodes_escapes() {
        let params = parse_query_params("search=broken%20street+light");
        assert_eq!(params.get("search"), Some(&"broken street light".to_string()));
    }

    #[test]
    fn test_decode_value_keeps_malformed_escapes() {
        assert_eq!(decode_value("50%"), "50%");
        assert_eq!(decode_value("a%zzb"), "a%zzb");
    }

    #[test]
    fn test_decode_value_handles_truncated_escape_at_end() {
        // A lone trailing escape must never slice past the end
        assert_eq!(decode_value("a%2"), "a%2");
        assert_eq!(decode_value("%"), "%");
    }

    #[test]
    fn test_decode_value_multibyte() {
        assert_eq!(decode_value("caf%C3%A9"), "café");
    }

    #[test]
    fn test_error_response_status() {
        let resp = error_response(&Error::NotFound("missing".to_string()));
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
