//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo for async handling. One task per
//! connection; routing is a flat (method, path) match so the whole surface
//! is visible in one place.

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::audit::ReconciliationAuditor;
use crate::comments::CommentEngine;
use crate::config::Args;
use crate::ledger::LedgerGateway;
use crate::lifecycle::{KeyedLocks, LifecycleManager};
use crate::routes;
use crate::similarity::SimilarityEngine;
use crate::store::{CommentStore, ComplaintStore};
use crate::types::{Error, Result};
use crate::votes::VoteEngine;

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub store: Arc<dyn ComplaintStore>,
    pub ledger: Arc<LedgerGateway>,
    pub lifecycle: LifecycleManager,
    pub votes: VoteEngine,
    pub comments: CommentEngine,
    pub auditor: ReconciliationAuditor,
    pub similarity: SimilarityEngine,
    pub started_at: std::time::Instant,
}

impl AppState {
    pub fn new(
        args: Args,
        store: Arc<dyn ComplaintStore>,
        comments: Arc<dyn CommentStore>,
        ledger: Arc<LedgerGateway>,
    ) -> Self {
        // One lock map for everything that writes complaints: transitions
        // persist whole documents, so votes must queue behind them.
        let locks = KeyedLocks::new();
        let lifecycle = LifecycleManager::new(Arc::clone(&store), Arc::clone(&ledger), locks.clone());
        let votes = VoteEngine::new(Arc::clone(&store), locks);
        let comments = CommentEngine::new(Arc::clone(&store), comments);
        let auditor = ReconciliationAuditor::new(
            Arc::clone(&store),
            Arc::clone(&ledger),
            args.audit_concurrency,
        );
        Self {
            args,
            store,
            ledger,
            lifecycle,
            votes,
            comments,
            auditor,
            similarity: SimilarityEngine::default(),
            started_at: std::time::Instant::now(),
        }
    }
}

/// Start the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "Civic Mirror listening on {} as node {}",
        state.args.listen, state.args.node_id
    );

    if state.args.dev_mode {
        warn!("Development mode enabled - complaints held in memory only");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> std::result::Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    info!("[{}] {} {}", addr, method, path);

    let response = match (method, path.as_str()) {
        // Liveness probe - returns 200 if the service is running
        (Method::GET, "/health") | (Method::GET, "/healthz") => {
            routes::health_check(Arc::clone(&state))
        }

        // Readiness probe - requires the primary store to answer
        (Method::GET, "/ready") | (Method::GET, "/readyz") => {
            routes::readiness_check(Arc::clone(&state)).await
        }

        // Version info for deployment verification
        (Method::GET, "/version") => routes::version_info(),

        // CORS preflight
        (Method::OPTIONS, _) => preflight_response(),

        // ====================================================================
        // Complaint API
        // ====================================================================
        (Method::POST, "/api/v1/complaints") => {
            routes::handle_create(req, Arc::clone(&state)).await
        }
        (Method::GET, "/api/v1/complaints") => {
            routes::handle_list(req, Arc::clone(&state)).await
        }
        (Method::GET, "/api/v1/complaints/nearby") => {
            routes::handle_nearby(req, Arc::clone(&state)).await
        }
        (Method::GET, p) if p.starts_with("/api/v1/complaints/") && p.ends_with("/integrity") => {
            let id = p
                .strip_prefix("/api/v1/complaints/")
                .and_then(|s| s.strip_suffix("/integrity"))
                .unwrap_or("");
            routes::handle_integrity(Arc::clone(&state), id).await
        }
        (Method::POST, p) if p.starts_with("/api/v1/complaints/") && p.ends_with("/vote") => {
            let id = p
                .strip_prefix("/api/v1/complaints/")
                .and_then(|s| s.strip_suffix("/vote"))
                .unwrap_or("")
                .to_string();
            routes::handle_vote(req, Arc::clone(&state), &id).await
        }
        (Method::GET, p) if p.starts_with("/api/v1/complaints/") && p.ends_with("/comments") => {
            let id = p
                .strip_prefix("/api/v1/complaints/")
                .and_then(|s| s.strip_suffix("/comments"))
                .unwrap_or("");
            routes::handle_comments_list(Arc::clone(&state), id).await
        }
        (Method::POST, p) if p.starts_with("/api/v1/complaints/") && p.ends_with("/comments") => {
            let id = p
                .strip_prefix("/api/v1/complaints/")
                .and_then(|s| s.strip_suffix("/comments"))
                .unwrap_or("")
                .to_string();
            routes::handle_comment_add(req, Arc::clone(&state), &id).await
        }
        (Method::GET, p) if p.starts_with("/api/v1/complaints/") => {
            let id = p.strip_prefix("/api/v1/complaints/").unwrap_or("");
            routes::handle_get(Arc::clone(&state), id).await
        }

        // ====================================================================
        // Admin API
        // ====================================================================
        (Method::PATCH, p)
            if p.starts_with("/api/v1/admin/complaints/") && p.ends_with("/verify") =>
        {
            let id = p
                .strip_prefix("/api/v1/admin/complaints/")
                .and_then(|s| s.strip_suffix("/verify"))
                .unwrap_or("")
                .to_string();
            routes::handle_verify(req, Arc::clone(&state), &id).await
        }
        (Method::PATCH, p)
            if p.starts_with("/api/v1/admin/complaints/") && p.ends_with("/status") =>
        {
            let id = p
                .strip_prefix("/api/v1/admin/complaints/")
                .and_then(|s| s.strip_suffix("/status"))
                .unwrap_or("")
                .to_string();
            routes::handle_status_update(req, Arc::clone(&state), &id).await
        }
        (Method::PATCH, p)
            if p.starts_with("/api/v1/admin/complaints/") && p.ends_with("/resolve") =>
        {
            let id = p
                .strip_prefix("/api/v1/admin/complaints/")
                .and_then(|s| s.strip_suffix("/resolve"))
                .unwrap_or("")
                .to_string();
            routes::handle_resolve(req, Arc::clone(&state), &id).await
        }
        (Method::DELETE, p) if p.starts_with("/api/v1/admin/complaints/") => {
            let id = p.strip_prefix("/api/v1/admin/complaints/").unwrap_or("");
            routes::handle_delete(Arc::clone(&state), id).await
        }
        (Method::GET, "/api/v1/admin/anomalies") => {
            routes::handle_anomalies(Arc::clone(&state)).await
        }

        // ====================================================================
        // Draft assistance (local scoring, no external calls)
        // ====================================================================
        (Method::POST, "/api/v1/ai/analyze") => {
            routes::handle_analyze(req, Arc::clone(&state)).await
        }
        (Method::POST, "/api/v1/ai/duplicates") => {
            routes::handle_duplicates(req, Arc::clone(&state)).await
        }

        _ => not_found_response(&path),
    };

    Ok(response)
}

/// CORS preflight response
fn preflight_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::OK)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Headers", "*")
        .header(
            "Access-Control-Allow-Methods",
            "GET, POST, PATCH, DELETE, OPTIONS",
        )
        .body(Full::new(Bytes::new()))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::new())))
}

/// Not found response
fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": "Not Found",
        "path": path,
    });

    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::new())))
}

/// Map a service error to its HTTP status
pub fn status_for(error: &Error) -> StatusCode {
    match error {
        Error::Validation(_) => StatusCode::BAD_REQUEST,
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::LedgerUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        Error::Config(_) | Error::Database(_) | Error::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&Error::Validation("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&Error::NotFound("x".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&Error::LedgerUnavailable("x".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_for(&Error::Database("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_not_found_body_names_path() {
        let resp = not_found_response("/nope");
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
