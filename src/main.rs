//! Civic Mirror - ledger-backed gateway for civic issue reports

use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use civic_mirror::{
    config::Args,
    db::MongoClient,
    ledger::{JsonRpcLedgerClient, LedgerGateway},
    server::{self, AppState},
    store::{
        CommentStore, ComplaintStore, MemoryCommentStore, MemoryComplaintStore, MongoCommentStore,
        MongoComplaintStore,
    },
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    // Parse command line arguments
    let args = Args::parse();

    // Initialize tracing/logging
    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("civic_mirror={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Validate configuration
    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    // Print startup banner
    info!("======================================");
    info!("  Civic Mirror - Complaint Gateway");
    info!("======================================");
    info!("Node ID: {}", args.node_id);
    info!("Listen: {}", args.listen);
    info!(
        "Mode: {}",
        if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" }
    );
    info!("Ledger RPC: {}", args.ledger_rpc_url);
    info!("Contract: {}", args.contract_address);
    info!("Ledger timeout: {}ms", args.ledger_timeout_ms);
    info!("Audit concurrency: {}", args.audit_concurrency);
    info!("MongoDB: {}", args.mongodb_uri);
    info!("======================================");

    // Primary stores: MongoDB in production, in-memory in dev mode
    let (store, comment_store): (Arc<dyn ComplaintStore>, Arc<dyn CommentStore>) = if args.dev_mode
    {
        warn!("Dev mode: using in-memory stores, data is not persisted");
        (
            Arc::new(MemoryComplaintStore::new()),
            Arc::new(MemoryCommentStore::new()),
        )
    } else {
        let mongo = match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
            Ok(client) => {
                info!("MongoDB connected successfully");
                client
            }
            Err(e) => {
                error!("MongoDB connection failed: {}", e);
                std::process::exit(1);
            }
        };
        let complaints = match MongoComplaintStore::new(&mongo).await {
            Ok(store) => Arc::new(store),
            Err(e) => {
                error!("Failed to initialize complaint collection: {}", e);
                std::process::exit(1);
            }
        };
        let comments = match MongoCommentStore::new(&mongo).await {
            Ok(store) => Arc::new(store),
            Err(e) => {
                error!("Failed to initialize comment collection: {}", e);
                std::process::exit(1);
            }
        };
        (complaints, comments)
    };

    // Ledger gateway over the signing JSON-RPC client
    let signer_key = match args.signer_key_bytes() {
        Ok(k) => k,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };
    let client = match JsonRpcLedgerClient::new(
        &args.ledger_rpc_url,
        &args.contract_address,
        signer_key,
    ) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            error!("Failed to build ledger client: {}", e);
            std::process::exit(1);
        }
    };
    let ledger = Arc::new(LedgerGateway::new(
        client,
        Duration::from_millis(args.ledger_timeout_ms),
    ));

    // Fail fast: the service refuses to start against an unusable ledger
    if let Err(e) = ledger.verify_connection().await {
        error!("Ledger connection check failed: {}", e);
        std::process::exit(1);
    }
    info!("Ledger connection verified");

    let state = Arc::new(AppState::new(args, store, comment_store, ledger));
    server::run(state).await?;

    Ok(())
}
