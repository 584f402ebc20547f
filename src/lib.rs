//! Civic Mirror - ledger-backed gateway for civic issue reports
//!
//! Citizen reports are mirrored into an immutable external ledger so that
//! status history cannot be silently rewritten. MongoDB stays the queryable
//! primary store; the ledger is the tamper-evidence anchor.
//!
//! ## Services
//!
//! - **Ledger Gateway**: content hashing, transaction submission with
//!   confirmation wait, existence/integrity queries
//! - **Lifecycle**: the complaint state machine, every transition ledger-first
//! - **Votes**: off-chain vote toggling and the derived impact score
//! - **Comments**: public discussion threads attached to complaints
//! - **Audit**: reconciliation sweep comparing both stores for divergence
//! - **Similarity**: keyword scoring and duplicate detection for drafts

pub mod audit;
pub mod comments;
pub mod config;
pub mod db;
pub mod ledger;
pub mod lifecycle;
pub mod model;
pub mod routes;
pub mod server;
pub mod similarity;
pub mod store;
pub mod types;
pub mod votes;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{Error, Result};
