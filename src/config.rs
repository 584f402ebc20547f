//! Configuration for civic-mirror
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use uuid::Uuid;

const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// civic-mirror - ledger-backed gateway for civic issue reports
#[derive(Parser, Debug, Clone)]
#[command(name = "civic-mirror")]
#[command(about = "Mirrors civic complaints into an immutable ledger")]
pub struct Args {
    /// Unique node identifier for this instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "civic_mirror")]
    pub mongodb_db: String,

    /// Enable development mode (in-memory store instead of MongoDB)
    ///
    /// The ledger connection is still mandatory: a complaint that is not
    /// registered on-chain never exists, dev mode or not.
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Ledger JSON-RPC endpoint
    #[arg(long, env = "LEDGER_RPC_URL", default_value = "")]
    pub ledger_rpc_url: String,

    /// Deployed complaint-registry contract address (0x + 40 hex chars)
    #[arg(long, env = "CONTRACT_ADDRESS", default_value = "")]
    pub contract_address: String,

    /// Signer credential: hex-encoded 32-byte Ed25519 key
    #[arg(long, env = "SIGNER_KEY", default_value = "")]
    pub signer_key: String,

    /// Ledger confirmation timeout in milliseconds
    ///
    /// A confirmation that has not returned by the deadline is treated as a
    /// failure even if the transaction might still land later.
    #[arg(long, env = "LEDGER_TIMEOUT_MS", default_value = "30000")]
    pub ledger_timeout_ms: u64,

    /// Concurrent existence queries issued by the reconciliation auditor
    #[arg(long, env = "AUDIT_CONCURRENCY", default_value = "8")]
    pub audit_concurrency: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Validate configuration
    ///
    /// Any violation here is fatal: the process must not serve a single
    /// request with a broken ledger configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.ledger_rpc_url.trim().is_empty() {
            return Err("LEDGER_RPC_URL is required".to_string());
        }
        if !self.ledger_rpc_url.starts_with("http://") && !self.ledger_rpc_url.starts_with("https://") {
            return Err(format!(
                "LEDGER_RPC_URL must be an http(s) endpoint, got '{}'",
                self.ledger_rpc_url
            ));
        }

        if self.contract_address.trim().is_empty() {
            return Err("CONTRACT_ADDRESS is required".to_string());
        }
        if self.contract_address == ZERO_ADDRESS {
            return Err("CONTRACT_ADDRESS is the zero address; deploy the contract first".to_string());
        }
        if !is_hex_address(&self.contract_address) {
            return Err(format!(
                "CONTRACT_ADDRESS must be 0x followed by 40 hex chars, got '{}'",
                self.contract_address
            ));
        }

        if self.signer_key.trim().is_empty() {
            return Err("SIGNER_KEY is required".to_string());
        }
        let stripped = self.signer_key.strip_prefix("0x").unwrap_or(&self.signer_key);
        match hex::decode(stripped) {
            Ok(bytes) if bytes.len() == 32 => {}
            Ok(bytes) => {
                return Err(format!(
                    "SIGNER_KEY must decode to 32 bytes, got {}",
                    bytes.len()
                ));
            }
            Err(_) => return Err("SIGNER_KEY is not valid hex".to_string()),
        }

        if self.ledger_timeout_ms == 0 {
            return Err("LEDGER_TIMEOUT_MS must be greater than zero".to_string());
        }
        if self.audit_concurrency == 0 {
            return Err("AUDIT_CONCURRENCY must be greater than zero".to_string());
        }

        Ok(())
    }

    /// Signer key bytes, assuming `validate()` has passed
    pub fn signer_key_bytes(&self) -> Result<[u8; 32], String> {
        let stripped = self.signer_key.strip_prefix("0x").unwrap_or(&self.signer_key);
        let bytes = hex::decode(stripped).map_err(|_| "SIGNER_KEY is not valid hex".to_string())?;
        bytes
            .try_into()
            .map_err(|_| "SIGNER_KEY must decode to 32 bytes".to_string())
    }
}

fn is_hex_address(addr: &str) -> bool {
    match addr.strip_prefix("0x") {
        Some(rest) => rest.len() == 40 && rest.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn valid_args() -> Args {
        let key = "ab".repeat(32);
        Args::parse_from([
            "civic-mirror",
            "--ledger-rpc-url",
            "http://localhost:8545",
            "--contract-address",
            "0x1111111111111111111111111111111111111111",
            "--signer-key",
            key.as_str(),
        ])
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_args().validate().is_ok());
    }

    #[test]
    fn test_zero_contract_address_rejected() {
        let mut args = valid_args();
        args.contract_address = ZERO_ADDRESS.to_string();
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_short_signer_key_rejected() {
        let mut args = valid_args();
        args.signer_key = "abcd".to_string();
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_missing_rpc_url_rejected() {
        let mut args = valid_args();
        args.ledger_rpc_url = String::new();
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_signer_key_bytes_roundtrip() {
        let args = valid_args();
        let bytes = args.signer_key_bytes().unwrap();
        assert_eq!(bytes, [0xab; 32]);
    }

    #[test]
    fn test_hex_address_check() {
        assert!(is_hex_address("0x1111111111111111111111111111111111111111"));
        assert!(!is_hex_address("1111111111111111111111111111111111111111"));
        assert!(!is_hex_address("0x1234"));
        assert!(!is_hex_address("0xzz11111111111111111111111111111111111111"));
    }
}
