//! TOML file configuration structures.
//!
//! These structs directly map to the `wallet-config.toml` file format.

use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use uuid::Uuid;
use wallet_core::config::SettlementConfig;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub settlement: SettlementConfig,
    #[serde(default)]
    pub accounts: Vec<SeedAccount>,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The address and port to listen on (e.g., "0.0.0.0:8080").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8080))
}

/// An account to open at startup if it is not in the ledger yet.
///
/// Account registration lives outside this service; this is how a
/// deployment (or the `--in-memory` mode) gets accounts to work with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedAccount {
    pub id: Uuid,
    #[serde(default)]
    pub balance: i64,
}
