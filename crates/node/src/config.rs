//! Node configuration

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

/// Resolved node configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Address the node advertises to peers.
    pub host: IpAddr,
    /// Base port; discovery binds base+1 and client RPC base+2.
    pub base_port: u16,
    /// Directory the prover uses for its working state.
    pub storage_dir: PathBuf,
    /// Dev-engine block interval in milliseconds.
    pub block_time_ms: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".parse().expect("valid literal"),
            base_port: 8301,
            storage_dir: PathBuf::from("./data/prover"),
            block_time_ms: 1000,
        }
    }
}
