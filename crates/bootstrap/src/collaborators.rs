//! External collaborator interfaces
//!
//! The proof system, peer discovery and the consensus engine live
//! outside this core. They are consumed through the object-safe
//! traits below; implementations decide the actual cryptography,
//! transport and chain-selection rules.

use async_trait::async_trait;
use chain_hub::{StrongestChainHub, TipSubscription};
use chain_types::{Block, Proof};
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;

/// Proof-system failures surfaced to the bootstrap path.
#[derive(Debug, Error)]
pub enum ProverError {
    #[error("proof generation failed: {0}")]
    Generation(String),
    #[error("chain verification failed: {0}")]
    Verification(String),
    #[error("prover unavailable: {0}")]
    Unavailable(String),
}

/// Creates prover handles scoped to a storage location.
///
/// The handle is a scoped resource: dropping it releases whatever the
/// proof system pinned for that location.
#[async_trait]
pub trait ProverFactory: Send + Sync {
    async fn create(&self, storage_location: &Path) -> Result<Box<dyn Prover>, ProverError>;
}

/// Opaque proof generation and verification capability.
#[async_trait]
pub trait Prover: Send + Sync {
    /// Produce the proof attached to the genesis block. Potentially
    /// long-running.
    async fn genesis_proof(&self) -> Result<Proof, ProverError>;

    /// Check that `block` extends a valid chain. Potentially
    /// long-running.
    async fn verify_chain(&self, block: &Block) -> Result<(), ProverError>;
}

/// Peer-set view owned by the running engine.
pub trait Membership: Send + Sync {
    /// Addresses of the peers currently known to this node.
    fn peers(&self) -> Vec<SocketAddr>;
}

/// Consensus-engine startup failure.
#[derive(Debug, Error)]
#[error("consensus engine failed to start: {0}")]
pub struct EngineError(pub String);

/// The standing hub consumers handed to the engine at startup, plus
/// the publish endpoint it feeds with every accepted strongest block.
pub struct HubEndpoints {
    /// Publish endpoint for accepted tips.
    pub publisher: StrongestChainHub,
    /// Stream to forward to network gossip.
    pub gossip: TipSubscription,
    /// Stream to write to durable storage.
    pub storage: TipSubscription,
    /// Stream for incremental body-diff computation.
    pub diffs: TipSubscription,
}

/// The external consensus/networking engine.
#[async_trait]
pub trait ConsensusEngine: Send + Sync {
    /// Start the engine. Returns once it is running, not once the node
    /// is synchronized with the network.
    async fn start(
        &self,
        genesis: Block,
        endpoints: HubEndpoints,
        initial_peers: Vec<SocketAddr>,
        should_mine: bool,
        addressing: crate::NodeAddressing,
    ) -> Result<Box<dyn Membership>, EngineError>;
}
