//! Local dev collaborators
//!
//! Stand-ins for the external proof system, consensus engine and peer
//! discovery so a single node runs end to end without external
//! services. The dev prover derives deterministic pseudo-proofs from
//! block content; the dev engine drains the standing hub consumers and
//! can mine dummy child blocks onto the tip.

use async_trait::async_trait;
use chain_bootstrap::{
    ConsensusEngine, EngineError, HubEndpoints, Membership, NodeAddressing, Prover, ProverError,
    ProverFactory,
};
use chain_types::{Block, Digest, Proof};
use parking_lot::RwLock;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const DEV_PROOF_DOMAIN: &[u8] = b"chain-node dev proof v1";

/// Deterministic pseudo-proof over the block's hashed content.
fn dev_proof(block: &Block) -> Proof {
    let mut hasher = blake3::Hasher::new();
    hasher.update(DEV_PROOF_DOMAIN);
    hasher.update(block.hash().as_bytes());
    Proof::new(hasher.finalize().as_bytes().to_vec())
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_millis() as u64
}

/// Creates [`DevProver`] handles.
pub struct DevProverFactory;

#[async_trait]
impl ProverFactory for DevProverFactory {
    async fn create(&self, storage_location: &Path) -> Result<Box<dyn Prover>, ProverError> {
        tracing::info!("Dev prover scoped to {:?}", storage_location);
        Ok(Box::new(DevProver))
    }
}

/// Prover stand-in: proofs are content digests, not zero-knowledge.
pub struct DevProver;

#[async_trait]
impl Prover for DevProver {
    async fn genesis_proof(&self) -> Result<Proof, ProverError> {
        Ok(dev_proof(&Block::genesis()))
    }

    async fn verify_chain(&self, block: &Block) -> Result<(), ProverError> {
        if block.body.proof == dev_proof(block) {
            Ok(())
        } else {
            Err(ProverError::Verification(format!(
                "proof does not attest to block {}",
                block.hash()
            )))
        }
    }
}

/// Fixed peer view over the configured initial peers.
pub struct StaticMembership {
    peers: Vec<SocketAddr>,
}

impl Membership for StaticMembership {
    fn peers(&self) -> Vec<SocketAddr> {
        self.peers.clone()
    }
}

/// Single-node consensus-engine stand-in.
pub struct DevEngine {
    block_time_ms: u64,
}

impl DevEngine {
    pub fn new(block_time_ms: u64) -> Self {
        Self { block_time_ms }
    }
}

#[async_trait]
impl ConsensusEngine for DevEngine {
    async fn start(
        &self,
        genesis: Block,
        endpoints: HubEndpoints,
        initial_peers: Vec<SocketAddr>,
        should_mine: bool,
        addressing: NodeAddressing,
    ) -> Result<Box<dyn Membership>, EngineError> {
        tracing::info!(
            "Dev engine starting on {} ({} initial peers)",
            addressing.external_addr(),
            initial_peers.len()
        );

        let HubEndpoints {
            publisher,
            mut gossip,
            mut storage,
            mut diffs,
        } = endpoints;

        // Standing consumers. Real engines forward to the network,
        // write durable state and feed the ledger diff pipeline; the
        // dev engine just keeps the streams drained.
        tokio::spawn(async move {
            while let Some(block) = gossip.recv().await {
                tracing::debug!("gossip: would forward {}", block.hash());
            }
        });
        tokio::spawn(async move {
            while let Some(block) = storage.recv().await {
                tracing::debug!("storage: would persist {}", block.hash());
            }
        });
        tokio::spawn(async move {
            let mut previous_target = Digest::ZERO;
            while let Some(block) = diffs.recv().await {
                let target = block.body.target_hash;
                if target != previous_target {
                    tracing::debug!("diff: ledger target {} -> {}", previous_target, target);
                    previous_target = target;
                }
            }
        });

        if should_mine {
            let tip = Arc::new(RwLock::new(genesis));
            let interval = Duration::from_millis(self.block_time_ms);
            tokio::spawn(async move {
                loop {
                    tokio::time::sleep(interval).await;
                    let parent = tip.read().clone();
                    let block = mine_child(&parent);
                    tracing::info!("Mined block {} on {}", block.hash(), parent.hash());
                    *tip.write() = block.clone();
                    publisher.publish(block).await;
                }
            });
        }

        Ok(Box::new(StaticMembership {
            peers: initial_peers,
        }))
    }
}

/// Build a dummy child of `parent` with a fresh nonce and an evolved
/// ledger target.
fn mine_child(parent: &Block) -> Block {
    let nonce: u64 = rand::random();

    let mut target_hasher = blake3::Hasher::new();
    target_hasher.update(parent.body.target_hash.as_bytes());
    target_hasher.update(&nonce.to_le_bytes());

    let mut block = Block {
        header: chain_types::Header {
            previous_block_hash: parent.hash(),
            time: now_millis(),
            nonce,
        },
        body: chain_types::Body {
            target_hash: target_hasher.finalize().into(),
            proof: Proof::placeholder(),
        },
    };
    block.body.proof = dev_proof(&block);
    block
}
