//! The one-time join sequence

use crate::addressing::NodeAddressing;
use crate::collaborators::{
    ConsensusEngine, EngineError, HubEndpoints, Membership, Prover, ProverError, ProverFactory,
};
use crate::context::NodeContext;
use chain_hub::StrongestChainHub;
use chain_types::Block;
use parking_lot::RwLock;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Inputs to [`join`], as resolved by the caller (CLI or RPC).
#[derive(Debug, Clone)]
pub struct JoinParams {
    /// Where the prover keeps its working state.
    pub storage_location: PathBuf,
    /// Peers to dial once the engine is up.
    pub initial_peers: Vec<SocketAddr>,
    /// Whether this node should produce blocks.
    pub should_mine: bool,
    /// The node's advertised external address; the discovery and
    /// client RPC ports derive from its port.
    pub self_address: SocketAddr,
}

/// Fatal startup failures. Any of these aborts the join with no
/// membership recorded and no partial node state retained.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("genesis proof generation failed")]
    GenesisProof(#[source] ProverError),
    #[error("genesis verification failed")]
    GenesisVerification(#[source] ProverError),
    #[error("prover startup failed")]
    ProverStartup(#[source] ProverError),
    #[error(transparent)]
    EngineStart(#[from] EngineError),
}

/// Join the network: verify the trust anchor, start the consensus
/// engine and wire the hub's standing consumers.
///
/// Expected to run at most once per process; a second call starts a
/// second engine instance, and it is the caller's slot that decides
/// which [`NodeContext`] wins.
pub async fn join(
    prover_factory: &dyn ProverFactory,
    engine: &dyn ConsensusEngine,
    hub: &StrongestChainHub,
    params: JoinParams,
) -> Result<NodeContext, BootstrapError> {
    let addressing = NodeAddressing::from_self_address(params.self_address);
    tracing::info!(
        "Joining network as {} (discovery {}, client RPC {}, mining: {})",
        addressing.external_addr(),
        addressing.discovery_port,
        addressing.client_rpc_port,
        params.should_mine
    );

    // Prover handle scoped to the storage location; lives in the
    // returned context so it is released on node shutdown.
    let prover: Arc<dyn Prover> = Arc::from(
        prover_factory
            .create(&params.storage_location)
            .await
            .map_err(BootstrapError::ProverStartup)?,
    );

    tracing::info!("Requesting genesis proof");
    let genesis_proof = prover
        .genesis_proof()
        .await
        .map_err(BootstrapError::GenesisProof)?;

    // Attach the proof to the fixed genesis state and verify it. An
    // invalid genesis must halt startup: it is the trust anchor.
    let mut genesis = Block::genesis();
    genesis.body.proof = genesis_proof;
    prover
        .verify_chain(&genesis)
        .await
        .map_err(BootstrapError::GenesisVerification)?;
    tracing::info!("Genesis verified: {}", genesis.hash());

    // Standing consumers. Gossip, storage and diff streams belong to
    // the engine; the latest-tip stream stays here and feeds the
    // queryable tip cell.
    let endpoints = HubEndpoints {
        publisher: hub.clone(),
        gossip: hub.subscribe(),
        storage: hub.subscribe(),
        diffs: hub.subscribe(),
    };
    let mut tip_stream = hub.subscribe();
    let latest_tip = Arc::new(RwLock::new(None));

    let membership: Arc<dyn Membership> = Arc::from(
        engine
            .start(
                genesis,
                endpoints,
                params.initial_peers,
                params.should_mine,
                addressing,
            )
            .await?,
    );
    tracing::info!("Consensus engine started");

    let tip_cell = latest_tip.clone();
    tokio::spawn(async move {
        while let Some(block) = tip_stream.recv().await {
            tracing::debug!("New strongest tip: {}", block.hash());
            *tip_cell.write() = Some(block);
        }
    });

    Ok(NodeContext::new(membership, prover, latest_tip))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chain_types::Proof;
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct StubProverFactory {
        fail_verification: bool,
    }

    struct StubProver {
        fail_verification: bool,
    }

    #[async_trait]
    impl ProverFactory for StubProverFactory {
        async fn create(&self, _storage_location: &Path) -> Result<Box<dyn Prover>, ProverError> {
            Ok(Box::new(StubProver {
                fail_verification: self.fail_verification,
            }))
        }
    }

    #[async_trait]
    impl Prover for StubProver {
        async fn genesis_proof(&self) -> Result<Proof, ProverError> {
            Ok(Proof::new(vec![0xaa; 8]))
        }

        async fn verify_chain(&self, _block: &Block) -> Result<(), ProverError> {
            if self.fail_verification {
                Err(ProverError::Verification("bad genesis".into()))
            } else {
                Ok(())
            }
        }
    }

    struct StubMembership;

    impl Membership for StubMembership {
        fn peers(&self) -> Vec<SocketAddr> {
            vec!["127.0.0.1:8301".parse().unwrap()]
        }
    }

    struct StubEngine {
        started: AtomicBool,
    }

    #[async_trait]
    impl ConsensusEngine for StubEngine {
        async fn start(
            &self,
            genesis: Block,
            endpoints: HubEndpoints,
            _initial_peers: Vec<SocketAddr>,
            _should_mine: bool,
            addressing: NodeAddressing,
        ) -> Result<Box<dyn Membership>, EngineError> {
            assert_eq!(genesis, {
                let mut expected = Block::genesis();
                expected.body.proof = Proof::new(vec![0xaa; 8]);
                expected
            });
            assert_eq!(addressing.client_rpc_port, addressing.external_port + 2);
            // Three standing streams plus the orchestrator's tip cell.
            assert_eq!(endpoints.publisher.subscriber_count(), 4);
            self.started.store(true, Ordering::SeqCst);
            Ok(Box::new(StubMembership))
        }
    }

    fn params() -> JoinParams {
        JoinParams {
            storage_location: PathBuf::from("/tmp/prover"),
            initial_peers: vec![],
            should_mine: false,
            self_address: "127.0.0.1:8301".parse().unwrap(),
        }
    }

    #[tokio::test]
    async fn join_wires_engine_and_records_membership() {
        let hub = StrongestChainHub::new();
        let factory = StubProverFactory {
            fail_verification: false,
        };
        let engine = StubEngine {
            started: AtomicBool::new(false),
        };

        let context = join(&factory, &engine, &hub, params()).await.unwrap();

        assert!(engine.started.load(Ordering::SeqCst));
        assert_eq!(context.peers(), vec!["127.0.0.1:8301".parse().unwrap()]);
        assert!(context.strongest_tip().is_none());
    }

    #[tokio::test]
    async fn genesis_verification_failure_is_fatal() {
        let hub = StrongestChainHub::new();
        let factory = StubProverFactory {
            fail_verification: true,
        };
        let engine = StubEngine {
            started: AtomicBool::new(false),
        };

        let err = join(&factory, &engine, &hub, params()).await.unwrap_err();

        assert!(matches!(err, BootstrapError::GenesisVerification(_)));
        // The engine never started and no consumer wiring survives.
        assert!(!engine.started.load(Ordering::SeqCst));
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn tip_cell_tracks_published_blocks() {
        let hub = StrongestChainHub::new();
        let factory = StubProverFactory {
            fail_verification: false,
        };
        let engine = StubEngine {
            started: AtomicBool::new(false),
        };

        let context = join(&factory, &engine, &hub, params()).await.unwrap();

        let mut tip = Block::genesis();
        tip.header.nonce = 5;
        hub.publish(tip.clone()).await;

        // The cell is fed by a spawned task; poll briefly.
        for _ in 0..50 {
            if context.strongest_tip().is_some() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert_eq!(context.strongest_tip(), Some(tip));
    }
}
