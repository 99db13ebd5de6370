//! Joined-node state handed back by the bootstrap sequence

use crate::collaborators::{Membership, Prover};
use chain_types::Block;
use parking_lot::RwLock;
use std::net::SocketAddr;
use std::sync::Arc;

/// Everything a handler needs from a successfully joined node.
///
/// Returned by [`join`](crate::join) and injected into the operations
/// that run after startup; there is no process-global membership slot.
/// Cheap to clone.
#[derive(Clone)]
pub struct NodeContext {
    membership: Arc<dyn Membership>,
    /// Keeps the storage-scoped prover alive for the node's lifetime.
    _prover: Arc<dyn Prover>,
    latest_tip: Arc<RwLock<Option<Block>>>,
}

impl std::fmt::Debug for NodeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeContext").finish_non_exhaustive()
    }
}

impl NodeContext {
    pub(crate) fn new(
        membership: Arc<dyn Membership>,
        prover: Arc<dyn Prover>,
        latest_tip: Arc<RwLock<Option<Block>>>,
    ) -> Self {
        Self {
            membership,
            _prover: prover,
            latest_tip,
        }
    }

    /// Current peer list from the engine's membership handle.
    pub fn peers(&self) -> Vec<SocketAddr> {
        self.membership.peers()
    }

    /// The strongest block most recently published through the hub,
    /// or `None` before the first publish.
    pub fn strongest_tip(&self) -> Option<Block> {
        self.latest_tip.read().clone()
    }
}
