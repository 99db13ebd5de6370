//! Node bootstrap - one-time startup orchestration
//!
//! Drives the join sequence: acquire a prover scoped to the node's
//! storage location, obtain and verify the genesis proof, start the
//! external consensus engine with the hub's pre-wired consumer set,
//! and hand back a [`NodeContext`] carrying the resulting membership
//! handle. Genesis failures are fatal: the node must halt rather than
//! proceed with a poisoned trust anchor.

pub mod addressing;
pub mod collaborators;
pub mod context;
pub mod join;

pub use addressing::NodeAddressing;
pub use collaborators::{
    ConsensusEngine, EngineError, HubEndpoints, Membership, Prover, ProverError, ProverFactory,
};
pub use context::NodeContext;
pub use join::{join, BootstrapError, JoinParams};
