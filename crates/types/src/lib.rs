//! Chain types - block data model for the sync core
//!
//! Provides the immutable value types the rest of the node moves
//! around: [`Digest`], [`Proof`], [`Header`], [`Body`] and [`Block`],
//! plus the deterministic block hash and the genesis constant.

pub mod block;
pub mod digest;

pub use block::{Block, Body, Header, Proof, GENESIS_TIMESTAMP_MS};
pub use digest::{Digest, DigestParseError};

/// Unix-epoch milliseconds, as carried in block headers.
pub type Timestamp = u64;

/// Proof-of-work / timing material in a header.
pub type Nonce = u64;
