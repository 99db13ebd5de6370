//! Block, header and body value types

use crate::digest::Digest;
use crate::{Nonce, Timestamp};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Header time of the genesis block: 2024-01-01T00:00:00Z in unix
/// millis. Fixed per network instance.
pub const GENESIS_TIMESTAMP_MS: Timestamp = 1_704_067_200_000;

/// Opaque proof bytes attached to a block body.
///
/// Produced and verified only by the external prover; this crate never
/// inspects the contents. Encoded as base64 on the JSON wire.
#[derive(Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Proof(Vec<u8>);

impl Proof {
    pub fn new(bytes: Vec<u8>) -> Self {
        Proof(bytes)
    }

    /// Sentinel proof carried by the genesis constant. Never passed to
    /// the prover's verification predicate; genesis is the trust
    /// anchor, not a proof of a transition.
    pub const fn placeholder() -> Self {
        Proof(Vec::new())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Proof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Proof({} bytes)", self.0.len())
    }
}

impl Serialize for Proof {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for Proof {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = <String as Deserialize>::deserialize(deserializer)?;
        BASE64
            .decode(s.as_bytes())
            .map(Proof)
            .map_err(serde::de::Error::custom)
    }
}

/// Link to the logical predecessor plus proof-of-work material.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct Header {
    /// Digest of the logical predecessor block.
    pub previous_block_hash: Digest,
    /// Header time (unix millis).
    pub time: Timestamp,
    /// Proof-of-work nonce.
    pub nonce: Nonce,
}

/// Claimed post-state digest and the proof attesting to it.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct Body {
    /// Ledger digest this block claims as its post-state.
    pub target_hash: Digest,
    /// Attests that the transition to `target_hash` is valid.
    pub proof: Proof,
}

/// The unit of chain extension and of hub fan-out.
///
/// Immutable once published; subscribers share it by clone, never by
/// mutation.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct Block {
    pub header: Header,
    pub body: Body,
}

impl Block {
    /// The fixed genesis block for this network instance.
    ///
    /// Zero predecessor digest, zero target, zero nonce, well-known
    /// epoch time and a placeholder proof. Every call returns the same
    /// bit-identical value.
    pub fn genesis() -> Block {
        Block {
            header: Header {
                previous_block_hash: Digest::ZERO,
                time: GENESIS_TIMESTAMP_MS,
                nonce: 0,
            },
            body: Body {
                target_hash: Digest::ZERO,
                proof: Proof::placeholder(),
            },
        }
    }

    /// Deterministic digest of this block.
    ///
    /// Absorbs the header fields and the body's target digest, in
    /// declaration order, with little-endian integer encoding. The
    /// proof is excluded from the hash domain: proofs attest to block
    /// content, not the other way around.
    pub fn hash(&self) -> Digest {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.header.previous_block_hash.as_bytes());
        hasher.update(&self.header.time.to_le_bytes());
        hasher.update(&self.header.nonce.to_le_bytes());
        hasher.update(self.body.target_hash.as_bytes());
        hasher.finalize().into()
    }

    /// Canonical byte encoding for network transmission.
    pub fn to_bytes(&self) -> Vec<u8> {
        borsh::to_vec(self).expect("Block serialization should not fail")
    }

    /// Decode from the canonical byte encoding.
    pub fn from_bytes(data: &[u8]) -> Result<Self, borsh::io::Error> {
        borsh::from_slice(data)
    }
}
