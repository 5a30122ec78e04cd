//! Core domain types used by the replica
//!
//! This module defines strongly-typed hashes, account addresses and state
//! digests shared across the replica. The goal is to avoid "naked" byte
//! buffers in public APIs and instead use domain-specific newtypes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Checkpoints and peer votes.
pub mod checkpoint;
/// Transactions as delivered by the chain feed, plus payload decoding.
pub mod tx;

pub use checkpoint::{Checkpoint, CheckpointStatus, PeerId, PeerVote};
pub use tx::{ActionEnvelope, FeedTransaction, PayloadError, TransferPayload};

/// Arbitrary-precision, non-negative account balance.
pub type Balance = num::BigUint;

/// Length in bytes of all 256-bit hash types used in this module.
pub const HASH_LEN: usize = 32;

/// Length in bytes of an account address.
pub const ADDRESS_LEN: usize = 20;

/// Strongly-typed 256-bit hash wrapper (BLAKE3-256).
///
/// Used as the node type of the ledger Merkle tree and as the concrete
/// representation of every digest produced by the bundled stores.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Hash256(pub [u8; HASH_LEN]);

impl Hash256 {
    /// The all-zero hash; root of an empty ledger.
    pub const ZERO: Hash256 = Hash256([0u8; HASH_LEN]);

    /// Returns the underlying 32-byte hash as a borrowed array.
    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }
}

/// Error returned when an address string cannot be decoded.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AddressError {
    #[error("address is not valid hex: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("address must be {ADDRESS_LEN} bytes, got {0}")]
    Length(usize),
}

/// Fixed-length account address.
///
/// Addresses travel as hex strings with an optional `0x` prefix; the raw
/// 20 bytes are the ledger key for the account's balance.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct Address(pub [u8; ADDRESS_LEN]);

impl Address {
    /// Parses a hex address, accepting an optional `0x` / `0X` prefix.
    pub fn from_hex(s: &str) -> Result<Self, AddressError> {
        let s = s.trim();
        let clean = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        let bytes = hex::decode(clean)?;
        Self::from_slice(&bytes)
    }

    /// Builds an address from raw bytes, checking the length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, AddressError> {
        let arr: [u8; ADDRESS_LEN] = bytes
            .try_into()
            .map_err(|_| AddressError::Length(bytes.len()))?;
        Ok(Address(arr))
    }

    /// Returns the raw address bytes.
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::from_hex(s)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// Opaque content digest of the whole ledger keyspace.
///
/// Peers compare digests byte-for-byte; nothing else about the bytes is
/// interpreted by the quorum logic.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct StateDigest(pub Vec<u8>);

impl StateDigest {
    /// Digest of a ledger with no entries.
    pub fn empty() -> Self {
        StateDigest::from(Hash256::ZERO)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Lower-case hex without prefix, as served on `/rootHash`.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Exact byte comparison against a digest reported by a peer.
    pub fn matches(&self, other: &[u8]) -> bool {
        self.0.as_slice() == other
    }
}

impl From<Hash256> for StateDigest {
    fn from(h: Hash256) -> Self {
        StateDigest(h.0.to_vec())
    }
}

impl fmt::Display for StateDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
