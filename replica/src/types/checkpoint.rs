//! Checkpoint records and peer votes.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::StateDigest;

/// Lifecycle of a checkpoint.
///
/// A checkpoint is created `Pending` when block progress fires and becomes
/// `Committed` once a quorum of peers confirmed its digest. Rejected
/// checkpoints are dropped, never stored.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum CheckpointStatus {
    Pending,
    Committed,
}

/// A `(block number, ledger digest)` pair.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Base-chain block the ledger state corresponds to.
    pub block_number: u64,
    /// Root hash of the whole ledger after applying `block_number`.
    pub digest: StateDigest,
    pub status: CheckpointStatus,
}

impl Checkpoint {
    /// Creates a pending checkpoint awaiting quorum confirmation.
    pub fn pending(block_number: u64, digest: StateDigest) -> Self {
        Self {
            block_number,
            digest,
            status: CheckpointStatus::Pending,
        }
    }

    /// Marks the checkpoint as confirmed by quorum.
    pub fn commit(self) -> Self {
        Self {
            status: CheckpointStatus::Committed,
            ..self
        }
    }

    pub fn is_committed(&self) -> bool {
        self.status == CheckpointStatus::Committed
    }
}

/// Identity of a peer replica (its base URL or host name).
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct PeerId(pub String);

impl PeerId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PeerId {
    fn from(s: &str) -> Self {
        PeerId(s.to_string())
    }
}

impl From<String> for PeerId {
    fn from(s: String) -> Self {
        PeerId(s)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Answer of one peer for one validation round.
///
/// `digest` is only meaningful when `responded` is true.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PeerVote {
    pub peer: PeerId,
    pub responded: bool,
    pub digest: Vec<u8>,
}

impl PeerVote {
    pub fn responded(peer: PeerId, digest: Vec<u8>) -> Self {
        Self {
            peer,
            responded: true,
            digest,
        }
    }

    /// A peer that timed out or could not be reached.
    pub fn no_response(peer: PeerId) -> Self {
        Self {
            peer,
            responded: false,
            digest: Vec::new(),
        }
    }

    /// Returns `true` if the peer answered with exactly `local`.
    pub fn agrees_with(&self, local: &StateDigest) -> bool {
        self.responded && local.matches(&self.digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_checkpoint_commits_without_changing_payload() {
        let digest = StateDigest(vec![1, 2, 3]);
        let cp = Checkpoint::pending(10, digest.clone());
        assert!(!cp.is_committed());

        let cp = cp.commit();
        assert!(cp.is_committed());
        assert_eq!(cp.block_number, 10);
        assert_eq!(cp.digest, digest);
    }

    #[test]
    fn silent_peer_never_agrees() {
        let local = StateDigest(Vec::new());
        let vote = PeerVote::no_response(PeerId::from("peer-a"));
        // An empty digest equals the silent vote's placeholder, but the
        // vote still must not count.
        assert!(!vote.agrees_with(&local));

        let vote = PeerVote::responded(PeerId::from("peer-a"), Vec::new());
        assert!(vote.agrees_with(&local));
    }
}
