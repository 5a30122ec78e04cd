use std::time::Duration;

/// Coordinator parameters.
#[derive(Clone, Debug)]
pub struct CoordinatorConfig {
    /// First block to process when the store holds no checkpoint yet.
    pub start_block: u64,
    /// Pause after a reverted round before the redelivered block is
    /// processed again.
    pub retry_delay: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            start_block: 1,
            retry_delay: Duration::from_millis(500),
        }
    }
}

/// What a validation round does when the peer roster is empty.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EmptyRosterPolicy {
    /// Nobody can confirm the digest, so nothing is committed.
    #[default]
    Reject,
    /// Single-node mode: the local digest is accepted as is.
    TrustLocal,
}

/// Quorum validation parameters.
#[derive(Clone, Debug)]
pub struct QuorumConfig {
    /// Upper bound on one peer's answer, retries included. A peer that does
    /// not answer in time is counted as not responding.
    pub peer_timeout: Duration,
    pub empty_roster: EmptyRosterPolicy,
}

impl Default for QuorumConfig {
    fn default() -> Self {
        Self {
            peer_timeout: Duration::from_secs(2),
            empty_roster: EmptyRosterPolicy::Reject,
        }
    }
}
