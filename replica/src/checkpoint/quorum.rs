//! Digest confirmation by a quorum of peer replicas.
//!
//! For one validation round the validator asks every peer in the roster for
//! its digest at the round's block and counts:
//!
//! - a peer answering with exactly the local digest as a match,
//! - a peer answering with anything else as a mismatch,
//! - a peer that does not answer (error or timeout) as no longer alive for
//!   this round.
//!
//! After each answer the threshold `floor(alive * 2 / 3) + 1` is recomputed
//! and the round commits as soon as `matches >= threshold`. Matches only
//! grow and the threshold only shrinks, so the decision does not depend on
//! the order in which answers arrive.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, info, warn};

use crate::types::{PeerId, PeerVote, StateDigest};

use super::config::{EmptyRosterPolicy, QuorumConfig};

/// Asks one peer for its ledger digest at a block height.
///
/// Implementations must not fail: anything other than a clean answer is
/// reported as [`PeerVote::no_response`].
#[async_trait]
pub trait PeerRootHashClient: Send + Sync {
    async fn query(&self, peer: &PeerId, block_number: u64) -> PeerVote;
}

#[async_trait]
impl<C: PeerRootHashClient + ?Sized> PeerRootHashClient for Arc<C> {
    async fn query(&self, peer: &PeerId, block_number: u64) -> PeerVote {
        (**self).query(peer, block_number).await
    }
}

/// Immutable set of peers asked in every round.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PeerRoster(Arc<[PeerId]>);

impl PeerRoster {
    pub fn new(peers: Vec<PeerId>) -> Self {
        Self(peers.into())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PeerId> {
        self.0.iter()
    }
}

impl FromIterator<PeerId> for PeerRoster {
    fn from_iter<I: IntoIterator<Item = PeerId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Number of matching digests needed when `alive` peers are still counted.
pub fn quorum_threshold(alive: usize) -> usize {
    alive * 2 / 3 + 1
}

/// Running count of one validation round.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QuorumTally {
    pub roster_size: usize,
    pub alive: usize,
    pub matches: usize,
    pub mismatches: usize,
    pub silent: usize,
}

impl QuorumTally {
    pub fn new(roster_size: usize) -> Self {
        Self {
            roster_size,
            alive: roster_size,
            ..Self::default()
        }
    }

    pub fn record(&mut self, vote: &PeerVote, local: &StateDigest) {
        if !vote.responded {
            self.silent += 1;
            self.alive = self.alive.saturating_sub(1);
        } else if vote.agrees_with(local) {
            self.matches += 1;
        } else {
            self.mismatches += 1;
        }
    }

    pub fn threshold(&self) -> usize {
        quorum_threshold(self.alive)
    }

    pub fn is_satisfied(&self) -> bool {
        self.matches >= self.threshold()
    }
}

/// Result of a validation round.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuorumDecision {
    Commit(QuorumTally),
    Reject(QuorumTally),
}

impl QuorumDecision {
    pub fn is_commit(&self) -> bool {
        matches!(self, QuorumDecision::Commit(_))
    }

    pub fn tally(&self) -> &QuorumTally {
        match self {
            QuorumDecision::Commit(tally) | QuorumDecision::Reject(tally) => tally,
        }
    }
}

/// Confirms local digests against a peer roster.
pub struct QuorumValidator<C> {
    client: C,
    config: QuorumConfig,
}

impl<C> QuorumValidator<C>
where
    C: PeerRootHashClient,
{
    pub fn new(client: C, config: QuorumConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &QuorumConfig {
        &self.config
    }

    /// Runs one round for `local` at `block_number`.
    ///
    /// All peers are queried concurrently. Queries still in flight when the
    /// round commits early are dropped with the round.
    pub async fn validate(
        &self,
        local: &StateDigest,
        block_number: u64,
        roster: &PeerRoster,
    ) -> QuorumDecision {
        let mut tally = QuorumTally::new(roster.len());

        if roster.is_empty() {
            return match self.config.empty_roster {
                EmptyRosterPolicy::Reject => {
                    warn!(block = block_number, "no peers configured; digest cannot be confirmed");
                    QuorumDecision::Reject(tally)
                }
                EmptyRosterPolicy::TrustLocal => {
                    debug!(block = block_number, "no peers configured; trusting local digest");
                    QuorumDecision::Commit(tally)
                }
            };
        }

        let timeout = self.config.peer_timeout;
        let mut pending: FuturesUnordered<_> = roster
            .iter()
            .map(|peer| async move {
                match tokio::time::timeout(timeout, self.client.query(peer, block_number)).await {
                    Ok(vote) => vote,
                    Err(_) => {
                        debug!(block = block_number, %peer, "peer query timed out");
                        PeerVote::no_response(peer.clone())
                    }
                }
            })
            .collect();

        while let Some(vote) = pending.next().await {
            tally.record(&vote, local);
            debug!(
                block = block_number,
                peer = %vote.peer,
                responded = vote.responded,
                matches = tally.matches,
                alive = tally.alive,
                threshold = tally.threshold(),
                "peer vote counted"
            );

            if tally.is_satisfied() {
                info!(
                    block = block_number,
                    matches = tally.matches,
                    alive = tally.alive,
                    threshold = tally.threshold(),
                    "quorum reached"
                );
                return QuorumDecision::Commit(tally);
            }
        }

        warn!(
            block = block_number,
            matches = tally.matches,
            mismatches = tally.mismatches,
            silent = tally.silent,
            threshold = tally.threshold(),
            "quorum not reached"
        );
        QuorumDecision::Reject(tally)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Clone, Copy)]
    enum Answer {
        Match,
        Differ,
        Silent,
        Slow,
    }

    struct ScriptedPeers {
        answers: HashMap<PeerId, Answer>,
        local: StateDigest,
        queried: AtomicUsize,
    }

    #[async_trait]
    impl PeerRootHashClient for ScriptedPeers {
        async fn query(&self, peer: &PeerId, _block_number: u64) -> PeerVote {
            self.queried.fetch_add(1, Ordering::SeqCst);
            match self.answers[peer] {
                Answer::Match => PeerVote::responded(peer.clone(), self.local.0.clone()),
                Answer::Differ => PeerVote::responded(peer.clone(), vec![0xde, 0xad]),
                Answer::Silent => PeerVote::no_response(peer.clone()),
                Answer::Slow => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    PeerVote::responded(peer.clone(), self.local.0.clone())
                }
            }
        }
    }

    fn local() -> StateDigest {
        StateDigest(vec![7; 32])
    }

    fn setup(answers: &[Answer]) -> (QuorumValidator<ScriptedPeers>, PeerRoster) {
        let peers: Vec<PeerId> = (0..answers.len())
            .map(|i| PeerId(format!("peer-{i}")))
            .collect();
        let client = ScriptedPeers {
            answers: peers.iter().cloned().zip(answers.iter().copied()).collect(),
            local: local(),
            queried: AtomicUsize::new(0),
        };
        let config = QuorumConfig {
            peer_timeout: Duration::from_millis(200),
            ..QuorumConfig::default()
        };
        (QuorumValidator::new(client, config), PeerRoster::new(peers))
    }

    #[test]
    fn threshold_arithmetic() {
        assert_eq!(quorum_threshold(4), 3);
        assert_eq!(quorum_threshold(3), 3);
        assert_eq!(quorum_threshold(6), 5);
        assert_eq!(quorum_threshold(1), 1);
        assert_eq!(quorum_threshold(0), 1);
    }

    #[tokio::test]
    async fn three_of_four_matching_commits() {
        use Answer::*;
        let (validator, roster) = setup(&[Match, Match, Differ, Match]);
        let decision = validator.validate(&local(), 10, &roster).await;
        assert!(decision.is_commit());
        assert_eq!(decision.tally().matches, 3);
    }

    #[tokio::test]
    async fn two_of_four_matching_rejects() {
        use Answer::*;
        let (validator, roster) = setup(&[Match, Differ, Match, Differ]);
        let decision = validator.validate(&local(), 10, &roster).await;
        assert_eq!(
            decision,
            QuorumDecision::Reject(QuorumTally {
                roster_size: 4,
                alive: 4,
                matches: 2,
                mismatches: 2,
                silent: 0,
            })
        );
    }

    #[tokio::test]
    async fn one_of_four_matching_rejects() {
        use Answer::*;
        let (validator, roster) = setup(&[Differ, Match, Differ, Differ]);
        assert!(!validator.validate(&local(), 10, &roster).await.is_commit());
    }

    #[tokio::test]
    async fn silent_peers_lower_the_threshold() {
        use Answer::*;
        // 3 alive -> threshold 3, all three match.
        let (validator, roster) = setup(&[Silent, Match, Match, Match]);
        assert!(validator.validate(&local(), 10, &roster).await.is_commit());

        // 2 alive -> threshold 2.
        let (validator, roster) = setup(&[Silent, Match, Silent, Match]);
        let decision = validator.validate(&local(), 10, &roster).await;
        assert!(decision.is_commit());
        assert_eq!(decision.tally().alive, 2);
    }

    #[tokio::test]
    async fn all_silent_rejects() {
        use Answer::*;
        let (validator, roster) = setup(&[Silent, Silent, Silent]);
        let decision = validator.validate(&local(), 10, &roster).await;
        assert!(!decision.is_commit());
        assert_eq!(decision.tally().alive, 0);
        assert_eq!(decision.tally().silent, 3);
    }

    #[tokio::test]
    async fn timed_out_peer_counts_as_silent() {
        use Answer::*;
        // The slow peer times out, leaving 2 alive with 1 match: threshold 2.
        let (validator, roster) = setup(&[Slow, Match, Differ]);
        let decision = validator.validate(&local(), 10, &roster).await;
        assert_eq!(
            decision,
            QuorumDecision::Reject(QuorumTally {
                roster_size: 3,
                alive: 2,
                matches: 1,
                mismatches: 1,
                silent: 1,
            })
        );
    }

    #[tokio::test]
    async fn commits_without_waiting_for_slow_peers() {
        use Answer::*;
        // Three quick matches satisfy threshold 3 out of 4 before the slow
        // peer's timeout would fire.
        let (validator, roster) = setup(&[Match, Match, Match, Slow]);
        let started = std::time::Instant::now();
        let decision = validator.validate(&local(), 10, &roster).await;
        assert!(decision.is_commit());
        assert!(started.elapsed() < Duration::from_millis(200));
    }

    #[tokio::test]
    async fn empty_roster_follows_policy() {
        let (validator, roster) = setup(&[]);
        assert!(roster.is_empty());
        assert!(!validator.validate(&local(), 1, &roster).await.is_commit());

        let trusting = QuorumValidator::new(
            validator.client,
            QuorumConfig {
                empty_roster: EmptyRosterPolicy::TrustLocal,
                ..QuorumConfig::default()
            },
        );
        assert!(trusting.validate(&local(), 1, &roster).await.is_commit());
        assert_eq!(trusting.client.queried.load(Ordering::SeqCst), 0);
    }
}
