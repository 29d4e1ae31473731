use crate::ledger::Block;
use crate::network::PeerAddr;
use std::time::Duration;

/// Peer failures a round set is designed to tolerate: `ceil((1 + peers) / 2) - 1`.
pub fn max_failures(peer_count: usize) -> usize {
    (1 + peer_count).div_ceil(2) - 1
}

/// Super-rounds per decision cycle.
pub fn super_rounds(peer_count: usize) -> usize {
    max_failures(peer_count) + 1
}

/// Timing knobs for the round engine.
#[derive(Debug, Clone)]
pub struct RoundConfig {
    /// Bound on one request/response exchange with a peer (and on its single retry).
    pub round_timeout: Duration,
    /// Extra round sets to run when nothing is eligible before giving up on the round.
    pub empty_round_retries: u32,
    pub empty_round_pause: Duration,
    /// Fallback poll interval of the control loop while idle.
    pub idle_poll: Duration,
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self {
            round_timeout: Duration::from_secs(5),
            empty_round_retries: 3,
            empty_round_pause: Duration::from_secs(1),
            idle_poll: Duration::from_millis(50),
        }
    }
}

/// What one full round set did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundReport {
    pub super_rounds: usize,
    pub merged: usize,
    pub evicted: Vec<PeerAddr>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundOutcome {
    Decided(Block),
    /// Nothing eligible after every retry; the node went back to idle.
    Abandoned,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_budget_matches_formula() {
        let expected = [(0, 0), (1, 0), (2, 1), (3, 1), (4, 2), (5, 2), (6, 3)];
        for (peers, failures) in expected {
            assert_eq!(max_failures(peers), failures, "peers={peers}");
            assert_eq!(super_rounds(peers), failures + 1);
        }
    }
}
