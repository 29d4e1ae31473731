//! Consensus module: round-based proposal exchange and smallest-hash decision.
//!
//! Public surface:
//! - ConsensusEngine: runs super-rounds against the peer set, merges proposals, decides
//! - PeerExchange: outbound request seam implemented by the network layer
//! - consensus_state: the shared node state store
//! - types: failure budget, round config and reports

pub mod consensus_state;
pub mod types;

use crate::consensus::consensus_state::{Decision, SharedState};
use crate::consensus::types::{super_rounds, RoundConfig, RoundOutcome, RoundReport};
use crate::ledger::Block;
use crate::network::{ExchangeError, PeerAddr};
use crate::utils::metrics::{self, METRICS};
use futures::future::join_all;
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::{watch, Notify};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

/// Outbound side of a round: ask one peer for its proposals at `index`.
/// Implemented by `network::ConnectionManager`.
#[async_trait::async_trait]
pub trait PeerExchange: Send + Sync + 'static {
    async fn request_values(&self, peer: &PeerAddr, index: u64) -> Result<Vec<Block>, ExchangeError>;
    /// Drop the current connection to `peer` and open a fresh one.
    async fn reconnect(&self, peer: &PeerAddr) -> Result<(), ExchangeError>;
    /// Forget `peer` for good.
    fn evict(&self, peer: &PeerAddr);
}

/// ConsensusEngine drives decision cycles over the shared state.
pub struct ConsensusEngine<P: PeerExchange> {
    state: SharedState,
    peers: RwLock<Vec<PeerAddr>>,
    net: Arc<P>,
    cfg: RoundConfig,
    wake: Arc<Notify>,
}

impl<P: PeerExchange> ConsensusEngine<P> {
    pub fn new(state: SharedState, peers: Vec<PeerAddr>, net: Arc<P>, cfg: RoundConfig) -> Self {
        Self {
            state,
            peers: RwLock::new(peers),
            net,
            cfg,
            wake: Arc::new(Notify::new()),
        }
    }

    /// Handle inbound handlers use to tell the control loop a round has started.
    pub fn round_signal(&self) -> Arc<Notify> {
        self.wake.clone()
    }

    pub fn peers(&self) -> Vec<PeerAddr> {
        self.peers.read().clone()
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    fn is_active(&self) -> bool {
        self.state.lock().active
    }

    /// Control loop: wait for the round flag, run the round to completion, repeat.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                info!("consensus loop observed shutdown");
                return;
            }
            if self.is_active() {
                tokio::select! {
                    _ = self.run_until_decided() => {}
                    _ = shutdown.changed() => {
                        info!("consensus loop observed shutdown mid-round");
                        return;
                    }
                }
                continue;
            }
            tokio::select! {
                _ = self.wake.notified() => {}
                _ = shutdown.changed() => {}
                _ = sleep(self.cfg.idle_poll) => {}
            }
        }
    }

    /// Run round sets until a block is decided or the empty-round budget is spent.
    pub async fn run_until_decided(&self) -> RoundOutcome {
        let mut retries = 0;
        loop {
            let report = self.run_round_set().await;
            debug!(
                "round set finished: {} super-rounds, {} proposals merged, {} peers evicted",
                report.super_rounds,
                report.merged,
                report.evicted.len()
            );

            let decision = self.state.lock().decide_block();
            match decision {
                Decision::Decided(block) => {
                    METRICS.inc_counter(metrics::BLOCKS_DECIDED);
                    info!(
                        "appended block {} to the chain: {} ({} decided since start)",
                        block.index(),
                        block.current_hash(),
                        METRICS.counter(metrics::BLOCKS_DECIDED)
                    );
                    let snapshot = self.state.lock().snapshot();
                    debug!("state after decision: {:?}", snapshot);
                    METRICS.set_gauge(metrics::CHAIN_HEIGHT, block.index() as f64);
                    METRICS.set_gauge(metrics::MEMPOOL_SIZE, 0.0);
                    return RoundOutcome::Decided(block);
                }
                Decision::NoEligible if retries < self.cfg.empty_round_retries => {
                    retries += 1;
                    warn!(
                        "no proposal with transactions to decide; re-running broadcast ({}/{})",
                        retries, self.cfg.empty_round_retries
                    );
                    sleep(self.cfg.empty_round_pause).await;
                }
                Decision::NoEligible => {
                    self.state.lock().abandon_round();
                    warn!("no proposal with transactions after {} retries; abandoning round", retries);
                    METRICS.inc_counter(metrics::ROUNDS_ABANDONED);
                    return RoundOutcome::Abandoned;
                }
            }
        }
    }

    /// One full set of super-rounds against a fixed peer list, followed by eviction
    /// of every peer that failed an exchange and its retry.
    pub async fn run_round_set(&self) -> RoundReport {
        let peers = self.peers();
        let rounds = super_rounds(peers.len());
        let mut failed = BTreeSet::new();
        let mut merged = 0;

        for round in 0..rounds {
            let index = self.state.lock().head().index() + 1;
            debug!("super-round {}/{} requesting index {} from {} peers", round + 1, rounds, index, peers.len());

            let results = join_all(peers.iter().map(|peer| self.exchange(peer, index))).await;
            for (peer, result) in peers.iter().zip(results) {
                match result {
                    Some(added) => merged += added,
                    None => {
                        failed.insert(peer.clone());
                    }
                }
            }
        }

        let evicted: Vec<PeerAddr> = failed.into_iter().collect();
        if !evicted.is_empty() {
            self.peers.write().retain(|p| !evicted.contains(p));
            for peer in &evicted {
                warn!("removing neighbour {}", peer);
                self.net.evict(peer);
                METRICS.inc_counter(metrics::PEERS_EVICTED);
            }
        }

        RoundReport { super_rounds: rounds, merged, evicted }
    }

    /// Request, and on failure reconnect and request exactly once more.
    /// Returns the number of newly merged proposals, or None if both attempts failed.
    async fn exchange(&self, peer: &PeerAddr, index: u64) -> Option<usize> {
        let first = match timeout(self.cfg.round_timeout, self.net.request_values(peer, index)).await {
            Ok(res) => res,
            Err(_) => Err(ExchangeError::Timeout),
        };
        let blocks = match first {
            Ok(blocks) => blocks,
            Err(e) => {
                debug!("communication with {} failed: {}; reconnecting", peer, e);
                METRICS.inc_counter(metrics::PEER_RETRIES);
                let retry = async {
                    self.net.reconnect(peer).await?;
                    self.net.request_values(peer, index).await
                };
                match timeout(self.cfg.round_timeout, retry).await {
                    Ok(Ok(blocks)) => blocks,
                    Ok(Err(e)) => {
                        debug!("communication with {} failed after reconnect: {}", peer, e);
                        return None;
                    }
                    Err(_) => {
                        debug!("communication with {} timed out after reconnect", peer);
                        return None;
                    }
                }
            }
        };
        let added = self.state.lock().merge_proposals(blocks);
        Some(added)
    }
}
