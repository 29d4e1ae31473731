//! ConsensusState: chain, mempool, proposal set, nonce table and the round-active flag.
//!
//! Locking: the whole struct lives behind one `parking_lot::Mutex` (`SharedState`).
//! Inbound handlers and the control loop both go through it, it is the only lock
//! over consensus data, and it is never held across an `.await`.

use crate::ledger::{Block, Chain};
use crate::txpool::{check_transaction, Mempool, NonceTable, Rejection};
use parking_lot::Mutex;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, info};

pub type SharedState = Arc<Mutex<ConsensusState>>;

/// Snapshot representation for logging/inspection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsensusSnapshot {
    pub height: u64,
    pub head_hash: String,
    pub mempool_len: usize,
    pub proposals_len: usize,
    pub active: bool,
}

/// Result of offering a client transaction to the node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxOutcome {
    Accepted(Block),
    Rejected(Rejection),
    /// A round is running; the transaction was not looked at.
    Busy,
}

/// Result of the decide step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Decided(Block),
    /// No collected proposal carries transactions and extends the head.
    NoEligible,
}

/// Distinct proposals in arrival order; equality is full value equality.
#[derive(Debug, Clone, Default)]
pub struct ProposalSet {
    items: Vec<Block>,
}

impl ProposalSet {
    /// Returns false if an equal proposal is already present.
    pub fn insert(&mut self, block: Block) -> bool {
        if self.items.contains(&block) {
            return false;
        }
        self.items.push(block);
        true
    }

    pub fn contains(&self, block: &Block) -> bool {
        self.items.contains(block)
    }

    pub fn snapshot(&self) -> Vec<Block> {
        self.items.clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Block> {
        self.items.iter()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// ConsensusState holds live consensus information
#[derive(Debug, Default)]
pub struct ConsensusState {
    pub chain: Chain,
    pub mempool: Mempool,
    pub proposals: ProposalSet,
    pub nonces: NonceTable,
    /// Set when a proposal is created, cleared once the round ends.
    pub active: bool,
}

impl ConsensusState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedState {
        Arc::new(Mutex::new(Self::new()))
    }

    pub fn head(&self) -> &Block {
        self.chain.head()
    }

    /// Snapshot the mempool into a candidate for the next index and record it.
    pub fn create_proposal(&mut self) -> Block {
        let head = self.chain.head();
        let proposal = Block::new(head.index() + 1, self.mempool.snapshot(), head.current_hash());
        if self.proposals.insert(proposal.clone()) {
            info!(
                "created block proposal {} with {} txs: {}",
                proposal.index(),
                proposal.transactions().len(),
                proposal.current_hash()
            );
        }
        proposal
    }

    /// Validate a client transaction and, if it passes, pool it, propose and go active.
    pub fn accept_transaction(&mut self, payload: &Value, from: SocketAddr) -> TxOutcome {
        if self.active {
            debug!("round in progress; refusing transaction from {}", from);
            return TxOutcome::Busy;
        }
        debug!("received a transaction from {}: {}", from.ip(), payload);
        match check_transaction(payload, &mut self.nonces) {
            Ok(tx) => {
                info!("stored transaction in the pool: {}", tx.signature());
                self.mempool.push(tx);
                let proposal = self.create_proposal();
                self.active = true;
                TxOutcome::Accepted(proposal)
            }
            Err(reason) => {
                info!("rejected transaction from {}: {}", from, reason);
                TxOutcome::Rejected(reason)
            }
        }
    }

    /// Answer a peer asking for blocks at `index`.
    ///
    /// A peer asking for an index we already have gets our head; otherwise it gets
    /// every proposal we hold, and we join the round if we were idle.
    pub fn values_for(&mut self, index: u64) -> Vec<Block> {
        let head = self.chain.head();
        if index <= head.index() {
            return vec![head.clone()];
        }
        if !self.active {
            self.create_proposal();
            self.active = true;
        }
        self.proposals.snapshot()
    }

    /// Merge proposals received from a peer. Transactions in newly added proposals
    /// advance the nonce table. Returns how many proposals were new.
    pub fn merge_proposals(&mut self, blocks: Vec<Block>) -> usize {
        let mut added = 0;
        for block in blocks {
            if self.proposals.contains(&block) {
                continue;
            }
            for tx in block.transactions() {
                self.nonces.raise(tx.sender(), tx.nonce());
            }
            self.proposals.insert(block);
            added += 1;
        }
        added
    }

    /// Pick the proposal with the smallest hash among those that carry transactions
    /// and extend the head, append it and reset the round.
    pub fn decide_block(&mut self) -> Decision {
        let head = self.chain.head();
        let winner = self
            .proposals
            .iter()
            .filter(|p| !p.transactions().is_empty() && p.extends(head))
            .min_by(|a, b| a.current_hash().cmp(b.current_hash()))
            .cloned();

        let Some(block) = winner else {
            return Decision::NoEligible;
        };
        if let Err(e) = self.chain.append(block.clone()) {
            // filtered on `extends` above
            debug!("decided block failed to append: {}", e);
            return Decision::NoEligible;
        }
        self.proposals.clear();
        self.mempool.clear();
        self.active = false;
        Decision::Decided(block)
    }

    /// Give up on a round that produced nothing to decide. Chain and mempool stay as they are.
    pub fn abandon_round(&mut self) {
        self.proposals.clear();
        self.active = false;
    }

    pub fn snapshot(&self) -> ConsensusSnapshot {
        let head = self.chain.head();
        ConsensusSnapshot {
            height: head.index(),
            head_hash: head.current_hash().to_string(),
            mempool_len: self.mempool.len(),
            proposals_len: self.proposals.len(),
            active: self.active,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;
    use crate::ledger::GENESIS_HASH;
    use crate::txpool::Transaction;

    fn from() -> SocketAddr {
        "127.0.0.1:4000".parse().unwrap()
    }

    fn payload(kp: &Keypair, message: &str, nonce: u64) -> Value {
        serde_json::to_value(Transaction::signed(kp, message, nonce)).unwrap()
    }

    #[test]
    fn accepted_transaction_proposes_and_activates() {
        let kp = Keypair::generate();
        let mut st = ConsensusState::new();

        let outcome = st.accept_transaction(&payload(&kp, "hello", 0), from());
        let TxOutcome::Accepted(proposal) = outcome else {
            panic!("expected the transaction to be accepted");
        };
        assert_eq!(proposal.index(), 1);
        assert_eq!(proposal.previous_hash(), GENESIS_HASH);
        assert_eq!(st.mempool.len(), 1);
        assert_eq!(st.nonces.get(&kp.public().to_hex()), 0);
        assert_eq!(st.proposals.len(), 1);
        assert!(st.active);

        // busy while the round runs, and the nonce is not consumed
        let busy = st.accept_transaction(&payload(&kp, "again", 1), from());
        assert_eq!(busy, TxOutcome::Busy);
        assert_eq!(st.nonces.get(&kp.public().to_hex()), 0);
    }

    #[test]
    fn proposal_is_not_changed_by_later_mempool_pushes() {
        let kp = Keypair::generate();
        let mut st = ConsensusState::new();
        st.mempool.push(Transaction::signed(&kp, "one", 0));
        let proposal = st.create_proposal();
        st.mempool.push(Transaction::signed(&kp, "two", 1));
        assert_eq!(proposal.transactions().len(), 1);
        assert_eq!(st.proposals.snapshot()[0].transactions().len(), 1);
    }

    #[test]
    fn identical_proposals_collapse() {
        let kp = Keypair::generate();
        let mut st = ConsensusState::new();
        st.mempool.push(Transaction::signed(&kp, "one", 0));
        let p = st.create_proposal();
        st.create_proposal();
        assert_eq!(st.proposals.len(), 1);
        assert_eq!(st.merge_proposals(vec![p.clone(), p]), 0);
        assert_eq!(st.proposals.len(), 1);
    }

    #[test]
    fn merge_raises_nonces_and_is_order_independent() {
        let kp = Keypair::generate();
        let a = Block::new(1, vec![Transaction::signed(&kp, "a", 3)], GENESIS_HASH);
        let b = Block::new(1, vec![Transaction::signed(&kp, "b", 7)], GENESIS_HASH);

        let mut left = ConsensusState::new();
        assert_eq!(left.merge_proposals(vec![a.clone(), b.clone()]), 2);
        let mut right = ConsensusState::new();
        right.merge_proposals(vec![b.clone()]);
        right.merge_proposals(vec![a.clone(), b.clone()]);

        let sender = kp.public().to_hex();
        assert_eq!(left.nonces.get(&sender), 7);
        assert_eq!(right.nonces.get(&sender), 7);
        assert_eq!(left.proposals.len(), right.proposals.len());
        assert!(right.proposals.contains(&a) && right.proposals.contains(&b));
    }

    #[test]
    fn decide_picks_smallest_hash_with_transactions() {
        let kp = Keypair::generate();
        let mut st = ConsensusState::new();
        let candidates: Vec<Block> = (0..5)
            .map(|n| Block::new(1, vec![Transaction::signed(&kp, "m", n)], GENESIS_HASH))
            .collect();
        let empty = Block::new(1, vec![], GENESIS_HASH);
        st.merge_proposals(candidates.clone());
        st.merge_proposals(vec![empty]);
        st.active = true;

        let expected = candidates.iter().min_by(|a, b| a.current_hash().cmp(b.current_hash())).unwrap();
        assert_eq!(st.decide_block(), Decision::Decided(expected.clone()));
        assert_eq!(st.chain.len(), 2);
        assert_eq!(st.head(), expected);
        assert!(st.proposals.is_empty());
        assert!(st.mempool.is_empty());
        assert!(!st.active);
    }

    #[test]
    fn decide_ignores_blocks_that_do_not_extend_head() {
        let kp = Keypair::generate();
        let mut st = ConsensusState::new();
        st.merge_proposals(vec![
            Block::new(2, vec![Transaction::signed(&kp, "far", 0)], GENESIS_HASH),
            Block::new(1, vec![Transaction::signed(&kp, "fork", 1)], "ab".repeat(32)),
        ]);
        assert_eq!(st.decide_block(), Decision::NoEligible);
        assert_eq!(st.chain.len(), 1);
    }

    #[test]
    fn empty_decision_is_a_no_op() {
        let mut st = ConsensusState::new();
        st.values_for(1);
        assert!(st.active);
        assert_eq!(st.decide_block(), Decision::NoEligible);
        assert!(st.active);
        assert_eq!(st.chain.len(), 1);

        st.abandon_round();
        assert!(!st.active);
        assert!(st.proposals.is_empty());
    }

    #[test]
    fn rejected_outcome_carries_a_cloneable_reason() {
        let kp = Keypair::generate();
        let mut st = ConsensusState::new();
        let mut bad = payload(&kp, "hi", 0);
        bad["signature"] = Value::String("00".repeat(64));
        let outcome = st.accept_transaction(&bad, from());
        let copy = outcome.clone();
        assert_eq!(copy, TxOutcome::Rejected(Rejection::SignatureInvalid));
        assert_eq!(outcome, copy);
    }

    #[test]
    fn snapshot_reflects_round_progress() {
        let kp = Keypair::generate();
        let mut st = ConsensusState::new();
        st.accept_transaction(&payload(&kp, "snap", 0), from());
        let during = st.snapshot();
        assert_eq!(
            during,
            ConsensusSnapshot {
                height: 0,
                head_hash: GENESIS_HASH.to_string(),
                mempool_len: 1,
                proposals_len: 1,
                active: true,
            }
        );

        let Decision::Decided(block) = st.decide_block() else {
            panic!("expected a decision");
        };
        let after = st.snapshot();
        assert_eq!(after.height, 1);
        assert_eq!(after.head_hash, block.current_hash());
        assert_eq!((after.mempool_len, after.proposals_len, after.active), (0, 0, false));
    }

    #[test]
    fn values_for_past_index_returns_head_without_activating() {
        let mut st = ConsensusState::new();
        let reply = st.values_for(0);
        assert_eq!(reply, vec![Block::genesis()]);
        assert!(!st.active);
        assert!(st.proposals.is_empty());
    }

    #[test]
    fn values_for_next_index_relays_all_proposals() {
        let kp = Keypair::generate();
        let mut st = ConsensusState::new();
        let remote = Block::new(1, vec![Transaction::signed(&kp, "x", 0)], GENESIS_HASH);
        st.merge_proposals(vec![remote.clone()]);

        let reply = st.values_for(1);
        assert!(st.active);
        assert_eq!(reply.len(), 2);
        assert!(reply.contains(&remote));
        // second request while active does not propose again
        assert_eq!(st.values_for(1).len(), 2);
    }
}
