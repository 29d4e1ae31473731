//! Ledger: block model, canonical hashing and the in-memory append-only chain.

pub mod hasher;

use crate::txpool::Transaction;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Digest the genesis block is known by on the network.
pub const GENESIS_HASH: &str = "03525042c7132a2ec3db14b7aa1db816e61f1311199ae2a31f3ad1c4312047d1";

/// 32 zero bytes, hex encoded.
pub const ZERO_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BlockError {
    #[error("block {index}: carried hash {carried} does not match content hash {computed}")]
    HashMismatch { index: u64, carried: String, computed: String },
    #[error("block {index} does not extend head {head}")]
    DoesNotExtend { index: u64, head: u64 },
}

/// A committed block or a candidate (proposal); both have the same shape.
///
/// `current_hash` is always derived from the other three fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireBlock")]
pub struct Block {
    index: u64,
    transactions: Vec<Transaction>,
    previous_hash: String,
    current_hash: String,
}

/// Block as it arrives from a peer, before its hash has been checked.
#[derive(Debug, Clone, Deserialize)]
pub struct WireBlock {
    pub index: u64,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    pub previous_hash: String,
    pub current_hash: String,
}

impl TryFrom<WireBlock> for Block {
    type Error = BlockError;

    fn try_from(raw: WireBlock) -> Result<Self, Self::Error> {
        let genesis = Block::genesis();
        if raw.index == 0
            && raw.transactions.is_empty()
            && raw.previous_hash == genesis.previous_hash
            && raw.current_hash == genesis.current_hash
        {
            return Ok(genesis);
        }
        let block = Block::new(raw.index, raw.transactions, raw.previous_hash);
        if block.current_hash != raw.current_hash {
            return Err(BlockError::HashMismatch {
                index: block.index,
                carried: raw.current_hash,
                computed: block.current_hash,
            });
        }
        Ok(block)
    }
}

impl Block {
    pub fn new(index: u64, transactions: Vec<Transaction>, previous_hash: impl Into<String>) -> Self {
        let previous_hash = previous_hash.into();
        let current_hash = hasher::block_hash(index, &transactions, &previous_hash);
        Self { index, transactions, previous_hash, current_hash }
    }

    /// Fixed genesis. Its digest is a well-known constant rather than derived.
    pub fn genesis() -> Self {
        Self {
            index: 0,
            transactions: vec![],
            previous_hash: ZERO_HASH.to_string(),
            current_hash: GENESIS_HASH.to_string(),
        }
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn previous_hash(&self) -> &str {
        &self.previous_hash
    }

    pub fn current_hash(&self) -> &str {
        &self.current_hash
    }

    /// True if this block can be appended directly after `head`.
    pub fn extends(&self, head: &Block) -> bool {
        self.index == head.index + 1 && self.previous_hash == head.current_hash
    }
}

/// Append-only in-memory chain, never empty.
#[derive(Debug, Clone)]
pub struct Chain {
    blocks: Vec<Block>,
}

impl Default for Chain {
    fn default() -> Self {
        Self::new()
    }
}

impl Chain {
    pub fn new() -> Self {
        Self { blocks: vec![Block::genesis()] }
    }

    pub fn head(&self) -> &Block {
        // never empty: constructed with genesis, only grows
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Block> {
        self.blocks.get(index)
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn append(&mut self, block: Block) -> Result<(), BlockError> {
        let head = self.head();
        if !block.extends(head) {
            return Err(BlockError::DoesNotExtend { index: block.index, head: head.index });
        }
        self.blocks.push(block);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(nonce: u64) -> Transaction {
        Transaction::new("aa".repeat(32), "hello", nonce, "bb".repeat(64))
    }

    #[test]
    fn genesis_is_fixed() {
        let g = Block::genesis();
        assert_eq!(g.index(), 0);
        assert!(g.transactions().is_empty());
        assert_eq!(g.previous_hash(), ZERO_HASH);
        assert_eq!(g.current_hash(), GENESIS_HASH);
    }

    #[test]
    fn chain_links_and_hashes_hold() {
        let mut chain = Chain::new();
        for n in 0..3 {
            let head = chain.head().clone();
            chain.append(Block::new(head.index() + 1, vec![tx(n)], head.current_hash())).unwrap();
        }
        assert_eq!(chain.len(), 4);
        for pair in chain.blocks().windows(2) {
            let (prev, cur) = (&pair[0], &pair[1]);
            assert_eq!(cur.index(), prev.index() + 1);
            assert_eq!(cur.previous_hash(), prev.current_hash());
            assert_eq!(
                cur.current_hash(),
                hasher::block_hash(cur.index(), cur.transactions(), cur.previous_hash())
            );
        }
    }

    #[test]
    fn append_rejects_unlinked_block() {
        let mut chain = Chain::new();
        let err = chain.append(Block::new(1, vec![tx(0)], "ff".repeat(32))).unwrap_err();
        assert_eq!(err, BlockError::DoesNotExtend { index: 1, head: 0 });
        assert!(chain.append(Block::new(2, vec![tx(0)], GENESIS_HASH)).is_err());
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn wire_block_with_forged_hash_is_rejected() {
        let good = Block::new(1, vec![tx(0)], GENESIS_HASH);
        let mut json = serde_json::to_value(&good).unwrap();
        let decoded: Block = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(decoded, good);

        json["current_hash"] = serde_json::Value::String("00".repeat(32));
        assert!(serde_json::from_value::<Block>(json).is_err());
    }

    #[test]
    fn genesis_decodes_from_wire() {
        let json = serde_json::to_value(Block::genesis()).unwrap();
        let decoded: Block = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, Block::genesis());
    }
}
