//! Mempool and nonce table.
//!
//! Data model:
//! - Transaction: signed client payload, immutable once built
//! - Mempool: validated, uncommitted transactions in arrival order
//! - NonceTable: sender -> highest nonce accepted so far

use crate::crypto::{Keypair, Signer};
use crate::ledger::hasher;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Public TX model. Fields are hex strings exactly as they travel on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transaction {
    sender: String,
    message: String,
    nonce: u64,
    signature: String,
}

impl Transaction {
    /// Assemble a transaction from already-encoded parts. No checks are made here;
    /// see `validator::check_transaction` for that.
    pub fn new(
        sender: impl Into<String>,
        message: impl Into<String>,
        nonce: u64,
        signature: impl Into<String>,
    ) -> Self {
        Self {
            sender: sender.into(),
            message: message.into(),
            nonce,
            signature: signature.into(),
        }
    }

    /// Build and sign a transaction the way a wallet does.
    pub fn signed(keypair: &Keypair, message: impl Into<String>, nonce: u64) -> Self {
        let sender = keypair.public().to_hex();
        let message = message.into();
        let sig = keypair.sign(&hasher::transaction_bytes(&sender, &message, nonce));
        Self { sender, message, nonce, signature: sig.to_hex() }
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Bytes covered by the signature.
    pub fn signing_bytes(&self) -> Vec<u8> {
        hasher::transaction_bytes(&self.sender, &self.message, self.nonce)
    }
}

/// Ordered pool of validated transactions awaiting a decision.
#[derive(Debug, Clone, Default)]
pub struct Mempool {
    txs: Vec<Transaction>,
}

impl Mempool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, tx: Transaction) {
        self.txs.push(tx);
    }

    /// Copy of the current contents; later pushes do not affect it.
    pub fn snapshot(&self) -> Vec<Transaction> {
        self.txs.clone()
    }

    pub fn clear(&mut self) {
        self.txs.clear();
    }

    pub fn len(&self) -> usize {
        self.txs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.txs.is_empty()
    }
}

/// Highest accepted nonce per sender. A sender with no entry behaves as -1.
#[derive(Debug, Clone, Default)]
pub struct NonceTable {
    last: HashMap<String, u64>,
}

impl NonceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last accepted nonce, or -1 when the sender is unknown.
    pub fn get(&self, sender: &str) -> i128 {
        self.last.get(sender).map_or(-1, |n| i128::from(*n))
    }

    pub fn is_fresh(&self, sender: &str, nonce: u64) -> bool {
        i128::from(nonce) > self.get(sender)
    }

    /// Record `nonce` if it is higher than what we have. Returns true if the entry moved.
    pub fn raise(&mut self, sender: &str, nonce: u64) -> bool {
        if !self.is_fresh(sender, nonce) {
            return false;
        }
        self.last.insert(sender.to_string(), nonce);
        true
    }

    pub fn len(&self) -> usize {
        self.last.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last.is_empty()
    }
}
