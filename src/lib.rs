//! gossipchain: a peer-to-peer ledger node that gossips signed transactions and
//! agrees on the next block by exchanging proposals over a fixed neighbourhood.

pub mod consensus;
pub mod crypto;
pub mod ledger;
pub mod network;
pub mod node;
pub mod txpool;
pub mod utils;
