//! Transaction pool: transaction model, mempool, nonce table and validation.

pub mod pool;
pub mod validator;

pub use pool::{Mempool, NonceTable, Transaction};
pub use validator::{check_transaction, validate_transaction, Rejection};
