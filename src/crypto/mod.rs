//! Crypto module: ed25519 key management, signing and verification.

pub mod keys;
pub mod sign;

pub use keys::{Keypair, PublicKey};
pub use sign::{Signature, Signer, Verifier};
