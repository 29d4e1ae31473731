use crate::crypto::{Keypair, PublicKey};
use anyhow::{anyhow, Result};
use ed25519_dalek::{Signature as DalekSig, Signer as DalekSigner, Verifier as DalekVerifier, VerifyingKey};
use hex::FromHex;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Signature(pub [u8; 64]);

impl Signature {
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = <[u8; 64]>::from_hex(s).map_err(|e| anyhow!("invalid signature hex: {e}"))?;
        Ok(Self(bytes))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

/// Trait for signing
pub trait Signer {
    fn sign(&self, msg: &[u8]) -> Signature;
}

/// Trait for verifying
pub trait Verifier {
    fn verify(&self, msg: &[u8], sig: &Signature) -> Result<()>;
}

impl Signer for Keypair {
    fn sign(&self, msg: &[u8]) -> Signature {
        Signature(self.signing.sign(msg).to_bytes())
    }
}

impl Verifier for PublicKey {
    fn verify(&self, msg: &[u8], sig: &Signature) -> Result<()> {
        let pk = VerifyingKey::from_bytes(&self.0)?;
        let ds = DalekSig::from_bytes(&sig.0);
        pk.verify(msg, &ds).map_err(|_| anyhow!("signature verification failed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_verify() {
        let kp = Keypair::generate();
        let sig = kp.sign(b"payload");
        assert!(kp.public().verify(b"payload", &sig).is_ok());
        assert!(kp.public().verify(b"tampered", &sig).is_err());
    }

    #[test]
    fn signature_hex_length_enforced() {
        assert!(Signature::from_hex(&"ab".repeat(64)).is_ok());
        assert!(Signature::from_hex(&"ab".repeat(63)).is_err());
    }
}
