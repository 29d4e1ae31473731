use anyhow::{anyhow, Result};
use ed25519_dalek::SigningKey;
use hex::FromHex;
use rand::rngs::OsRng;

/// Raw ed25519 public key; hex encoded on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PublicKey(pub [u8; 32]);

impl PublicKey {
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = <[u8; 32]>::from_hex(s).map_err(|e| anyhow!("invalid public key hex: {e}"))?;
        Ok(Self(bytes))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

#[derive(Clone)]
pub struct Keypair {
    pub(crate) signing: SigningKey,
}

impl Keypair {
    /// Generate a new random keypair
    pub fn generate() -> Self {
        Self { signing: SigningKey::generate(&mut OsRng) }
    }

    /// Construct from a raw 32-byte secret
    pub fn from_bytes(secret: &[u8]) -> Result<Self> {
        let secret: [u8; 32] = secret
            .try_into()
            .map_err(|_| anyhow!("secret key must be 32 bytes, got {}", secret.len()))?;
        Ok(Self { signing: SigningKey::from_bytes(&secret) })
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let secret = hex::decode(s.trim())?;
        Self::from_bytes(&secret)
    }

    /// Get public key
    pub fn public(&self) -> PublicKey {
        PublicKey(self.signing.verifying_key().to_bytes())
    }

    /// Export secret as bytes
    pub fn secret_bytes(&self) -> [u8; 32] {
        self.signing.to_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_roundtrips_to_same_public_key() {
        let kp = Keypair::generate();
        let again = Keypair::from_bytes(&kp.secret_bytes()).unwrap();
        assert_eq!(kp.public(), again.public());
        assert_eq!(PublicKey::from_hex(&kp.public().to_hex()).unwrap(), kp.public());
    }

    #[test]
    fn rejects_short_material() {
        assert!(Keypair::from_bytes(&[1u8; 31]).is_err());
        assert!(PublicKey::from_hex("abcd").is_err());
    }
}
