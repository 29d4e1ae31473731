//! Transaction validation: sender, message, nonce and signature checks, in that
//! order, stopping at the first failure.
//!
//! The nonce table is updated as soon as the nonce check passes, *before* the
//! signature is verified. A transaction with a fresh nonce and a bad signature
//! therefore burns that nonce for its sender. Replays of any nonce at or below
//! the burned one are refused even if correctly signed.

use crate::crypto::{PublicKey, Signature, Verifier};
use crate::ledger::hasher;
use crate::txpool::pool::{NonceTable, Transaction};
use serde_json::Value;
use std::net::SocketAddr;
use thiserror::Error;
use tracing::{debug, info};

pub const SENDER_HEX_LEN: usize = 64;
pub const SIGNATURE_HEX_LEN: usize = 128;
pub const MAX_MESSAGE_CHARS: usize = 70;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Rejection {
    #[error("payload is not an object")]
    Payload,
    #[error("wrong sender")]
    Sender,
    #[error("wrong message")]
    Message,
    #[error("wrong nonce (last accepted {last})")]
    Nonce { last: i128 },
    #[error("malformed signature")]
    SignatureFormat,
    #[error("wrong signature")]
    SignatureInvalid,
}

fn is_hex_of_len(s: &str, len: usize) -> bool {
    s.len() == len && s.bytes().all(|b| b.is_ascii_hexdigit())
}

fn validate_sender(payload: &Value) -> Result<&str, Rejection> {
    match payload.get("sender").and_then(Value::as_str) {
        Some(s) if is_hex_of_len(s, SENDER_HEX_LEN) => Ok(s),
        _ => Err(Rejection::Sender),
    }
}

fn validate_message(payload: &Value) -> Result<&str, Rejection> {
    match payload.get("message").and_then(Value::as_str) {
        Some(m)
            if !m.is_empty()
                && m.chars().count() <= MAX_MESSAGE_CHARS
                && m.chars().all(char::is_alphanumeric) =>
        {
            Ok(m)
        }
        _ => Err(Rejection::Message),
    }
}

fn validate_nonce(payload: &Value, sender: &str, nonces: &mut NonceTable) -> Result<u64, Rejection> {
    let last = nonces.get(sender);
    let nonce = payload
        .get("nonce")
        .and_then(Value::as_u64)
        .ok_or(Rejection::Nonce { last })?;
    if !nonces.raise(sender, nonce) {
        return Err(Rejection::Nonce { last });
    }
    Ok(nonce)
}

fn validate_signature<'a>(
    payload: &'a Value,
    sender: &str,
    message: &str,
    nonce: u64,
) -> Result<&'a str, Rejection> {
    let sig_hex = match payload.get("signature").and_then(Value::as_str) {
        Some(s) if is_hex_of_len(s, SIGNATURE_HEX_LEN) => s,
        _ => return Err(Rejection::SignatureFormat),
    };
    let sig = Signature::from_hex(sig_hex).map_err(|_| Rejection::SignatureFormat)?;
    let key = PublicKey::from_hex(sender).map_err(|_| Rejection::SignatureInvalid)?;
    key.verify(&hasher::transaction_bytes(sender, message, nonce), &sig)
        .map_err(|_| Rejection::SignatureInvalid)?;
    Ok(sig_hex)
}

/// Run every check and return the typed transaction on success.
pub fn check_transaction(payload: &Value, nonces: &mut NonceTable) -> Result<Transaction, Rejection> {
    if !payload.is_object() {
        return Err(Rejection::Payload);
    }
    let sender = validate_sender(payload)?;
    let message = validate_message(payload)?;
    let nonce = validate_nonce(payload, sender, nonces)?;
    let signature = validate_signature(payload, sender, message, nonce)?;
    Ok(Transaction::new(sender, message, nonce, signature))
}

/// Boolean contract used by callers that only need accept/reject.
pub fn validate_transaction(payload: &Value, from: SocketAddr, nonces: &mut NonceTable) -> bool {
    debug!("received a transaction from {}: {}", from.ip(), payload);
    match check_transaction(payload, nonces) {
        Ok(_) => true,
        Err(reason) => {
            info!("rejected transaction from {}: {}", from, reason);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;
    use serde_json::json;

    const SENDER: &str = "ea4a6c63e29c520abef5507b132ec5f9954776aebebe7b92421eea691446d22c";
    const SIGNATURE: &str = "edd7a42df86f0ecae5a9bc1b33b5ddfdf6db4fd4382b259bf4b6cb2ece7f38c720ab4ae6de5118f4bee4ce2c6435bf6dd88a9768d8d3c5e6ee592b368685e40a";

    fn addr() -> SocketAddr {
        "127.0.0.1:9000".parse().unwrap()
    }

    fn signed_payload(kp: &Keypair, message: &str, nonce: u64) -> Value {
        serde_json::to_value(Transaction::signed(kp, message, nonce)).unwrap()
    }

    #[test]
    fn accepts_wallet_signed_vector() {
        let payload = json!({"sender": SENDER, "message": "hello", "nonce": 0, "signature": SIGNATURE});
        let mut nonces = NonceTable::new();
        let tx = check_transaction(&payload, &mut nonces).unwrap();
        assert_eq!(tx.sender(), SENDER);
        assert_eq!(nonces.get(SENDER), 0);
    }

    #[test]
    fn rejects_bad_sender() {
        let mut nonces = NonceTable::new();
        for sender in [json!("abc"), json!("zz".repeat(32)), json!(42), Value::Null] {
            let payload = json!({"sender": sender, "message": "hi", "nonce": 0, "signature": SIGNATURE});
            assert_eq!(check_transaction(&payload, &mut nonces), Err(Rejection::Sender));
        }
        assert!(nonces.is_empty());
    }

    #[test]
    fn rejects_bad_message() {
        let mut nonces = NonceTable::new();
        let long = "a".repeat(MAX_MESSAGE_CHARS + 1);
        for message in [json!(""), json!("hello world"), json!("semi;colon"), json!(long), json!(7)] {
            let payload = json!({"sender": SENDER, "message": message, "nonce": 0, "signature": SIGNATURE});
            assert_eq!(check_transaction(&payload, &mut nonces), Err(Rejection::Message));
        }
        let exact = "a".repeat(MAX_MESSAGE_CHARS);
        assert!(validate_message(&json!({"message": exact})).is_ok());
    }

    #[test]
    fn rejects_stale_or_invalid_nonce() {
        let kp = Keypair::generate();
        let mut nonces = NonceTable::new();
        assert!(validate_transaction(&signed_payload(&kp, "first", 4), addr(), &mut nonces));

        for nonce in [4u64, 3, 0] {
            let payload = signed_payload(&kp, "again", nonce);
            assert_eq!(check_transaction(&payload, &mut nonces), Err(Rejection::Nonce { last: 4 }));
        }
        let mut negative = signed_payload(&kp, "neg", 0);
        negative["nonce"] = json!(-1);
        assert!(matches!(check_transaction(&negative, &mut nonces), Err(Rejection::Nonce { .. })));
        let mut float = signed_payload(&kp, "flt", 9);
        float["nonce"] = json!(9.5);
        assert!(matches!(check_transaction(&float, &mut nonces), Err(Rejection::Nonce { .. })));
        assert_eq!(nonces.get(&kp.public().to_hex()), 4);
    }

    #[test]
    fn rejects_malformed_signature() {
        let kp = Keypair::generate();
        let mut nonces = NonceTable::new();
        let mut payload = signed_payload(&kp, "hi", 0);
        payload["signature"] = json!("ab".repeat(63));
        assert_eq!(check_transaction(&payload, &mut nonces), Err(Rejection::SignatureFormat));
    }

    #[test]
    fn bad_signature_still_consumes_nonce() {
        let kp = Keypair::generate();
        let other = Keypair::generate();
        let mut nonces = NonceTable::new();

        let mut forged = signed_payload(&other, "hi", 0);
        forged["sender"] = json!(kp.public().to_hex());
        assert_eq!(check_transaction(&forged, &mut nonces), Err(Rejection::SignatureInvalid));
        assert_eq!(nonces.get(&kp.public().to_hex()), 0);

        // the genuine transaction with the same nonce is now a replay
        assert!(!validate_transaction(&signed_payload(&kp, "hi", 0), addr(), &mut nonces));
        assert!(validate_transaction(&signed_payload(&kp, "hi", 1), addr(), &mut nonces));
    }

    #[test]
    fn tampered_message_fails_verification() {
        let kp = Keypair::generate();
        let mut nonces = NonceTable::new();
        let mut payload = signed_payload(&kp, "hello", 0);
        payload["message"] = json!("hellp");
        assert_eq!(check_transaction(&payload, &mut nonces), Err(Rejection::SignatureInvalid));
    }

    #[test]
    fn non_object_payload_rejected() {
        let mut nonces = NonceTable::new();
        assert_eq!(check_transaction(&json!([1, 2]), &mut nonces), Err(Rejection::Payload));
        assert!(!validate_transaction(&Value::Null, addr(), &mut nonces));
    }
}
