//! Canonical hashing.
//!
//! Blocks and signed transaction bodies are encoded as JSON with object keys
//! sorted at every level, `", "` / `": "` separators and every non-ASCII
//! character escaped as `\uXXXX`. This is byte-for-byte the encoding wallets
//! sign with, so signatures and block digests agree across implementations.

use crate::txpool::Transaction;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::fmt::Write;

/// Serialize a JSON value in canonical form.
///
/// `serde_json::Map` is BTree-backed, so iteration is already in key order;
/// UTF-8 byte order and code point order coincide.
pub fn canonical_bytes(value: &Value) -> Vec<u8> {
    let mut out = String::with_capacity(256);
    write_value(&mut out, value);
    out.into_bytes()
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => write_str(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => {
            out.push('{');
            for (i, (k, v)) in map.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_str(out, k);
                out.push_str(": ");
                write_value(out, v);
            }
            out.push('}');
        }
    }
}

fn write_str(out: &mut String, s: &str) {
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            ' '..='~' => out.push(ch),
            _ => {
                let mut units = [0u16; 2];
                for unit in ch.encode_utf16(&mut units) {
                    // writing into a String is infallible
                    let _ = write!(out, "\\u{:04x}", unit);
                }
            }
        }
    }
    out.push('"');
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Digest over a block's identity fields; `current_hash` never takes part.
pub fn block_hash(index: u64, transactions: &[Transaction], previous_hash: &str) -> String {
    let body = json!({
        "index": index,
        "transactions": transactions,
        "previous_hash": previous_hash,
    });
    sha256_hex(&canonical_bytes(&body))
}

/// The byte string a wallet signs: `{message, nonce, sender}` in canonical form.
pub fn transaction_bytes(sender: &str, message: &str, nonce: u64) -> Vec<u8> {
    canonical_bytes(&json!({
        "sender": sender,
        "message": message,
        "nonce": nonce,
    }))
}
