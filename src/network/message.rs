use crate::ledger::Block;
use crate::txpool::Transaction;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outbound request envelope: `{"type": ..., "payload": ...}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "lowercase")]
pub enum Envelope {
    Transaction(Transaction),
    /// Ask for the proposals (or the committed block) at this index.
    Values(u64),
}

/// Inbound request, decoded once at the connection boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// Raw payload; field-level checks belong to the validator.
    Transaction(Value),
    Values(u64),
    /// Anything we cannot route, with the reason.
    Unknown(String),
}

impl InboundMessage {
    pub fn decode(bytes: &[u8]) -> Self {
        let value: Value = match serde_json::from_slice(bytes) {
            Ok(v) => v,
            Err(e) => return Self::Unknown(format!("unparseable envelope: {e}")),
        };
        let Some(obj) = value.as_object() else {
            return Self::Unknown("envelope is not an object".into());
        };
        let payload = obj.get("payload").cloned().unwrap_or(Value::Null);
        match obj.get("type").and_then(Value::as_str) {
            Some("transaction") => Self::Transaction(payload),
            Some("values") => match payload.as_u64() {
                Some(index) => Self::Values(index),
                // a negative index is below any head
                None if payload.as_i64().is_some() => Self::Values(0),
                None => Self::Unknown(format!("values payload is not an integer: {payload}")),
            },
            Some(other) => Self::Unknown(format!("unknown message type {other:?}")),
            None => Self::Unknown("missing message type".into()),
        }
    }
}

/// Transaction acknowledgement: `{"response": bool}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub response: bool,
}

/// Anything the dispatcher writes back.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Reply {
    Ack(Ack),
    Blocks(Vec<Block>),
}

impl Reply {
    pub fn ack(ok: bool) -> Self {
        Self::Ack(Ack { response: ok })
    }
}
