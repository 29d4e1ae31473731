//! Network module - framing, peer addressing, outbound connection manager.
//! Exposes ConnectionManager, Connection, Envelope/InboundMessage types.

pub mod codec;
pub mod connection;
pub mod manager;
pub mod message;
pub mod peer;
pub mod transport;

pub use connection::{Connection, ExchangeError, PeerConnection};
pub use manager::{Backoff, ConnectionManager};
pub use message::{Ack, Envelope, InboundMessage, Reply};
pub use peer::{parse_peer_list, PeerAddr, PeerAddrError};
