use crate::consensus::PeerExchange;
use crate::ledger::Block;
use crate::network::connection::{Connection, ExchangeError, PeerConnection};
use crate::network::message::Envelope;
use crate::network::transport;
use crate::network::PeerAddr;
use dashmap::DashMap;
use futures::future::join_all;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Startup reconnect schedule: start at `initial`, double per failure, cap at `max`.
#[derive(Debug, Clone)]
pub struct Backoff {
    pub initial: Duration,
    pub max: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self { initial: Duration::from_millis(500), max: Duration::from_secs(5) }
    }
}

/// Manager holds one outbound connection per peer. Connections are replaced on
/// failure and never shared between peers.
pub struct ConnectionManager {
    conns: DashMap<PeerAddr, Arc<Mutex<PeerConnection>>>,
    backoff: Backoff,
}

impl ConnectionManager {
    pub fn new(backoff: Backoff) -> Self {
        Self { conns: DashMap::new(), backoff }
    }

    /// Connect every peer, retrying each until it answers. Returns only once all of
    /// them are connected; drop the future to cancel.
    pub async fn connect_all(&self, peers: &[PeerAddr]) {
        join_all(peers.iter().map(|peer| self.connect_with_retry(peer))).await;
        info!("connected to all {} neighbours", peers.len());
    }

    async fn connect_with_retry(&self, peer: &PeerAddr) {
        let mut backoff = self.backoff.initial;
        let mut attempt = 1u32;
        loop {
            match transport::connect(peer).await {
                Ok(stream) => {
                    info!("connected to {}", peer);
                    self.replace(peer.clone(), Connection::new(stream));
                    return;
                }
                Err(e) => {
                    debug!("connect attempt {} to {} failed: {}; retrying in {:?}", attempt, peer, e, backoff);
                }
            }
            sleep(backoff).await;
            backoff = (backoff * 2).min(self.backoff.max);
            attempt += 1;
        }
    }

    pub fn get(&self, peer: &PeerAddr) -> Option<Arc<Mutex<PeerConnection>>> {
        self.conns.get(peer).map(|entry| entry.value().clone())
    }

    pub fn replace(&self, peer: PeerAddr, conn: PeerConnection) {
        self.conns.insert(peer, Arc::new(Mutex::new(conn)));
    }

    /// Remove and drop (close) the connection to `peer`.
    pub fn remove(&self, peer: &PeerAddr) -> bool {
        self.conns.remove(peer).is_some()
    }

    pub fn len(&self) -> usize {
        self.conns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conns.is_empty()
    }
}

/// Keep every block that decodes and hashes correctly; log and skip the rest.
fn decode_blocks(peer: &PeerAddr, raw: Vec<Value>) -> Vec<Block> {
    raw.into_iter()
        .filter_map(|v| match serde_json::from_value::<Block>(v) {
            Ok(block) => Some(block),
            Err(e) => {
                warn!("dropping invalid block from {}: {}", peer, e);
                None
            }
        })
        .collect()
}

#[async_trait::async_trait]
impl PeerExchange for ConnectionManager {
    async fn request_values(&self, peer: &PeerAddr, index: u64) -> Result<Vec<Block>, ExchangeError> {
        let conn = self.get(peer).ok_or(ExchangeError::NotConnected)?;
        let mut conn = conn.lock().await;
        let raw: Vec<Value> = conn.request(&Envelope::Values(index)).await?;
        Ok(decode_blocks(peer, raw))
    }

    async fn reconnect(&self, peer: &PeerAddr) -> Result<(), ExchangeError> {
        self.remove(peer);
        let stream = transport::connect(peer).await?;
        self.replace(peer.clone(), Connection::new(stream));
        Ok(())
    }

    fn evict(&self, peer: &PeerAddr) {
        self.remove(peer);
    }
}
