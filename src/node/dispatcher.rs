//! Inbound side: one handler per accepted connection, routing decoded envelopes
//! into the shared consensus state.

use crate::consensus::consensus_state::{SharedState, TxOutcome};
use crate::network::{Connection, ExchangeError, InboundMessage, Reply};
use crate::utils::metrics::{self, METRICS};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Notify;
use tokio::time::timeout;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct Dispatcher {
    state: SharedState,
    round_signal: Arc<Notify>,
}

impl Dispatcher {
    pub fn new(state: SharedState, round_signal: Arc<Notify>) -> Self {
        Self { state, round_signal }
    }

    /// Handle one request. `None` means the message could not be routed and the
    /// connection should be closed without a reply.
    pub fn handle(&self, msg: InboundMessage, from: SocketAddr) -> Option<Reply> {
        match msg {
            InboundMessage::Transaction(payload) => {
                let (outcome, pooled) = {
                    let mut st = self.state.lock();
                    let outcome = st.accept_transaction(&payload, from);
                    (outcome, st.mempool.len())
                };
                let ok = match outcome {
                    TxOutcome::Accepted(_) => {
                        METRICS.inc_counter(metrics::TX_ACCEPTED);
                        METRICS.set_gauge(metrics::MEMPOOL_SIZE, pooled as f64);
                        self.round_signal.notify_one();
                        true
                    }
                    TxOutcome::Rejected(_) => {
                        METRICS.inc_counter(metrics::TX_REJECTED);
                        false
                    }
                    TxOutcome::Busy => {
                        METRICS.inc_counter(metrics::TX_BUSY);
                        false
                    }
                };
                Some(Reply::ack(ok))
            }
            InboundMessage::Values(index) => {
                let (blocks, started) = {
                    let mut st = self.state.lock();
                    let was_active = st.active;
                    let blocks = st.values_for(index);
                    (blocks, !was_active && st.active)
                };
                debug!("values request for {} from {}: replying with {} blocks", index, from, blocks.len());
                if started {
                    self.round_signal.notify_one();
                }
                Some(Reply::Blocks(blocks))
            }
            InboundMessage::Unknown(reason) => {
                warn!("dropping message from {}: {}", from, reason);
                None
            }
        }
    }

    /// Serve requests on one connection until the peer closes it or a message
    /// cannot be routed.
    ///
    /// Only the first request is bounded by `read_timeout`. Once a connection has
    /// carried a request it may be a neighbour's persistent link, which stays idle
    /// between super-rounds.
    pub async fn serve_connection<S>(&self, stream: S, from: SocketAddr, read_timeout: Duration)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut conn = Connection::new(stream);
        let mut served = 0usize;
        loop {
            let read = if served == 0 {
                match timeout(read_timeout, conn.recv_frame()).await {
                    Ok(read) => read,
                    Err(_) => {
                        warn!("no request from {} within {:?}; closing", from, read_timeout);
                        return;
                    }
                }
            } else {
                conn.recv_frame().await
            };
            let frame = match read {
                Ok(frame) => frame,
                Err(ExchangeError::Closed) => {
                    debug!("{} closed the connection after {} requests", from, served);
                    return;
                }
                Err(e) => {
                    warn!("read from {} failed: {}", from, e);
                    return;
                }
            };
            let Some(reply) = self.handle(InboundMessage::decode(&frame), from) else {
                return;
            };
            if let Err(e) = conn.send_json(&reply).await {
                warn!("reply to {} failed: {}", from, e);
                return;
            }
            served += 1;
        }
    }
}
