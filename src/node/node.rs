//! Node orchestration: bind, connect the neighbourhood, then serve and run consensus.

use crate::consensus::consensus_state::{ConsensusSnapshot, ConsensusState, SharedState};
use crate::consensus::types::RoundConfig;
use crate::consensus::ConsensusEngine;
use crate::crypto::{Keypair, PublicKey};
use crate::network::{transport, Backoff, ConnectionManager, PeerAddr};
use crate::node::dispatcher::Dispatcher;
use crate::node::service_handle::ServiceHandle;
use crate::utils::{NodeError, Result, METRICS};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub host: String,
    /// 0 picks a free port.
    pub port: u16,
    pub peers: Vec<PeerAddr>,
    pub round: RoundConfig,
    pub inbound_read_timeout: Duration,
    pub backoff: Backoff,
}

impl NodeConfig {
    pub fn new(host: impl Into<String>, port: u16, peers: Vec<PeerAddr>) -> Self {
        Self {
            host: host.into(),
            port,
            peers,
            round: RoundConfig::default(),
            inbound_read_timeout: Duration::from_secs(30),
            backoff: Backoff::default(),
        }
    }
}

/// Main Node object
pub struct Node {
    cfg: NodeConfig,
    identity: Keypair,
}

/// Handle to a started node.
pub struct RunningNode {
    local_addr: SocketAddr,
    state: SharedState,
    service: ServiceHandle,
}

impl RunningNode {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub fn snapshot(&self) -> ConsensusSnapshot {
        self.state.lock().snapshot()
    }

    /// Stop every task, then log the final chain state and metrics.
    pub async fn shutdown(self) -> anyhow::Result<()> {
        self.service.shutdown().await?;
        let (counters, gauges) = METRICS.snapshot();
        info!("final state: {:?}", self.state.lock().snapshot());
        info!("metrics: counters {:?} gauges {:?}", counters, gauges);
        Ok(())
    }
}

impl Node {
    pub fn new(cfg: NodeConfig) -> Self {
        Self { cfg, identity: Keypair::generate() }
    }

    pub fn public_key(&self) -> PublicKey {
        self.identity.public()
    }

    /// Bind the listener, block until every neighbour is connected, then spawn the
    /// accept loop and the consensus control loop. Dropping the returned future
    /// before it resolves cancels the startup barrier.
    pub async fn start(self) -> Result<RunningNode> {
        info!("node public key {}", self.identity.public().to_hex());

        let bind_addr = format!("{}:{}", self.cfg.host, self.cfg.port);
        let listener = transport::bind(&bind_addr)
            .await
            .map_err(|e| NodeError::NetworkError(format!("binding {}: {}", bind_addr, e)))?;
        let local_addr = listener.local_addr()?;

        let manager = Arc::new(ConnectionManager::new(self.cfg.backoff.clone()));
        manager.connect_all(&self.cfg.peers).await;

        let state = ConsensusState::shared();
        let engine = Arc::new(ConsensusEngine::new(
            state.clone(),
            self.cfg.peers.clone(),
            manager,
            self.cfg.round.clone(),
        ));
        let dispatcher = Dispatcher::new(state.clone(), engine.round_signal());

        let (mut service, shutdown_rx) = ServiceHandle::new();
        let read_timeout = self.cfg.inbound_read_timeout;
        service.spawn("accept", accept_loop(listener, dispatcher, read_timeout, shutdown_rx));

        let consensus_rx = service.shutdown_rx();
        service.spawn("consensus", async move {
            engine.run(consensus_rx).await;
            Ok(())
        });

        info!("node serving on {} with {} neighbours", local_addr, self.cfg.peers.len());
        Ok(RunningNode { local_addr, state, service })
    }
}

async fn accept_loop(
    listener: TcpListener,
    dispatcher: Dispatcher,
    read_timeout: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    loop {
        tokio::select! {
            res = listener.accept() => match res {
                Ok((stream, from)) => {
                    let dispatcher = dispatcher.clone();
                    tokio::spawn(async move {
                        dispatcher.serve_connection(stream, from, read_timeout).await;
                    });
                }
                Err(e) => warn!("accept failed: {}", e),
            },
            _ = shutdown.changed() => {
                info!("accept loop observed shutdown");
                return Ok(());
            }
        }
    }
}
