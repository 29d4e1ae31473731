use lazy_static::lazy_static;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

pub const TX_ACCEPTED: &str = "tx_accepted";
pub const TX_REJECTED: &str = "tx_rejected";
pub const TX_BUSY: &str = "tx_busy";
pub const BLOCKS_DECIDED: &str = "blocks_decided";
pub const ROUNDS_ABANDONED: &str = "rounds_abandoned";
pub const PEERS_EVICTED: &str = "peers_evicted";
pub const PEER_RETRIES: &str = "peer_retries";
pub const CHAIN_HEIGHT: &str = "chain_height";
pub const MEMPOOL_SIZE: &str = "mempool_size";

/// Metrics registry (simple, Prometheus-style)
#[derive(Clone, Default)]
pub struct MetricsRegistry {
    counters: Arc<Mutex<HashMap<String, u64>>>,
    gauges: Arc<Mutex<HashMap<String, f64>>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_counter(&self, name: &str) {
        self.add_counter(name, 1);
    }

    pub fn add_counter(&self, name: &str, by: u64) {
        let mut counters = self.counters.lock();
        *counters.entry(name.to_string()).or_insert(0) += by;
    }

    pub fn counter(&self, name: &str) -> u64 {
        self.counters.lock().get(name).copied().unwrap_or(0)
    }

    pub fn set_gauge(&self, name: &str, val: f64) {
        self.gauges.lock().insert(name.to_string(), val);
    }

    pub fn snapshot(&self) -> (HashMap<String, u64>, HashMap<String, f64>) {
        (self.counters.lock().clone(), self.gauges.lock().clone())
    }
}

lazy_static! {
    pub static ref METRICS: MetricsRegistry = MetricsRegistry::new();
}
