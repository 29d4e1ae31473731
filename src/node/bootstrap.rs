use crate::consensus::types::RoundConfig;
use crate::network::{parse_peer_list, Backoff, PeerAddr};
use crate::utils::{NodeError, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Optional TOML tuning file. Every key falls back to its default.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct NodeFileConfig {
    pub round_timeout_ms: u64,
    pub inbound_read_timeout_ms: u64,
    pub connect_backoff_initial_ms: u64,
    pub connect_backoff_max_ms: u64,
    pub empty_round_retries: u32,
    pub empty_round_pause_ms: u64,
    pub idle_poll_ms: u64,
}

impl Default for NodeFileConfig {
    fn default() -> Self {
        Self {
            round_timeout_ms: 5_000,
            inbound_read_timeout_ms: 30_000,
            connect_backoff_initial_ms: 500,
            connect_backoff_max_ms: 5_000,
            empty_round_retries: 3,
            empty_round_pause_ms: 1_000,
            idle_poll_ms: 50,
        }
    }
}

impl NodeFileConfig {
    /// Load tuning from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)?;
        toml::from_str(&data).map_err(|e| NodeError::ConfigError(format!("{}: {}", path.display(), e)))
    }

    pub fn round(&self) -> RoundConfig {
        RoundConfig {
            round_timeout: Duration::from_millis(self.round_timeout_ms),
            empty_round_retries: self.empty_round_retries,
            empty_round_pause: Duration::from_millis(self.empty_round_pause_ms),
            idle_poll: Duration::from_millis(self.idle_poll_ms),
        }
    }

    pub fn backoff(&self) -> Backoff {
        Backoff {
            initial: Duration::from_millis(self.connect_backoff_initial_ms),
            max: Duration::from_millis(self.connect_backoff_max_ms.max(self.connect_backoff_initial_ms)),
        }
    }

    pub fn inbound_read_timeout(&self) -> Duration {
        Duration::from_millis(self.inbound_read_timeout_ms)
    }
}

/// Read the neighbour list, dropping our own address.
pub fn load_peer_list<P: AsRef<Path>>(path: P, own: &PeerAddr) -> Result<Vec<PeerAddr>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    parse_peer_list(&text, own).map_err(|e| NodeError::ConfigError(format!("peers file {}: {}", path.display(), e)))
}
