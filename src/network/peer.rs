use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PeerAddrError {
    #[error("line {line}: expected host:port, got {text:?}")]
    Malformed { line: usize, text: String },
}

/// `(host, port)` identity of a neighbour.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerAddr {
    pub host: String,
    pub port: u16,
}

impl PeerAddr {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port }
    }
}

impl fmt::Display for PeerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for PeerAddr {
    type Err = PeerAddrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || PeerAddrError::Malformed { line: 0, text: s.to_string() };
        let (host, port) = s.trim().rsplit_once(':').ok_or_else(malformed)?;
        if host.is_empty() {
            return Err(malformed());
        }
        let port = port.parse::<u16>().map_err(|_| malformed())?;
        Ok(Self::new(host, port))
    }
}

/// Parse a newline-delimited `host:port` list, skipping blank lines and our own address.
pub fn parse_peer_list(text: &str, own: &PeerAddr) -> Result<Vec<PeerAddr>, PeerAddrError> {
    let mut peers = Vec::new();
    for (i, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let peer = line.parse::<PeerAddr>().map_err(|_| PeerAddrError::Malformed {
            line: i + 1,
            text: line.to_string(),
        })?;
        if &peer == own || peers.contains(&peer) {
            continue;
        }
        peers.push(peer);
    }
    Ok(peers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_self_and_blank_lines() {
        let own = PeerAddr::new("127.0.0.1", 5001);
        let text = "127.0.0.1:5000\n127.0.0.1:5001\n\n127.0.0.1:5002\n";
        let peers = parse_peer_list(text, &own).unwrap();
        assert_eq!(peers, vec![PeerAddr::new("127.0.0.1", 5000), PeerAddr::new("127.0.0.1", 5002)]);
    }

    #[test]
    fn same_port_on_other_host_is_kept() {
        let own = PeerAddr::new("127.0.0.1", 5000);
        let peers = parse_peer_list("10.0.0.2:5000", &own).unwrap();
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].to_string(), "10.0.0.2:5000");
    }

    #[test]
    fn malformed_lines_report_position() {
        let own = PeerAddr::new("127.0.0.1", 5000);
        let err = parse_peer_list("127.0.0.1:5001\nlocalhost\n", &own).unwrap_err();
        assert_eq!(err, PeerAddrError::Malformed { line: 2, text: "localhost".into() });
        assert!(parse_peer_list("127.0.0.1:99999", &own).is_err());
        assert!(":80".parse::<PeerAddr>().is_err());
    }
}
