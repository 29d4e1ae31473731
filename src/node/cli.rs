use crate::crypto::Keypair;
use crate::network::{transport, Ack, Connection, Envelope, PeerAddr};
use crate::node::bootstrap::{load_peer_list, NodeFileConfig};
use crate::node::{Node, NodeConfig};
use crate::txpool::Transaction;
use crate::utils::init_logging;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};

/// CLI for running a node and submitting transactions to one.
#[derive(Parser)]
#[clap(name = "gossipchain", version)]
pub struct Cli {
    #[clap(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand)]
pub enum Cmd {
    /// Run the node
    Run {
        /// port to listen on
        #[clap(long)]
        port: u16,

        /// newline-delimited host:port list of neighbours
        #[clap(long)]
        peers: PathBuf,

        #[clap(long, default_value = "127.0.0.1")]
        host: String,

        /// optional TOML tuning file
        #[clap(long)]
        config: Option<PathBuf>,
    },
    /// Sign a transaction and send it to a node
    Submit {
        /// node address (host:port)
        #[clap(long)]
        node: PeerAddr,

        #[clap(long)]
        message: String,

        #[clap(long)]
        nonce: u64,

        /// 32-byte ed25519 secret as hex; a fresh key is used if omitted
        #[clap(long)]
        secret_hex: Option<String>,
    },
}

pub async fn run_cli() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.cmd {
        Cmd::Run { port, peers, host, config } => {
            let file_cfg = match config {
                Some(path) => NodeFileConfig::load(path)?,
                None => NodeFileConfig::default(),
            };
            let own = PeerAddr::new(host.clone(), port);
            let peers = load_peer_list(&peers, &own)?;

            let config = NodeConfig {
                host,
                port,
                peers,
                round: file_cfg.round(),
                inbound_read_timeout: file_cfg.inbound_read_timeout(),
                backoff: file_cfg.backoff(),
            };

            let node = Node::new(config);
            let running = tokio::select! {
                res = node.start() => res.map_err(|e| {
                    error!("node failed to start: {:#}", e);
                    e
                })?,
                _ = tokio::signal::ctrl_c() => {
                    info!("interrupted while connecting to neighbours");
                    return Ok(());
                }
            };

            tokio::signal::ctrl_c().await?;
            info!("shutting down node");
            running.shutdown().await?;
            info!("node stopped");
            Ok(())
        }
        Cmd::Submit { node, message, nonce, secret_hex } => {
            let keypair = match secret_hex {
                Some(hex) => Keypair::from_hex(&hex)?,
                None => Keypair::generate(),
            };
            let tx = Transaction::signed(&keypair, message, nonce);
            info!("submitting from {} with nonce {}", tx.sender(), nonce);
            let accepted = submit_transaction(&node, tx).await?;
            println!("{}", serde_json::to_string(&Ack { response: accepted })?);
            Ok(())
        }
    }
}

/// Send one transaction envelope to `node` and return the acknowledgement.
pub async fn submit_transaction(node: &PeerAddr, tx: Transaction) -> Result<bool> {
    let stream = transport::connect(node).await.with_context(|| format!("connecting to {}", node))?;
    let mut conn = Connection::new(stream);
    let ack: Ack = conn.request(&Envelope::Transaction(tx)).await?;
    Ok(ack.response)
}
