use crate::network::PeerAddr;
use tokio::io;
use tokio::net::{TcpListener, TcpStream};
use tracing::info;

/// Bind the listening socket. Consumer should `accept().await` and hand streams to the dispatcher.
pub async fn bind(addr: &str) -> io::Result<TcpListener> {
    let listener = TcpListener::bind(addr).await?;
    info!("listening on {}", listener.local_addr()?);
    Ok(listener)
}

pub async fn connect(peer: &PeerAddr) -> io::Result<TcpStream> {
    let stream = TcpStream::connect((peer.host.as_str(), peer.port)).await?;
    stream.set_nodelay(true)?;
    Ok(stream)
}
