use crate::network::codec::FrameCodec;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;

/// Failure of one request/response exchange.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("timed out")]
    Timeout,
    #[error("connection closed")]
    Closed,
    #[error("no connection to peer")]
    NotConnected,
    #[error("i/o: {0}")]
    Io(#[from] io::Error),
    #[error("decode: {0}")]
    Decode(#[from] serde_json::Error),
}

/// A framed JSON connection. Outbound peer links, inbound handlers and the
/// submit client all speak through this.
pub struct Connection<S = TcpStream> {
    framed: Framed<S, FrameCodec>,
}

/// Outbound connection owned by the connection manager.
pub type PeerConnection = Connection<TcpStream>;

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self { framed: Framed::new(stream, FrameCodec::new()) }
    }

    pub async fn send_json<T: Serialize>(&mut self, msg: &T) -> Result<(), ExchangeError> {
        let body = serde_json::to_vec(msg)?;
        self.framed.send(Bytes::from(body)).await?;
        Ok(())
    }

    /// Next frame, or `Closed` if the other side hung up.
    pub async fn recv_frame(&mut self) -> Result<Bytes, ExchangeError> {
        match self.framed.next().await {
            Some(Ok(frame)) => Ok(frame),
            Some(Err(e)) => Err(ExchangeError::Io(e)),
            None => Err(ExchangeError::Closed),
        }
    }

    pub async fn recv_json<R: DeserializeOwned>(&mut self) -> Result<R, ExchangeError> {
        let frame = self.recv_frame().await?;
        Ok(serde_json::from_slice(&frame)?)
    }

    /// Send one message and wait for the single reply.
    pub async fn request<T: Serialize, R: DeserializeOwned>(&mut self, msg: &T) -> Result<R, ExchangeError> {
        self.send_json(msg).await?;
        self.recv_json().await
    }
}
