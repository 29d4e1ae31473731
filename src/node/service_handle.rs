use anyhow::Result;
use std::future::Future;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::error;

/// Background tasks of a running node plus the shutdown flag they watch.
pub struct ServiceHandle {
    shutdown_tx: watch::Sender<bool>,
    join_handles: Vec<(&'static str, JoinHandle<Result<()>>)>,
}

impl ServiceHandle {
    /// New handle together with a receiver for the first task.
    pub fn new() -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        (Self { shutdown_tx: tx, join_handles: vec![] }, rx)
    }

    /// Spawn `fut` and track it under `name` until shutdown.
    pub fn spawn<F>(&mut self, name: &'static str, fut: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        self.join_handles.push((name, tokio::spawn(fut)));
    }

    pub fn shutdown_rx(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Flip the shutdown flag and wait for every task in spawn order.
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown_tx.send(true);
        for (name, h) in self.join_handles {
            match h.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("{} task returned error: {:?}", name, e),
                Err(e) => error!("{} task join error: {:?}", name, e),
            }
        }
        Ok(())
    }
}
