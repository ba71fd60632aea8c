use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinSet;

use crate::error::ServerError;
use crate::utils::BoxResult;

/// A TCP echo server: every byte read on a connection is written back
/// to the same connection, until the peer closes it.
pub struct Server {
    listener: TcpListener,
    shutdown: watch::Receiver<bool>,
}

/// Handle to stop the server: the accept loop stops, live connections
/// are signalled and drained before [`Server::run`] returns.
pub struct ShutdownHandle {
    tx: watch::Sender<bool>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        let _ = self.tx.send(true);
    }
}

impl Server {
    pub async fn bind(addr: SocketAddr) -> Result<(Server, ShutdownHandle), ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let (tx, rx) = watch::channel(false);
        let server = Server {
            listener,
            shutdown: rx,
        };
        Ok((server, ShutdownHandle { tx }))
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept loop. Each connection gets its own task so a slow or
    /// broken connection never blocks the others.
    pub async fn run(mut self) -> BoxResult<()> {
        let mut conns = JoinSet::new();
        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, socket_addr) = accepted?;
                    let shutdown = self.shutdown.clone();
                    conns.spawn(async move {
                        tracing::info!("incoming connection from {}", socket_addr);
                        match echo(stream, shutdown).await {
                            Ok(_) => tracing::info!("done with {}", socket_addr),
                            Err(err) => {
                                tracing::info!("Error while processing {}: {err:?}", socket_addr)
                            }
                        }
                    });
                }
                _ = shutdown_requested(&mut self.shutdown) => break,
            }
        }

        // closes the listening socket before draining, so no new
        // connection can sneak in while existing ones finish
        drop(self.listener);
        tracing::info!("stopped accepting, draining {} connection(s)", conns.len());
        while let Some(res) = conns.join_next().await {
            if let Err(err) = res {
                tracing::warn!("connection task failed during shutdown: {err:?}");
            }
        }
        Ok(())
    }
}

/// Resolves when a shutdown is requested. If the [`ShutdownHandle`] has
/// been dropped without firing, no shutdown can ever come, so this
/// pends forever instead of tearing the server down.
async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    if rx.changed().await.is_err() {
        std::future::pending::<()>().await;
    }
}

async fn echo(mut stream: TcpStream, mut shutdown: watch::Receiver<bool>) -> BoxResult<()> {
    let mut buf = [0; 4096];
    loop {
        let read = tokio::select! {
            read = stream.read(&mut buf) => read?,
            _ = shutdown_requested(&mut shutdown) => break,
        };
        if read == 0 {
            break;
        }
        stream.write_all(&buf[0..read]).await?;
    }
    stream.shutdown().await?;
    Ok(())
}
