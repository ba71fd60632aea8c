use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{lookup_host, TcpStream};
use tokio::time::timeout;

use crate::error::ClientError;
use crate::utils::BoxResult;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// What the client does with an established connection: optionally send
/// something once connected, and consume whatever the peer sends back.
pub trait Handler: Send {
    /// called once, right after the connection is established; the
    /// returned bytes are written to the peer before any read happens
    fn on_connect(&mut self) -> Option<Bytes> {
        None
    }

    /// called for every chunk of bytes received from the peer
    fn on_read(&mut self, bytes: &[u8]);
}

/// Default handler: greets the peer on connect and logs whatever comes
/// back, as text when it is valid utf8.
pub struct LogHandler {
    greeting: Option<Bytes>,
}

impl Default for LogHandler {
    fn default() -> Self {
        LogHandler {
            greeting: Some(Bytes::from_static(b"hello from echo-toy\n")),
        }
    }
}

impl Handler for LogHandler {
    fn on_connect(&mut self) -> Option<Bytes> {
        self.greeting.take()
    }

    fn on_read(&mut self, bytes: &[u8]) {
        match std::str::from_utf8(bytes) {
            Ok(s) => tracing::info!("received: {s:?}"),
            Err(_) => tracing::info!("received {} bytes of binary data", bytes.len()),
        }
    }
}

pub struct Client {
    stream: TcpStream,
    peer_addr: SocketAddr,
}

impl Client {
    /// Resolves `host:port` and connects to the first address, bounded
    /// by a connect timeout so a dead route never hangs the caller.
    pub async fn connect(host: &str, port: u16) -> Result<Client, ClientError> {
        let mut addrs = lookup_host((host, port))
            .await
            .map_err(|source| ClientError::Resolve {
                host: host.to_string(),
                port,
                source,
            })?;
        let addr = addrs.next().ok_or_else(|| ClientError::NoAddress {
            host: host.to_string(),
            port,
        })?;

        let stream = match timeout(CONNECT_TIMEOUT, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => return Err(ClientError::Connect { addr, source }),
            Err(_) => {
                return Err(ClientError::ConnectTimeout {
                    addr,
                    timeout: CONNECT_TIMEOUT,
                })
            }
        };
        Ok(Client {
            stream,
            peer_addr: addr,
        })
    }

    /// Drives the handler over the connection and blocks until the
    /// connection closes, then releases it.
    pub async fn run<H: Handler>(mut self, handler: &mut H) -> BoxResult<()> {
        tracing::info!("connected to {}", self.peer_addr);
        if let Some(payload) = handler.on_connect() {
            self.stream.write_all(&payload).await?;
        }

        let mut buf = [0; 4096];
        loop {
            let read = self.stream.read(&mut buf).await?;
            if read == 0 {
                break;
            }
            handler.on_read(&buf[0..read]);
        }

        // the peer is already gone; a failed shutdown only gets logged
        if let Err(err) = self.stream.shutdown().await {
            tracing::warn!("error closing connection to {}: {err:?}", self.peer_addr);
        }
        tracing::info!("connection to {} closed", self.peer_addr);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::*;
    use crate::server::Server;
    use crate::utils::AbortHdl;
    use pretty_assertions::assert_eq;
    use tokio::net::TcpListener;

    struct RecordingHandler {
        greeting: Option<Bytes>,
        received: Vec<u8>,
    }

    impl Handler for RecordingHandler {
        fn on_connect(&mut self) -> Option<Bytes> {
            self.greeting.take()
        }

        fn on_read(&mut self, bytes: &[u8]) {
            self.received.extend_from_slice(bytes);
        }
    }

    #[tokio::test]
    async fn test_run_until_peer_closes() -> BoxResult<()> {
        let _ = tracing_subscriber::fmt::try_init();
        // one-shot peer: echo a single read back, then close
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let _peer = AbortHdl(tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0; 4096];
            let read = stream.read(&mut buf).await.unwrap();
            stream.write_all(&buf[0..read]).await.unwrap();
            stream.shutdown().await.unwrap();
        }));

        let client = Client::connect("127.0.0.1", addr.port()).await?;
        let mut handler = RecordingHandler {
            greeting: Some(Bytes::from_static(b"ping")),
            received: Vec::new(),
        };
        timeout(Duration::from_secs(1), client.run(&mut handler)).await??;
        assert_eq!(handler.received, b"ping");
        Ok(())
    }

    #[tokio::test]
    async fn test_blocks_until_server_shutdown() -> BoxResult<()> {
        let _ = tracing_subscriber::fmt::try_init();
        let (server, shutdown) = Server::bind(([127, 0, 0, 1], 0).into()).await?;
        let addr = server.local_addr()?;
        let _server = AbortHdl(tokio::spawn(async move {
            if let Err(err) = server.run().await {
                tracing::error!("error running server? {err:?}");
            }
        }));

        let client = Client::connect("127.0.0.1", addr.port()).await?;
        let mut handler = RecordingHandler {
            greeting: Some(Bytes::from_static(b"ping")),
            received: Vec::new(),
        };
        {
            let run = client.run(&mut handler);
            tokio::pin!(run);
            // the echo server keeps the connection open, so the client
            // must still be blocked
            assert!(timeout(Duration::from_millis(100), run.as_mut())
                .await
                .is_err());
            shutdown.shutdown();
            timeout(Duration::from_secs(1), run).await??;
        }
        assert_eq!(handler.received, b"ping");
        Ok(())
    }

    #[tokio::test]
    async fn test_connect_refused() -> BoxResult<()> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        drop(listener);

        match Client::connect("127.0.0.1", addr.port()).await {
            Err(ClientError::Connect { .. }) => Ok(()),
            Ok(_) => Err("connected to a closed port?".into()),
            Err(err) => Err(format!("unexpected error: {err:?}").into()),
        }
    }

    #[test]
    fn test_log_handler_greets_once() {
        let mut handler = LogHandler::default();
        assert!(handler.on_connect().is_some());
        assert!(handler.on_connect().is_none(), "greeting is sent only once");
    }
}
