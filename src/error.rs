use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

/// Fatal startup errors for the server. Anything that happens after the
/// listener is up is contained to a single connection and only logged.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("could not bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },
}

/// Fatal startup errors for the client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("could not resolve {host}:{port}: {source}")]
    Resolve {
        host: String,
        port: u16,
        source: std::io::Error,
    },

    #[error("{host}:{port} did not resolve to any address")]
    NoAddress { host: String, port: u16 },

    #[error("could not connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("timed out connecting to {addr} after {timeout:?}")]
    ConnectTimeout {
        addr: SocketAddr,
        timeout: Duration,
    },
}
