use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;
use waypost_net::ParseError;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("proxy configuration error: {0}")]
    Config(String),
    #[error("proxy runtime error: {0}")]
    Runtime(String),
    #[error("proxy IO error: {0}")]
    Io(#[from] io::Error),
    #[error("request rejected: {0}")]
    Parse(#[from] ParseError),
    #[error("request names no host")]
    MissingHost,
    #[error(transparent)]
    Resolution(#[from] ResolveError),
    #[error("failed to connect to {address}: {source}")]
    Connect {
        address: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("relay failed: {0}")]
    Relay(#[source] io::Error),
    #[error("{step} timed out after {after:?}")]
    Timeout { step: &'static str, after: Duration },
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("failed to resolve {host}: {source}")]
    Lookup {
        host: String,
        #[source]
        source: io::Error,
    },
    #[error("no address found for {host}")]
    NoAddress { host: String },
}
