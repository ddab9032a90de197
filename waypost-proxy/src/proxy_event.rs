use std::net::{IpAddr, SocketAddr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pipeline::ConnectionState;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProxyEventKind {
    Accepted {
        peer: Option<SocketAddr>,
    },
    RequestParsed {
        method: String,
        target: String,
        host: Option<String>,
        port: u16,
        content_length: usize,
    },
    HostResolved {
        host: String,
        address: IpAddr,
        cached: bool,
    },
    UpstreamConnected {
        address: SocketAddr,
    },
    RequestForwarded {
        bytes: usize,
    },
    BytesRelayed {
        bytes: usize,
    },
    ConnectionClosed {
        state: ConnectionState,
        bytes_relayed: u64,
    },
    Failed {
        state: ConnectionState,
        error: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProxyEvent {
    pub event_id: Uuid,
    pub connection_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub kind: ProxyEventKind,
}
