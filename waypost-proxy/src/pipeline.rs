use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use uuid::Uuid;

use waypost_net::{AssembleStatus, Limits, ParsedRequest, RequestAssembler, encode_request};

use crate::error::ProxyError;
use crate::events::EventSink;
use crate::proxy::ProxyState;
use crate::proxy_event::ProxyEventKind;
use crate::resolver::NameLookup;

const READ_CHUNK: usize = 16 * 1024;

/// Where a connection is in its single request/response exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Idle,
    ParsingHeader,
    ParsingBody,
    HeaderOnly,
    Resolving,
    Connecting,
    Sending,
    Relaying,
    Closed,
}

/// Per-connection bookkeeping: the id every event carries, the current
/// state and the number of bytes handed to the client so far.
pub(crate) struct ConnectionTrace<'a> {
    id: Uuid,
    pub(crate) state: ConnectionState,
    bytes_relayed: u64,
    events: &'a EventSink,
}

impl<'a> ConnectionTrace<'a> {
    pub(crate) fn new(events: &'a EventSink) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: ConnectionState::Idle,
            bytes_relayed: 0,
            events,
        }
    }

    fn enter(&mut self, state: ConnectionState) {
        if self.state != ConnectionState::Closed {
            self.state = state;
        }
    }

    fn emit(&self, kind: ProxyEventKind) {
        self.events.emit(self.id, kind);
    }
}

/// Runs one client connection to completion. Failures are reported on the
/// event stream and end the exchange; nothing is returned to the caller and
/// the client simply sees its connection close.
pub(crate) async fn handle_connection<L, C>(
    state: &ProxyState<L>,
    mut client: C,
    peer: Option<SocketAddr>,
) where
    L: NameLookup,
    C: AsyncRead + AsyncWrite + Unpin,
{
    let mut trace = ConnectionTrace::new(&state.events);
    trace.emit(ProxyEventKind::Accepted { peer });

    if let Err(err) = forward(state, &mut trace, &mut client).await {
        tracing::debug!(connection = %trace.id, state = ?trace.state, error = %err, "proxying failed");
        trace.emit(ProxyEventKind::Failed {
            state: trace.state,
            error: err.to_string(),
        });
    }

    let _ = client.shutdown().await;
    drop(client);

    let last_state = trace.state;
    trace.enter(ConnectionState::Closed);
    trace.emit(ProxyEventKind::ConnectionClosed {
        state: last_state,
        bytes_relayed: trace.bytes_relayed,
    });
}

async fn forward<L, C>(
    state: &ProxyState<L>,
    trace: &mut ConnectionTrace<'_>,
    client: &mut C,
) -> Result<(), ProxyError>
where
    L: NameLookup,
    C: AsyncRead + AsyncWrite + Unpin,
{
    let config = &state.config;

    let request = read_request(client, Limits::from(&config.limits), trace).await?;
    trace.emit(ProxyEventKind::RequestParsed {
        method: request.line.method.clone(),
        target: request.line.target.clone(),
        host: request.host.clone(),
        port: request.port,
        content_length: request.content_length,
    });

    let host = request.host.as_deref().ok_or(ProxyError::MissingHost)?;

    trace.enter(ConnectionState::Resolving);
    let resolution = with_deadline(config.timeouts.resolve(), "resolve", async {
        state.resolver.resolve(host).await.map_err(ProxyError::from)
    })
    .await?;
    trace.emit(ProxyEventKind::HostResolved {
        host: host.to_string(),
        address: resolution.address,
        cached: resolution.cached,
    });

    trace.enter(ConnectionState::Connecting);
    let address = SocketAddr::new(resolution.address, request.port);
    let mut upstream = with_deadline(config.timeouts.connect(), "connect", async {
        TcpStream::connect(address)
            .await
            .map_err(|source| ProxyError::Connect { address, source })
    })
    .await?;
    trace.emit(ProxyEventKind::UpstreamConnected { address });

    trace.enter(ConnectionState::Sending);
    let bytes = send_request(&mut upstream, &request).await?;
    trace.emit(ProxyEventKind::RequestForwarded { bytes });

    trace.enter(ConnectionState::Relaying);
    relay(
        &mut upstream,
        client,
        config.relay.buffer_size,
        config.timeouts.relay_idle(),
        trace,
    )
    .await
}

/// Reads from `reader` until a full request is assembled. Each read asks for
/// no more than the assembler can still take, so the header buffer is never
/// overrun.
pub(crate) async fn read_request<R>(
    reader: &mut R,
    limits: Limits,
    trace: &mut ConnectionTrace<'_>,
) -> Result<ParsedRequest, ProxyError>
where
    R: AsyncRead + Unpin,
{
    trace.enter(ConnectionState::ParsingHeader);
    let mut assembler = RequestAssembler::with_limits(limits);
    let mut buffer = vec![0u8; READ_CHUNK];

    loop {
        let want = assembler.remaining().clamp(1, buffer.len());
        let n = reader.read(&mut buffer[..want]).await?;
        if n == 0 {
            return Err(assembler.finish().into());
        }

        match assembler.push(&buffer[..n]) {
            AssembleStatus::NeedMore => {
                if assembler.in_body() {
                    trace.enter(ConnectionState::ParsingBody);
                }
            }
            AssembleStatus::Complete { request } => {
                trace.enter(if request.body.is_some() {
                    ConnectionState::ParsingBody
                } else {
                    ConnectionState::HeaderOnly
                });
                return Ok(request);
            }
            AssembleStatus::Error { error } => return Err(error.into()),
        }
    }
}

async fn send_request<U>(upstream: &mut U, request: &ParsedRequest) -> Result<usize, ProxyError>
where
    U: AsyncWrite + Unpin,
{
    let bytes = encode_request(request);
    upstream.write_all(&bytes).await.map_err(ProxyError::Relay)?;
    upstream.flush().await.map_err(ProxyError::Relay)?;
    Ok(bytes.len())
}

/// Copies upstream bytes to the client until the upstream closes.
async fn relay<U, C>(
    upstream: &mut U,
    client: &mut C,
    buffer_size: usize,
    idle: Option<Duration>,
    trace: &mut ConnectionTrace<'_>,
) -> Result<(), ProxyError>
where
    U: AsyncRead + Unpin,
    C: AsyncWrite + Unpin,
{
    let mut buffer = vec![0u8; buffer_size.max(1)];
    loop {
        let n = with_deadline(idle, "relay", async {
            upstream.read(&mut buffer).await.map_err(ProxyError::Relay)
        })
        .await?;
        if n == 0 {
            break;
        }
        client
            .write_all(&buffer[..n])
            .await
            .map_err(ProxyError::Relay)?;
        trace.bytes_relayed += n as u64;
        trace.emit(ProxyEventKind::BytesRelayed { bytes: n });
    }
    client.flush().await.map_err(ProxyError::Relay)
}

async fn with_deadline<T, F>(
    limit: Option<Duration>,
    step: &'static str,
    future: F,
) -> Result<T, ProxyError>
where
    F: Future<Output = Result<T, ProxyError>>,
{
    match limit {
        Some(after) => tokio::time::timeout(after, future)
            .await
            .map_err(|_| ProxyError::Timeout { step, after })?,
        None => future.await,
    }
}
