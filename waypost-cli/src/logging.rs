use tokio_stream::StreamExt;
use tracing_subscriber::EnvFilter;
use waypost_proxy::{ProxyEvent, ProxyEventKind, ProxyEvents};

pub fn init_tracing(json: bool) {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info,waypost_proxy=debug".into());
    let env_filter = EnvFilter::new(filter);

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .json()
            .flatten_event(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .compact()
            .init();
    }
}

pub async fn log_events(mut events: ProxyEvents) {
    while let Some(event) = events.next().await {
        log_event(&event);
    }
}

fn log_event(event: &ProxyEvent) {
    let connection = event.connection_id;
    match &event.kind {
        ProxyEventKind::Accepted { peer } => {
            tracing::debug!(%connection, ?peer, "accepted connection");
        }
        ProxyEventKind::RequestParsed {
            method,
            target,
            host,
            port,
            content_length,
        } => {
            tracing::info!(
                %connection, %method, %target, ?host, port, content_length,
                "read request from client"
            );
        }
        ProxyEventKind::HostResolved {
            host,
            address,
            cached,
        } => {
            tracing::info!(%connection, %host, %address, cached, "resolved host");
        }
        ProxyEventKind::UpstreamConnected { address } => {
            tracing::info!(%connection, %address, "connected to server");
        }
        ProxyEventKind::RequestForwarded { bytes } => {
            tracing::debug!(%connection, bytes, "sent request to server");
        }
        ProxyEventKind::BytesRelayed { bytes } => {
            tracing::debug!(%connection, bytes, "relayed bytes from server to client");
        }
        ProxyEventKind::ConnectionClosed {
            state,
            bytes_relayed,
        } => {
            tracing::info!(%connection, ?state, bytes_relayed, "connection closed");
        }
        ProxyEventKind::Failed { state, error } => {
            tracing::warn!(%connection, ?state, %error, "connection failed");
        }
    }
}
