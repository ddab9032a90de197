use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::Semaphore;

use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::events::{EventSink, ProxyEvents, event_channel};
use crate::pipeline::handle_connection;
use crate::resolver::{NameLookup, ResolverCache, SystemLookup};

const ACCEPT_BACKOFF_START: Duration = Duration::from_millis(10);
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

pub struct Proxy<L = SystemLookup> {
    state: Arc<ProxyState<L>>,
}

pub(crate) struct ProxyState<L> {
    pub(crate) config: ProxyConfig,
    pub(crate) resolver: ResolverCache<L>,
    pub(crate) events: EventSink,
}

impl<L> Clone for Proxy<L> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl Proxy<SystemLookup> {
    pub fn new(config: ProxyConfig) -> Result<(Self, ProxyEvents), ProxyError> {
        Self::with_lookup(config, SystemLookup)
    }
}

impl<L: NameLookup> Proxy<L> {
    pub fn with_lookup(config: ProxyConfig, lookup: L) -> Result<(Self, ProxyEvents), ProxyError> {
        config.validate()?;
        let resolver = ResolverCache::with_lookup(lookup, config.resolver.ttl());
        let (events, stream) = event_channel();
        Ok((
            Self {
                state: Arc::new(ProxyState {
                    config,
                    resolver,
                    events,
                }),
            },
            stream,
        ))
    }

    pub fn resolver(&self) -> &ResolverCache<L> {
        &self.state.resolver
    }

    pub async fn run(&self) -> Result<(), ProxyError> {
        let addr = self.state.config.listen_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|err| ProxyError::Runtime(format!("failed to bind {addr}: {err}")))?;
        tracing::info!(%addr, "waiting for requests");
        self.serve(listener).await
    }

    /// Accepts connections forever, one task per connection. Accept errors
    /// are logged and do not stop the loop.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ProxyError> {
        let admission = self
            .state
            .config
            .max_connections
            .map(|limit| Arc::new(Semaphore::new(limit)));

        let purge_state = Arc::clone(&self.state);
        let purge_task = tokio::spawn(async move {
            purge_loop(purge_state).await;
        });

        let result = self.accept_loop(&listener, admission).await;
        purge_task.abort();
        result
    }

    /// Handles a single already-accepted connection on the current task.
    pub async fn handle_connection<C>(&self, client: C)
    where
        C: AsyncRead + AsyncWrite + Unpin,
    {
        handle_connection(&self.state, client, None).await;
    }

    async fn accept_loop(
        &self,
        listener: &TcpListener,
        admission: Option<Arc<Semaphore>>,
    ) -> Result<(), ProxyError> {
        let mut failures = 0u32;
        loop {
            let permit = match &admission {
                Some(semaphore) => Some(
                    Arc::clone(semaphore)
                        .acquire_owned()
                        .await
                        .map_err(|err| ProxyError::Runtime(err.to_string()))?,
                ),
                None => None,
            };

            let (stream, peer) = match listener.accept().await {
                Ok(accepted) => {
                    failures = 0;
                    accepted
                }
                Err(err) => {
                    failures = failures.saturating_add(1);
                    let delay = accept_backoff(failures);
                    tracing::warn!(error = %err, ?delay, "failed to accept connection");
                    tokio::time::sleep(delay).await;
                    continue;
                }
            };

            let state = Arc::clone(&self.state);
            tokio::spawn(async move {
                handle_connection(&state, stream, Some(peer)).await;
                drop(permit);
            });
        }
    }
}

/// Pause before retrying after `failures` accept errors in a row.
pub(crate) fn accept_backoff(failures: u32) -> Duration {
    let shift = failures.saturating_sub(1).min(16);
    ACCEPT_BACKOFF_START
        .saturating_mul(1 << shift)
        .min(ACCEPT_BACKOFF_MAX)
}

async fn purge_loop<L: NameLookup>(state: Arc<ProxyState<L>>) {
    let period = state.resolver.ttl().max(Duration::from_secs(1));
    let mut interval = tokio::time::interval(period);
    interval.tick().await;
    loop {
        interval.tick().await;
        let purged = state.resolver.purge_expired().await;
        if purged > 0 {
            tracing::debug!(purged, "dropped stale resolver entries");
        }
    }
}
