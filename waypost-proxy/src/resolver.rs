use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::net::IpAddr;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::ResolveError;

pub const DEFAULT_TTL: Duration = Duration::from_secs(30);

/// Hostname lookup used to fill the cache.
pub trait NameLookup: Send + Sync + 'static {
    fn lookup(&self, host: &str) -> impl Future<Output = io::Result<Vec<IpAddr>>> + Send;
}

/// Resolves through the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLookup;

impl NameLookup for SystemLookup {
    async fn lookup(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        let addresses = tokio::net::lookup_host((host, 0)).await?;
        Ok(addresses.map(|address| address.ip()).collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub address: IpAddr,
    pub cached: bool,
}

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    address: IpAddr,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_fresh(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Hostname to address map shared by every connection.
///
/// The freshness check and the refill run under one lock, so concurrent
/// callers never see a half-written map. A failed lookup leaves existing
/// entries as they were.
#[derive(Debug)]
pub struct ResolverCache<L = SystemLookup> {
    lookup: L,
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl<L: NameLookup> ResolverCache<L> {
    pub fn with_lookup(lookup: L, ttl: Duration) -> Self {
        Self {
            lookup,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_ttl(self, ttl: Duration) -> Self {
        Self { ttl, ..self }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn resolve(&self, host: &str) -> Result<Resolution, ResolveError> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        if let Some(entry) = entries.get(host).filter(|entry| entry.is_fresh(now)) {
            return Ok(Resolution {
                address: entry.address,
                cached: true,
            });
        }

        let address = self
            .lookup
            .lookup(host)
            .await
            .map_err(|source| ResolveError::Lookup {
                host: host.to_string(),
                source,
            })?
            .into_iter()
            .next()
            .ok_or_else(|| ResolveError::NoAddress {
                host: host.to_string(),
            })?;

        entries.insert(
            host.to_string(),
            CacheEntry {
                address,
                expires_at: now + self.ttl,
            },
        );
        Ok(Resolution {
            address,
            cached: false,
        })
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Drops stale entries. Lookups ignore them anyway; this only bounds the
    /// map for long-running processes.
    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_fresh(now));
        before - entries.len()
    }
}
