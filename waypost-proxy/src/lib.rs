mod config;
mod error;
mod events;
mod pipeline;
#[cfg(test)]
mod pipeline_test;
mod proxy;
#[cfg(test)]
mod proxy_test;
mod proxy_event;
mod resolver;

pub use config::{
    DEFAULT_PORT, LimitsConfig, ListenConfig, ProxyConfig, RelayConfig, ResolverConfig,
    TimeoutConfig,
};
pub use error::{ProxyError, ResolveError};
pub use events::{EventSink, ProxyEvents, event_channel};
pub use pipeline::ConnectionState;
pub use proxy::Proxy;
pub use proxy_event::{ProxyEvent, ProxyEventKind};
pub use resolver::{DEFAULT_TTL, NameLookup, Resolution, ResolverCache, SystemLookup};
