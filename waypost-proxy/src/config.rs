use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use waypost_net::Limits;

use crate::error::ProxyError;
use crate::resolver::DEFAULT_TTL;

pub const DEFAULT_PORT: u16 = 5042;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProxyConfig {
    pub listen: ListenConfig,
    pub resolver: ResolverConfig,
    pub limits: LimitsConfig,
    pub relay: RelayConfig,
    pub timeouts: TimeoutConfig,
    /// Upper bound on connections handled at once; unbounded when unset.
    pub max_connections: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ListenConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ResolverConfig {
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_header_bytes: usize,
    pub max_body_bytes: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RelayConfig {
    pub buffer_size: usize,
}

/// Per-step deadlines. Every step waits indefinitely when its deadline is
/// unset.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TimeoutConfig {
    pub resolve_ms: Option<u64>,
    pub connect_ms: Option<u64>,
    pub relay_idle_ms: Option<u64>,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_TTL.as_secs(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        let limits = Limits::default();
        Self {
            max_header_bytes: limits.max_header_bytes,
            max_body_bytes: limits.max_body_bytes,
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            buffer_size: 64 * 1024,
        }
    }
}

impl ResolverConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl From<&LimitsConfig> for Limits {
    fn from(config: &LimitsConfig) -> Self {
        Self {
            max_header_bytes: config.max_header_bytes,
            max_body_bytes: config.max_body_bytes,
        }
    }
}

impl TimeoutConfig {
    pub fn resolve(&self) -> Option<Duration> {
        self.resolve_ms.map(Duration::from_millis)
    }

    pub fn connect(&self) -> Option<Duration> {
        self.connect_ms.map(Duration::from_millis)
    }

    pub fn relay_idle(&self) -> Option<Duration> {
        self.relay_idle_ms.map(Duration::from_millis)
    }
}

impl ProxyConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ProxyError> {
        let config: Self =
            toml::from_str(input).map_err(|err| ProxyError::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ProxyError> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path)
            .map_err(|err| ProxyError::Config(format!("{}: {err}", path.display())))?;
        Self::from_toml_str(&input)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.listen.host, self.listen.port)
    }

    pub fn validate(&self) -> Result<(), ProxyError> {
        if self.limits.max_header_bytes < 4 {
            return Err(ProxyError::Config(
                "limits.max_header_bytes must hold at least the header terminator".to_string(),
            ));
        }
        if self.relay.buffer_size == 0 {
            return Err(ProxyError::Config(
                "relay.buffer_size must be greater than zero".to_string(),
            ));
        }
        if self.max_connections == Some(0) {
            return Err(ProxyError::Config(
                "max_connections must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
