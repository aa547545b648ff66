//! # Client Configuration
//!
//! Defaults match a local daemon on the standard port. `from_env` overlays
//! `BEANSTALK_*` variables so deployments can retarget without code changes.

use std::time::Duration;

use beanstalk_common::{DEFAULT_HOST, DEFAULT_PORT};

use crate::pool::PoolConfig;

/// Default pool capacity.
pub const DEFAULT_MAX_CONNECTIONS: usize = 16;

/// Configuration for the client and its pool.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Daemon host, e.g. "localhost".
    pub host: String,
    /// Daemon port.
    pub port: u16,
    /// Maximum total connections (idle + in-use).
    pub max_connections: usize,
    /// Optional TCP connect timeout.
    pub connect_timeout: Option<Duration>,
    /// Optional TCP read timeout.
    pub read_timeout: Option<Duration>,
    /// Optional TCP write timeout.
    pub write_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            connect_timeout: None,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

impl ClientConfig {
    /// Defaults overlaid with `BEANSTALK_*` environment variables.
    ///
    /// Recognized: `BEANSTALK_HOST`, `BEANSTALK_PORT`,
    /// `BEANSTALK_MAX_CONNECTIONS`, `BEANSTALK_CONNECT_TIMEOUT_MS`,
    /// `BEANSTALK_READ_TIMEOUT_MS`, `BEANSTALK_WRITE_TIMEOUT_MS`.
    /// Unparsable values are ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = ClientConfig::default();
        if let Some(host) = lookup("BEANSTALK_HOST").filter(|host| !host.is_empty()) {
            config.host = host;
        }
        if let Some(port) = parse(&lookup, "BEANSTALK_PORT") {
            config.port = port;
        }
        if let Some(max) = parse(&lookup, "BEANSTALK_MAX_CONNECTIONS") {
            config.max_connections = max;
        }
        if let Some(ms) = parse(&lookup, "BEANSTALK_CONNECT_TIMEOUT_MS") {
            config.connect_timeout = Some(Duration::from_millis(ms));
        }
        if let Some(ms) = parse(&lookup, "BEANSTALK_READ_TIMEOUT_MS") {
            config.read_timeout = Some(Duration::from_millis(ms));
        }
        if let Some(ms) = parse(&lookup, "BEANSTALK_WRITE_TIMEOUT_MS") {
            config.write_timeout = Some(Duration::from_millis(ms));
        }
        config
    }

    pub(crate) fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            host: self.host.clone(),
            port: self.port,
            max_connections: self.max_connections,
            connect_timeout: self.connect_timeout,
            read_timeout: self.read_timeout,
            write_timeout: self.write_timeout,
        }
    }
}

fn parse<F, T>(lookup: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key).and_then(|raw| raw.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_target_local_daemon() {
        let config = ClientConfig::default();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 11300);
        assert_eq!(config.max_connections, DEFAULT_MAX_CONNECTIONS);
        assert!(config.read_timeout.is_none());
    }

    #[test]
    fn environment_overrides_defaults() {
        let vars: HashMap<&str, &str> = [
            ("BEANSTALK_HOST", "queue.internal"),
            ("BEANSTALK_PORT", "11400"),
            ("BEANSTALK_MAX_CONNECTIONS", "4"),
            ("BEANSTALK_READ_TIMEOUT_MS", "250"),
        ]
        .into_iter()
        .collect();
        let config = ClientConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(config.host, "queue.internal");
        assert_eq!(config.port, 11400);
        assert_eq!(config.max_connections, 4);
        assert_eq!(config.read_timeout, Some(Duration::from_millis(250)));
        assert!(config.write_timeout.is_none());
    }

    #[test]
    fn unparsable_values_are_ignored() {
        let config = ClientConfig::from_lookup(|key| match key {
            "BEANSTALK_PORT" => Some("not-a-port".to_string()),
            "BEANSTALK_HOST" => Some(String::new()),
            _ => None,
        });
        assert_eq!(config.port, 11300);
        assert_eq!(config.host, "localhost");
    }
}
