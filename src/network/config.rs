//! Server Configuration
//!
//! Defaults suit local play; every field can be overridden from the
//! environment.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::game::engine::MatchConfig;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable could not be parsed.
    #[error("Invalid value for {name}: {value:?}")]
    InvalidValue {
        /// Variable name
        name: &'static str,
        /// Raw value
        value: String,
    },
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Card catalog file.
    pub catalog_path: PathBuf,
    /// How often each session's timer is ticked.
    pub tick_interval: Duration,
    /// How long an ended session lingers before removal.
    pub session_grace: Duration,
    /// How often the cleanup task runs.
    pub cleanup_interval: Duration,
    /// Match rules.
    pub match_config: MatchConfig,
    /// Fixed engine seed for every session.
    pub seed: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_connections: 1000,
            catalog_path: PathBuf::from("data/cards.json"),
            tick_interval: Duration::from_millis(100),
            session_grace: Duration::from_secs(5),
            cleanup_interval: Duration::from_secs(60),
            match_config: MatchConfig::default(),
            seed: None,
        }
    }
}

impl ServerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = parse_var::<SocketAddr, _>(&lookup, "DUEL_BIND_ADDR")? {
            config.bind_addr = addr;
        }
        if let Some(max) = parse_var::<usize, _>(&lookup, "DUEL_MAX_CONNECTIONS")? {
            config.max_connections = max;
        }
        if let Some(path) = lookup("DUEL_CATALOG_PATH") {
            config.catalog_path = PathBuf::from(path);
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "DUEL_TICK_MS")? {
            if ms == 0 {
                return Err(ConfigError::InvalidValue {
                    name: "DUEL_TICK_MS",
                    value: ms.to_string(),
                });
            }
            config.tick_interval = Duration::from_millis(ms);
        }
        if let Some(turns) = parse_var::<u32, _>(&lookup, "DUEL_TOTAL_TURNS")? {
            if turns == 0 {
                return Err(ConfigError::InvalidValue {
                    name: "DUEL_TOTAL_TURNS",
                    value: turns.to_string(),
                });
            }
            config.match_config.total_turns = turns;
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "DUEL_TURN_SECONDS")? {
            config.match_config.turn_duration = Duration::from_secs(secs);
        }
        config.seed = parse_var::<u64, _>(&lookup, "DUEL_SEED")?;

        Ok(config)
    }
}

fn parse_var<T, F>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { name, value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let vars: BTreeMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.max_connections, 1000);
        assert_eq!(config.tick_interval, Duration::from_millis(100));
        assert_eq!(config.match_config.total_turns, 6);
        assert!(config.seed.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = from_pairs(&[
            ("DUEL_BIND_ADDR", "127.0.0.1:9000"),
            ("DUEL_MAX_CONNECTIONS", "10"),
            ("DUEL_CATALOG_PATH", "/tmp/cards.json"),
            ("DUEL_TICK_MS", "50"),
            ("DUEL_TOTAL_TURNS", "4"),
            ("DUEL_TURN_SECONDS", "15"),
            ("DUEL_SEED", "1234"),
        ])
        .unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:9000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.catalog_path, PathBuf::from("/tmp/cards.json"));
        assert_eq!(config.tick_interval, Duration::from_millis(50));
        assert_eq!(config.match_config.total_turns, 4);
        assert_eq!(config.match_config.turn_duration, Duration::from_secs(15));
        assert_eq!(config.seed, Some(1234));
    }

    #[test]
    fn test_invalid_values() {
        assert!(from_pairs(&[("DUEL_BIND_ADDR", "nowhere")]).is_err());
        assert!(from_pairs(&[("DUEL_TICK_MS", "0")]).is_err());
        assert!(from_pairs(&[("DUEL_TOTAL_TURNS", "-1")]).is_err());
        assert!(matches!(
            from_pairs(&[("DUEL_SEED", "abc")]),
            Err(ConfigError::InvalidValue { name: "DUEL_SEED", .. })
        ));
    }
}
