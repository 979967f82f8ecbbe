//! Server configuration.
//!
//! Read from the environment by the binary, or assembled in code through
//! [`PairplayServerBuilder`](crate::PairplayServerBuilder).
//!
//! | Variable                     | Default         |
//! |------------------------------|-----------------|
//! | `PAIRPLAY_BIND`              | `0.0.0.0:3000`  |
//! | `HOST` / `PORT`              | used when `PAIRPLAY_BIND` is unset |
//! | `PAIRPLAY_MAX_SEATS`         | `4`             |
//! | `PAIRPLAY_REPAIR_POLICY`     | `transfer`      |
//! | `PAIRPLAY_IDLE_TIMEOUT_SECS` | `300`           |
//! | `PAIRPLAY_PING_INTERVAL_SECS`| `25`            |

use std::time::Duration;

use pairplay_room::{RepairPolicy, RoomConfig};
use serde::{Deserialize, Serialize};

use crate::PairplayError;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;

/// Settings for a Pairplay server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub bind_addr: String,

    /// A connection that sends nothing for this long, pongs included, is
    /// closed.
    pub idle_timeout: Duration,

    /// How often the server pings each connection. Keep it well below
    /// `idle_timeout` so a quiet but live peer always answers in time.
    pub ping_interval: Duration,

    /// Settings handed to the room coordinator.
    pub room: RoomConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("{DEFAULT_HOST}:{DEFAULT_PORT}"),
            idle_timeout: Duration::from_secs(300),
            ping_interval: Duration::from_secs(25),
            room: RoomConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Builds a config from the process environment.
    ///
    /// # Errors
    /// Returns [`PairplayError::Config`] if a variable is set to a value
    /// that can't be parsed.
    pub fn from_env() -> Result<Self, PairplayError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup.
    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, PairplayError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(bind) = lookup("PAIRPLAY_BIND") {
            config.bind_addr = bind;
        } else if lookup("HOST").is_some() || lookup("PORT").is_some() {
            let host = lookup("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
            let port = match lookup("PORT") {
                Some(raw) => parse::<u16>("PORT", raw)?,
                None => DEFAULT_PORT,
            };
            config.bind_addr = format!("{host}:{port}");
        }

        if let Some(raw) = lookup("PAIRPLAY_MAX_SEATS") {
            let seats = parse::<usize>("PAIRPLAY_MAX_SEATS", raw.clone())?;
            if seats == 0 {
                return Err(PairplayError::Config {
                    key: "PAIRPLAY_MAX_SEATS",
                    value: raw,
                    reason: "must be at least 1".into(),
                });
            }
            config.room.default_max_seats = seats;
        }

        if let Some(raw) = lookup("PAIRPLAY_REPAIR_POLICY") {
            config.room.repair_policy = parse::<RepairPolicy>("PAIRPLAY_REPAIR_POLICY", raw)?;
        }

        if let Some(raw) = lookup("PAIRPLAY_IDLE_TIMEOUT_SECS") {
            let secs = parse::<u64>("PAIRPLAY_IDLE_TIMEOUT_SECS", raw)?;
            config.idle_timeout = Duration::from_secs(secs);
        }

        if let Some(raw) = lookup("PAIRPLAY_PING_INTERVAL_SECS") {
            let secs = parse::<u64>("PAIRPLAY_PING_INTERVAL_SECS", raw.clone())?;
            if secs == 0 {
                return Err(PairplayError::Config {
                    key: "PAIRPLAY_PING_INTERVAL_SECS",
                    value: raw,
                    reason: "must be at least 1".into(),
                });
            }
            config.ping_interval = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

fn parse<T>(key: &'static str, raw: String) -> Result<T, PairplayError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| PairplayError::Config {
        key,
        reason: e.to_string(),
        value: raw,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_vars(vars: &[(&str, &str)]) -> Result<ServerConfig, PairplayError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_from_lookup_empty_uses_defaults() {
        let config = from_vars(&[]).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.idle_timeout, Duration::from_secs(300));
        assert_eq!(config.ping_interval, Duration::from_secs(25));
        assert_eq!(config.room.default_max_seats, 4);
        assert_eq!(config.room.repair_policy, RepairPolicy::Transfer);
    }

    #[test]
    fn test_from_lookup_host_and_port() {
        let config = from_vars(&[("PORT", "8080")]).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8080");

        let config = from_vars(&[("HOST", "127.0.0.1"), ("PORT", "9000")]).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:9000");
    }

    #[test]
    fn test_from_lookup_bind_wins_over_host_port() {
        let config = from_vars(&[("PAIRPLAY_BIND", "[::1]:4000"), ("PORT", "8080")]).unwrap();
        assert_eq!(config.bind_addr, "[::1]:4000");
    }

    #[test]
    fn test_from_lookup_room_settings() {
        let config = from_vars(&[
            ("PAIRPLAY_MAX_SEATS", "8"),
            ("PAIRPLAY_REPAIR_POLICY", "Reject"),
            ("PAIRPLAY_IDLE_TIMEOUT_SECS", "30"),
            ("PAIRPLAY_PING_INTERVAL_SECS", "10"),
        ])
        .unwrap();
        assert_eq!(config.room.default_max_seats, 8);
        assert_eq!(config.room.repair_policy, RepairPolicy::Reject);
        assert_eq!(config.idle_timeout, Duration::from_secs(30));
        assert_eq!(config.ping_interval, Duration::from_secs(10));
    }

    #[test]
    fn test_from_lookup_bad_values_return_config_error() {
        for vars in [
            [("PORT", "http")],
            [("PAIRPLAY_MAX_SEATS", "0")],
            [("PAIRPLAY_REPAIR_POLICY", "steal")],
            [("PAIRPLAY_IDLE_TIMEOUT_SECS", "-1")],
            [("PAIRPLAY_PING_INTERVAL_SECS", "0")],
        ] {
            let err = from_vars(&vars).unwrap_err();
            assert!(
                matches!(&err, PairplayError::Config { key, .. } if *key == vars[0].0),
                "unexpected {err:?}"
            );
        }
    }
}
