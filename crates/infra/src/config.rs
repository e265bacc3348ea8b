//! Process configuration read from the environment.
//!
//! | Variable                   | Default        |
//! |----------------------------|----------------|
//! | `BIND_ADDR`                | `0.0.0.0:8080` |
//! | `USE_PERSISTENT_STORES`    | `false`        |
//! | `DATABASE_URL`             | required when persistent |
//! | `FIXTURE_CHILD_CONTAINERS` | `3`            |

use std::net::SocketAddr;

use thiserror::Error;

use crate::fixture::DEFAULT_CHILD_CONTAINERS;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{name} is not valid: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("{0} must be set when USE_PERSISTENT_STORES=true")]
    Missing(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    InMemory,
    Postgres { database_url: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub store: StoreBackend,
    pub fixture_child_containers: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_addr = lookup("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid {
                name: "BIND_ADDR",
                reason: e.to_string(),
            })?;

        let persistent = match lookup("USE_PERSISTENT_STORES") {
            None => false,
            Some(raw) => parse_flag(&raw).ok_or_else(|| ConfigError::Invalid {
                name: "USE_PERSISTENT_STORES",
                reason: format!("expected true/false, got '{raw}'"),
            })?,
        };

        let store = if persistent {
            let database_url = lookup("DATABASE_URL")
                .filter(|url| !url.trim().is_empty())
                .ok_or(ConfigError::Missing("DATABASE_URL"))?;
            StoreBackend::Postgres { database_url }
        } else {
            StoreBackend::InMemory
        };

        let fixture_child_containers = match lookup("FIXTURE_CHILD_CONTAINERS") {
            None => DEFAULT_CHILD_CONTAINERS,
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(n) if n >= 1 => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "FIXTURE_CHILD_CONTAINERS",
                        reason: format!("expected a positive integer, got '{raw}'"),
                    });
                }
            },
        };

        Ok(Self {
            bind_addr,
            store,
            fixture_child_containers,
        })
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" | "" => Some(false),
        _ => None,
    }
}
