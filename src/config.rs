use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub cache: CacheConfig,
    pub identity: IdentityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Lifetime of the shared global feed slot.
    pub global_feed_ttl_secs: u64,
}

impl CacheConfig {
    pub fn global_feed_ttl(&self) -> Duration {
        Duration::from_secs(self.global_feed_ttl_secs)
    }
}

/// Where the upstream identity collaborator puts the authenticated username.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    pub header: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite:data/postboard.db".to_string(),
                max_connections: 5,
            },
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            cache: CacheConfig {
                global_feed_ttl_secs: 20,
            },
            identity: IdentityConfig {
                header: "x-remote-user".to_string(),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup; unset or malformed values
    /// fall back to the defaults.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let config = Self {
            database: DatabaseConfig {
                url: lookup("DATABASE_URL").unwrap_or(defaults.database.url),
                max_connections: lookup("DATABASE_MAX_CONNECTIONS")
                    .and_then(|v| v.parse().ok())
                    .filter(|n| *n > 0)
                    .unwrap_or(defaults.database.max_connections),
            },
            server: ServerConfig {
                host: lookup("SERVER_HOST").unwrap_or(defaults.server.host),
                port: lookup("SERVER_PORT")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.server.port),
            },
            cache: CacheConfig {
                global_feed_ttl_secs: lookup("FEED_CACHE_TTL_SECS")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.cache.global_feed_ttl_secs),
            },
            identity: IdentityConfig {
                header: lookup("IDENTITY_HEADER")
                    .map(|h| h.trim().to_ascii_lowercase())
                    .filter(|h| !h.is_empty())
                    .unwrap_or(defaults.identity.header),
            },
        };

        if axum::http::HeaderName::from_bytes(config.identity.header.as_bytes()).is_err() {
            anyhow::bail!(
                "IDENTITY_HEADER {:?} is not a valid header name",
                config.identity.header
            );
        }

        Ok(config)
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
