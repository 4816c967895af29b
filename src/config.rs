//! Runtime configuration
//!
//! Settings come from an optional JSON file, then environment variables on top.
//! The default file lives at `<config_dir>/config.json` (`~/.config/dareadmin/`
//! on Linux).

use chrono::Duration;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::cache::CacheConfig;
use crate::data::AdminAuth;

pub const ENV_API_GATEWAY: &str = "DARE_ADMIN_API_GATEWAY";
pub const ENV_ADMIN_TOKEN: &str = "DARE_ADMIN_TOKEN";
pub const ENV_IPFS_GATEWAY: &str = "DARE_ADMIN_IPFS_GATEWAY";

/// Largest page or batch the backend accepts
pub const MAX_REQUEST_SIZE: usize = 1000;

/// Longest TTL accepted for any cache (ten years)
pub const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("No API gateway configured (set api_gateway or DARE_ADMIN_API_GATEWAY)")]
    MissingApiGateway,

    #[error("Invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the admin backend
    pub api_gateway: Option<String>,
    /// Opaque bearer token for admin endpoints
    pub admin_token: Option<String>,
    /// Custom IPFS gateway tried before the public ones
    pub ipfs_gateway: Option<String>,
    pub profile_ttl_secs: u64,
    pub metadata_ttl_secs: u64,
    pub sol_price_ttl_secs: u64,
    pub ipfs_timeout_secs: u64,
    pub page_size: usize,
    pub max_batch_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_gateway: None,
            admin_token: None,
            ipfs_gateway: None,
            profile_ttl_secs: 900,
            metadata_ttl_secs: 86_400,
            sol_price_ttl_secs: 300,
            ipfs_timeout_secs: 10,
            page_size: 50,
            max_batch_size: MAX_REQUEST_SIZE,
        }
    }
}

impl Config {
    /// Default config file location, if a home directory can be determined
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "dareadmin").map(|dirs| dirs.config_dir().join("config.json"))
    }

    /// Loads configuration
    ///
    /// An explicit `path` must exist. The default path is optional: a missing
    /// file there means defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(default) => Self::from_file(&default)?,
                None => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    /// Overrides file settings with non-empty environment values
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(gateway) = non_empty(ENV_API_GATEWAY) {
            self.api_gateway = Some(gateway);
        }
        if let Some(token) = non_empty(ENV_ADMIN_TOKEN) {
            self.admin_token = Some(token);
        }
        if let Some(gateway) = non_empty(ENV_IPFS_GATEWAY) {
            self.ipfs_gateway = Some(gateway);
        }
    }

    /// Checks limits; `needs_backend` also requires an API gateway
    pub fn validate(&self, needs_backend: bool) -> Result<(), ConfigError> {
        if needs_backend && self.api_gateway().is_none() {
            return Err(ConfigError::MissingApiGateway);
        }
        if self.page_size == 0 || self.page_size > MAX_REQUEST_SIZE {
            return Err(ConfigError::Invalid {
                field: "page_size",
                reason: format!("must be between 1 and {}, got {}", MAX_REQUEST_SIZE, self.page_size),
            });
        }
        if self.max_batch_size == 0 || self.max_batch_size > MAX_REQUEST_SIZE {
            return Err(ConfigError::Invalid {
                field: "max_batch_size",
                reason: format!(
                    "must be between 1 and {}, got {}",
                    MAX_REQUEST_SIZE, self.max_batch_size
                ),
            });
        }
        for (field, secs) in [
            ("profile_ttl_secs", self.profile_ttl_secs),
            ("metadata_ttl_secs", self.metadata_ttl_secs),
            ("sol_price_ttl_secs", self.sol_price_ttl_secs),
        ] {
            if secs > MAX_TTL_SECS {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("must be at most {} seconds, got {}", MAX_TTL_SECS, secs),
                });
            }
        }
        if self.ipfs_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "ipfs_timeout_secs",
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Gateway with surrounding whitespace and trailing slashes removed
    pub fn api_gateway(&self) -> Option<&str> {
        self.api_gateway
            .as_deref()
            .map(|g| g.trim().trim_end_matches('/'))
            .filter(|g| !g.is_empty())
    }

    pub fn auth(&self) -> AdminAuth {
        match &self.admin_token {
            Some(token) => AdminAuth::bearer(token.clone()),
            None => AdminAuth::none(),
        }
    }

    pub fn profile_cache(&self) -> CacheConfig {
        CacheConfig::profiles()
            .with_ttl(seconds(self.profile_ttl_secs))
            .with_max_batch_size(self.max_batch_size)
    }

    pub fn metadata_cache(&self) -> CacheConfig {
        CacheConfig::ipfs_metadata().with_ttl(seconds(self.metadata_ttl_secs))
    }

    pub fn sol_price_ttl(&self) -> Duration {
        seconds(self.sol_price_ttl_secs)
    }

    pub fn ipfs_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.ipfs_timeout_secs)
    }
}

/// Clamped to `MAX_TTL_SECS`, which keeps chrono from panicking on huge values
fn seconds(secs: u64) -> Duration {
    Duration::seconds(secs.min(MAX_TTL_SECS) as i64)
}
