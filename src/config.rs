// ReadHub Core - Book catalog client data layer
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Client configuration
//!
//! `ClientConfig` carries everything the HTTP adapter and local storage need.
//! Defaults target a local development backend; `from_env` layers
//! environment overrides on top.

use crate::error::{CatalogError, Result};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Default backend base URL
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8084";

/// Fixed request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Environment variable overriding the backend base URL
pub const ENV_BASE_URL: &str = "READHUB_API_BASE_URL";

/// Environment variable overriding the request timeout (seconds)
pub const ENV_TIMEOUT_SECS: &str = "READHUB_TIMEOUT_SECS";

/// Environment variable overriding the local storage database path
pub const ENV_DATABASE_PATH: &str = "READHUB_DATABASE_PATH";

/// Configuration for the book service client
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub user_agent: String,
    /// Local storage database; `None` keeps session state in memory only
    pub database_path: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: format!("readhub-core/{}", env!("CARGO_PKG_VERSION")),
            database_path: None,
        }
    }
}

impl ClientConfig {
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Build configuration from defaults plus environment overrides
    ///
    /// # Errors
    /// Returns `InvalidConfiguration` when an override cannot be parsed
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Self::builder();

        if let Some(base_url) = lookup(ENV_BASE_URL) {
            builder = builder.base_url(base_url);
        }

        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            let secs = raw.trim().parse::<u64>().map_err(|e| {
                CatalogError::InvalidConfiguration(format!("{}={}: {}", ENV_TIMEOUT_SECS, raw, e))
            })?;
            builder = builder.timeout(Duration::from_secs(secs));
        }

        if let Some(path) = lookup(ENV_DATABASE_PATH) {
            builder = builder.database_path(path);
        }

        let config = builder.build();
        config.validate()?;
        Ok(config)
    }

    /// Check that the base URL is an absolute http(s) URL
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.base_url)?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(CatalogError::InvalidConfiguration(format!(
                "Unsupported base URL scheme: {}",
                url.scheme()
            )));
        }
        if self.timeout.is_zero() {
            return Err(CatalogError::InvalidConfiguration(
                "Request timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for ClientConfig
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.config.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn user_agent<S: Into<String>>(mut self, user_agent: S) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config.database_path = Some(path.into());
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, "http://127.0.0.1:8084");
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert!(config.database_path.is_none());
    }

    #[test]
    fn test_builder_trims_trailing_slash() {
        let config = ClientConfig::builder()
            .base_url("https://books.example.com/api/")
            .timeout(Duration::from_secs(3))
            .user_agent("TestAgent/1.0")
            .build();

        assert_eq!(config.base_url, "https://books.example.com/api");
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert_eq!(config.user_agent, "TestAgent/1.0");
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_BASE_URL, "https://readhub.example.org"),
            (ENV_TIMEOUT_SECS, "25"),
            (ENV_DATABASE_PATH, "/tmp/readhub.db"),
        ]
        .into_iter()
        .collect();

        let config = ClientConfig::from_lookup(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.base_url, "https://readhub.example.org");
        assert_eq!(config.timeout, Duration::from_secs(25));
        assert_eq!(config.database_path, Some(PathBuf::from("/tmp/readhub.db")));
    }

    #[test]
    fn test_invalid_overrides_rejected() {
        let bad_timeout = ClientConfig::from_lookup(|k| {
            (k == ENV_TIMEOUT_SECS).then(|| "soon".to_string())
        });
        assert!(matches!(bad_timeout, Err(CatalogError::InvalidConfiguration(_))));

        let bad_url = ClientConfig::from_lookup(|k| {
            (k == ENV_BASE_URL).then(|| "ftp://books".to_string())
        });
        assert!(matches!(bad_url, Err(CatalogError::InvalidConfiguration(_))));
    }
}
