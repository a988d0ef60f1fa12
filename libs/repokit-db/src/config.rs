//! Connection and store configuration.
//!
//! Loaded with figment from an optional YAML file, then overridden by
//! `REPOKIT_*` environment variables (`__` separates nesting levels), e.g.
//! `REPOKIT_STORE__MAX_PAGE_SIZE=200`.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};

pub const ENV_PREFIX: &str = "REPOKIT_";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DbConfig {
    pub dsn: String,
    pub max_conns: u32,
    pub min_conns: Option<u32>,
    #[serde(with = "humantime_serde")]
    pub acquire_timeout: Duration,
    /// Log every statement through sqlx.
    pub sqlx_logging: bool,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            dsn: "sqlite::memory:".to_owned(),
            max_conns: 10,
            min_conns: None,
            acquire_timeout: Duration::from_secs(30),
            sqlx_logging: false,
        }
    }
}

impl DbConfig {
    pub fn with_dsn(dsn: impl Into<String>) -> Self {
        Self {
            dsn: dsn.into(),
            ..Self::default()
        }
    }
}

/// What `delete` does when the id does not exist.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingDeletePolicy {
    /// Return `false` and leave the store untouched.
    #[default]
    Ignore,
    /// Fail with `StoreError::NotFound`.
    NotFound,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Cursor page size when the query carries no limit.
    pub default_page_size: u64,
    /// Upper bound for offset page sizes and cursor limits.
    pub max_page_size: u64,
    pub missing_delete: MissingDeletePolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            default_page_size: 25,
            max_page_size: 1000,
            missing_delete: MissingDeletePolicy::default(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoConfig {
    pub database: DbConfig,
    pub store: StoreConfig,
}

impl RepoConfig {
    /// Extract from a prepared figment, on top of the defaults.
    ///
    /// # Errors
    /// Returns an error when a provider fails or a value has the wrong shape.
    pub fn from_figment(figment: Figment) -> anyhow::Result<Self> {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(figment)
            .extract()
            .context("invalid repokit configuration")
    }

    /// Defaults, then `path` (when given), then `REPOKIT_*` variables.
    ///
    /// # Errors
    /// Returns an error when the file cannot be parsed or a value is invalid.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut figment = Figment::new();
        if let Some(path) = path {
            anyhow::ensure!(path.exists(), "config file not found: {}", path.display());
            figment = figment.merge(Yaml::file(path));
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        Self::from_figment(figment)
    }
}
