use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use snafu::ResultExt as _;

use crate::database::{RetryPolicy, StorageConfig};
use crate::error::{ApplicationError, ConfigLoadSnafu};

/// Service configuration, read from the environment (and `.env`).
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(rename = "host_address", default = "default_host")]
    pub host: SocketAddr,

    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_database_file")]
    pub database_file: String,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// `EnvFilter` directives used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,

    #[serde(default = "default_init_attempts")]
    pub init_attempts: usize,
    #[serde(default = "default_init_backoff", deserialize_with = "duration")]
    pub init_backoff: Duration,
    #[serde(default = "default_storage_timeout", deserialize_with = "duration")]
    pub storage_timeout: Duration,
    #[serde(default = "default_reinit_cooldown", deserialize_with = "duration")]
    pub reinit_cooldown: Duration,
}

impl Config {
    pub fn from_env() -> Result<Config, envy::Error> {
        envy::from_env::<Config>()
    }

    pub fn storage(&self) -> StorageConfig {
        StorageConfig::new(
            self.data_dir.clone(),
            self.database_file.clone(),
            RetryPolicy::new(self.init_attempts, self.init_backoff),
            self.storage_timeout,
            self.reinit_cooldown,
        )
    }
}

pub fn load() -> Result<Config, ApplicationError> {
    Config::from_env().context(ConfigLoadSnafu)
}

/// Durations are written in humantime syntax, e.g. `1s` or `250ms`.
fn duration<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    let text = String::deserialize(deserializer)?;
    humantime::parse_duration(&text).map_err(serde::de::Error::custom)
}

fn default_host() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8000))
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("/app/data")
}

fn default_database_file() -> String {
    StorageConfig::DEFAULT_DATABASE_FILE.to_string()
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_filter() -> String {
    "info".to_string()
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("static")
}

fn default_init_attempts() -> usize {
    3
}

fn default_init_backoff() -> Duration {
    Duration::from_secs(1)
}

fn default_storage_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_reinit_cooldown() -> Duration {
    Duration::from_secs(5)
}
