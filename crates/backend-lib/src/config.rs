// ============================
// crates/backend-lib/src/config.rs
// ============================
//! Configuration management.
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;
use thiserror::Error;

use crate::auth::{PasswordRequirements, DEFAULT_RESET_LENGTH};

/// Default configuration file, relative to the working directory
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Prefix of environment overrides, nested keys split on `__`
pub const ENV_PREFIX: &str = "USERMGMT_";

const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Application settings
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Log level used when `RUST_LOG` is not set
    pub log_level: String,
    pub server: ServerSettings,
    pub storage: StorageSettings,
    pub hashing: HashingSettings,
    pub reset: ResetSettings,
    pub password_requirements: PasswordRequirements,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StorageSettings {
    /// Directory holding `users.json` and the reset outbox
    pub path: PathBuf,
}

/// argon2id cost parameters
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HashingSettings {
    /// Memory cost in KiB
    pub memory_kib: u32,
    pub iterations: u32,
    /// Degree of parallelism (lanes)
    pub parallelism: u32,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ResetSettings {
    /// Length of generated reset secrets, in characters
    pub secret_length: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            server: ServerSettings::default(),
            storage: StorageSettings::default(),
            hashing: HashingSettings::default(),
            reset: ResetSettings::default(),
            password_requirements: PasswordRequirements::default(),
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data"),
        }
    }
}

impl Default for HashingSettings {
    fn default() -> Self {
        Self {
            memory_kib: argon2::Params::DEFAULT_M_COST,
            iterations: argon2::Params::DEFAULT_T_COST,
            parallelism: argon2::Params::DEFAULT_P_COST,
        }
    }
}

impl Default for ResetSettings {
    fn default() -> Self {
        Self {
            secret_length: DEFAULT_RESET_LENGTH,
        }
    }
}

impl Settings {
    /// Load settings from `config.toml` and the environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Load settings from a specific file, then apply environment overrides.
    /// A missing file falls back to defaults.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings: Settings = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(Box::new)?;

        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::Invalid(format!(
                "unknown log level '{}'",
                self.log_level
            )));
        }

        if self.server.port == 0 {
            return Err(ConfigError::Invalid("server.port must not be 0".into()));
        }

        if self.reset.secret_length < 8 {
            return Err(ConfigError::Invalid(
                "reset.secret_length must be at least 8".into(),
            ));
        }

        if self.password_requirements.min_length < 6 {
            return Err(ConfigError::Invalid(
                "password_requirements.min_length must be at least 6".into(),
            ));
        }

        argon2::Params::new(
            self.hashing.memory_kib,
            self.hashing.iterations,
            self.hashing.parallelism,
            None,
        )
        .map_err(|e| ConfigError::Invalid(format!("hashing: {e}")))?;

        Ok(())
    }

    /// Socket address assembled from `server.host` and `server.port`
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self
            .server
            .host
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("server.host: {e}")))?;
        Ok(SocketAddr::new(ip, self.server.port))
    }
}
