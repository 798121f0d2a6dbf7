//! Connection and server configuration
//!
//! Resolution order (later wins):
//! 1. Built-in development defaults
//! 2. TOML file (`./feedbench.toml`, then `~/.feedbench/config.toml`)
//! 3. `FEEDBENCH_*` environment variables

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sqlx::postgres::PgConnectOptions;
use thiserror::Error;

/// Database holding the social graph.
pub const FEED_DB: &str = "feeddb";

/// Maintenance database used for CREATE/DROP DATABASE.
pub const MAINTENANCE_DB: &str = "postgres";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config file {path:?} failed: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing config file {path:?} failed: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for {key}: '{value}'")]
    InvalidValue { key: &'static str, value: String },
}

/// Postgres connection options plus pool and deadline settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnOptions {
    pub host: String,
    pub port: u16,
    pub user_name: String,
    pub password: String,
    pub database: String,
    pub max_connections: u32,
    /// Seconds to wait for a pooled connection before reporting the store unavailable.
    pub acquire_timeout_secs: u64,
    /// Deadline applied to every logical operation.
    pub operation_timeout_secs: u64,
}

impl Default for ConnOptions {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user_name: "postgres".to_string(),
            password: "password".to_string(),
            database: FEED_DB.to_string(),
            max_connections: 10,
            acquire_timeout_secs: 10,
            operation_timeout_secs: 10,
        }
    }
}

impl ConnOptions {
    /// Connection URL for `db_name`. Contains the password; never log it.
    pub fn conn_string(&self, db_name: &str) -> String {
        self.render(db_name, false)
    }

    /// Connection URL with the password masked, safe for logs and errors.
    pub fn debug_conn_string(&self, db_name: &str) -> String {
        self.render(db_name, true)
    }

    fn render(&self, db_name: &str, hide_password: bool) -> String {
        let password = if hide_password && !self.password.is_empty() {
            "***"
        } else {
            self.password.as_str()
        };
        format!(
            "postgres://{}:{}/{}?user={}&password={}",
            self.host, self.port, db_name, self.user_name, password
        )
    }

    /// Structured connect options for `db_name`.
    pub fn connect_options(&self, db_name: &str) -> PgConnectOptions {
        let mut opts = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user_name)
            .database(db_name);
        if !self.password.is_empty() {
            opts = opts.password(&self.password);
        }
        opts
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }
}

/// HTTP listener configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

/// Full configuration file layout
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbenchConfig {
    #[serde(default)]
    pub db: ConnOptions,

    #[serde(default)]
    pub http: ServerConfig,
}

impl FeedbenchConfig {
    /// Load defaults, the first config file found, then environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match Self::default_paths().into_iter().find(|p| p.exists()) {
            Some(path) => {
                tracing::debug!("Loading config from {}", path.display());
                Self::from_file(&path)?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn default_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("feedbench.toml")];
        if let Some(dir) = config_dir() {
            paths.push(dir.join("config.toml"));
        }
        paths
    }

    /// Apply `FEEDBENCH_*` overrides using `lookup` to read variables.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("FEEDBENCH_DB_HOST") {
            self.db.host = v;
        }
        if let Some(v) = lookup("FEEDBENCH_DB_PORT") {
            self.db.port = parse_env("FEEDBENCH_DB_PORT", v)?;
        }
        if let Some(v) = lookup("FEEDBENCH_DB_USER") {
            self.db.user_name = v;
        }
        if let Some(v) = lookup("FEEDBENCH_DB_PASSWORD") {
            self.db.password = v;
        }
        if let Some(v) = lookup("FEEDBENCH_DB_NAME") {
            self.db.database = v;
        }
        if let Some(v) = lookup("FEEDBENCH_DB_MAX_CONNECTIONS") {
            self.db.max_connections = parse_env("FEEDBENCH_DB_MAX_CONNECTIONS", v)?;
        }
        if let Some(v) = lookup("FEEDBENCH_OPERATION_TIMEOUT_SECS") {
            self.db.operation_timeout_secs = parse_env("FEEDBENCH_OPERATION_TIMEOUT_SECS", v)?;
        }
        if let Some(v) = lookup("FEEDBENCH_HTTP_HOST") {
            self.http.host = v;
        }
        if let Some(v) = lookup("FEEDBENCH_HTTP_PORT") {
            self.http.port = parse_env("FEEDBENCH_HTTP_PORT", v)?;
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::InvalidValue { key, value })
}

/// Get the feedbench config directory path (~/.feedbench)
pub fn config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".feedbench"))
}
