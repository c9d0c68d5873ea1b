//! Store configuration.
//!
//! Selects and opens a [`CampusStore`] backend. Configuration is loaded from
//! environment variables with defaults suitable for local development:
//!
//! | variable | default | meaning |
//! |----------|---------|---------|
//! | `CAMPUS_STORE_BACKEND` | `memory` | `memory` or `sqlite` |
//! | `CAMPUS_SQLITE_PATH` | `campus.db` | database file, or `:memory:` |
//! | `CAMPUS_SQLITE_WAL` | `true` | enable write-ahead logging |

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::error::StoreResult;
use crate::memory::MemoryStore;
use crate::repository::CampusStore;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Missing required environment variable.
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    /// Invalid configuration value.
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue {
        /// Configuration key.
        key: String,
        /// Error message.
        message: String,
    },
}

/// Available store backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process memory; contents are lost on exit.
    Memory,
    /// SQLite database file.
    Sqlite,
}

impl StoreBackend {
    /// Parse from string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "memory" | "mem" => Some(StoreBackend::Memory),
            "sqlite" | "sqlite3" => Some(StoreBackend::Sqlite),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StoreBackend::Memory => "memory",
            StoreBackend::Sqlite => "sqlite",
        }
    }
}

/// Store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Backend name as configured; checked by [`validate`](Self::validate).
    pub backend: String,

    /// SQLite database path, or `:memory:`.
    pub sqlite_path: String,

    /// Whether to switch SQLite to write-ahead logging.
    pub sqlite_wal: bool,
}

impl Default for StoreConfig {
    /// Returns default configuration suitable for local development.
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory.as_str().to_string(),
            sqlite_path: "campus.db".to_string(),
            sqlite_wal: true,
        }
    }
}

impl StoreConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            backend: std::env::var("CAMPUS_STORE_BACKEND").unwrap_or(default.backend),
            sqlite_path: std::env::var("CAMPUS_SQLITE_PATH").unwrap_or(default.sqlite_path),
            sqlite_wal: std::env::var("CAMPUS_SQLITE_WAL")
                .map(|s| s != "false" && s != "0")
                .unwrap_or(default.sqlite_wal),
        }
    }

    /// Configuration for an in-memory SQLite database.
    pub fn sqlite_in_memory() -> Self {
        Self {
            backend: StoreBackend::Sqlite.as_str().to_string(),
            sqlite_path: ":memory:".to_string(),
            sqlite_wal: false,
        }
    }

    /// The configured backend.
    pub fn backend(&self) -> Result<StoreBackend, ConfigError> {
        StoreBackend::parse(&self.backend).ok_or_else(|| ConfigError::InvalidValue {
            key: "CAMPUS_STORE_BACKEND".to_string(),
            message: format!("unknown backend '{}', expected memory or sqlite", self.backend),
        })
    }

    /// Validate that the configuration can open a store.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.backend()? {
            StoreBackend::Memory => Ok(()),
            StoreBackend::Sqlite => {
                if !cfg!(feature = "sqlite") {
                    return Err(ConfigError::InvalidValue {
                        key: "CAMPUS_STORE_BACKEND".to_string(),
                        message: "sqlite support is not compiled in".to_string(),
                    });
                }
                if self.sqlite_path.trim().is_empty() {
                    return Err(ConfigError::MissingEnvVar("CAMPUS_SQLITE_PATH".to_string()));
                }
                Ok(())
            }
        }
    }
}

/// Open the store described by `config`.
pub fn open_store(config: &StoreConfig) -> StoreResult<Arc<dyn CampusStore>> {
    config.validate()?;
    let store: Arc<dyn CampusStore> = match config.backend()? {
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
        #[cfg(feature = "sqlite")]
        StoreBackend::Sqlite => {
            let path = config.sqlite_path.trim();
            if path == ":memory:" {
                Arc::new(crate::sqlite::SqliteStore::open_in_memory()?)
            } else {
                Arc::new(crate::sqlite::SqliteStore::open(path, config.sqlite_wal)?)
            }
        }
        #[cfg(not(feature = "sqlite"))]
        StoreBackend::Sqlite => {
            return Err(ConfigError::InvalidValue {
                key: "CAMPUS_STORE_BACKEND".to_string(),
                message: "sqlite support is not compiled in".to_string(),
            }
            .into())
        }
    };
    info!(backend = store.backend_name(), "Campus store opened");
    Ok(store)
}
