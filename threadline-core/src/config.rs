//! Config - Backend Selection from the Environment
//!
//! ```text
//! STORAGE_TYPE        memory (default) | postgres
//! DATABASE_URL        full postgres URL, preferred when set
//! DB_HOST DB_PORT DB_USER DB_PASSWORD DB_NAME
//!                     assembled into a URL when DATABASE_URL is unset
//! DB_MAX_CONNECTIONS  pool size, default 10
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::constants::DB_CONNECTIONS_COUNT_DEFAULT;
use crate::storage::{MemoryStorage, Storage, StorageResult};

/// Environment variable names.
pub mod vars {
    /// Backend selector
    pub const STORAGE_TYPE: &str = "STORAGE_TYPE";
    /// Full connection URL
    pub const DATABASE_URL: &str = "DATABASE_URL";
    /// Database host
    pub const DB_HOST: &str = "DB_HOST";
    /// Database port
    pub const DB_PORT: &str = "DB_PORT";
    /// Database user
    pub const DB_USER: &str = "DB_USER";
    /// Database password
    pub const DB_PASSWORD: &str = "DB_PASSWORD";
    /// Database name
    pub const DB_NAME: &str = "DB_NAME";
    /// Pool size
    pub const DB_MAX_CONNECTIONS: &str = "DB_MAX_CONNECTIONS";
}

const DB_PORT_DEFAULT: u16 = 5432;

/// Errors building a `StorageConfig`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// `STORAGE_TYPE` names no known backend.
    #[error("unknown storage type: {0} (expected memory or postgres)")]
    UnknownStorage(String),

    /// A required variable is unset or empty.
    #[error("missing environment variable: {0}")]
    Missing(&'static str),

    /// A variable could not be parsed.
    #[error("invalid value for {name}: {value}")]
    Invalid {
        /// Variable name
        name: &'static str,
        /// Raw value
        value: String,
    },
}

/// Which backend to build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StorageKind {
    /// `MemoryStorage`
    #[default]
    Memory,
    /// `PostgresStorage`
    Postgres,
}

impl StorageKind {
    /// Get string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Postgres => "postgres",
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "memory" | "inmemory" => Ok(Self::Memory),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            other => Err(ConfigError::UnknownStorage(other.to_string())),
        }
    }
}

/// Resolved backend settings.
#[derive(Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// Backend to build
    pub kind: StorageKind,
    /// Connection URL; required for `Postgres`
    pub database_url: Option<String>,
    /// Pool size for `Postgres`
    pub max_connections: u32,
}

// The URL can carry a password.
impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("kind", &self.kind)
            .field("database_url", &self.database_url.as_ref().map(|_| "<redacted>"))
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::memory()
    }
}

impl StorageConfig {
    /// Volatile backend.
    #[must_use]
    pub fn memory() -> Self {
        Self {
            kind: StorageKind::Memory,
            database_url: None,
            max_connections: DB_CONNECTIONS_COUNT_DEFAULT,
        }
    }

    /// Durable backend at `url`.
    pub fn postgres(url: impl Into<String>) -> Self {
        Self {
            kind: StorageKind::Postgres,
            database_url: Some(url.into()),
            max_connections: DB_CONNECTIONS_COUNT_DEFAULT,
        }
    }

    /// Read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read settings through `lookup`; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let kind = get(vars::STORAGE_TYPE)
            .map(|v| v.parse::<StorageKind>())
            .transpose()?
            .unwrap_or_default();

        let max_connections = match get(vars::DB_MAX_CONNECTIONS) {
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: vars::DB_MAX_CONNECTIONS,
                        value: raw,
                    })
                }
            },
            None => DB_CONNECTIONS_COUNT_DEFAULT,
        };

        let database_url = match kind {
            StorageKind::Memory => get(vars::DATABASE_URL),
            StorageKind::Postgres => Some(match get(vars::DATABASE_URL) {
                Some(url) => url,
                None => assemble_url(&get)?,
            }),
        };

        Ok(Self {
            kind,
            database_url,
            max_connections,
        })
    }

    /// Build the configured backend.
    ///
    /// # Errors
    /// Fails if the durable backend cannot connect or create its schema,
    /// or if it was requested in a build without the `postgres` feature.
    pub async fn connect(&self) -> StorageResult<Arc<dyn Storage>> {
        match self.kind {
            StorageKind::Memory => Ok(Arc::new(MemoryStorage::new())),
            StorageKind::Postgres => self.connect_postgres().await,
        }
    }

    #[cfg(feature = "postgres")]
    async fn connect_postgres(&self) -> StorageResult<Arc<dyn Storage>> {
        use crate::storage::{PostgresStorage, StorageError};

        let url = self
            .database_url
            .as_deref()
            .ok_or_else(|| StorageError::connection("no database URL configured"))?;
        let storage = PostgresStorage::connect(url, self.max_connections).await?;
        Ok(Arc::new(storage))
    }

    #[cfg(not(feature = "postgres"))]
    #[allow(clippy::unused_async)]
    async fn connect_postgres(&self) -> StorageResult<Arc<dyn Storage>> {
        Err(crate::storage::StorageError::connection(
            "built without the postgres feature",
        ))
    }
}

fn assemble_url<G>(get: &G) -> Result<String, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let host = get(vars::DB_HOST).ok_or(ConfigError::Missing(vars::DB_HOST))?;
    let user = get(vars::DB_USER).ok_or(ConfigError::Missing(vars::DB_USER))?;
    let name = get(vars::DB_NAME).ok_or(ConfigError::Missing(vars::DB_NAME))?;
    let port = match get(vars::DB_PORT) {
        Some(raw) => raw.trim().parse::<u16>().map_err(|_| ConfigError::Invalid {
            name: vars::DB_PORT,
            value: raw,
        })?,
        None => DB_PORT_DEFAULT,
    };

    let credentials = match get(vars::DB_PASSWORD) {
        Some(password) => format!("{user}:{password}"),
        None => user,
    };
    Ok(format!(
        "postgres://{credentials}@{host}:{port}/{name}?sslmode=disable"
    ))
}

// =============================================================================
// Tests
// =============================================================================
