//! Configuration type definitions.

use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Target database configuration (PostgreSQL).
    pub target: TargetConfig,

    /// Load behavior configuration.
    #[serde(default)]
    pub loader: LoaderConfig,
}

/// Target database (PostgreSQL) configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 5432).
    #[serde(default = "default_pg_port")]
    pub port: u16,

    /// Database name. Also used to filter metadata lookups by catalog.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    pub password: String,

    /// Schema qualifying all table references (default: "public").
    #[serde(default = "default_public_schema")]
    pub schema: String,

    /// Maximum pooled connections (default: 4).
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

impl std::fmt::Debug for TargetConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("schema", &self.schema)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

/// Behavior when the target table already exists and update mode is off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IfExists {
    /// Refuse to write.
    Fail,
    /// Truncate the table before inserting.
    Replace,
    /// Insert after any existing rows.
    #[default]
    Append,
}

/// Load behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Existence policy for the target table (default: append).
    #[serde(default)]
    pub if_exists: IfExists,

    /// Rows handed to the target per chunk in update mode (default: 1000).
    /// Each row within a chunk is still executed as its own statement.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            if_exists: IfExists::default(),
            chunk_size: default_chunk_size(),
        }
    }
}

fn default_pg_port() -> u16 {
    5432
}

fn default_public_schema() -> String {
    "public".to_string()
}

fn default_chunk_size() -> usize {
    1000
}

fn default_max_connections() -> usize {
    4
}
