//! Configuration validation.

use super::Config;
use crate::error::{LoadError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    if config.target.host.is_empty() {
        return Err(LoadError::Config("target.host is required".into()));
    }
    if config.target.database.is_empty() {
        return Err(LoadError::Config("target.database is required".into()));
    }
    if config.target.user.is_empty() {
        return Err(LoadError::Config("target.user is required".into()));
    }
    if config.target.schema.is_empty() {
        return Err(LoadError::Config("target.schema is required".into()));
    }
    if config.target.max_connections == 0 {
        return Err(LoadError::Config(
            "target.max_connections must be at least 1".into(),
        ));
    }

    if config.loader.chunk_size == 0 {
        return Err(LoadError::Config(
            "loader.chunk_size must be at least 1".into(),
        ));
    }

    Ok(())
}
