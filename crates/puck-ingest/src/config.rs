//! Runtime configuration
//!
//! Values come from the environment, optionally seeded from a `.env` file.

use crate::error::{IngestError, IngestResult};
use puck_loader::db::DbConfig;
use puck_loader::descriptor::validate_identifier;
use std::path::PathBuf;

pub const DEFAULT_LAKE_BASE_DIR: &str = "./lake";
pub const DEFAULT_TARGET_SCHEMA: &str = "raw";
pub const DEFAULT_STAGING_SCHEMA: &str = "staging";

#[derive(Debug, Clone)]
pub struct Config {
    pub database: DbConfig,
    /// Root of the lake; endpoint directories live under `raw/nhl/`
    pub lake_base_dir: PathBuf,
    /// Schema of the raw target tables
    pub target_schema: String,
    /// Schema of the request-id views
    pub staging_schema: String,
}

impl Config {
    /// Load `.env` when present, then read the environment
    pub fn load() -> IngestResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    pub fn from_env() -> IngestResult<Self> {
        let database = DbConfig::from_env()?;

        let lake_base_dir = std::env::var("LAKE_BASE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_LAKE_BASE_DIR));

        let target_schema =
            std::env::var("PUCK_TARGET_SCHEMA").unwrap_or_else(|_| DEFAULT_TARGET_SCHEMA.to_string());

        let staging_schema =
            std::env::var("PUCK_STAGING_SCHEMA").unwrap_or_else(|_| DEFAULT_STAGING_SCHEMA.to_string());

        let config = Self {
            database,
            lake_base_dir,
            target_schema,
            staging_schema,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> IngestResult<()> {
        self.database.validate()?;

        if self.lake_base_dir.as_os_str().is_empty() {
            return Err(IngestError::config("LAKE_BASE_DIR cannot be empty"));
        }

        validate_identifier("target schema", &self.target_schema)?;
        validate_identifier("staging schema", &self.staging_schema)?;

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            database: DbConfig::default(),
            lake_base_dir: PathBuf::from(DEFAULT_LAKE_BASE_DIR),
            target_schema: DEFAULT_TARGET_SCHEMA.to_string(),
            staging_schema: DEFAULT_STAGING_SCHEMA.to_string(),
        }
    }

    #[test]
    fn test_defaults_validate() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn test_invalid_schema_rejected() {
        let mut config = config();
        config.staging_schema = "staging; drop".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_lake_dir_rejected() {
        let mut config = config();
        config.lake_base_dir = PathBuf::new();
        assert!(matches!(config.validate(), Err(IngestError::Config(_))));
    }
}
