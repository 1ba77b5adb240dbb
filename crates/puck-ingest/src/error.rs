//! Extraction and pipeline errors

use puck_loader::LoadError;
use std::path::PathBuf;
use thiserror::Error;

pub type IngestResult<T> = std::result::Result<T, IngestError>;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to read request ids from {view}: {source}")]
    RequestIds {
        view: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Unknown endpoint '{0}'. Run `puck-ingest endpoints` for the list.")]
    UnknownEndpoint(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl IngestError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

impl From<puck_common::PuckError> for IngestError {
    fn from(err: puck_common::PuckError) -> Self {
        Self::Load(err.into())
    }
}
