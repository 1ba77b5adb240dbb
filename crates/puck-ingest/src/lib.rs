//! puck ingest
//!
//! Extraction side of the NHL stats lake: fetches documents from the NHL web
//! and stats APIs, saves them under the lake directory and hands them to
//! [`puck_loader`] for loading.
//!
//! # Example
//!
//! ```no_run
//! use puck_ingest::extractor::{save_json, Extractor};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let extractor = Extractor::new()?;
//!     let seasons = extractor.fetch("https://api-web.nhle.com/v1/season").await;
//!     save_json(seasons.as_ref(), Path::new("./lake/raw/nhl/single"), "all_season_ids").await?;
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod catalog;
pub mod config;
pub mod error;
pub mod extractor;
pub mod pipeline;
pub mod request_ids;

pub use catalog::{Catalog, Endpoint, EndpointKind, RequestSource};
pub use config::Config;
pub use error::{IngestError, IngestResult};
pub use extractor::{Extractor, RetryPolicy};
pub use pipeline::{EndpointStatus, ExtractSummary, Pipeline};
pub use request_ids::RequestIdSource;
