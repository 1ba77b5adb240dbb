//! Loading layer of the puck NHL stats lake
//!
//! Raw JSON files extracted from the NHL APIs are rediscovered on disk
//! ([`collector`]), flattened into COPY text ([`normalizer`]) and bulk-loaded
//! into PostgreSQL JSONB tables ([`store`]). The ingestion ledger ([`ledger`])
//! makes reruns idempotent per file.
//!
//! ```no_run
//! use puck_loader::{collect_files, EndpointDescriptor, IngestionStore};
//!
//! # async fn run(pool: sqlx::PgPool) -> puck_loader::LoadResult<()> {
//! let descriptor = EndpointDescriptor::builder("nhl_raw_all_games_details")
//!     .output_directory("/lake/raw/nhl/raw_all_games_details")
//!     .file_pattern("raw_*_details.json")
//!     .build()?;
//!
//! let files = collect_files(&descriptor, None);
//! let report = IngestionStore::new(pool).load_many(&descriptor, &files).await?;
//! println!("{} files loaded", report.files_loaded);
//! # Ok(())
//! # }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod collector;
pub mod db;
pub mod descriptor;
pub mod error;
pub mod ledger;
pub mod normalizer;
pub mod observer;
pub mod store;

pub use collector::{collect_files, season_roots};
pub use descriptor::{EndpointDescriptor, EndpointDescriptorBuilder, LoadMode};
pub use error::{LoadError, LoadResult};
pub use normalizer::{normalize, NormalizedBatch};
pub use observer::{LoadEvent, LoadObserver, TracingObserver};
pub use store::{IngestionStore, LoadReport};
