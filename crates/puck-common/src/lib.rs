//! Puck Common Library
//!
//! Shared utilities for the puck ingestion workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`PuckError`] and the [`Result`] alias
//! - **Logging**: subscriber setup for binaries ([`logging`])
//! - **Templates**: `{placeholder}` rendering for endpoint URLs and file names
//!
//! # Example
//!
//! ```no_run
//! use puck_common::template::{render, Params};
//!
//! fn url_for(game_id: u64) -> puck_common::Result<String> {
//!     let params = Params::new().with("game_id", game_id);
//!     render("https://api-web.nhle.com/v1/gamecenter/{game_id}/boxscore", &params)
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod error;
pub mod logging;
pub mod template;

// Re-export commonly used types
pub use error::{PuckError, Result};
