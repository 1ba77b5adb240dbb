//! Load lifecycle events
//!
//! The store never configures logging itself; it reports what it does to a
//! [`LoadObserver`]. [`TracingObserver`] forwards events to `tracing` and is
//! what [`IngestionStore::new`](crate::store::IngestionStore::new) installs.

use crate::store::LoadReport;
use tracing::{debug, error, info, warn};

/// Something the store did while loading `table`
#[derive(Debug, Clone, PartialEq)]
pub enum LoadEvent {
    TableEnsured {
        table: String,
    },
    LedgerEnsured {
        table: String,
    },
    TableTruncated {
        table: String,
    },
    LedgerCleared {
        table: String,
        removed: u64,
    },
    CandidatesSelected {
        table: String,
        considered: usize,
        selected: usize,
    },
    /// No input file was selected; DDL and an Overwrite reset still commit
    NothingToLoad {
        table: String,
    },
    /// Another writer, or an earlier path in the same call, already claimed the file
    FileSkipped {
        table: String,
        filename: String,
    },
    FileCopied {
        table: String,
        filename: String,
        records: usize,
    },
    Committed {
        report: LoadReport,
    },
    Failed {
        table: String,
        error: String,
    },
}

impl LoadEvent {
    /// Short stable name of the variant, handy for assertions and metrics keys
    pub fn kind(&self) -> &'static str {
        match self {
            LoadEvent::TableEnsured { .. } => "table_ensured",
            LoadEvent::LedgerEnsured { .. } => "ledger_ensured",
            LoadEvent::TableTruncated { .. } => "table_truncated",
            LoadEvent::LedgerCleared { .. } => "ledger_cleared",
            LoadEvent::CandidatesSelected { .. } => "candidates_selected",
            LoadEvent::NothingToLoad { .. } => "nothing_to_load",
            LoadEvent::FileSkipped { .. } => "file_skipped",
            LoadEvent::FileCopied { .. } => "file_copied",
            LoadEvent::Committed { .. } => "committed",
            LoadEvent::Failed { .. } => "failed",
        }
    }
}

/// Sink for [`LoadEvent`]s
pub trait LoadObserver: Send + Sync {
    fn on_event(&self, event: &LoadEvent);
}

/// Default observer: one `tracing` event per [`LoadEvent`]
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl LoadObserver for TracingObserver {
    fn on_event(&self, event: &LoadEvent) {
        match event {
            LoadEvent::TableEnsured { table } => debug!(table = %table, "Target table ready"),
            LoadEvent::LedgerEnsured { table } => debug!(table = %table, "Ingestion ledger ready"),
            LoadEvent::TableTruncated { table } => info!(table = %table, "Truncated target table"),
            LoadEvent::LedgerCleared { table, removed } => {
                info!(table = %table, removed, "Cleared ledger entries")
            },
            LoadEvent::CandidatesSelected {
                table,
                considered,
                selected,
            } => info!(
                table = %table,
                considered,
                selected,
                "Selected files to load"
            ),
            LoadEvent::NothingToLoad { table } => {
                info!(table = %table, "No new files to load")
            },
            LoadEvent::FileSkipped { table, filename } => {
                warn!(table = %table, filename = %filename, "File already ingested, skipping")
            },
            LoadEvent::FileCopied {
                table,
                filename,
                records,
            } => debug!(table = %table, filename = %filename, records, "Copied file"),
            LoadEvent::Committed { report } => info!(
                table = %report.table,
                mode = %report.mode,
                files_loaded = report.files_loaded,
                files_skipped = report.files_skipped,
                records_loaded = report.records_loaded,
                duration_ms = report.duration.as_millis() as u64,
                "Load committed"
            ),
            LoadEvent::Failed { table, error } => {
                error!(table = %table, error = %error, "Load failed, transaction rolled back")
            },
        }
    }
}
