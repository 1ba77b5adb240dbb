//! Load error taxonomy
//!
//! Every failure of the loading layer is one of four kinds so callers can tell
//! "fix the source file and rerun" apart from "the database is down".

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for loading operations
pub type LoadResult<T> = std::result::Result<T, LoadError>;

/// Errors surfaced by the normalizer, the collector and the ingestion store
#[derive(Error, Debug)]
pub enum LoadError {
    /// The source file is unreadable, is not JSON, or has an unexpected shape.
    /// The whole batch of the current call is aborted.
    #[error(
        "Malformed input{} in '{}'{}: {}",
        table_suffix(.table),
        .path.display(),
        record_suffix(.record_index),
        .cause
    )]
    MalformedInput {
        table: Option<String>,
        path: PathBuf,
        record_index: Option<usize>,
        cause: String,
    },

    /// The store could not be reached; nothing was written
    #[error("Database unavailable for {target}: {source}. Check the connection settings.")]
    ConnectionUnavailable {
        target: String,
        #[source]
        source: sqlx::Error,
    },

    /// A DDL, COPY or ledger statement failed; the batch transaction was rolled back
    #[error("Write to {table} failed and was rolled back: {source}")]
    StoreWriteFailed {
        table: String,
        #[source]
        source: sqlx::Error,
    },

    /// Descriptor or template mismatch
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

/// SQLSTATEs meaning the server would not give us a usable session:
/// class 08 (connection exception), class 28 (invalid authorization),
/// 3D000 (unknown database) and 57P01..57P03 (shutdown, cannot connect now)
fn is_connection_sqlstate(code: &str) -> bool {
    code.starts_with("08") || code.starts_with("28") || matches!(code, "3D000" | "57P01" | "57P02" | "57P03")
}

fn table_suffix(table: &Option<String>) -> String {
    table.as_ref().map(|t| format!(" for {}", t)).unwrap_or_default()
}

fn record_suffix(record_index: &Option<usize>) -> String {
    record_index
        .map(|i| format!(" at record {}", i))
        .unwrap_or_default()
}

impl LoadError {
    pub fn malformed(path: impl Into<PathBuf>, cause: impl ToString) -> Self {
        Self::MalformedInput {
            table: None,
            path: path.into(),
            record_index: None,
            cause: cause.to_string(),
        }
    }

    pub fn malformed_record(path: impl Into<PathBuf>, record_index: usize, cause: impl ToString) -> Self {
        Self::MalformedInput {
            table: None,
            path: path.into(),
            record_index: Some(record_index),
            cause: cause.to_string(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigurationError(message.into())
    }

    /// Classify a sqlx error raised while working on `table`
    ///
    /// Transport failures and servers refusing the session (bad credentials,
    /// unknown database, shutdown) are `ConnectionUnavailable`.
    pub fn from_sqlx(table: &str, err: sqlx::Error) -> Self {
        let unavailable = match &err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::Configuration(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => true,
            sqlx::Error::Database(db) => db.code().is_some_and(|code| is_connection_sqlstate(&code)),
            _ => false,
        };

        if unavailable {
            Self::ConnectionUnavailable {
                target: table.to_string(),
                source: err,
            }
        } else {
            Self::StoreWriteFailed {
                table: table.to_string(),
                source: err,
            }
        }
    }

    /// Attach the target table to a `MalformedInput` that does not name one yet
    pub fn in_table(self, name: &str) -> Self {
        match self {
            Self::MalformedInput {
                table: None,
                path,
                record_index,
                cause,
            } => Self::MalformedInput {
                table: Some(name.to_string()),
                path,
                record_index,
                cause,
            },
            other => other,
        }
    }

    pub fn is_malformed_input(&self) -> bool {
        matches!(self, Self::MalformedInput { .. })
    }

    pub fn is_connection_unavailable(&self) -> bool {
        matches!(self, Self::ConnectionUnavailable { .. })
    }
}

impl From<puck_common::PuckError> for LoadError {
    fn from(err: puck_common::PuckError) -> Self {
        Self::ConfigurationError(err.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_message_names_table_file_and_record() {
        let err = LoadError::malformed_record("/lake/raw_1.json", 3, "expected value")
            .in_table("raw.nhl_raw_all_play_by_play");
        let message = err.to_string();
        assert!(message.contains("raw.nhl_raw_all_play_by_play"));
        assert!(message.contains("/lake/raw_1.json"));
        assert!(message.contains("at record 3"));
    }

    #[test]
    fn test_in_table_keeps_existing_table() {
        let err = LoadError::malformed("a.json", "bad").in_table("raw.a").in_table("raw.b");
        assert!(err.to_string().contains("raw.a"));
    }

    #[test]
    fn test_sqlx_classification() {
        let err = LoadError::from_sqlx("raw.t", sqlx::Error::PoolTimedOut);
        assert!(err.is_connection_unavailable());

        let err = LoadError::from_sqlx("raw.t", sqlx::Error::Protocol("unexpected message".to_string()));
        assert!(err.is_connection_unavailable());

        let err = LoadError::from_sqlx("raw.t", sqlx::Error::RowNotFound);
        assert!(matches!(err, LoadError::StoreWriteFailed { .. }));
        assert!(err.to_string().contains("raw.t"));
    }

    #[test]
    fn test_refused_session_sqlstates() {
        for code in ["08006", "08P01", "28P01", "28000", "3D000", "57P01", "57P02", "57P03"] {
            assert!(is_connection_sqlstate(code), "{code} should mean unavailable");
        }
        // unique violation, undefined table, bad copy data
        for code in ["23505", "42P01", "22P02", "57014"] {
            assert!(!is_connection_sqlstate(code), "{code} should be a write failure");
        }
    }
}
