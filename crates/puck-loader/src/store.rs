//! Ingestion store
//!
//! Owns every target table and the ingestion ledger. Each public load runs in
//! exactly one transaction: either all of its rows and ledger entries become
//! visible, or none do.

use crate::descriptor::{EndpointDescriptor, LoadMode};
use crate::error::{LoadError, LoadResult};
use crate::ledger::{self, LedgerEntry};
use crate::normalizer::{self, NormalizedBatch};
use crate::observer::{LoadEvent, LoadObserver, TracingObserver};
use puck_common::template::Params;
use sqlx::{PgConnection, PgPool};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Outcome of one committed load
#[derive(Debug, Clone, PartialEq)]
pub struct LoadReport {
    /// `schema.table`
    pub table: String,
    pub mode: LoadMode,
    pub files_considered: usize,
    pub files_loaded: usize,
    /// Files already in the ledger, or claimed earlier in the same call
    pub files_skipped: usize,
    pub records_loaded: usize,
    pub duration: Duration,
}

impl LoadReport {
    pub fn is_noop(&self) -> bool {
        self.files_loaded == 0
    }
}

/// Bulk loader for normalized JSON files
#[derive(Clone)]
pub struct IngestionStore {
    pool: PgPool,
    observer: Arc<dyn LoadObserver>,
}

impl IngestionStore {
    /// Create a store reporting to `tracing`
    pub fn new(pool: PgPool) -> Self {
        Self::with_observer(pool, Arc::new(TracingObserver))
    }

    pub fn with_observer(pool: PgPool, observer: Arc<dyn LoadObserver>) -> Self {
        Self { pool, observer }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // ========================================================================
    // Loads
    // ========================================================================

    /// Load the descriptor's single file, without touching the ledger
    ///
    /// The file is `output_directory / file_name_template` with no parameters.
    /// Overwrite descriptors have their table truncated in the same transaction.
    pub async fn load_single(&self, descriptor: &EndpointDescriptor) -> LoadResult<LoadReport> {
        let result = self.load_single_inner(descriptor).await;
        self.finish(descriptor, result)
    }

    async fn load_single_inner(&self, descriptor: &EndpointDescriptor) -> LoadResult<LoadReport> {
        let started = Instant::now();
        let table = descriptor.display_name();

        let path = descriptor.build_file_path(&Params::new())?;
        let source_filename = source_filename(&path).map_err(|e| e.in_table(&table))?;
        let batch = normalizer::normalize(&path, descriptor.array_unwrap_key(), &source_filename)
            .map_err(|e| e.in_table(&table))?;

        let mut tx = self.pool.begin().await.map_err(|e| LoadError::from_sqlx(&table, e))?;

        self.ensure_table(&mut tx, descriptor).await?;
        if descriptor.load_mode().is_overwrite() {
            self.truncate_table(&mut tx, descriptor).await?;
        }

        copy_batch(&mut tx, descriptor, &batch).await?;
        self.emit(LoadEvent::FileCopied {
            table: table.clone(),
            filename: source_filename,
            records: batch.record_count(),
        });

        tx.commit().await.map_err(|e| LoadError::from_sqlx(&table, e))?;

        Ok(LoadReport {
            table,
            mode: descriptor.load_mode(),
            files_considered: 1,
            files_loaded: 1,
            files_skipped: 0,
            records_loaded: batch.record_count(),
            duration: started.elapsed(),
        })
    }

    /// Load `file_paths` into the descriptor's table in one transaction
    ///
    /// Append: files whose name is already in the ledger are skipped.
    /// Overwrite: the table and its ledger entries are cleared first, so afterwards
    /// the ledger lists exactly the files of this call.
    ///
    /// Files are processed in the given order. The first malformed file aborts the
    /// whole call and nothing from it is kept.
    pub async fn load_many(
        &self,
        descriptor: &EndpointDescriptor,
        file_paths: &[PathBuf],
    ) -> LoadResult<LoadReport> {
        let result = self.load_many_inner(descriptor, file_paths).await;
        self.finish(descriptor, result)
    }

    async fn load_many_inner(
        &self,
        descriptor: &EndpointDescriptor,
        file_paths: &[PathBuf],
    ) -> LoadResult<LoadReport> {
        let started = Instant::now();
        let table = descriptor.display_name();
        let schema_name = descriptor.schema_name();
        let table_name = descriptor.table_name();
        let overwrite = descriptor.load_mode().is_overwrite();

        let named: Vec<(&Path, String)> = file_paths
            .iter()
            .map(|path| source_filename(path).map(|name| (path.as_path(), name)))
            .collect::<LoadResult<_>>()
            .map_err(|e| e.in_table(&table))?;

        let mut tx = self.pool.begin().await.map_err(|e| LoadError::from_sqlx(&table, e))?;

        self.ensure_table(&mut tx, descriptor).await?;
        ledger::ensure(&mut tx)
            .await
            .map_err(|e| LoadError::from_sqlx(&table, e))?;
        self.emit(LoadEvent::LedgerEnsured { table: table.clone() });

        let candidates: Vec<&(&Path, String)> = if overwrite {
            self.truncate_table(&mut tx, descriptor).await?;
            let removed = ledger::clear(&mut tx, schema_name, table_name)
                .await
                .map_err(|e| LoadError::from_sqlx(&table, e))?;
            self.emit(LoadEvent::LedgerCleared {
                table: table.clone(),
                removed,
            });
            named.iter().collect()
        } else {
            let done = ledger::ingested_files(&mut tx, schema_name, table_name)
                .await
                .map_err(|e| LoadError::from_sqlx(&table, e))?;
            named.iter().filter(|(_, name)| !done.contains(name)).collect()
        };

        self.emit(LoadEvent::CandidatesSelected {
            table: table.clone(),
            considered: named.len(),
            selected: candidates.len(),
        });

        let mut files_loaded = 0;
        let mut records_loaded = 0;

        if candidates.is_empty() {
            self.emit(LoadEvent::NothingToLoad { table: table.clone() });
        }

        for (path, filename) in candidates {
            let claimed = ledger::claim(&mut tx, schema_name, table_name, filename, overwrite)
                .await
                .map_err(|e| LoadError::from_sqlx(&table, e))?;
            if !claimed {
                self.emit(LoadEvent::FileSkipped {
                    table: table.clone(),
                    filename: filename.clone(),
                });
                continue;
            }

            let batch = normalizer::normalize(path, descriptor.array_unwrap_key(), filename)
                .map_err(|e| e.in_table(&table))?;
            copy_batch(&mut tx, descriptor, &batch).await?;

            self.emit(LoadEvent::FileCopied {
                table: table.clone(),
                filename: filename.clone(),
                records: batch.record_count(),
            });
            files_loaded += 1;
            records_loaded += batch.record_count();
        }

        tx.commit().await.map_err(|e| LoadError::from_sqlx(&table, e))?;

        Ok(LoadReport {
            table,
            mode: descriptor.load_mode(),
            files_considered: named.len(),
            files_loaded,
            files_skipped: named.len() - files_loaded,
            records_loaded,
            duration: started.elapsed(),
        })
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// File names the ledger records for the descriptor's table
    pub async fn ingested_files(&self, descriptor: &EndpointDescriptor) -> LoadResult<BTreeSet<String>> {
        let table = descriptor.display_name();
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| LoadError::from_sqlx(&table, e))?;

        ledger::ensure(&mut conn)
            .await
            .map_err(|e| LoadError::from_sqlx(&table, e))?;
        ledger::ingested_files(&mut conn, descriptor.schema_name(), descriptor.table_name())
            .await
            .map_err(|e| LoadError::from_sqlx(&table, e))
    }

    /// Ledger rows of the descriptor's table, oldest first
    pub async fn ledger_entries(&self, descriptor: &EndpointDescriptor) -> LoadResult<Vec<LedgerEntry>> {
        let table = descriptor.display_name();
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| LoadError::from_sqlx(&table, e))?;

        ledger::ensure(&mut conn)
            .await
            .map_err(|e| LoadError::from_sqlx(&table, e))?;
        ledger::entries(&mut conn, descriptor.schema_name(), descriptor.table_name())
            .await
            .map_err(|e| LoadError::from_sqlx(&table, e))
    }

    /// Rows in the descriptor's table; 0 when the table does not exist yet
    pub async fn row_count(&self, descriptor: &EndpointDescriptor) -> LoadResult<i64> {
        let table = descriptor.display_name();
        let qualified = descriptor.qualified_table();

        let exists: bool = sqlx::query_scalar("SELECT to_regclass($1) IS NOT NULL")
            .bind(&qualified)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| LoadError::from_sqlx(&table, e))?;
        if !exists {
            return Ok(0);
        }

        let sql = format!("SELECT COUNT(*) FROM {}", qualified);
        let count: i64 = sqlx::query_scalar(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| LoadError::from_sqlx(&table, e))?;

        Ok(count)
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn ensure_table(&self, conn: &mut PgConnection, descriptor: &EndpointDescriptor) -> LoadResult<()> {
        let table = descriptor.display_name();

        sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", descriptor.quoted_schema()))
            .execute(&mut *conn)
            .await
            .map_err(|e| LoadError::from_sqlx(&table, e))?;

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                payload JSONB NOT NULL,
                source_filename TEXT NOT NULL
            )
            "#,
            descriptor.qualified_table()
        ))
        .execute(&mut *conn)
        .await
        .map_err(|e| LoadError::from_sqlx(&table, e))?;

        self.emit(LoadEvent::TableEnsured { table });
        Ok(())
    }

    async fn truncate_table(&self, conn: &mut PgConnection, descriptor: &EndpointDescriptor) -> LoadResult<()> {
        let table = descriptor.display_name();

        sqlx::query(&format!("TRUNCATE TABLE {}", descriptor.qualified_table()))
            .execute(&mut *conn)
            .await
            .map_err(|e| LoadError::from_sqlx(&table, e))?;

        self.emit(LoadEvent::TableTruncated { table });
        Ok(())
    }

    fn emit(&self, event: LoadEvent) {
        self.observer.on_event(&event);
    }

    fn finish(&self, descriptor: &EndpointDescriptor, result: LoadResult<LoadReport>) -> LoadResult<LoadReport> {
        match &result {
            Ok(report) => self.emit(LoadEvent::Committed { report: report.clone() }),
            Err(e) => self.emit(LoadEvent::Failed {
                table: descriptor.display_name(),
                error: e.to_string(),
            }),
        }
        result
    }
}

/// Stream one batch through `COPY ... FROM STDIN`
async fn copy_batch(
    conn: &mut PgConnection,
    descriptor: &EndpointDescriptor,
    batch: &NormalizedBatch,
) -> LoadResult<()> {
    if batch.is_empty() {
        return Ok(());
    }

    let table = descriptor.display_name();
    let statement = format!(
        "COPY {} (payload, source_filename) FROM STDIN WITH (FORMAT text)",
        descriptor.qualified_table()
    );

    let mut copy = conn
        .copy_in_raw(&statement)
        .await
        .map_err(|e| LoadError::from_sqlx(&table, e))?;

    let sent = copy.send(batch.as_bytes()).await.map(|_| ());
    match sent {
        Ok(()) => {
            copy.finish().await.map_err(|e| LoadError::from_sqlx(&table, e))?;
            Ok(())
        },
        Err(e) => {
            // The transaction is rolled back either way; the abort only frees the connection.
            log_abort_failure(&table, copy.abort(e.to_string()).await);
            Err(LoadError::from_sqlx(&table, e))
        },
    }
}

fn log_abort_failure(table: &str, result: Result<(), sqlx::Error>) {
    if let Err(e) = result {
        debug!(table = %table, error = %e, "COPY abort failed");
    }
}

/// Ledger key and row tag: the file name without its directory
fn source_filename(path: &Path) -> LoadResult<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| LoadError::malformed(path, "path has no UTF-8 file name"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_source_filename_strips_directory() {
        let name = source_filename(Path::new("/lake/20232024/8478402_20232024_2.json")).unwrap();
        assert_eq!(name, "8478402_20232024_2.json");
    }

    #[test]
    fn test_source_filename_requires_file_name() {
        assert!(source_filename(Path::new("/")).unwrap_err().is_malformed_input());
    }

    #[test]
    fn test_log_abort_failure_accepts_both_outcomes() {
        log_abort_failure("raw.t", Ok(()));
        log_abort_failure("raw.t", Err(sqlx::Error::Protocol("connection reset".to_string())));
    }

    #[test]
    fn test_report_noop() {
        let report = LoadReport {
            table: "raw.t".to_string(),
            mode: LoadMode::Append,
            files_considered: 2,
            files_loaded: 0,
            files_skipped: 2,
            records_loaded: 0,
            duration: Duration::ZERO,
        };
        assert!(report.is_noop());
    }
}
