//! Ingestion ledger (`raw.nhl_ingestion_control`)
//!
//! One row per `(table_schema, table_name, filename)` that has been committed
//! into a target table. The primary key is what makes appends exactly-once:
//! [`claim`] inserts with `ON CONFLICT DO NOTHING` and only the winner loads.
//!
//! All functions run on the caller's connection so they join its transaction.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use std::collections::BTreeSet;

pub const LEDGER_SCHEMA: &str = "raw";
pub const LEDGER_TABLE: &str = "nhl_ingestion_control";

/// One ledger row of a target table
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct LedgerEntry {
    pub filename: String,
    pub ingested_at: DateTime<Utc>,
    pub is_overwrite: bool,
}

/// `raw.nhl_ingestion_control`
pub fn ledger_display_name() -> String {
    format!("{}.{}", LEDGER_SCHEMA, LEDGER_TABLE)
}

fn quoted_ledger() -> String {
    format!("\"{}\".\"{}\"", LEDGER_SCHEMA, LEDGER_TABLE)
}

/// Create the ledger schema and table when missing
pub async fn ensure(conn: &mut PgConnection) -> Result<(), sqlx::Error> {
    sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS \"{}\"", LEDGER_SCHEMA))
        .execute(&mut *conn)
        .await?;

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {} (
            table_schema TEXT NOT NULL,
            table_name TEXT NOT NULL,
            filename TEXT NOT NULL,
            ingested_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            is_overwrite BOOLEAN NOT NULL,
            PRIMARY KEY (table_schema, table_name, filename)
        )
        "#,
        quoted_ledger()
    ))
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// File names recorded for `schema.table`
pub async fn ingested_files(
    conn: &mut PgConnection,
    schema: &str,
    table: &str,
) -> Result<BTreeSet<String>, sqlx::Error> {
    let rows: Vec<String> = sqlx::query_scalar(&format!(
        "SELECT filename FROM {} WHERE table_schema = $1 AND table_name = $2",
        quoted_ledger()
    ))
    .bind(schema)
    .bind(table)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().collect())
}

/// Entries for `schema.table`, oldest first
pub async fn entries(conn: &mut PgConnection, schema: &str, table: &str) -> Result<Vec<LedgerEntry>, sqlx::Error> {
    let sql = format!(
        "SELECT filename, ingested_at, is_overwrite FROM {} \
         WHERE table_schema = $1 AND table_name = $2 \
         ORDER BY ingested_at, filename",
        quoted_ledger()
    );

    let entries = sqlx::query_as::<_, LedgerEntry>(&sql)
        .bind(schema)
        .bind(table)
        .fetch_all(&mut *conn)
        .await?;

    Ok(entries)
}

/// Remove every entry for `schema.table`, returning how many were removed
pub async fn clear(conn: &mut PgConnection, schema: &str, table: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(&format!(
        "DELETE FROM {} WHERE table_schema = $1 AND table_name = $2",
        quoted_ledger()
    ))
    .bind(schema)
    .bind(table)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

/// Record `filename` as ingested; `false` when an entry already exists
///
/// A concurrent transaction holding the same key makes this wait until that
/// transaction ends, so at most one writer ever wins a file.
pub async fn claim(
    conn: &mut PgConnection,
    schema: &str,
    table: &str,
    filename: &str,
    is_overwrite: bool,
) -> Result<bool, sqlx::Error> {
    let claimed: Option<String> = sqlx::query_scalar(&format!(
        r#"
        INSERT INTO {} (table_schema, table_name, filename, is_overwrite)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (table_schema, table_name, filename) DO NOTHING
        RETURNING filename
        "#,
        quoted_ledger()
    ))
    .bind(schema)
    .bind(table)
    .bind(filename)
    .bind(is_overwrite)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(claimed.is_some())
}
