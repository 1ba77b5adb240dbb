//! Shared helpers for ingestion store integration tests
//!
//! Every test starts its own PostgreSQL container, so tests never see each
//! other's tables or ledger rows. Docker must be running:
//!
//! ```bash
//! cargo test -p puck-loader --test ingestion_store_tests -- --ignored --nocapture
//! ```

#![allow(dead_code)]

use anyhow::{Context, Result};
use puck_loader::{EndpointDescriptor, LoadEvent, LoadObserver};
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use testcontainers::{core::IntoContainerPort, runners::AsyncRunner, ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{debug, info};

// ============================================================================
// PostgreSQL Test Container
// ============================================================================

pub struct TestPostgres {
    // Held so the container lives as long as the pool.
    _container: ContainerAsync<Postgres>,
    pool: PgPool,
}

impl TestPostgres {
    pub async fn start() -> Result<Self> {
        info!("Starting PostgreSQL test container...");

        let container = Postgres::default()
            .with_tag("16-alpine")
            .start()
            .await
            .context("Failed to start PostgreSQL container")?;

        let host = container
            .get_host()
            .await
            .context("Failed to get container host")?;
        let port = container
            .get_host_port_ipv4(5432.tcp())
            .await
            .context("Failed to get container port")?;

        let connection_string = format!("postgresql://postgres:postgres@{}:{}/postgres", host, port);
        debug!("PostgreSQL connection: {}", connection_string);

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&connection_string)
            .await
            .context("Failed to connect to PostgreSQL")?;

        Ok(Self {
            _container: container,
            pool,
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// ============================================================================
// Refusing server
// ============================================================================

/// Start a server that answers every PostgreSQL startup packet with a FATAL
/// `ErrorResponse` carrying `sqlstate`. Connect with `sslmode=disable`.
pub async fn spawn_refusing_server(sqlstate: &'static str, message: &'static str) -> Result<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .context("Failed to bind refusing server")?;
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let mut len = [0u8; 4];
            if socket.read_exact(&mut len).await.is_err() {
                continue;
            }
            let mut startup = vec![0u8; (u32::from_be_bytes(len) as usize).saturating_sub(4)];
            if socket.read_exact(&mut startup).await.is_err() {
                continue;
            }
            let _ = socket.write_all(&error_response(sqlstate, message)).await;
            let _ = socket.shutdown().await;
        }
    });

    Ok(addr)
}

fn error_response(sqlstate: &str, message: &str) -> Vec<u8> {
    let mut fields = Vec::new();
    for (tag, value) in [(b'S', "FATAL"), (b'V', "FATAL"), (b'C', sqlstate), (b'M', message)] {
        fields.push(tag);
        fields.extend_from_slice(value.as_bytes());
        fields.push(0);
    }
    fields.push(0);

    let mut packet = vec![b'E'];
    packet.extend_from_slice(&((fields.len() + 4) as u32).to_be_bytes());
    packet.extend_from_slice(&fields);
    packet
}

// ============================================================================
// Observer
// ============================================================================

/// Observer that keeps every event for later assertions
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<LoadEvent>>,
}

impl RecordingObserver {
    pub fn kinds(&self) -> Vec<&'static str> {
        self.events
            .lock()
            .map(|events| events.iter().map(LoadEvent::kind).collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.kinds().contains(&kind)
    }
}

impl LoadObserver for RecordingObserver {
    fn on_event(&self, event: &LoadEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub fn write_json(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap_or_else(|e| panic!("Failed to write {}: {}", path.display(), e));
    path
}

pub fn append_descriptor(dir: &Path, table: &str) -> EndpointDescriptor {
    EndpointDescriptor::builder(table)
        .output_directory(dir)
        .file_pattern("raw_*.json")
        .build()
        .unwrap_or_else(|e| panic!("invalid descriptor: {}", e))
}

pub fn overwrite_descriptor(dir: &Path, table: &str) -> EndpointDescriptor {
    EndpointDescriptor::builder(table)
        .output_directory(dir)
        .overwrite()
        .build()
        .unwrap_or_else(|e| panic!("invalid descriptor: {}", e))
}

/// `(payload, source_filename)` rows of `schema.table`, ordered by file then payload text
pub async fn table_rows(pool: &PgPool, descriptor: &EndpointDescriptor) -> Result<Vec<(Value, String)>> {
    let sql = format!(
        "SELECT payload, source_filename FROM {} ORDER BY source_filename, payload::text",
        descriptor.qualified_table()
    );
    let rows: Vec<(Value, String)> = sqlx::query_as(&sql).fetch_all(pool).await?;
    Ok(rows)
}

pub fn init_test_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,puck_loader=debug,sqlx=warn,testcontainers=info")),
        )
        .with_test_writer()
        .try_init();
}
