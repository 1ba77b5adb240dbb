//! Extract and load orchestration for catalog endpoints

use crate::catalog::{partition_dir, Catalog, Endpoint, EndpointKind};
use crate::error::{IngestError, IngestResult};
use crate::extractor::{save_json, Extractor};
use crate::request_ids::RequestIdSource;
use chrono::{DateTime, Utc};
use puck_common::template::Params;
use puck_loader::{collect_files, season_roots, IngestionStore, LoadReport};
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

/// Files kept by a test-mode load
pub const TEST_MODE_FILE_LIMIT: usize = 3;

/// Outcome of one extraction run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    pub requested: usize,
    pub saved: usize,
    /// Requests that produced no document
    pub empty: usize,
}

/// Load state of one endpoint's table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointStatus {
    pub table: String,
    pub rows: i64,
    /// Files recorded in the ingestion ledger
    pub files: usize,
    pub last_ingested_at: Option<DateTime<Utc>>,
}

pub struct Pipeline {
    catalog: Catalog,
    extractor: Extractor,
    store: IngestionStore,
    request_ids: RequestIdSource,
}

impl Pipeline {
    pub fn new(catalog: Catalog, extractor: Extractor, store: IngestionStore, request_ids: RequestIdSource) -> Self {
        Self {
            catalog,
            extractor,
            store,
            request_ids,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn endpoint(&self, name: &str) -> IngestResult<&Endpoint> {
        self.catalog
            .get(name)
            .ok_or_else(|| IngestError::UnknownEndpoint(name.to_string()))
    }

    // ========================================================================
    // Extraction
    // ========================================================================

    /// Fetch and save the documents of `name`
    ///
    /// Dynamic endpoints request one document per staging row, at most `limit`.
    pub async fn extract(&self, name: &str, limit: Option<usize>) -> IngestResult<ExtractSummary> {
        let endpoint = self.endpoint(name)?;
        let started = Instant::now();
        let mut summary = ExtractSummary::default();

        match &endpoint.kind {
            EndpointKind::Static => {
                summary.requested = 1;
                let saved = self
                    .extract_one(endpoint, &Params::new(), endpoint.descriptor.output_directory())
                    .await?;
                summary.saved = usize::from(saved);
            },
            EndpointKind::Dynamic(source) => {
                let mut rows = self.request_ids.fetch_params(source).await?;
                if let Some(limit) = limit {
                    rows.truncate(limit);
                }
                summary.requested = rows.len();
                info!(endpoint = endpoint.name, requests = rows.len(), "Starting extraction");

                for (index, params) in rows.iter().enumerate() {
                    let partition = source.partition_by.and_then(|key| params.get(key));
                    let dir = partition_dir(endpoint, partition);

                    if self.extract_one(endpoint, params, &dir).await? {
                        summary.saved += 1;
                    }
                    info!(endpoint = endpoint.name, done = index + 1, total = rows.len(), "Extraction progress");
                }
            },
        }

        summary.empty = summary.requested - summary.saved;
        info!(
            endpoint = endpoint.name,
            requested = summary.requested,
            saved = summary.saved,
            empty = summary.empty,
            elapsed_secs = started.elapsed().as_secs_f64(),
            "Extraction complete"
        );

        Ok(summary)
    }

    async fn extract_one(&self, endpoint: &Endpoint, params: &Params, dir: &Path) -> IngestResult<bool> {
        let url = endpoint.descriptor.build_url(params)?;
        let file_name = endpoint.descriptor.build_file_name(params)?;

        let data = self.extractor.fetch(&url).await;
        if data.is_none() {
            warn!(endpoint = endpoint.name, url = %url, "No document returned");
        }

        let saved = save_json(data.as_ref(), dir, &file_name).await?;
        Ok(saved.is_some())
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Load the extracted files of `name`
    ///
    /// Static endpoints load their one file with `load_single`. Dynamic endpoints
    /// collect their files (only under the given season folders when `seasons`
    /// is not empty) and load them with `load_many`.
    pub async fn load(&self, name: &str, seasons: &[String], test_mode: bool) -> IngestResult<LoadReport> {
        let endpoint = self.endpoint(name)?;
        if endpoint.is_static() {
            return Ok(self.store.load_single(&endpoint.descriptor).await?);
        }

        let descriptor = &endpoint.descriptor;
        let roots = (!seasons.is_empty()).then(|| season_roots(descriptor, seasons));
        let mut files = collect_files(descriptor, roots.as_deref());
        files.sort();

        if test_mode {
            info!(endpoint = endpoint.name, limit = TEST_MODE_FILE_LIMIT, "Running in test mode");
            files.truncate(TEST_MODE_FILE_LIMIT);
        }

        info!(endpoint = endpoint.name, files = files.len(), "Loading files");
        Ok(self.store.load_many(descriptor, &files).await?)
    }

    /// Load the single document of a static endpoint
    pub async fn load_single(&self, name: &str) -> IngestResult<LoadReport> {
        let endpoint = self.endpoint(name)?;
        if !endpoint.is_static() {
            return Err(IngestError::config(format!(
                "'{}' is a dynamic endpoint; use `load` instead",
                name
            )));
        }
        Ok(self.store.load_single(&endpoint.descriptor).await?)
    }

    /// Row count and ledger state of the table behind `name`
    pub async fn status(&self, name: &str) -> IngestResult<EndpointStatus> {
        let endpoint = self.endpoint(name)?;
        let descriptor = &endpoint.descriptor;

        let rows = self.store.row_count(descriptor).await?;
        let entries = self.store.ledger_entries(descriptor).await?;

        Ok(EndpointStatus {
            table: descriptor.display_name(),
            rows,
            files: entries.len(),
            last_ingested_at: entries.iter().map(|entry| entry.ingested_at).max(),
        })
    }

    /// Extract then load `name`
    pub async fn extract_load(&self, name: &str, limit: Option<usize>) -> IngestResult<(ExtractSummary, LoadReport)> {
        let summary = self.extract(name, limit).await?;
        let report = self.load(name, &[], false).await?;
        Ok((summary, report))
    }
}
