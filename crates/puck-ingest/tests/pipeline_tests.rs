//! Pipeline behaviour that needs no database
//!
//! The pools below are lazy and never connect; the paths exercised here fail or
//! finish before any query is issued.

use puck_ingest::catalog::{Endpoint, EndpointKind, RequestSource};
use puck_ingest::{Catalog, Extractor, IngestError, Pipeline, RequestIdSource, RetryPolicy};
use puck_loader::{EndpointDescriptor, IngestionStore};
use serde_json::{json, Value};
use sqlx::postgres::PgPoolOptions;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn pipeline(endpoints: Vec<Endpoint>) -> Pipeline {
    let pool = PgPoolOptions::new()
        .acquire_timeout(Duration::from_secs(1))
        .connect_lazy("postgresql://postgres@127.0.0.1:1/postgres")
        .unwrap();
    let extractor = Extractor::with_policy(RetryPolicy {
        backoff_base: Duration::ZERO,
        ..RetryPolicy::default()
    })
    .unwrap();

    Pipeline::new(
        Catalog::from_endpoints(endpoints),
        extractor,
        IngestionStore::new(pool.clone()),
        RequestIdSource::new(pool, "staging"),
    )
}

fn static_endpoint(server: &MockServer, dir: &Path) -> Endpoint {
    Endpoint {
        name: "seasons",
        description: "All season ids",
        descriptor: EndpointDescriptor::builder("nhl_raw_all_seasons_id")
            .url(format!("{}/v1/season", server.uri()))
            .file_name("all_season_ids")
            .output_directory(dir)
            .overwrite()
            .build()
            .unwrap(),
        kind: EndpointKind::Static,
    }
}

#[tokio::test]
async fn test_extract_static_saves_document() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/season"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([20222023, 20232024])))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let pipeline = pipeline(vec![static_endpoint(&server, dir.path())]);

    let summary = pipeline.extract("seasons", None).await.unwrap();
    assert_eq!(summary.requested, 1);
    assert_eq!(summary.saved, 1);

    let saved = std::fs::read_to_string(dir.path().join("all_season_ids.json")).unwrap();
    let value: Value = serde_json::from_str(&saved).unwrap();
    assert_eq!(value, json!([20222023, 20232024]));
}

#[tokio::test]
async fn test_extract_static_without_data_saves_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let pipeline = pipeline(vec![static_endpoint(&server, dir.path())]);

    let summary = pipeline.extract("seasons", None).await.unwrap();
    assert_eq!(summary.saved, 0);
    assert_eq!(summary.empty, 1);
    assert!(!dir.path().join("all_season_ids.json").exists());
}

#[tokio::test]
async fn test_unknown_endpoint() {
    let pipeline = pipeline(Vec::new());
    let err = pipeline.extract("nope", None).await.unwrap_err();
    assert!(matches!(err, IngestError::UnknownEndpoint(name) if name == "nope"));
}

#[tokio::test]
async fn test_load_single_rejects_dynamic_endpoint() {
    let dir = TempDir::new().unwrap();
    let endpoint = Endpoint {
        name: "play-by-play",
        description: "Play-by-play events, per game",
        descriptor: EndpointDescriptor::builder("nhl_raw_all_play_by_play")
            .url("http://localhost/{game_id}")
            .file_name("raw_{game_id}.json")
            .output_directory(dir.path())
            .file_pattern("raw_*.json")
            .build()
            .unwrap(),
        kind: EndpointKind::Dynamic(RequestSource {
            view: "vw_stg_request_games_id",
            columns: &["game_id"],
            missing_flag: Some("has_play_by_play"),
            partition_by: None,
        }),
    };
    let pipeline = pipeline(vec![endpoint]);

    let err = pipeline.load_single("play-by-play").await.unwrap_err();
    assert!(matches!(err, IngestError::Config(_)));
}
