//! NHL API extraction
//!
//! [`Extractor::fetch`] never fails: anything other than a JSON body with status
//! 200 or 201 is logged and reported as `None`, so one bad game id does not stop
//! an extraction run.

use crate::error::{IngestError, IngestResult};
use puck_loader::descriptor::ensure_json_extension;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Statuses worth asking again for
pub const RETRY_STATUSES: [u16; 6] = [403, 429, 500, 502, 503, 504];

const USER_AGENT: &str = concat!("puck-ingest/", env!("CARGO_PKG_VERSION"));

/// Fixed retry schedule of the extractor
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base: Duration::from_millis(500),
            timeout: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based): `base * 2^(retry - 1)`
    pub fn backoff(&self, retry: u32) -> Duration {
        self.backoff_base * 2u32.pow(retry.saturating_sub(1))
    }
}

fn is_retryable(status: StatusCode) -> bool {
    RETRY_STATUSES.contains(&status.as_u16())
}

/// HTTP client for the NHL APIs
#[derive(Debug, Clone)]
pub struct Extractor {
    client: Client,
    policy: RetryPolicy,
}

impl Extractor {
    pub fn new() -> IngestResult<Self> {
        Self::with_policy(RetryPolicy::default())
    }

    pub fn with_policy(policy: RetryPolicy) -> IngestResult<Self> {
        let client = Client::builder()
            .timeout(policy.timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self { client, policy })
    }

    /// GET `url` and parse the body as JSON
    pub async fn fetch(&self, url: &str) -> Option<Value> {
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let can_retry = attempt <= self.policy.max_retries;

            match self.client.get(url).send().await {
                Ok(response) => {
                    let status = response.status();

                    if is_retryable(status) && can_retry {
                        let delay = self.policy.backoff(attempt);
                        warn!(url, status = status.as_u16(), attempt, ?delay, "Retryable status, retrying");
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    if status != StatusCode::OK && status != StatusCode::CREATED {
                        warn!(url, status = status.as_u16(), "Request returned no data");
                        return None;
                    }

                    return match response.json::<Value>().await {
                        Ok(body) => {
                            debug!(url, status = status.as_u16(), "Request succeeded");
                            Some(body)
                        },
                        Err(e) => {
                            error!(url, error = %e, "Response body is not JSON");
                            None
                        },
                    };
                },
                Err(e) if can_retry => {
                    let delay = self.policy.backoff(attempt);
                    warn!(url, error = %e, attempt, ?delay, "Request failed, retrying");
                    tokio::time::sleep(delay).await;
                },
                Err(e) => {
                    error!(url, error = %e, attempts = attempt, "Request failed");
                    return None;
                },
            }
        }
    }
}

/// Write `data` as pretty JSON (4-space indent) to `output_dir/file_name`
///
/// `.json` is appended when missing and the directory is created. Returns
/// `Ok(None)` without touching the disk when there is no data.
pub async fn save_json(data: Option<&Value>, output_dir: &Path, file_name: &str) -> IngestResult<Option<PathBuf>> {
    let Some(data) = data else {
        warn!(file_name, "No data to save");
        return Ok(None);
    };

    tokio::fs::create_dir_all(output_dir)
        .await
        .map_err(|e| IngestError::Write {
            path: output_dir.to_path_buf(),
            source: e,
        })?;

    let path = output_dir.join(ensure_json_extension(file_name.to_string()));

    let mut buffer = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    data.serialize(&mut serializer)?;

    tokio::fs::write(&path, buffer)
        .await
        .map_err(|e| IngestError::Write {
            path: path.clone(),
            source: e,
        })?;

    info!(path = %path.display(), "Saved extraction");
    Ok(Some(path))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_extractor() -> Extractor {
        Extractor::with_policy(RetryPolicy {
            backoff_base: Duration::ZERO,
            ..RetryPolicy::default()
        })
        .unwrap()
    }

    #[test]
    fn test_backoff_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_millis(500));
        assert_eq!(policy.backoff(2), Duration::from_secs(1));
        assert_eq!(policy.backoff(3), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_fetch_ok() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/season"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([20222023, 20232024])))
            .expect(1)
            .mount(&server)
            .await;

        let body = fast_extractor().fetch(&format!("{}/v1/season", server.uri())).await;
        assert_eq!(body, Some(json!([20222023, 20232024])));
    }

    #[tokio::test]
    async fn test_fetch_created_is_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"ok": true})))
            .mount(&server)
            .await;

        assert!(fast_extractor().fetch(&server.uri()).await.is_some());
    }

    #[tokio::test]
    async fn test_fetch_not_found_is_none_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        assert!(fast_extractor().fetch(&server.uri()).await.is_none());
    }

    #[tokio::test]
    async fn test_fetch_retries_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"gameId": 1})))
            .expect(1)
            .mount(&server)
            .await;

        let body = fast_extractor().fetch(&server.uri()).await;
        assert_eq!(body, Some(json!({"gameId": 1})));
    }

    #[tokio::test]
    async fn test_fetch_gives_up_after_three_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .expect(4)
            .mount(&server)
            .await;

        assert!(fast_extractor().fetch(&server.uri()).await.is_none());
    }

    #[tokio::test]
    async fn test_fetch_non_json_body_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
            .mount(&server)
            .await;

        assert!(fast_extractor().fetch(&server.uri()).await.is_none());
    }

    #[tokio::test]
    async fn test_fetch_unreachable_host_is_none() {
        assert!(fast_extractor().fetch("http://127.0.0.1:1/v1/season").await.is_none());
    }

    #[tokio::test]
    async fn test_save_json_pretty_prints() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("raw/nhl/single");
        let data = json!({"ids": [1], "name": "Chára"});

        let path = save_json(Some(&data), &out, "all_season_ids").await.unwrap().unwrap();
        assert_eq!(path, out.join("all_season_ids.json"));

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "{\n    \"ids\": [\n        1\n    ],\n    \"name\": \"Chára\"\n}");
    }

    #[tokio::test]
    async fn test_save_json_without_data() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("never-created");

        assert!(save_json(None, &out, "x.json").await.unwrap().is_none());
        assert!(!out.exists());
    }
}
