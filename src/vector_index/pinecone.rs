//! Pinecone data-plane client.

use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::{VectorIndex, VectorMatch};
use crate::error::VectorIndexError;
use crate::http::{is_transient, retry_backoff, should_retry};
use crate::snippet::{VectorMetadata, VectorRecord};

const CONTROL_PLANE: &str = "https://api.pinecone.io";
const API_VERSION: &str = "2024-07";

/// Blocking client bound to one Pinecone index host.
#[derive(Clone)]
pub struct PineconeIndex {
    client: Client,
    host: String,
    namespace: Option<String>,
    max_retries: usize,
}

impl PineconeIndex {
    /// Builds a client for a known data-plane host
    /// (e.g. `https://my-index-abc123.svc.us-east-1.pinecone.io`).
    pub fn new(
        api_key: &str,
        host: &str,
        namespace: Option<String>,
        timeout: Duration,
        max_retries: usize,
    ) -> anyhow::Result<Self> {
        let client = build_client(api_key, timeout)?;
        Ok(Self {
            client,
            host: normalize_host(host)?,
            namespace: namespace.filter(|ns| !ns.trim().is_empty()),
            max_retries: max_retries.max(1),
        })
    }

    /// Resolves the host of `index_name` through the control plane, then builds the client.
    pub fn connect(
        api_key: &str,
        index_name: &str,
        namespace: Option<String>,
        timeout: Duration,
        max_retries: usize,
    ) -> anyhow::Result<Self> {
        Self::connect_via(
            CONTROL_PLANE,
            api_key,
            index_name,
            namespace,
            timeout,
            max_retries,
        )
    }

    fn connect_via(
        control_plane: &str,
        api_key: &str,
        index_name: &str,
        namespace: Option<String>,
        timeout: Duration,
        max_retries: usize,
    ) -> anyhow::Result<Self> {
        anyhow::ensure!(!index_name.trim().is_empty(), "missing Pinecone index name");
        let client = build_client(api_key, timeout)?;
        let url = format!(
            "{}/indexes/{}",
            control_plane.trim_end_matches('/'),
            index_name.trim()
        );
        let resp = client
            .get(&url)
            .send()
            .with_context(|| format!("failed to describe Pinecone index {index_name}"))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            anyhow::bail!("Pinecone describe_index returned {}: {}", status, body);
        }
        let described: IndexDescription = resp
            .json()
            .context("failed to parse Pinecone index description")?;
        let host = described
            .host
            .ok_or_else(|| anyhow!("Pinecone index {index_name} has no host yet"))?;
        Ok(Self {
            client,
            host: normalize_host(&host)?,
            namespace: namespace.filter(|ns| !ns.trim().is_empty()),
            max_retries: max_retries.max(1),
        })
    }

    /// Data-plane base URL.
    pub fn host(&self) -> &str {
        &self.host
    }

    fn send_with_retry<F>(&self, build: F) -> Result<reqwest::blocking::Response, VectorIndexError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt = 0usize;
        loop {
            match build().send() {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return Ok(resp);
                    }
                    let body = resp
                        .text()
                        .unwrap_or_else(|_| "<body unavailable>".to_string());
                    if should_retry(status) && attempt + 1 < self.max_retries {
                        attempt += 1;
                        debug!(%status, attempt, "retrying Pinecone request");
                        thread::sleep(retry_backoff(attempt));
                        continue;
                    }
                    return Err(VectorIndexError::Status {
                        status: status.as_u16(),
                        body,
                    });
                }
                Err(err) => {
                    if is_transient(&err) && attempt + 1 < self.max_retries {
                        attempt += 1;
                        thread::sleep(retry_backoff(attempt));
                        continue;
                    }
                    return Err(VectorIndexError::Request(err.to_string()));
                }
            }
        }
    }
}

impl VectorIndex for PineconeIndex {
    fn upsert(&self, records: &[VectorRecord]) -> Result<(), VectorIndexError> {
        if records.is_empty() {
            return Ok(());
        }
        let body = UpsertRequest {
            vectors: records
                .iter()
                .map(|record| PineconeVector {
                    id: &record.id,
                    values: &record.vector,
                    metadata: &record.metadata,
                })
                .collect(),
            namespace: self.namespace.as_deref(),
        };
        let url = format!("{}/vectors/upsert", self.host);
        let resp = self.send_with_retry(|| self.client.post(&url).json(&body))?;
        let parsed: UpsertResponse = resp
            .json()
            .map_err(|err| VectorIndexError::InvalidResponse(err.to_string()))?;
        if let Some(count) = parsed.upserted_count {
            if count != records.len() {
                return Err(VectorIndexError::InvalidResponse(format!(
                    "Pinecone upserted {} of {} vectors",
                    count,
                    records.len()
                )));
            }
        }
        Ok(())
    }

    fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        include_metadata: bool,
    ) -> Result<Vec<VectorMatch>, VectorIndexError> {
        let body = QueryRequest {
            vector,
            top_k: top_k.max(1),
            include_metadata,
            namespace: self.namespace.as_deref(),
        };
        let url = format!("{}/query", self.host);
        let resp = self.send_with_retry(|| self.client.post(&url).json(&body))?;
        let parsed: QueryResponse = resp
            .json()
            .map_err(|err| VectorIndexError::InvalidResponse(err.to_string()))?;
        Ok(parsed
            .matches
            .into_iter()
            .map(|m| VectorMatch {
                id: m.id,
                score: m.score.unwrap_or(0.0),
                metadata: m.metadata.unwrap_or_default(),
            })
            .collect())
    }
}

fn build_client(api_key: &str, timeout: Duration) -> anyhow::Result<Client> {
    anyhow::ensure!(!api_key.trim().is_empty(), "missing Pinecone API key");
    let mut headers = HeaderMap::new();
    headers.insert(
        "api-key",
        HeaderValue::from_str(api_key.trim()).context("invalid Pinecone API key")?,
    );
    headers.insert(
        "x-pinecone-api-version",
        HeaderValue::from_static(API_VERSION),
    );
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Client::builder()
        .timeout(timeout)
        .default_headers(headers)
        .build()
        .context("failed to build Pinecone HTTP client")
}

fn normalize_host(host: &str) -> anyhow::Result<String> {
    let host = host.trim().trim_end_matches('/');
    anyhow::ensure!(!host.is_empty(), "missing Pinecone index host");
    if host.starts_with("http://") || host.starts_with("https://") {
        Ok(host.to_string())
    } else {
        Ok(format!("https://{host}"))
    }
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: Vec<PineconeVector<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Serialize)]
struct PineconeVector<'a> {
    id: &'a str,
    values: &'a [f32],
    metadata: &'a VectorMetadata,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: Option<usize>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Debug, Deserialize)]
struct QueryMatch {
    id: String,
    #[serde(default)]
    score: Option<f32>,
    #[serde(default)]
    metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct IndexDescription {
    #[serde(default)]
    host: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn record(id: &str) -> VectorRecord {
        VectorRecord {
            id: id.to_string(),
            vector: vec![0.25, 0.5],
            metadata: VectorMetadata {
                text: "const App = () => null;".into(),
                tags: "react,upvoted".into(),
                recommended: false,
                upvoted: true,
                model: "unknown".into(),
                dataset: "local".into(),
            },
        }
    }

    #[test]
    fn bare_host_gets_https_scheme() {
        assert_eq!(
            normalize_host("idx-123.svc.pinecone.io/").unwrap(),
            "https://idx-123.svc.pinecone.io"
        );
        assert!(normalize_host("  ").is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn upsert_sends_metadata_and_namespace() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/vectors/upsert"))
            .and(header("api-key", "pc-test"))
            .and(body_partial_json(json!({
                "namespace": "snippets",
                "vectors": [{"id": "a", "metadata": {"tags": "react,upvoted", "upvoted": true}}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"upsertedCount": 1})))
            .expect(1)
            .mount(&server)
            .await;

        let host = server.uri();
        tokio::task::spawn_blocking(move || {
            let index = PineconeIndex::new(
                "pc-test",
                &host,
                Some("snippets".into()),
                Duration::from_secs(5),
                1,
            )
            .expect("client");
            index.upsert(&[record("a")])
        })
        .await
        .expect("join")
        .expect("upsert");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn query_maps_matches() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/query"))
            .and(body_partial_json(json!({"topK": 2, "includeMetadata": true})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "matches": [
                    {"id": "a", "score": 0.91, "metadata": {"text": "first"}},
                    {"id": "b", "score": 0.42}
                ]
            })))
            .mount(&server)
            .await;

        let host = server.uri();
        let matches = tokio::task::spawn_blocking(move || {
            let index = PineconeIndex::new("pc-test", &host, None, Duration::from_secs(5), 1)
                .expect("client");
            index.query(&[0.1, 0.2], 2, true)
        })
        .await
        .expect("join")
        .expect("query");
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].metadata_str("text"), Some("first"));
        assert!(matches[1].metadata.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn connect_resolves_host_from_index_name() {
        let control = MockServer::start().await;
        let data_host = format!("{}/data", control.uri());
        Mock::given(method("GET"))
            .and(path("/indexes/react-snippets"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "react-snippets",
                "host": data_host
            })))
            .mount(&control)
            .await;

        let base = control.uri();
        let expected = data_host.clone();
        let host = tokio::task::spawn_blocking(move || {
            PineconeIndex::connect_via(
                &base,
                "pc-test",
                "react-snippets",
                None,
                Duration::from_secs(5),
                1,
            )
            .map(|index| index.host().to_string())
        })
        .await
        .expect("join")
        .expect("resolves");
        assert_eq!(host, expected);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn server_error_is_reported_after_retries() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/vectors/upsert"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(1)
            .mount(&server)
            .await;

        let host = server.uri();
        let err = tokio::task::spawn_blocking(move || {
            let index = PineconeIndex::new("pc-test", &host, None, Duration::from_secs(5), 1)
                .expect("client");
            index.upsert(&[record("a")])
        })
        .await
        .expect("join")
        .expect_err("fails");
        assert!(matches!(err, VectorIndexError::Status { status: 500, .. }));
    }
}
