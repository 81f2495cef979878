//! Hugging Face datasets-server rows API, paged lazily.

use std::collections::VecDeque;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::DatasetError;
use crate::http::{is_transient, retry_backoff, should_retry};
use crate::snippet::SourceRecord;

use super::{DatasetSource, RecordStream};

/// Largest page the rows endpoint serves.
pub const MAX_PAGE_LENGTH: usize = 100;

/// Blocking reader over `GET {base}/rows?dataset=..&config=..&split=..`.
#[derive(Clone)]
pub struct HfRowsDataset {
    client: Client,
    endpoint: String,
    dataset: String,
    config: String,
    split: String,
    page_length: usize,
    max_retries: usize,
}

impl HfRowsDataset {
    /// Builds a reader for `dataset` using the `default` config.
    pub fn new(
        base_url: &str,
        dataset: impl Into<String>,
        split: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let dataset = dataset.into();
        anyhow::ensure!(!dataset.trim().is_empty(), "missing dataset identifier");
        anyhow::ensure!(
            base_url.starts_with("http://") || base_url.starts_with("https://"),
            "datasets-server base must be an http(s) URL"
        );
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build datasets-server HTTP client")?;
        Ok(Self {
            client,
            endpoint: format!("{}/rows", base_url.trim_end_matches('/')),
            dataset,
            config: "default".to_string(),
            split: split.into(),
            page_length: MAX_PAGE_LENGTH,
            max_retries: 3,
        })
    }

    /// Overrides the dataset config name.
    pub fn with_config(mut self, config: impl Into<String>) -> Self {
        self.config = config.into();
        self
    }

    /// Overrides the page size, clamped to the server maximum.
    pub fn with_page_length(mut self, page_length: usize) -> Self {
        self.page_length = page_length.clamp(1, MAX_PAGE_LENGTH);
        self
    }

    fn fetch_page(&self, offset: usize) -> Result<RowsPage, DatasetError> {
        let mut attempt = 0usize;
        loop {
            let response = self
                .client
                .get(&self.endpoint)
                .query(&[
                    ("dataset", self.dataset.as_str()),
                    ("config", self.config.as_str()),
                    ("split", self.split.as_str()),
                ])
                .query(&[("offset", offset), ("length", self.page_length)])
                .send();
            match response {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return resp.json::<RowsPage>().map_err(|err| {
                            DatasetError::Unavailable(format!(
                                "failed to parse rows page at offset {offset}: {err}"
                            ))
                        });
                    }
                    let body = resp
                        .text()
                        .unwrap_or_else(|_| "<body unavailable>".to_string());
                    if should_retry(status) && attempt + 1 < self.max_retries {
                        attempt += 1;
                        thread::sleep(retry_backoff(attempt));
                        continue;
                    }
                    return Err(DatasetError::Unavailable(format!(
                        "rows request at offset {offset} failed ({status}): {body}"
                    )));
                }
                Err(err) => {
                    if is_transient(&err) && attempt + 1 < self.max_retries {
                        attempt += 1;
                        thread::sleep(retry_backoff(attempt));
                        continue;
                    }
                    return Err(DatasetError::Unavailable(err.to_string()));
                }
            }
        }
    }
}

impl DatasetSource for HfRowsDataset {
    fn name(&self) -> &str {
        &self.dataset
    }

    fn records(&self) -> Result<RecordStream<'_>, DatasetError> {
        let first = self.fetch_page(0)?;
        info!(
            dataset = %self.dataset,
            total_rows = ?first.num_rows_total,
            "dataset opened"
        );
        let mut pager = RowPager {
            source: self,
            next_offset: 0,
            total: first.num_rows_total,
            buffer: VecDeque::new(),
            exhausted: false,
        };
        pager.absorb(first);
        Ok(Box::new(pager))
    }
}

struct RowPager<'a> {
    source: &'a HfRowsDataset,
    next_offset: usize,
    total: Option<usize>,
    buffer: VecDeque<Result<SourceRecord, DatasetError>>,
    exhausted: bool,
}

impl RowPager<'_> {
    fn absorb(&mut self, page: RowsPage) {
        let offset = self.next_offset;
        let received = page.rows.len();
        self.next_offset += received;
        if received == 0 || self.total.is_some_and(|total| self.next_offset >= total) {
            self.exhausted = true;
        }
        self.buffer.extend(
            page.rows
                .into_iter()
                .enumerate()
                .map(|(idx, entry)| entry.decode(offset + idx)),
        );
    }
}

impl Iterator for RowPager<'_> {
    type Item = Result<SourceRecord, DatasetError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.buffer.pop_front() {
                return Some(record);
            }
            if self.exhausted {
                return None;
            }
            debug!(offset = self.next_offset, "fetching dataset page");
            match self.source.fetch_page(self.next_offset) {
                Ok(page) => self.absorb(page),
                Err(err) => {
                    self.exhausted = true;
                    return Some(Err(err));
                }
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct RowsPage {
    #[serde(default)]
    rows: Vec<RowEntry>,
    #[serde(default)]
    num_rows_total: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RowEntry {
    #[serde(default)]
    row_idx: Option<usize>,
    #[serde(default)]
    row: Value,
}

impl RowEntry {
    fn decode(self, fallback_position: usize) -> Result<SourceRecord, DatasetError> {
        let position = self.row_idx.unwrap_or(fallback_position);
        serde_json::from_value(self.row).map_err(|err| DatasetError::InvalidRecord {
            position,
            reason: err.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn row(content: &str) -> serde_json::Value {
        json!({
            "row_idx": 0,
            "row": {"messages": [{"role": "assistant", "content": content}], "upvoted": true},
            "truncated_cells": []
        })
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn pages_until_total_is_reached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rows"))
            .and(query_param("offset", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "rows": [row("a"), row("b")],
                "num_rows_total": 3
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rows"))
            .and(query_param("offset", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "rows": [row("c")],
                "num_rows_total": 3
            })))
            .expect(1)
            .mount(&server)
            .await;

        let base = server.uri();
        let contents = tokio::task::spawn_blocking(move || {
            let dataset = HfRowsDataset::new(&base, "org/set", "train", Duration::from_secs(5))
                .expect("client")
                .with_page_length(2);
            dataset
                .records()
                .expect("opens")
                .map(|record| record.expect("row").messages[0].content.clone())
                .collect::<Vec<_>>()
        })
        .await
        .expect("join");
        assert_eq!(contents, vec!["a", "b", "c"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn undecodable_row_is_reported_alone() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rows"))
            .and(query_param("config", "messages"))
            .and(query_param("offset", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "rows": [
                    row("a"),
                    {"row_idx": 1, "row": {"messages": [{"role": "assistant", "content": 7}]}},
                    row("c")
                ],
                "num_rows_total": 3
            })))
            .expect(1)
            .mount(&server)
            .await;

        let base = server.uri();
        let outcomes = tokio::task::spawn_blocking(move || {
            let dataset = HfRowsDataset::new(&base, "org/set", "train", Duration::from_secs(5))
                .expect("client")
                .with_config("messages");
            dataset
                .records()
                .expect("opens")
                .map(|record| match record {
                    Ok(record) => Ok(record.messages[0].content.clone()),
                    Err(DatasetError::InvalidRecord { position, .. }) => Err(position),
                    Err(other) => panic!("unexpected {other:?}"),
                })
                .collect::<Vec<_>>()
        })
        .await
        .expect("join");
        assert_eq!(outcomes, vec![Ok("a".to_string()), Err(1), Ok("c".to_string())]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unreachable_dataset_fails_on_open() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rows"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .mount(&server)
            .await;

        let base = server.uri();
        let err = tokio::task::spawn_blocking(move || {
            let dataset = HfRowsDataset::new(&base, "org/missing", "train", Duration::from_secs(5))
                .expect("client");
            dataset.records().err()
        })
        .await
        .expect("join");
        assert!(matches!(err, Some(DatasetError::Unavailable(_))));
    }
}
