use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("bulk request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("sink returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed bulk payload: {0}")]
    Payload(String),

    #[error("no sink hosts configured")]
    NoHosts,
}

pub type Result<T> = std::result::Result<T, SinkError>;

/// Parsed result of one `_bulk` submission, mirroring the Elasticsearch
/// bulk API response shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkResponse {
    #[serde(default)]
    pub took: u64,
    pub errors: bool,
    pub items: Vec<BulkItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkItem {
    pub index: BulkItemStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkItemStatus {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub status: Option<u16>,
}

/// One bulk submission to the indexing endpoint. Implementations do a
/// single blocking (awaited) network call per flush; retry policy is
/// deliberately absent here.
#[async_trait]
pub trait BulkSink: Send {
    async fn submit(&mut self, body: String) -> Result<BulkResponse>;
}

/// HTTP sink posting NDJSON payloads to `{host}/_bulk`, cycling through the
/// configured hosts round-robin across submissions.
pub struct ElasticSink {
    client: reqwest::Client,
    hosts: Vec<String>,
    next_host: usize,
}

impl ElasticSink {
    pub fn new(hosts: &[String], request_timeout: Duration) -> Result<Self> {
        if hosts.is_empty() {
            return Err(SinkError::NoHosts);
        }
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        let hosts = hosts
            .iter()
            .map(|host| {
                let host = host.trim_end_matches('/');
                if host.contains("://") {
                    host.to_string()
                } else {
                    format!("http://{}", host)
                }
            })
            .collect();
        Ok(Self {
            client,
            hosts,
            next_host: 0,
        })
    }
}

#[async_trait]
impl BulkSink for ElasticSink {
    async fn submit(&mut self, body: String) -> Result<BulkResponse> {
        let host = &self.hosts[self.next_host % self.hosts.len()];
        self.next_host = self.next_host.wrapping_add(1);

        let url = format!("{}/_bulk", host);
        let response = self
            .client
            .post(&url)
            .header("content-type", "application/x-ndjson")
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SinkError::Status {
                status: response.status().as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        Ok(response.json().await?)
    }
}

/// Dry-run sink used when no hosts are configured: prints each document to
/// stdout and acknowledges everything, so the pipeline (checkpoint
/// included) behaves as in production.
pub struct StdoutSink;

#[async_trait]
impl BulkSink for StdoutSink {
    async fn submit(&mut self, body: String) -> Result<BulkResponse> {
        let response = acknowledge_all(&body)?;
        for line in body.lines().skip(1).step_by(2) {
            println!("{}", line);
        }
        Ok(response)
    }
}

/// Build a fully-acknowledged response for an NDJSON bulk payload by
/// echoing back the document id of every action line.
pub fn acknowledge_all(body: &str) -> Result<BulkResponse> {
    let mut items = Vec::new();
    let mut lines = body.lines();
    while let Some(action) = lines.next() {
        let action: serde_json::Value = serde_json::from_str(action)
            .map_err(|e| SinkError::Payload(format!("bad action line: {}", e)))?;
        let id = action["index"]["_id"]
            .as_str()
            .ok_or_else(|| SinkError::Payload("action line without _id".to_string()))?
            .to_string();
        if lines.next().is_none() {
            return Err(SinkError::Payload(
                "action line without document".to_string(),
            ));
        }
        items.push(BulkItem {
            index: BulkItemStatus {
                id,
                status: Some(200),
            },
        });
    }
    Ok(BulkResponse {
        took: 0,
        errors: false,
        items,
    })
}
