//! HTTP client for the study server's task endpoints
//!
//! Every endpoint answers with the same tagged envelope:
//!
//! ```json
//! {"status": true,  "data": {...}}
//! {"status": false, "msg": "task not found"}
//! ```
//!
//! The client only reads. Failures are classified into [`Error::Request`]
//! (transport, non-JSON error pages), [`Error::Api`] (`status: false`) and
//! [`Error::Malformed`] (unexpected shape) and handed back to the caller; it
//! never retries on its own; the poll loop's next tick is the retry.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use serde::de::DeserializeOwned;

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::monitor::TaskSource;
use crate::types::{DetailSnapshot, Envelope, LogEntry, StatusSnapshot, TaskId};

/// HTTP client for the task API
#[derive(Debug, Clone)]
pub struct TaskClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl TaskClient {
    /// Create a new client from configuration
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: &ServerConfig) -> Result<Self> {
        config.validate()?;

        let base_url = config.base_url.trim().trim_end_matches('/').to_string();

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http_client = reqwest::Client::builder()
            .timeout(config.timeout())
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET /task/{id}`
    pub async fn get_status(&self, task_id: &TaskId) -> Result<StatusSnapshot> {
        let path = format!("/task/{}", urlencoding::encode(task_id.as_str()));
        self.get_data(&path).await
    }

    /// `GET /task/{id}/details`
    pub async fn get_details(&self, task_id: &TaskId) -> Result<DetailSnapshot> {
        let path = format!("/task/{}/details", urlencoding::encode(task_id.as_str()));
        self.get_data(&path).await
    }

    /// `GET /logs/{id}`: only entries not returned by an earlier call
    pub async fn get_logs(&self, task_id: &TaskId) -> Result<Vec<LogEntry>> {
        let path = format!("/logs/{}", urlencoding::encode(task_id.as_str()));
        self.get_data(&path).await
    }

    /// Check if the server is reachable and reports itself healthy
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/health", self.base_url);

        match self.http_client.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                let envelope: Envelope<serde_json::Value> = match response.json().await {
                    Ok(envelope) => envelope,
                    Err(_) => return Ok(false),
                };
                Ok(envelope.status)
            }
            Ok(_) => Ok(false),
            Err(_) => Ok(false),
        }
    }

    /// Issue a GET and unwrap the envelope's `data` as `T`.
    async fn get_data<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Request(format!("GET {} failed: {}", path, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Request(format!("failed to read body of {}: {}", path, e)))?;

        let envelope: Envelope<serde_json::Value> = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(e) if status.is_success() => {
                return Err(Error::Malformed {
                    endpoint: path.to_string(),
                    message: e.to_string(),
                });
            }
            Err(_) => {
                return Err(Error::Request(format!("GET {} returned {}", path, status)));
            }
        };

        if !envelope.status || !status.is_success() {
            return Err(Error::Api {
                status: (!status.is_success()).then(|| status.as_u16()),
                message: envelope
                    .msg
                    .unwrap_or_else(|| "no message from server".to_string()),
            });
        }

        let data = envelope.data.ok_or_else(|| Error::Malformed {
            endpoint: path.to_string(),
            message: "envelope has no data".to_string(),
        })?;

        serde_json::from_value(data).map_err(|e| Error::Malformed {
            endpoint: path.to_string(),
            message: e.to_string(),
        })
    }
}

impl TaskSource for TaskClient {
    async fn fetch_status(&self, task_id: &TaskId) -> Result<StatusSnapshot> {
        self.get_status(task_id).await
    }

    async fn fetch_details(&self, task_id: &TaskId) -> Result<DetailSnapshot> {
        self.get_details(task_id).await
    }

    async fn fetch_logs(&self, task_id: &TaskId) -> Result<Vec<LogEntry>> {
        self.get_logs(task_id).await
    }
}
