// src/api/client.rs
//! Single HTTP client shared by every upstream source.

use crate::api::sources::Source;
use crate::config::Config;
use crate::error::{PollerError, Result};
use crate::record::NormalizedRecord;
use crate::utils::now_ts;
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use serde_json::Value;
use std::fmt;
use url::Url;

/// Anything the poll loop can pull a batch of records from.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Namespace used to build cache keys and pick a TTL.
    fn namespace(&self) -> &str;

    /// Field whose value identifies a record.
    fn id_field(&self) -> &str;

    /// Human readable filter summary for log lines.
    fn describe(&self) -> String;

    async fn fetch(&self) -> Result<Vec<NormalizedRecord>>;
}

pub struct ApiClient {
    http: Client,
    endpoint: Url,
    access_key: Option<String>,
    source: Source,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("access_key", &self.access_key.as_ref().map(|_| "<redacted>"))
            .field("source", &self.source)
            .finish()
    }
}

/// Joins base URL and resource path, e.g. `http://api.aviationstack.com/v1` + `/flights`.
pub fn endpoint_url(base_url: &str, path: &str) -> Result<Url> {
    let raw = format!("{}{}", base_url.trim_end_matches('/'), path);
    Url::parse(&raw)
        .map_err(|e| PollerError::ConfigError(format!("Invalid API URL '{}': {}", raw, e)))
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| PollerError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;
        let source = Source::from_config(config);

        Ok(Self {
            http,
            endpoint: endpoint_url(&config.api_base_url, &source.path)?,
            access_key: config.access_key.clone(),
            source,
        })
    }

    /// Request URL with the access key first, then the filters.
    fn request_url(&self) -> Url {
        let mut url = self.endpoint.clone();
        if self.access_key.is_some() || !self.source.params.is_empty() {
            let mut query = url.query_pairs_mut();
            if let Some(key) = &self.access_key {
                query.append_pair("access_key", key);
            }
            for (name, value) in &self.source.params {
                query.append_pair(name, value);
            }
        }
        url
    }

    async fn get_json(&self) -> Result<Value> {
        let url = self.request_url();
        debug!("GET {}", self.endpoint);

        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!("HTTP error {} from {}", status, self.endpoint);
            return Err(PollerError::RequestError(format!(
                "HTTP {} from {}",
                status, self.source.path
            )));
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl Fetcher for ApiClient {
    fn namespace(&self) -> &str {
        self.source.kind.namespace()
    }

    fn id_field(&self) -> &str {
        self.source.normalizer().id_field()
    }

    fn describe(&self) -> String {
        self.source.describe()
    }

    async fn fetch(&self) -> Result<Vec<NormalizedRecord>> {
        let body = self.get_json().await?;
        let normalizer = self.source.normalizer();
        let id_field = normalizer.id_field();

        let mut records = normalizer.normalize(&body, now_ts())?;
        let raw_count = records.len();
        records.retain(|record| record.identifier(id_field).is_some());
        if records.len() < raw_count {
            debug!(
                "Dropped {} {} entries without '{}'",
                raw_count - records.len(),
                self.source.kind,
                id_field
            );
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn todo_config() -> Config {
        Config::from_lookup(|var| match var {
            "POLL_SOURCE" => Some("todo".to_string()),
            "TODO_ID" => Some("4".to_string()),
            _ => None,
        })
        .unwrap()
    }

    #[test]
    fn test_endpoint_is_resolved_once_at_construction() {
        let client = ApiClient::new(&todo_config()).unwrap();
        assert_eq!(
            client.request_url().as_str(),
            "https://jsonplaceholder.typicode.com/todos/4"
        );
    }

    #[test]
    fn test_bad_base_url_fails_construction() {
        let mut config = todo_config();
        config.api_base_url = "not a url".to_string();
        let err = ApiClient::new(&config).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let url = endpoint_url("http://api.aviationstack.com/v1/", "/flights").unwrap();
        assert_eq!(url.as_str(), "http://api.aviationstack.com/v1/flights");
    }
}
