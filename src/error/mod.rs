use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum PollerError {
    /// Missing or malformed configuration; fatal at startup
    #[error("Config Error: {0}")]
    ConfigError(String),

    /// Non-2xx response or network/transport failure
    #[error("Request Error: {0}")]
    RequestError(String),

    /// Malformed JSON or an unexpected response shape
    #[error("Deserialization Error: {0}")]
    DeserializationError(String),

    /// Store unreachable or a failed store operation
    #[error("Cache Error: {0}")]
    CacheError(String),
}

pub type Result<T> = std::result::Result<T, PollerError>;

impl From<serde_json::Error> for PollerError {
    fn from(err: serde_json::Error) -> Self {
        PollerError::DeserializationError(format!(
            "JSON serialization/deserialization error: {}",
            err
        ))
    }
}

impl From<reqwest::Error> for PollerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return PollerError::DeserializationError(format!("Response body error: {}", err));
        }
        match err.status() {
            Some(status) => PollerError::RequestError(format!("HTTP {}: {}", status, err)),
            None => PollerError::RequestError(format!("Transport error: {}", err)),
        }
    }
}

impl From<redis::RedisError> for PollerError {
    fn from(err: redis::RedisError) -> Self {
        PollerError::CacheError(format!("Redis error: {}", err))
    }
}

impl PollerError {
    /// Only configuration problems stop the process; everything else is
    /// absorbed at the poll-cycle boundary.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PollerError::ConfigError(_))
    }

    /// Short category label used in cycle log lines.
    pub fn category(&self) -> &'static str {
        match self {
            PollerError::ConfigError(_) => "config",
            PollerError::RequestError(_) => "request",
            PollerError::DeserializationError(_) => "deserialization",
            PollerError::CacheError(_) => "cache",
        }
    }
}
