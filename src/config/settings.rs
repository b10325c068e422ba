use crate::api::client::endpoint_url;
use crate::api::SourceKind;
use crate::error::{PollerError, Result};
use crate::record::CacheKeyTemplate;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Per-source request filters, fixed for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceFilters {
    Flight {
        dep_iata: String,
        arr_iata: String,
        flight_status: String,
        limit: u32,
    },
    Weather {
        query: String,
    },
    Todo {
        id: u64,
    },
}

#[derive(Clone)]
pub struct Config {
    pub source: SourceKind,
    pub api_base_url: String,
    pub access_key: Option<String>,
    pub filters: SourceFilters,
    pub poll_interval: Duration,
    pub http_timeout: Duration,
    pub redis_url: String,
    /// Namespace -> TTL in seconds. Namespaces absent here never expire.
    pub cache_ttl_secs: HashMap<String, u64>,
    pub cache_key_template: Option<String>,
    pub report_upsert_kind: bool,
}

// Manual Debug so the access key never reaches the logs
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("source", &self.source)
            .field("api_base_url", &self.api_base_url)
            .field("access_key", &self.access_key.as_ref().map(|_| "<redacted>"))
            .field("filters", &self.filters)
            .field("poll_interval", &self.poll_interval)
            .field("http_timeout", &self.http_timeout)
            .field("redis_url", &self.redis_url)
            .field("cache_ttl_secs", &self.cache_ttl_secs)
            .field("cache_key_template", &self.cache_key_template)
            .field("report_upsert_kind", &self.report_upsert_kind)
            .finish()
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, var: &str, default: T) -> Result<T> {
    match lookup(var) {
        None => Ok(default),
        Some(raw) if raw.trim().is_empty() => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| {
            PollerError::ConfigError(format!("{} has an invalid value: '{}'", var, raw))
        }),
    }
}

fn string_or(lookup: &impl Fn(&str) -> Option<String>, var: &str, default: &str) -> String {
    lookup(var)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Parses `flight:0,weather:600`. A zero TTL means "never expire" and is left out.
pub fn parse_ttl_map(raw: &str) -> Result<HashMap<String, u64>> {
    let mut ttls = HashMap::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (namespace, secs) = part.split_once(':').ok_or_else(|| {
            PollerError::ConfigError(format!("CACHE_TTL_SECS entry '{}' is not namespace:secs", part))
        })?;
        let secs: u64 = secs.trim().parse().map_err(|_| {
            PollerError::ConfigError(format!("CACHE_TTL_SECS entry '{}' has a bad TTL", part))
        })?;
        if secs > 0 {
            ttls.insert(namespace.trim().to_string(), secs);
        }
    }
    Ok(ttls)
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Builds the configuration from any variable source. Fails fast when a
    /// required credential is missing or a value does not parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let source: SourceKind = string_or(&lookup, "POLL_SOURCE", "flight").parse()?;

        let access_key = match source.access_key_var() {
            Some(var) => match lookup(var).filter(|v| !v.trim().is_empty()) {
                Some(key) => Some(key),
                None => {
                    return Err(PollerError::ConfigError(format!(
                        "{} environment variable is not set",
                        var
                    )))
                }
            },
            None => None,
        };

        let filters = match source {
            SourceKind::Flight => SourceFilters::Flight {
                dep_iata: string_or(&lookup, "DEP_IATA", "WUH"),
                arr_iata: string_or(&lookup, "ARR_IATA", "SZX"),
                flight_status: string_or(&lookup, "FLIGHT_STATUS", "scheduled"),
                limit: parse_or(&lookup, "MAX_FLIGHTS", 5)?,
            },
            SourceKind::Weather => SourceFilters::Weather {
                query: string_or(&lookup, "WEATHER_QUERY", "London"),
            },
            SourceKind::Todo => SourceFilters::Todo {
                id: parse_or(&lookup, "TODO_ID", 1)?,
            },
        };

        let poll_interval_secs: u64 = parse_or(&lookup, "POLL_INTERVAL_SECONDS", 60)?;
        if poll_interval_secs == 0 {
            return Err(PollerError::ConfigError(
                "POLL_INTERVAL_SECONDS must be greater than zero".to_string(),
            ));
        }
        let http_timeout_secs: u64 = parse_or(&lookup, "HTTP_TIMEOUT_SECONDS", 10)?;
        if !(1..=60).contains(&http_timeout_secs) {
            return Err(PollerError::ConfigError(format!(
                "HTTP_TIMEOUT_SECONDS must be between 1 and 60, got {}",
                http_timeout_secs
            )));
        }

        let cache_ttl_secs = match lookup("CACHE_TTL_SECS") {
            Some(raw) => parse_ttl_map(&raw)?,
            None => HashMap::new(),
        };

        let cache_key_template = lookup("CACHE_KEY_TEMPLATE").filter(|t| !t.trim().is_empty());
        if let Some(template) = &cache_key_template {
            CacheKeyTemplate::new(template)?;
        }

        let api_base_url = string_or(&lookup, "API_BASE_URL", source.default_base_url());
        endpoint_url(&api_base_url, "")?;

        Ok(Config {
            source,
            api_base_url,
            access_key,
            filters,
            poll_interval: Duration::from_secs(poll_interval_secs),
            http_timeout: Duration::from_secs(http_timeout_secs),
            redis_url: string_or(&lookup, "REDIS_URL", "redis://localhost:6379/0"),
            cache_ttl_secs,
            cache_key_template,
            report_upsert_kind: parse_or(&lookup, "REPORT_UPSERT_KIND", true)?,
        })
    }

    pub fn ttl_for(&self, namespace: &str) -> Option<Duration> {
        self.cache_ttl_secs
            .get(namespace)
            .map(|secs| Duration::from_secs(*secs))
    }

    pub fn key_template(&self) -> CacheKeyTemplate {
        match &self.cache_key_template {
            // Validated in from_lookup; fall back to the default shape otherwise.
            Some(template) => CacheKeyTemplate::new(template)
                .unwrap_or_else(|_| CacheKeyTemplate::for_namespace(self.source.namespace())),
            None => CacheKeyTemplate::for_namespace(self.source.namespace()),
        }
    }

    pub fn validate_and_log(&self) {
        log::info!("Application Configuration Loaded: {:?}", self);
        if self.ttl_for(self.source.namespace()).is_none() {
            log::info!(
                "No TTL configured for namespace '{}'; entries persist until overwritten",
                self.source.namespace()
            );
        }
    }
}
