// src/api/sources.rs
//! Upstream sources: where to poll and how to flatten each response.

use crate::config::{Config, SourceFilters};
use crate::error::{PollerError, Result};
use crate::record::{lookup, NormalizedRecord};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Flight,
    Weather,
    Todo,
}

impl SourceKind {
    pub fn namespace(&self) -> &'static str {
        match self {
            SourceKind::Flight => "flight",
            SourceKind::Weather => "weather",
            SourceKind::Todo => "todo",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            SourceKind::Flight => "http://api.aviationstack.com/v1",
            SourceKind::Weather => "http://api.weatherstack.com",
            SourceKind::Todo => "https://jsonplaceholder.typicode.com",
        }
    }

    /// Environment variable holding the access key, for sources that need one.
    pub fn access_key_var(&self) -> Option<&'static str> {
        match self {
            SourceKind::Flight => Some("AVIATIONSTACK_ACCESS_KEY"),
            SourceKind::Weather => Some("WEATHERSTACK_ACCESS_KEY"),
            SourceKind::Todo => None,
        }
    }

    pub fn normalizer(&self) -> Box<dyn Normalizer> {
        match self {
            SourceKind::Flight => Box::new(FlightNormalizer),
            SourceKind::Weather => Box::new(WeatherNormalizer),
            SourceKind::Todo => Box::new(TodoNormalizer),
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.namespace())
    }
}

impl FromStr for SourceKind {
    type Err = PollerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "flight" | "flights" => Ok(SourceKind::Flight),
            "weather" => Ok(SourceKind::Weather),
            "todo" | "todos" => Ok(SourceKind::Todo),
            other => Err(PollerError::ConfigError(format!(
                "unknown POLL_SOURCE '{}' (expected flight, weather or todo)",
                other
            ))),
        }
    }
}

/// Maps a raw JSON response body to flat records.
///
/// Implementations may return records whose identifier is missing; the client
/// drops those before handing results to the poll loop.
pub trait Normalizer: Send + Sync {
    /// Field that identifies the entity and feeds the cache key.
    fn id_field(&self) -> &'static str;

    fn normalize(&self, body: &Value, polled_at: i64) -> Result<Vec<NormalizedRecord>>;
}

/// Aviationstack `/flights`: `{"data": [ {flight, airline, departure, arrival, ...} ]}`.
pub struct FlightNormalizer;

impl Normalizer for FlightNormalizer {
    fn id_field(&self) -> &'static str {
        "flight_iata"
    }

    fn normalize(&self, body: &Value, polled_at: i64) -> Result<Vec<NormalizedRecord>> {
        if !body.is_object() {
            return Err(PollerError::DeserializationError(
                "flights response is not a JSON object".to_string(),
            ));
        }
        let entries = match body.get("data") {
            None | Some(Value::Null) => return Ok(Vec::new()),
            Some(Value::Array(entries)) => entries,
            Some(_) => {
                return Err(PollerError::DeserializationError(
                    "flights response 'data' is not an array".to_string(),
                ))
            }
        };

        Ok(entries
            .iter()
            .filter(|entry| entry.is_object())
            .map(|flight| {
                NormalizedRecord::new(polled_at)
                    .with("flight_iata", lookup(flight, &["flight", "iata"]))
                    .with("flight_number", lookup(flight, &["flight", "number"]))
                    .with("airline_name", lookup(flight, &["airline", "name"]))
                    .with("status", flight.get("flight_status"))
                    .with("departure_airport", lookup(flight, &["departure", "airport"]))
                    .with("departure_iata", lookup(flight, &["departure", "iata"]))
                    .with("departure_scheduled", lookup(flight, &["departure", "scheduled"]))
                    .with("arrival_airport", lookup(flight, &["arrival", "airport"]))
                    .with("arrival_iata", lookup(flight, &["arrival", "iata"]))
                    .with("arrival_scheduled", lookup(flight, &["arrival", "scheduled"]))
            })
            .collect())
    }
}

/// Weatherstack `/current`: a single `{location, current}` object.
pub struct WeatherNormalizer;

impl Normalizer for WeatherNormalizer {
    fn id_field(&self) -> &'static str {
        "location_name"
    }

    fn normalize(&self, body: &Value, polled_at: i64) -> Result<Vec<NormalizedRecord>> {
        if !body.is_object() {
            return Err(PollerError::DeserializationError(
                "weather response is not a JSON object".to_string(),
            ));
        }
        // Weatherstack reports failures with a 200 and an error body.
        if body.get("success") == Some(&Value::Bool(false)) {
            let info = lookup(body, &["error", "info"])
                .and_then(Value::as_str)
                .unwrap_or("unspecified upstream error");
            return Err(PollerError::RequestError(format!(
                "weather API rejected request: {}",
                info
            )));
        }

        let description = lookup(body, &["current", "weather_descriptions"])
            .and_then(Value::as_array)
            .and_then(|descriptions| descriptions.first());

        Ok(vec![NormalizedRecord::new(polled_at)
            .with("location_name", lookup(body, &["location", "name"]))
            .with("country", lookup(body, &["location", "country"]))
            .with("temperature", lookup(body, &["current", "temperature"]))
            .with("weather_description", description)
            .with("humidity", lookup(body, &["current", "humidity"]))
            .with("wind_speed", lookup(body, &["current", "wind_speed"]))
            .with("observation_time", lookup(body, &["current", "observation_time"]))])
    }
}

/// JSONPlaceholder `/todos/{id}`: a flat `{userId, id, title, completed}` object.
pub struct TodoNormalizer;

impl Normalizer for TodoNormalizer {
    fn id_field(&self) -> &'static str {
        "id"
    }

    fn normalize(&self, body: &Value, polled_at: i64) -> Result<Vec<NormalizedRecord>> {
        if !body.is_object() {
            return Err(PollerError::DeserializationError(
                "todo response is not a JSON object".to_string(),
            ));
        }
        Ok(vec![NormalizedRecord::new(polled_at)
            .with("id", body.get("id"))
            .with("user_id", body.get("userId"))
            .with("title", body.get("title"))
            .with("completed", body.get("completed"))])
    }
}

/// A fully resolved upstream: request shape plus response normalizer.
pub struct Source {
    pub kind: SourceKind,
    pub path: String,
    pub params: Vec<(String, String)>,
    normalizer: Box<dyn Normalizer>,
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Source")
            .field("kind", &self.kind)
            .field("path", &self.path)
            .field("params", &self.params)
            .field("id_field", &self.normalizer.id_field())
            .finish()
    }
}

impl Source {
    pub fn from_config(config: &Config) -> Self {
        let (path, params) = match &config.filters {
            SourceFilters::Flight {
                dep_iata,
                arr_iata,
                flight_status,
                limit,
            } => (
                "/flights".to_string(),
                vec![
                    ("dep_iata".to_string(), dep_iata.clone()),
                    ("arr_iata".to_string(), arr_iata.clone()),
                    ("flight_status".to_string(), flight_status.clone()),
                    ("limit".to_string(), limit.to_string()),
                ],
            ),
            SourceFilters::Weather { query } => (
                "/current".to_string(),
                vec![("query".to_string(), query.clone())],
            ),
            SourceFilters::Todo { id } => (format!("/todos/{}", id), Vec::new()),
        };

        Self {
            kind: config.source,
            path,
            params,
            normalizer: config.source.normalizer(),
        }
    }

    pub fn normalizer(&self) -> &dyn Normalizer {
        self.normalizer.as_ref()
    }

    /// Filter summary for log lines, e.g. `dep_iata=WUH, arr_iata=SZX`.
    pub fn describe(&self) -> String {
        if self.params.is_empty() {
            return format!("{}{}", self.kind, self.path);
        }
        self.params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
