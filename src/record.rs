// src/record.rs
//! Flat, normalized records produced by every upstream source, plus the cache
//! key template used to address them.

use crate::error::{PollerError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field stamped on every record at fetch time (epoch seconds).
pub const LAST_POLLED_TS: &str = "last_polled_ts";

/// Placeholder substituted with the entity identifier in key templates.
pub const ID_PLACEHOLDER: &str = "{id}";

/// A flat mapping of field names to scalar JSON values.
///
/// Records are rebuilt from scratch on every poll and never merged with what
/// is already cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedRecord(Map<String, Value>);

impl NormalizedRecord {
    pub fn new(polled_at: i64) -> Self {
        let mut fields = Map::new();
        fields.insert(LAST_POLLED_TS.to_string(), Value::from(polled_at));
        Self(fields)
    }

    /// Inserts a field, keeping only scalar values. Missing values and nested
    /// objects/arrays are stored as `null`.
    pub fn insert(&mut self, field: &str, value: Option<&Value>) {
        let scalar = match value {
            Some(v @ (Value::String(_) | Value::Number(_) | Value::Bool(_))) => v.clone(),
            _ => Value::Null,
        };
        self.0.insert(field.to_string(), scalar);
    }

    pub fn with(mut self, field: &str, value: Option<&Value>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last_polled_ts(&self) -> Option<i64> {
        self.0.get(LAST_POLLED_TS).and_then(Value::as_i64)
    }

    /// Text form of the identifying field, or `None` if it is null, empty or
    /// not a string/number.
    pub fn identifier(&self, field: &str) -> Option<String> {
        match self.0.get(field)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Walks a chain of object keys. A missing or `null` hop yields `None`.
pub fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, key| current.get(*key))
}

/// Renders `<namespace>:<identifier>` style keys from a fixed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKeyTemplate {
    template: String,
}

impl CacheKeyTemplate {
    pub fn new(template: &str) -> Result<Self> {
        if !template.contains(ID_PLACEHOLDER) {
            return Err(PollerError::ConfigError(format!(
                "cache key template '{}' must contain {}",
                template, ID_PLACEHOLDER
            )));
        }
        Ok(Self {
            template: template.to_string(),
        })
    }

    /// Default template for a namespace, e.g. `flight:{id}`.
    pub fn for_namespace(namespace: &str) -> Self {
        Self {
            template: format!("{}:{}", namespace, ID_PLACEHOLDER),
        }
    }

    pub fn render(&self, id: &str) -> String {
        self.template.replace(ID_PLACEHOLDER, id)
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }
}
