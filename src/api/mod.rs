// src/api/mod.rs
//! Upstream API access: one parameterized HTTP client with a pluggable
//! normalizer per source (flights, weather, todos).

pub mod client;
pub mod sources;

pub use client::{ApiClient, Fetcher};
pub use sources::{
    FlightNormalizer, Normalizer, Source, SourceKind, TodoNormalizer, WeatherNormalizer,
};
