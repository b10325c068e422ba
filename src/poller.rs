// src/poller.rs
//! The poll loop: fetch, key, upsert, log, sleep, forever.
//!
//! Every error raised while fetching or writing is caught at the cycle
//! boundary. Request, deserialization and cache errors never stop the loop.

use crate::api::Fetcher;
use crate::cache::KeyValueStore;
use crate::config::Config;
use crate::error::Result;
use crate::record::CacheKeyTemplate;
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

/// What a single upsert did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
    /// Written without looking at the previous value.
    Written,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub fetched: usize,
    pub created: usize,
    pub updated: usize,
    pub written: usize,
}

impl CycleReport {
    fn record(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Created => self.created += 1,
            UpsertOutcome::Updated => self.updated += 1,
            UpsertOutcome::Written => self.written += 1,
        }
    }

    pub fn stored(&self) -> usize {
        self.created + self.updated + self.written
    }
}

pub struct Poller {
    fetcher: Arc<dyn Fetcher>,
    store: Arc<dyn KeyValueStore>,
    key_template: CacheKeyTemplate,
    ttl: Option<Duration>,
    interval: Duration,
    report_upsert_kind: bool,
}

impl Poller {
    pub fn new(config: &Config, fetcher: Arc<dyn Fetcher>, store: Arc<dyn KeyValueStore>) -> Self {
        let ttl = config.ttl_for(fetcher.namespace());
        Self {
            key_template: config.key_template(),
            ttl,
            interval: config.poll_interval,
            report_upsert_kind: config.report_upsert_kind,
            fetcher,
            store,
        }
    }

    /// Writes one serialized record. With `report_upsert_kind` the previous
    /// value is read first purely to pick the log line; the stored value is the
    /// same either way.
    pub async fn upsert(&self, key: &str, serialized: &str) -> Result<UpsertOutcome> {
        if !self.report_upsert_kind {
            self.store.set(key, serialized, self.ttl).await?;
            info!("Key '{}' upserted.", key);
            return Ok(UpsertOutcome::Written);
        }

        match self.store.get(key).await? {
            None => {
                info!("Key '{}' does not exist yet. Creating it.", key);
                self.store.set(key, serialized, self.ttl).await?;
                Ok(UpsertOutcome::Created)
            }
            Some(_) => {
                info!("Key '{}' exists. Updating it.", key);
                self.store.update(key, serialized, self.ttl).await?;
                Ok(UpsertOutcome::Updated)
            }
        }
    }

    /// One poll cycle without the trailing sleep. The first error aborts the
    /// rest of the cycle; records already written stay written.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        info!(
            "Polling {} API ({})",
            self.fetcher.namespace(),
            self.fetcher.describe()
        );

        let records = self.fetcher.fetch().await?;
        let mut report = CycleReport {
            fetched: records.len(),
            ..CycleReport::default()
        };

        if records.is_empty() {
            warn!(
                "No {} records returned for {}; nothing to cache.",
                self.fetcher.namespace(),
                self.fetcher.describe()
            );
            return Ok(report);
        }

        let id_field = self.fetcher.id_field();
        for record in &records {
            // The fetcher already filtered these; skip quietly if one slipped through.
            let Some(id) = record.identifier(id_field) else {
                debug!("Skipping record without '{}'", id_field);
                continue;
            };
            let key = self.key_template.render(&id);
            let serialized = record.to_json()?;

            let outcome = self.upsert(&key, &serialized).await?;
            report.record(outcome);
            info!("Key '{}' now holds: {}", key, serialized);
        }

        Ok(report)
    }

    /// Runs one cycle, logs its outcome, then sleeps for the poll interval.
    /// The cycle result is returned so `run` can tell fatal errors apart.
    pub async fn tick(&self) -> Result<CycleReport> {
        let outcome = self.run_cycle().await;
        match &outcome {
            Ok(report) => info!(
                "Cycle complete: fetched={}, created={}, updated={}, written={}",
                report.fetched, report.created, report.updated, report.written
            ),
            Err(e) => error!(
                "Failed to poll {} API or update cache ({} error): {}",
                self.fetcher.namespace(),
                e.category(),
                e
            ),
        }
        sleep(self.interval).await;
        outcome
    }

    /// Polls until the process is terminated. Recoverable errors are logged
    /// and the next tick proceeds; a fatal (configuration) error is returned.
    pub async fn run(&self) -> Result<()> {
        info!(
            "Starting {} polling loop. Interval={:?}, key template={}, ttl={:?}",
            self.fetcher.namespace(),
            self.interval,
            self.key_template.as_str(),
            self.ttl
        );
        loop {
            if let Err(e) = self.tick().await {
                if e.is_fatal() {
                    return Err(e);
                }
            }
        }
    }
}
