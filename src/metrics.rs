//! Operational counters
//!
//! Counter increments are best-effort: a failing sink is logged and never
//! fails the operation being counted.

use crate::storage::{lock, CounterStore, SharedStorage, StorageError};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("Metrics backend error: {0}")]
    Backend(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Destination of named counter increments such as `PixivImageSaved`
#[async_trait]
pub trait MetricsSink: Send + Sync {
    async fn increment(&self, name: &str, delta: u64) -> Result<(), MetricsError>;
}

/// Increments a counter, logging instead of failing
pub async fn record_best_effort(sink: &dyn MetricsSink, name: &str, delta: u64) {
    if let Err(e) = sink.increment(name, delta).await {
        tracing::warn!("Failed to increment counter {}: {}", name, e);
    }
}

/// Counters persisted in the `counters` table
#[derive(Clone)]
pub struct StorageMetrics {
    storage: SharedStorage,
}

impl StorageMetrics {
    pub fn new(storage: SharedStorage) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl MetricsSink for StorageMetrics {
    async fn increment(&self, name: &str, delta: u64) -> Result<(), MetricsError> {
        let mut storage = lock(&self.storage)?;
        storage.increment_counter(name, delta)?;
        Ok(())
    }
}

/// Sink that drops every increment
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

#[async_trait]
impl MetricsSink for NoopMetrics {
    async fn increment(&self, _name: &str, _delta: u64) -> Result<(), MetricsError> {
        Ok(())
    }
}
