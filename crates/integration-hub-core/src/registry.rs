//! Integration status registry
//!
//! One live [`IntegrationMetric`] per service name. Writes are upserts keyed
//! by name; nothing is ever removed. Aggregates across services (averages,
//! overall success rate) are left to callers of [`IntegrationRegistry::list_all`].

use rand::Rng;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::clock::{Clock, SystemClock};
use crate::error::{HubError, Result};
use crate::models::{IntegrationMetric, IntegrationStatus};

/// Services seeded at startup so the read API is never empty
pub const DEFAULT_SERVICES: [&str; 6] = [
    "shared-context-server",
    "microsoft365",
    "github",
    "notion",
    "n8n",
    "external_apis",
];

/// Synthetic jitter bound applied to response times, in milliseconds
pub const JITTER_RANGE_MS: f64 = 5.0;

/// Floor for jittered response times, in milliseconds
pub const JITTER_FLOOR_MS: f64 = 10.0;

#[derive(Debug)]
pub struct IntegrationRegistry {
    clock: Arc<dyn Clock>,
    metrics: RwLock<BTreeMap<String, IntegrationMetric>>,
}

impl Default for IntegrationRegistry {
    fn default() -> Self {
        Self::with_default_services(Arc::new(SystemClock))
    }
}

impl IntegrationRegistry {
    /// Empty registry
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            metrics: RwLock::new(BTreeMap::new()),
        }
    }

    /// Registry pre-seeded with [`DEFAULT_SERVICES`] at `unknown`
    pub fn with_default_services(clock: Arc<dyn Clock>) -> Self {
        let registry = Self::new(clock);
        for service in DEFAULT_SERVICES {
            registry.seed(service);
        }
        registry
    }

    /// Insert a neutral record unless the service already exists
    pub fn seed(&self, service: &str) {
        let mut metrics = self.metrics.write().unwrap_or_else(PoisonError::into_inner);
        metrics
            .entry(service.to_string())
            .or_insert_with(|| IntegrationMetric::new(service));
    }

    /// Fold one check outcome into the service's record
    pub fn upsert(
        &self,
        service: &str,
        status: IntegrationStatus,
        response_time_ms: f64,
        success: bool,
    ) -> IntegrationMetric {
        self.update(service, |metric, at| {
            metric.record_check(status, response_time_ms, success, at);
        })
    }

    /// Like [`upsert`](Self::upsert), also replacing the details payload
    pub fn upsert_with_details(
        &self,
        service: &str,
        status: IntegrationStatus,
        response_time_ms: f64,
        success: bool,
        details: Map<String, Value>,
    ) -> IntegrationMetric {
        self.update(service, |metric, at| {
            metric.record_check(status, response_time_ms, success, at);
            metric.details = details;
        })
    }

    /// Status-only change; request counters stay untouched
    pub fn mark(
        &self,
        service: &str,
        status: IntegrationStatus,
        details: Map<String, Value>,
    ) -> IntegrationMetric {
        self.update(service, |metric, at| {
            metric.status = status;
            metric.last_check = Some(at);
            metric.details = details;
        })
    }

    fn update<F>(&self, service: &str, apply: F) -> IntegrationMetric
    where
        F: FnOnce(&mut IntegrationMetric, chrono::DateTime<chrono::Utc>),
    {
        let at = self.clock.now();
        let mut metrics = self.metrics.write().unwrap_or_else(PoisonError::into_inner);
        let metric = metrics
            .entry(service.to_string())
            .or_insert_with(|| IntegrationMetric::new(service));
        let previous = metric.status;
        apply(metric, at);

        if previous != metric.status {
            tracing::info!(
                service = %service,
                from = %previous,
                to = %metric.status,
                "Integration status changed"
            );
        }
        metric.clone()
    }

    pub fn get(&self, service: &str) -> Result<IntegrationMetric> {
        self.metrics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(service)
            .cloned()
            .ok_or_else(|| HubError::ServiceNotFound(service.to_string()))
    }

    /// Snapshot of every tracked service, ordered by name
    pub fn list_all(&self) -> BTreeMap<String, IntegrationMetric> {
        self.metrics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.metrics.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn connected_count(&self) -> usize {
        self.metrics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|m| m.status.is_connected())
            .count()
    }

    /// Nudge response times of already-checked services by up to
    /// ±[`JITTER_RANGE_MS`], floored at [`JITTER_FLOOR_MS`].
    ///
    /// Counters and success rate are left alone so they stay derived from
    /// real checks.
    pub fn apply_jitter<R: Rng + ?Sized>(&self, rng: &mut R) {
        let mut metrics = self.metrics.write().unwrap_or_else(PoisonError::into_inner);
        for metric in metrics.values_mut().filter(|m| m.checks_total() > 0) {
            let delta = rng.random_range(-JITTER_RANGE_MS..=JITTER_RANGE_MS);
            metric.response_time = (metric.response_time + delta).max(JITTER_FLOOR_MS);
        }
    }
}
