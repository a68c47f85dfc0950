//! The hub service object
//!
//! Owns the store and registry. Constructed once at startup and shared by
//! `Arc` with request handlers and the refresh task.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::registry::IntegrationRegistry;
use crate::store::{EventStore, StoreConfig};

#[derive(Debug)]
pub struct IntegrationHub {
    clock: Arc<dyn Clock>,
    store: EventStore,
    registry: IntegrationRegistry,
}

impl Default for IntegrationHub {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl IntegrationHub {
    pub fn new(config: StoreConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Build a hub whose store and registry share `clock`
    pub fn with_clock(config: StoreConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            store: EventStore::with_clock(config, clock.clone()),
            registry: IntegrationRegistry::with_default_services(clock.clone()),
            clock,
        }
    }

    pub fn store(&self) -> &EventStore {
        &self.store
    }

    pub fn registry(&self) -> &IntegrationRegistry {
        &self.registry
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}
