//! Integration Hub core
//!
//! In-memory state behind the Enterprise Integration Hub:
//!
//! - **Store** (`store`): bounded, FIFO-evicting logs of system events and
//!   workflow executions
//! - **Registry** (`registry`): one live health metric per collaborator,
//!   updated by upsert
//! - **Hub** (`hub`): the explicitly owned service object bundling both
//!
//! Nothing here performs I/O. Polling, webhooks and the HTTP read API live in
//! the `integration-hub` crate.

pub mod clock;
pub mod error;
pub mod hub;
pub mod models;
pub mod registry;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{HubError, Result};
pub use hub::IntegrationHub;
pub use models::{
    event_types, IntegrationMetric, IntegrationStatus, SystemEvent, WorkflowExecution,
    WorkflowStatus,
};
pub use registry::{IntegrationRegistry, DEFAULT_SERVICES};
pub use store::{EventStore, StoreConfig, DEFAULT_EVENT_CAPACITY, DEFAULT_WORKFLOW_CAPACITY};
