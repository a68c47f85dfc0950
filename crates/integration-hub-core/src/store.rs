//! Bounded event and workflow store
//!
//! Two append-only logs with FIFO eviction at the head. Each log sits behind
//! its own lock, so an append and the trim that follows it are one atomic
//! step for readers. Snapshots are copies; callers never see the live log.

use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, PoisonError, RwLock};

use crate::clock::{Clock, SystemClock};
use crate::error::{HubError, Result};
use crate::models::{event_types, SystemEvent, WorkflowExecution};

/// Most recent system events retained
pub const DEFAULT_EVENT_CAPACITY: usize = 500;

/// Most recent workflow executions retained
pub const DEFAULT_WORKFLOW_CAPACITY: usize = 1000;

/// Retention caps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    pub event_capacity: usize,
    pub workflow_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            event_capacity: DEFAULT_EVENT_CAPACITY,
            workflow_capacity: DEFAULT_WORKFLOW_CAPACITY,
        }
    }
}

/// In-memory store for system events and workflow executions
#[derive(Debug)]
pub struct EventStore {
    config: StoreConfig,
    clock: Arc<dyn Clock>,
    events: RwLock<VecDeque<SystemEvent>>,
    workflows: RwLock<VecDeque<WorkflowExecution>>,
}

impl Default for EventStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl EventStore {
    pub fn new(config: StoreConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: StoreConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            events: RwLock::new(VecDeque::with_capacity(config.event_capacity)),
            workflows: RwLock::new(VecDeque::with_capacity(config.workflow_capacity)),
        }
    }

    pub fn config(&self) -> StoreConfig {
        self.config
    }

    /// Append a system event stamped with the current time
    pub fn record_event(
        &self,
        event_type: impl Into<String>,
        message: impl Into<String>,
        data: Value,
    ) {
        let event = SystemEvent::new(event_type, message, self.clock.now()).with_data(data);
        self.append_event(event);
    }

    /// Append a fully built event
    pub fn append_event(&self, event: SystemEvent) {
        let mut events = self.events.write().unwrap_or_else(PoisonError::into_inner);
        let evicted = push_bounded(&mut events, event, self.config.event_capacity);
        if evicted > 0 {
            tracing::trace!(evicted, retained = events.len(), "Evicted oldest system events");
        }
    }

    /// Append a workflow execution and the event describing it
    ///
    /// The two appends take different locks; a concurrent reader may see
    /// the execution a moment before its event.
    pub fn record_workflow_execution(&self, execution: WorkflowExecution) {
        let message = format!(
            "Workflow {} executed with status {}",
            execution.workflow_name, execution.status
        );
        let data = json!({
            "workflow_id": execution.workflow_id,
            "duration": execution.duration,
            "status": execution.status,
        });

        {
            let mut workflows = self.workflows.write().unwrap_or_else(PoisonError::into_inner);
            let evicted = push_bounded(&mut workflows, execution, self.config.workflow_capacity);
            if evicted > 0 {
                tracing::trace!(evicted, retained = workflows.len(), "Evicted oldest workflow executions");
            }
        }

        self.record_event(event_types::WORKFLOW_EXECUTION, message, data);
    }

    /// Most recent `limit` events, oldest first
    pub fn snapshot_events(&self, limit: usize) -> Vec<SystemEvent> {
        let events = self.events.read().unwrap_or_else(PoisonError::into_inner);
        tail(&events, limit)
    }

    /// Most recent `limit` workflow executions, oldest first
    pub fn snapshot_workflows(&self, limit: usize) -> Vec<WorkflowExecution> {
        let workflows = self.workflows.read().unwrap_or_else(PoisonError::into_inner);
        tail(&workflows, limit)
    }

    /// Look up a retained execution by id
    pub fn find_workflow(&self, workflow_id: &str) -> Result<WorkflowExecution> {
        let workflows = self.workflows.read().unwrap_or_else(PoisonError::into_inner);
        workflows
            .iter()
            .rev()
            .find(|w| w.workflow_id == workflow_id)
            .cloned()
            .ok_or_else(|| HubError::WorkflowNotFound(workflow_id.to_string()))
    }

    pub fn event_count(&self) -> usize {
        self.events.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn workflow_count(&self) -> usize {
        self.workflows.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Push and trim the head until `len <= capacity`. Returns how many were evicted.
fn push_bounded<T>(log: &mut VecDeque<T>, item: T, capacity: usize) -> usize {
    log.push_back(item);
    let excess = log.len().saturating_sub(capacity);
    log.drain(..excess);
    excess
}

fn tail<T: Clone>(log: &VecDeque<T>, limit: usize) -> Vec<T> {
    let skip = log.len().saturating_sub(limit);
    log.iter().skip(skip).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::models::WorkflowStatus;
    use chrono::{Duration, TimeZone, Utc};

    fn small_store() -> EventStore {
        EventStore::new(StoreConfig {
            event_capacity: 3,
            workflow_capacity: 2,
        })
    }

    fn execution(n: usize) -> WorkflowExecution {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        WorkflowExecution::succeeded(
            format!("wf-{n}"),
            "sync",
            start,
            start + Duration::milliseconds(n as i64),
            json!({ "n": n }),
            json!({}),
        )
        .unwrap()
    }

    #[test]
    fn test_push_bounded_evicts_head() {
        let mut log = VecDeque::new();
        for i in 0..5 {
            push_bounded(&mut log, i, 3);
        }
        assert_eq!(log, VecDeque::from(vec![2, 3, 4]));
    }

    #[test]
    fn test_push_bounded_zero_capacity() {
        let mut log = VecDeque::new();
        assert_eq!(push_bounded(&mut log, 1, 0), 1);
        assert!(log.is_empty());
    }

    #[test]
    fn test_event_cap() {
        let store = small_store();
        for i in 0..10 {
            store.record_event("test", format!("event {i}"), json!({}));
        }

        let events = store.snapshot_events(100);
        assert_eq!(events.len(), 3);
        let messages: Vec<_> = events.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["event 7", "event 8", "event 9"]);
    }

    #[test]
    fn test_snapshot_limit_keeps_most_recent() {
        let store = EventStore::default();
        for i in 0..10 {
            store.record_event("test", format!("event {i}"), json!({}));
        }

        let events = store.snapshot_events(2);
        assert_eq!(events[0].message, "event 8");
        assert_eq!(events[1].message, "event 9");
        assert!(store.snapshot_events(0).is_empty());
    }

    #[test]
    fn test_snapshot_is_independent_copy() {
        let store = EventStore::default();
        store.record_event("test", "first", json!({}));

        let mut snapshot = store.snapshot_events(10);
        snapshot.clear();
        store.record_event("test", "second", json!({}));

        assert_eq!(store.event_count(), 2);
    }

    #[test]
    fn test_workflow_execution_records_event() {
        let store = EventStore::default();
        store.record_workflow_execution(execution(7));

        assert_eq!(store.workflow_count(), 1);
        let events = store.snapshot_events(10);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, event_types::WORKFLOW_EXECUTION);
        assert_eq!(events[0].message, "Workflow sync executed with status success");
        assert_eq!(events[0].data["workflow_id"], "wf-7");
        assert_eq!(events[0].data["duration"], 7);
    }

    #[test]
    fn test_workflow_cap() {
        let store = small_store();
        for n in 1..=5 {
            store.record_workflow_execution(execution(n));
        }

        let ids: Vec<_> = store
            .snapshot_workflows(10)
            .into_iter()
            .map(|w| w.workflow_id)
            .collect();
        assert_eq!(ids, vec!["wf-4", "wf-5"]);
        assert_eq!(store.event_count(), 3);
    }

    #[test]
    fn test_find_workflow() {
        let store = EventStore::default();
        store.record_workflow_execution(execution(1));

        let found = store.find_workflow("wf-1").unwrap();
        assert_eq!(found.status, WorkflowStatus::Success);
        assert!(store.find_workflow("wf-404").unwrap_err().is_not_found());
    }

    #[test]
    fn test_events_use_injected_clock() {
        let at = Utc.with_ymd_and_hms(2025, 6, 1, 8, 30, 0).unwrap();
        let store = EventStore::with_clock(StoreConfig::default(), Arc::new(ManualClock::new(at)));
        store.record_event("test", "stamped", json!({}));

        assert_eq!(store.snapshot_events(1)[0].timestamp, at);
    }
}
