//! Records held by the hub
//!
//! Defines the live per-service health metric, the immutable workflow
//! execution record and the immutable system event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::{HubError, Result};

/// Event type tags written by the hub itself
pub mod event_types {
    pub const WEBHOOK_RECEIVED: &str = "webhook_received";
    pub const WORKFLOW_EXECUTION: &str = "workflow_execution";
    pub const HEALTH_CHECK: &str = "health_check";
}

/// Connection status of a collaborator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationStatus {
    /// Last check succeeded
    Connected,
    /// Not configured (missing credentials)
    Disconnected,
    /// Last check failed
    Error,
    /// Never checked
    #[default]
    Unknown,
}

impl IntegrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntegrationStatus::Connected => "connected",
            IntegrationStatus::Disconnected => "disconnected",
            IntegrationStatus::Error => "error",
            IntegrationStatus::Unknown => "unknown",
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, IntegrationStatus::Connected)
    }
}

impl fmt::Display for IntegrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Live health record for one monitored service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationMetric {
    /// Service name (registry key)
    pub service: String,

    /// Current connection status
    pub status: IntegrationStatus,

    /// Last observed response time in milliseconds
    pub response_time: f64,

    /// Percentage of requests that succeeded (0-100)
    pub success_rate: f64,

    /// Timestamp of the last successful check
    pub last_success: Option<DateTime<Utc>>,

    /// Timestamp of the last failed check
    pub last_error: Option<DateTime<Utc>>,

    /// Timestamp of the last status change of any kind
    pub last_check: Option<DateTime<Utc>>,

    /// Cumulative requests issued to the service
    pub total_requests: u64,

    /// Cumulative failed requests (never exceeds `total_requests`)
    pub error_count: u64,

    /// Percentage of health checks that succeeded since process start
    pub uptime_percentage: f64,

    /// Last collaborator payload or error message
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub details: Map<String, Value>,

    #[serde(skip)]
    checks_total: u64,

    #[serde(skip)]
    checks_successful: u64,
}

impl IntegrationMetric {
    /// Neutral record for a service that has not been checked yet
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            status: IntegrationStatus::Unknown,
            response_time: 0.0,
            success_rate: 100.0,
            last_success: None,
            last_error: None,
            last_check: None,
            total_requests: 0,
            error_count: 0,
            uptime_percentage: 100.0,
            details: Map::new(),
            checks_total: 0,
            checks_successful: 0,
        }
    }

    /// Fold one check outcome into the counters
    pub(crate) fn record_check(
        &mut self,
        status: IntegrationStatus,
        response_time_ms: f64,
        success: bool,
        at: DateTime<Utc>,
    ) {
        self.status = status;
        self.response_time = response_time_ms.max(0.0);
        self.last_check = Some(at);

        self.total_requests += 1;
        self.checks_total += 1;
        if success {
            self.checks_successful += 1;
            self.last_success = Some(at);
        } else {
            self.error_count += 1;
            self.last_error = Some(at);
        }

        self.success_rate = percentage(self.total_requests - self.error_count, self.total_requests)
            .unwrap_or(self.success_rate);
        self.uptime_percentage =
            percentage(self.checks_successful, self.checks_total).unwrap_or(self.uptime_percentage);
    }

    /// Number of checks folded in since process start
    pub fn checks_total(&self) -> u64 {
        self.checks_total
    }
}

fn percentage(part: u64, whole: u64) -> Option<f64> {
    if whole == 0 {
        None
    } else {
        Some(100.0 * part as f64 / whole as f64)
    }
}

/// Outcome of a workflow run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Running,
    Success,
    Error,
}

impl WorkflowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::Running => "running",
            WorkflowStatus::Success => "success",
            WorkflowStatus::Error => "error",
        }
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One workflow run. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExecution {
    /// Unique per run
    pub workflow_id: String,

    pub workflow_name: String,

    pub status: WorkflowStatus,

    pub start_time: DateTime<Utc>,

    /// Absent while running
    pub end_time: Option<DateTime<Utc>>,

    /// `end_time - start_time` in milliseconds, 0 while running
    pub duration: u64,

    pub input_data: Value,

    pub output_data: Value,

    /// Present only when `status` is `error`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl WorkflowExecution {
    /// Record a run that has started but not finished
    pub fn running(
        workflow_id: impl Into<String>,
        workflow_name: impl Into<String>,
        start_time: DateTime<Utc>,
        input_data: Value,
    ) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            workflow_name: workflow_name.into(),
            status: WorkflowStatus::Running,
            start_time,
            end_time: None,
            duration: 0,
            input_data,
            output_data: Value::Null,
            error_message: None,
        }
    }

    /// Record a run that completed successfully
    pub fn succeeded(
        workflow_id: impl Into<String>,
        workflow_name: impl Into<String>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        input_data: Value,
        output_data: Value,
    ) -> Result<Self> {
        let duration = duration_ms(start_time, end_time)?;
        Ok(Self {
            workflow_id: workflow_id.into(),
            workflow_name: workflow_name.into(),
            status: WorkflowStatus::Success,
            start_time,
            end_time: Some(end_time),
            duration,
            input_data,
            output_data,
            error_message: None,
        })
    }

    /// Record a run that ended in an error
    pub fn failed(
        workflow_id: impl Into<String>,
        workflow_name: impl Into<String>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        input_data: Value,
        error_message: impl Into<String>,
    ) -> Result<Self> {
        let duration = duration_ms(start_time, end_time)?;
        Ok(Self {
            workflow_id: workflow_id.into(),
            workflow_name: workflow_name.into(),
            status: WorkflowStatus::Error,
            start_time,
            end_time: Some(end_time),
            duration,
            input_data,
            output_data: Value::Null,
            error_message: Some(error_message.into()),
        })
    }
}

fn duration_ms(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<u64> {
    let millis = (end - start).num_milliseconds();
    u64::try_from(millis).map_err(|_| {
        HubError::invalid_execution(format!(
            "end time {} precedes start time {}",
            end.to_rfc3339(),
            start.to_rfc3339()
        ))
    })
}

/// A notable occurrence. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemEvent {
    #[serde(rename = "type")]
    pub event_type: String,

    pub message: String,

    pub timestamp: DateTime<Utc>,

    /// Originating system, set for webhooks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    #[serde(default)]
    pub data: Value,
}

impl SystemEvent {
    pub fn new(
        event_type: impl Into<String>,
        message: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            message: message.into(),
            timestamp,
            source: None,
            data: Value::Object(Map::new()),
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }
}
