//! Prometheus metrics for the Integration Hub
//!
//! - `integration_hub_health_checks_total` (counter) - checks by service and result
//! - `integration_hub_health_check_duration_seconds` (histogram) - check latency
//! - `integration_hub_integration_up` (gauge) - 1 when a service is connected
//! - `integration_hub_webhooks_received_total` (counter) - webhooks by source
//! - `integration_hub_workflow_executions_total` (counter) - runs by status
//! - `integration_hub_refresh_cycles_total` (counter) - completed refresh cycles
//! - `integration_hub_retained_events` / `integration_hub_retained_workflows` (gauges)

use prometheus::{
    Counter, CounterVec, Gauge, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry,
};
use std::sync::Arc;
use std::time::Instant;

use super::{Result, TelemetryError};
use integration_hub_core::{IntegrationStatus, WorkflowStatus};

const NAMESPACE: &str = "integration_hub";

/// Webhook sources that get their own label value; anything else is `other`
pub const WEBHOOK_SOURCES: [&str; 10] = [
    "shared-context-server",
    "microsoft365",
    "github",
    "notion",
    "n8n",
    "slack",
    "jira",
    "salesforce",
    "teams",
    "unknown",
];

const OTHER_WEBHOOK_SOURCE: &str = "other";

/// Hub metrics for Prometheus
pub struct HubMetrics {
    health_checks_total: CounterVec,
    health_check_duration_seconds: HistogramVec,
    integration_up: GaugeVec,
    webhooks_received_total: CounterVec,
    workflow_executions_total: CounterVec,
    refresh_cycles_total: Counter,
    retained_events: Gauge,
    retained_workflows: Gauge,
}

impl HubMetrics {
    /// Create and register with the provided registry
    pub fn new(registry: Arc<Registry>) -> Result<Self> {
        let health_checks_total = CounterVec::new(
            Opts::new("health_checks_total", "Total collaborator health checks")
                .namespace(NAMESPACE),
            &["service", "result"],
        )?;

        let health_check_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "health_check_duration_seconds",
                "Collaborator health check duration in seconds",
            )
            .namespace(NAMESPACE)
            .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
            &["service"],
        )?;

        let integration_up = GaugeVec::new(
            Opts::new("integration_up", "Whether the collaborator is connected (1) or not (0)")
                .namespace(NAMESPACE),
            &["service"],
        )?;

        let webhooks_received_total = CounterVec::new(
            Opts::new("webhooks_received_total", "Total webhooks received")
                .namespace(NAMESPACE),
            &["source"],
        )?;

        let workflow_executions_total = CounterVec::new(
            Opts::new("workflow_executions_total", "Total workflow executions recorded")
                .namespace(NAMESPACE),
            &["status"],
        )?;

        let refresh_cycles_total = Counter::with_opts(
            Opts::new("refresh_cycles_total", "Total completed refresh cycles").namespace(NAMESPACE),
        )?;

        let retained_events = Gauge::with_opts(
            Opts::new("retained_events", "System events currently retained").namespace(NAMESPACE),
        )?;

        let retained_workflows = Gauge::with_opts(
            Opts::new("retained_workflows", "Workflow executions currently retained")
                .namespace(NAMESPACE),
        )?;

        registry.register(Box::new(health_checks_total.clone()))?;
        registry.register(Box::new(health_check_duration_seconds.clone()))?;
        registry.register(Box::new(integration_up.clone()))?;
        registry.register(Box::new(webhooks_received_total.clone()))?;
        registry.register(Box::new(workflow_executions_total.clone()))?;
        registry.register(Box::new(refresh_cycles_total.clone()))?;
        registry.register(Box::new(retained_events.clone()))?;
        registry.register(Box::new(retained_workflows.clone()))?;

        Ok(Self {
            health_checks_total,
            health_check_duration_seconds,
            integration_up,
            webhooks_received_total,
            workflow_executions_total,
            refresh_cycles_total,
            retained_events,
            retained_workflows,
        })
    }

    /// Record a health check outcome
    pub fn record_health_check(&self, service: &str, status: IntegrationStatus) {
        self.health_checks_total
            .with_label_values(&[service, status.as_str()])
            .inc();
        let up = if status.is_connected() { 1.0 } else { 0.0 };
        self.integration_up.with_label_values(&[service]).set(up);
    }

    pub fn observe_check_duration(&self, service: &str, duration_secs: f64) {
        self.health_check_duration_seconds
            .with_label_values(&[service])
            .observe(duration_secs);
    }

    /// Count a webhook. The label set stays fixed whatever `source` the
    /// caller sends.
    pub fn record_webhook(&self, source: &str) {
        self.webhooks_received_total
            .with_label_values(&[webhook_source_label(source)])
            .inc();
    }

    pub fn record_workflow(&self, status: WorkflowStatus) {
        self.workflow_executions_total
            .with_label_values(&[status.as_str()])
            .inc();
    }

    pub fn record_refresh_cycle(&self) {
        self.refresh_cycles_total.inc();
    }

    /// Set the store size gauges
    pub fn set_retained(&self, events: usize, workflows: usize) {
        self.retained_events.set(events as f64);
        self.retained_workflows.set(workflows as f64);
    }

    /// Start a probe timer (records duration on drop)
    pub fn start_probe_timer<'a>(&'a self, service: &'a str) -> ProbeTimer<'a> {
        ProbeTimer {
            start: Instant::now(),
            service,
            metrics: self,
        }
    }
}

fn webhook_source_label(source: &str) -> &str {
    WEBHOOK_SOURCES
        .iter()
        .copied()
        .find(|known| *known == source)
        .unwrap_or(OTHER_WEBHOOK_SOURCE)
}

/// RAII guard for timing a single collaborator probe
pub struct ProbeTimer<'a> {
    start: Instant,
    service: &'a str,
    metrics: &'a HubMetrics,
}

impl<'a> ProbeTimer<'a> {
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl<'a> Drop for ProbeTimer<'a> {
    fn drop(&mut self) {
        self.metrics
            .observe_check_duration(self.service, self.start.elapsed().as_secs_f64());
    }
}

/// Registry owning all hub metrics
pub struct HubMetricsRegistry {
    registry: Arc<Registry>,
    hub: HubMetrics,
}

impl HubMetricsRegistry {
    pub fn new() -> Result<Self> {
        Self::with_registry(Arc::new(Registry::new()))
    }

    /// Create with an existing Prometheus registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let hub = HubMetrics::new(Arc::clone(&registry))?;
        Ok(Self { registry, hub })
    }

    pub fn hub(&self) -> &HubMetrics {
        &self.hub
    }

    /// Encode metrics as text for scraping
    pub fn encode_text(&self) -> Result<String> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| TelemetryError::Encoding(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| TelemetryError::Encoding(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_health_check_sets_up_gauge() {
        let registry = HubMetricsRegistry::new().unwrap();
        registry
            .hub()
            .record_health_check("github", IntegrationStatus::Connected);
        registry
            .hub()
            .record_health_check("n8n", IntegrationStatus::Error);

        let text = registry.encode_text().unwrap();
        assert!(text.contains(r#"integration_hub_integration_up{service="github"} 1"#));
        assert!(text.contains(r#"integration_hub_integration_up{service="n8n"} 0"#));
        assert!(text.lines().any(|line| line.starts_with("integration_hub_health_checks_total{")
            && line.contains(r#"result="error""#)
            && line.contains(r#"service="n8n""#)
            && line.ends_with(" 1")));
    }

    #[test]
    fn test_probe_timer_observes_on_drop() {
        let registry = HubMetricsRegistry::new().unwrap();
        {
            let _timer = registry.hub().start_probe_timer("notion");
        }
        let text = registry.encode_text().unwrap();
        assert!(text.contains(r#"integration_hub_health_check_duration_seconds_count{service="notion"} 1"#));
    }

    #[test]
    fn test_double_registration_fails() {
        let shared = Arc::new(Registry::new());
        assert!(HubMetricsRegistry::with_registry(Arc::clone(&shared)).is_ok());
        assert!(HubMetricsRegistry::with_registry(shared).is_err());
    }

    #[test]
    fn test_workflow_and_webhook_counters() {
        let registry = HubMetricsRegistry::new().unwrap();
        registry.hub().record_webhook("github");
        registry.hub().record_workflow(WorkflowStatus::Success);
        registry.hub().set_retained(3, 1);

        let text = registry.encode_text().unwrap();
        assert!(text.contains(r#"integration_hub_webhooks_received_total{source="github"} 1"#));
        assert!(text.contains(r#"integration_hub_workflow_executions_total{status="success"} 1"#));
        assert!(text.contains("integration_hub_retained_events 3"));
    }

    #[test]
    fn test_webhook_series_stay_bounded() {
        let registry = HubMetricsRegistry::new().unwrap();
        for i in 0..2000 {
            registry.hub().record_webhook(&format!("src-{}", i));
        }
        registry.hub().record_webhook("n8n");

        let text = registry.encode_text().unwrap();
        let series: Vec<&str> = text
            .lines()
            .filter(|line| line.starts_with("integration_hub_webhooks_received_total{"))
            .collect();
        assert_eq!(series.len(), 2);
        assert!(text.contains(r#"integration_hub_webhooks_received_total{source="other"} 2000"#));
        assert!(text.contains(r#"integration_hub_webhooks_received_total{source="n8n"} 1"#));
    }
}
