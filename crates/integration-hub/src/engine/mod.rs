//! Background refresh engine
//!
//! Polls every collaborator concurrently, each probe bounded by the request
//! timeout, and folds the outcomes into the registry. Runs on a fixed tokio
//! interval until the shutdown watch flips.

mod checkers;

pub use checkers::*;

use futures::future::join_all;
use integration_hub_core::{event_types, IntegrationHub, IntegrationStatus};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};

use crate::client::CollaboratorClient;
use crate::telemetry::HubMetricsRegistry;

/// Lower bound on the jitter sub-interval
const MIN_JITTER_INTERVAL: Duration = Duration::from_secs(1);

/// Trait for collaborator probes
pub trait CollaboratorProbe: Send + Sync {
    /// Registry key of the probed service
    fn service(&self) -> &'static str;

    /// Probe the collaborator (takes an owned client handle to avoid lifetime issues)
    fn probe(
        &self,
        client: Arc<CollaboratorClient>,
    ) -> Pin<Box<dyn Future<Output = ProbeOutcome> + Send>>;
}

/// Summary of one refresh cycle
#[derive(Debug, Clone, Serialize)]
pub struct RefreshReport {
    pub connected: usize,
    pub total: usize,
    pub statuses: BTreeMap<String, IntegrationStatus>,
}

/// Refresh engine shared by the background task and the `check` command
pub struct RefreshEngine {
    hub: Arc<IntegrationHub>,
    client: Arc<CollaboratorClient>,
    metrics: Arc<HubMetricsRegistry>,
    probes: Vec<Box<dyn CollaboratorProbe>>,
    /// SCS session ids opened during bootstrap, by service
    sessions: RwLock<BTreeMap<String, String>>,
    jitter_rng: Mutex<StdRng>,
}

impl RefreshEngine {
    /// Create new engine with the default probes
    pub fn new(
        hub: Arc<IntegrationHub>,
        client: Arc<CollaboratorClient>,
        metrics: Arc<HubMetricsRegistry>,
    ) -> Self {
        Self::with_probes(hub, client, metrics, default_probes())
    }

    pub fn with_probes(
        hub: Arc<IntegrationHub>,
        client: Arc<CollaboratorClient>,
        metrics: Arc<HubMetricsRegistry>,
        probes: Vec<Box<dyn CollaboratorProbe>>,
    ) -> Self {
        Self {
            hub,
            client,
            metrics,
            probes,
            sessions: RwLock::new(BTreeMap::new()),
            jitter_rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Seed the jitter source for reproducible response times
    pub fn with_jitter_seed(self, seed: u64) -> Self {
        Self {
            jitter_rng: Mutex::new(StdRng::seed_from_u64(seed)),
            ..self
        }
    }

    pub fn session_id(&self, service: &str) -> Option<String> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(service)
            .cloned()
    }

    /// Open SCS sessions for the configured collaborators, then poll once
    pub async fn initialize(&self) -> RefreshReport {
        let config = self.client.config();
        let mut wanted: Vec<(&str, &str, Value)> = Vec::new();

        if config.microsoft365.is_configured() {
            wanted.push((
                "microsoft365",
                "Microsoft 365 Integration",
                json!({ "service": "microsoft365", "tenant": config.microsoft365.tenant_id }),
            ));
        }
        if config.github.token.is_some() {
            wanted.push((
                "github",
                "GitHub Enterprise Integration",
                json!({ "service": "github", "enterprise_url": config.github.api_url }),
            ));
        }
        if config.notion.is_configured() {
            wanted.push((
                "notion",
                "Notion Documentation Integration",
                json!({ "service": "notion", "database_id": config.notion.database_id }),
            ));
        }

        for (service, purpose, metadata) in wanted {
            match self.client.create_scs_session(purpose, metadata).await {
                Ok(body) => {
                    if let Some(session_id) = body.get("session_id").and_then(Value::as_str) {
                        tracing::info!(service, session_id, "Opened context session");
                        self.sessions
                            .write()
                            .unwrap_or_else(PoisonError::into_inner)
                            .insert(service.to_string(), session_id.to_string());
                    }
                }
                Err(e) => {
                    tracing::warn!(service, error = %e, "Failed to open context session");
                }
            }
        }

        self.poll_once().await
    }

    /// Run one refresh cycle
    pub async fn poll_once(&self) -> RefreshReport {
        let request_timeout = self.client.request_timeout();
        let hub_metrics = self.metrics.hub();

        let checks = self.probes.iter().map(|probe| {
            let service = probe.service();
            let check = probe.probe(Arc::clone(&self.client));
            async move {
                let timer = hub_metrics.start_probe_timer(service);
                let outcome = match timeout(request_timeout, check).await {
                    Ok(outcome) => outcome,
                    Err(_) => ProbeOutcome::Failed {
                        latency_ms: timer.elapsed_ms(),
                        error: format!(
                            "Health check timed out after {}ms",
                            request_timeout.as_millis()
                        ),
                    },
                };
                (service, outcome)
            }
        });

        let mut statuses = BTreeMap::new();
        for (service, outcome) in join_all(checks).await {
            let status = self.apply(service, outcome);
            hub_metrics.record_health_check(service, status);
            statuses.insert(service.to_string(), status);
        }

        if self.client.config().synthetic_jitter {
            self.jitter();
        }

        let registry = self.hub.registry();
        let connected = registry.connected_count();
        let total = registry.len();
        self.hub.store().record_event(
            event_types::HEALTH_CHECK,
            format!("Health check completed: {}/{} integrations connected", connected, total),
            json!({ "connected": connected, "total": total }),
        );

        hub_metrics.record_refresh_cycle();
        hub_metrics.set_retained(self.hub.store().event_count(), self.hub.store().workflow_count());
        tracing::debug!(connected, total, "Refresh cycle completed");

        RefreshReport {
            connected,
            total,
            statuses,
        }
    }

    fn apply(&self, service: &str, outcome: ProbeOutcome) -> IntegrationStatus {
        let registry = self.hub.registry();
        let metric = match outcome {
            ProbeOutcome::Reachable {
                latency_ms,
                mut details,
            } => {
                self.attach_session(service, &mut details);
                registry.upsert_with_details(
                    service,
                    IntegrationStatus::Connected,
                    latency_ms,
                    true,
                    details,
                )
            }
            ProbeOutcome::Failed { latency_ms, error } => {
                tracing::warn!(service, error = %error, "Collaborator check failed");
                let mut details = Map::new();
                details.insert("error".to_string(), Value::String(error));
                registry.upsert_with_details(
                    service,
                    IntegrationStatus::Error,
                    latency_ms,
                    false,
                    details,
                )
            }
            ProbeOutcome::Configured { mut details } => {
                self.attach_session(service, &mut details);
                registry.mark(service, IntegrationStatus::Connected, details)
            }
            ProbeOutcome::NotConfigured { reason } => {
                let mut details = Map::new();
                details.insert("error".to_string(), Value::String(reason));
                registry.mark(service, IntegrationStatus::Disconnected, details)
            }
        };
        metric.status
    }

    fn attach_session(&self, service: &str, details: &mut Map<String, Value>) {
        if let Some(session_id) = self.session_id(service) {
            details.insert("session_id".to_string(), Value::String(session_id));
        }
    }

    fn jitter(&self) {
        let mut rng = self.jitter_rng.lock().unwrap_or_else(PoisonError::into_inner);
        self.hub.registry().apply_jitter(&mut *rng);
    }

    /// Poll on the refresh interval until `shutdown` becomes true or its
    /// sender is dropped
    ///
    /// The first poll happens one interval after the call; the startup poll
    /// belongs to [`initialize`](Self::initialize).
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let refresh_every = self.client.config().refresh_interval;
        let jitter_every = (refresh_every / 4).max(MIN_JITTER_INTERVAL);
        let jitter_enabled = self.client.config().synthetic_jitter;

        let started = Instant::now();
        let mut refresh = interval_at(started + refresh_every, refresh_every);
        refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut jitter = interval_at(started + jitter_every, jitter_every);
        jitter.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            interval_secs = refresh_every.as_secs(),
            "Refresh loop started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = refresh.tick() => {
                    self.poll_once().await;
                }
                _ = jitter.tick(), if jitter_enabled => {
                    self.jitter();
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Refresh loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HubConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct CountingCollaborator {
        service: &'static str,
        calls: Arc<AtomicUsize>,
    }

    impl CollaboratorProbe for CountingCollaborator {
        fn service(&self) -> &'static str {
            self.service
        }

        fn probe(
            &self,
            _client: Arc<CollaboratorClient>,
        ) -> Pin<Box<dyn Future<Output = ProbeOutcome> + Send>> {
            let calls = Arc::clone(&self.calls);
            Box::pin(async move {
                calls.fetch_add(1, Ordering::SeqCst);
                ProbeOutcome::Reachable {
                    latency_ms: 12.0,
                    details: Map::new(),
                }
            })
        }
    }

    struct StuckProbe;

    impl CollaboratorProbe for StuckProbe {
        fn service(&self) -> &'static str {
            "n8n"
        }

        fn probe(
            &self,
            _client: Arc<CollaboratorClient>,
        ) -> Pin<Box<dyn Future<Output = ProbeOutcome> + Send>> {
            Box::pin(std::future::pending())
        }
    }

    fn engine_with(config: HubConfig, probes: Vec<Box<dyn CollaboratorProbe>>) -> Arc<RefreshEngine> {
        let hub = Arc::new(IntegrationHub::default());
        let client = Arc::new(CollaboratorClient::new(config).unwrap());
        let metrics = Arc::new(HubMetricsRegistry::new().unwrap());
        Arc::new(RefreshEngine::with_probes(hub, client, metrics, probes).with_jitter_seed(7))
    }

    fn mock_config(server: &MockServer) -> HubConfig {
        let mut config = HubConfig::default();
        config.scs.url = server.uri();
        config.n8n.url = server.uri();
        config.github.api_url = server.uri();
        config.synthetic_jitter = false;
        config
    }

    #[tokio::test]
    async fn test_poll_once_updates_registry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "healthy"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/active"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let hub = Arc::new(IntegrationHub::default());
        let client = Arc::new(CollaboratorClient::new(mock_config(&server)).unwrap());
        let metrics = Arc::new(HubMetricsRegistry::new().unwrap());
        let engine = RefreshEngine::new(Arc::clone(&hub), client, metrics);

        let report = engine.poll_once().await;

        let registry = hub.registry();
        let scs = registry.get("shared-context-server").unwrap();
        assert_eq!(scs.status, IntegrationStatus::Connected);
        assert_eq!(scs.total_requests, 1);
        assert_eq!(scs.details["status"], "healthy");

        let n8n = registry.get("n8n").unwrap();
        assert_eq!(n8n.status, IntegrationStatus::Error);
        assert_eq!(n8n.error_count, 1);
        assert_eq!(n8n.success_rate, 0.0);
        assert!(n8n.details["error"].as_str().unwrap().contains("500"));

        // no credentials: marked, never counted
        let github = registry.get("github").unwrap();
        assert_eq!(github.status, IntegrationStatus::Disconnected);
        assert_eq!(github.total_requests, 0);

        assert_eq!(report.connected, 1);
        assert_eq!(report.total, 6);

        let events = hub.store().snapshot_events(10);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, event_types::HEALTH_CHECK);
        assert!(events[0].message.contains("1/6"));
    }

    #[tokio::test]
    async fn test_initialize_opens_sessions_for_configured_services() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/sessions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"session_id": "sess-1"})))
            .mount(&server)
            .await;

        let mut config = mock_config(&server);
        config.microsoft365.tenant_id = Some("tenant".to_string());
        config.microsoft365.client_id = Some("client".to_string());

        let engine = engine_with(config, vec![Box::new(Microsoft365Probe), Box::new(NotionProbe)]);
        engine.initialize().await;

        assert_eq!(engine.session_id("microsoft365").as_deref(), Some("sess-1"));
        assert!(engine.session_id("notion").is_none());

        let registry = engine.hub.registry();
        let ms365 = registry.get("microsoft365").unwrap();
        assert_eq!(ms365.status, IntegrationStatus::Connected);
        assert_eq!(ms365.details["session_id"], "sess-1");
        assert_eq!(
            registry.get("notion").unwrap().status,
            IntegrationStatus::Disconnected
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_timeout_marks_error() {
        let config = HubConfig::default().with_request_timeout(Duration::from_millis(50));
        let engine = engine_with(config, vec![Box::new(StuckProbe)]);

        engine.poll_once().await;

        let n8n = engine.hub.registry().get("n8n").unwrap();
        assert_eq!(n8n.status, IntegrationStatus::Error);
        assert!(n8n.details["error"].as_str().unwrap().contains("timed out"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_polls_on_interval_and_stops_on_shutdown() {
        let calls = Arc::new(AtomicUsize::new(0));
        let config = HubConfig::default().with_refresh_interval(Duration::from_secs(60));
        let engine = engine_with(
            config,
            vec![Box::new(CountingCollaborator {
                service: "github",
                calls: Arc::clone(&calls),
            })],
        );

        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(Arc::clone(&engine).run(rx));

        // first poll waits a full interval
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        tx.send(true).unwrap();
        tokio_test::assert_ok!(task.await);

        // nothing polls after shutdown
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_startup_polls_once_before_interval() {
        let calls = Arc::new(AtomicUsize::new(0));
        let config = HubConfig::default().with_refresh_interval(Duration::from_secs(60));
        let engine = engine_with(
            config,
            vec![Box::new(CountingCollaborator {
                service: "github",
                calls: Arc::clone(&calls),
            })],
        );

        engine.initialize().await;
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(Arc::clone(&engine).run(rx));

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(engine.hub.registry().get("github").unwrap().total_requests, 1);
        let health_checks = engine
            .hub
            .store()
            .snapshot_events(usize::MAX)
            .iter()
            .filter(|e| e.event_type == event_types::HEALTH_CHECK)
            .count();
        assert_eq!(health_checks, 1);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        tx.send(true).unwrap();
        tokio_test::assert_ok!(task.await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_when_sender_dropped() {
        let engine = engine_with(HubConfig::default(), Vec::new());
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(Arc::clone(&engine).run(rx));

        drop(tx);
        tokio_test::assert_ok!(task.await);
    }
}
