//! HTTP handler for the Integration Hub
//!
//! Read API, webhook ingest and the dashboard page.

mod routes;

pub use routes::*;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use integration_hub_core::IntegrationHub;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::client::CollaboratorClient;
use crate::engine::RefreshEngine;
use crate::telemetry::HubMetricsRegistry;
use crate::workflow::EmailWorkflow;

/// Application state shared by every handler and the refresh task
pub struct AppState {
    pub hub: Arc<IntegrationHub>,
    pub client: Arc<CollaboratorClient>,
    pub metrics: Arc<HubMetricsRegistry>,
    pub engine: Arc<RefreshEngine>,
    pub email_workflow: EmailWorkflow,
}

impl AppState {
    pub fn new(
        hub: Arc<IntegrationHub>,
        client: Arc<CollaboratorClient>,
        metrics: Arc<HubMetricsRegistry>,
    ) -> Self {
        let engine = Arc::new(RefreshEngine::new(
            Arc::clone(&hub),
            Arc::clone(&client),
            Arc::clone(&metrics),
        ));
        Self::with_engine(hub, client, metrics, engine)
    }

    /// Build state around an existing engine
    pub fn with_engine(
        hub: Arc<IntegrationHub>,
        client: Arc<CollaboratorClient>,
        metrics: Arc<HubMetricsRegistry>,
        engine: Arc<RefreshEngine>,
    ) -> Self {
        let email_workflow =
            EmailWorkflow::new(Arc::clone(&hub), Arc::clone(&client), Arc::clone(&metrics));
        Self {
            hub,
            client,
            metrics,
            engine,
            email_workflow,
        }
    }
}

/// Create the router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(dashboard))
        .route("/health", get(health_check))
        .route("/metrics", get(prometheus_metrics))
        .route("/api/status", get(system_status))
        .route("/api/metrics", get(integration_metrics))
        .route("/api/workflows", get(workflow_executions))
        .route("/api/workflows/email", post(run_email_workflow))
        .route("/api/workflows/:workflow_id", get(workflow_execution))
        .route("/api/events", get(system_events))
        .route(
            "/api/webhook",
            post(handle_webhook).layer(DefaultBodyLimit::max(WEBHOOK_BODY_LIMIT)),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
