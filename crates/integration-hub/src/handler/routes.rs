//! Route handlers
//!
//! - GET  /                      - dashboard page
//! - GET  /health                - liveness
//! - GET  /metrics               - Prometheus text exposition
//! - GET  /api/status            - aggregate status with live SCS and n8n checks
//! - GET  /api/metrics           - per-service integration metrics
//! - GET  /api/workflows         - recent workflow executions (`?limit=`, default 50)
//! - GET  /api/workflows/:id     - one retained execution
//! - POST /api/workflows/email   - run the email workflow
//! - GET  /api/events            - recent system events (`?limit=`, default 100)
//! - POST /api/webhook           - record an inbound webhook (64 KiB max)

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use integration_hub_core::{
    event_types, HubError, IntegrationMetric, SystemEvent, WorkflowExecution,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::AppState;
use crate::client::CollaboratorClient;
use crate::telemetry::TelemetryError;
use crate::workflow::EmailRequest;

pub const DEFAULT_WORKFLOW_LIMIT: usize = 50;
pub const DEFAULT_EVENT_LIMIT: usize = 100;

/// Largest webhook body accepted; the body is retained as event data
pub const WEBHOOK_BODY_LIMIT: usize = 64 * 1024;

const DASHBOARD_HTML: &str = include_str!("../../assets/dashboard.html");

/// API error types
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    InternalError(String),
}

impl ApiError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) | ApiError::NotFound(msg) | ApiError::InternalError(msg) => {
                msg
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::InternalError(msg) = &self {
            tracing::error!(error = %msg, "Request failed");
        }
        let body = ErrorBody {
            error: self.message().to_string(),
            code: self.error_code(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

impl From<HubError> for ApiError {
    fn from(err: HubError) -> Self {
        if err.is_not_found() {
            ApiError::NotFound(err.to_string())
        } else {
            ApiError::InternalError(err.to_string())
        }
    }
}

impl From<TelemetryError> for ApiError {
    fn from(err: TelemetryError) -> Self {
        ApiError::InternalError(err.to_string())
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: &'static str,
}

/// Query parameters for the list endpoints
#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct SystemStatusResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub total_integrations: usize,
    pub connected_integrations: usize,
    pub integration_health: Value,
    pub n8n_status: Value,
    pub workflow_executions: usize,
    pub system_events: usize,
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub success: bool,
}

/// GET / - dashboard page
pub async fn dashboard() -> Html<&'static str> {
    Html(DASHBOARD_HTML)
}

/// GET /health
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: state.hub.now(),
    })
}

/// GET /api/status
///
/// SCS and n8n are queried live and concurrently. Their failures are
/// embedded in the response rather than failing the request.
pub async fn system_status(State(state): State<Arc<AppState>>) -> Json<SystemStatusResponse> {
    let (integration_health, n8n_status) =
        tokio::join!(scs_status(&state.client), n8n_status(&state.client));

    let registry = state.hub.registry();
    let store = state.hub.store();

    Json(SystemStatusResponse {
        status: "healthy",
        timestamp: state.hub.now(),
        total_integrations: registry.len(),
        connected_integrations: registry.connected_count(),
        integration_health,
        n8n_status,
        workflow_executions: store.workflow_count(),
        system_events: store.event_count(),
    })
}

async fn scs_status(client: &CollaboratorClient) -> Value {
    match client.scs_health().await {
        Ok(body) => body,
        Err(e) => json!({ "status": "error", "error": e.to_string() }),
    }
}

async fn n8n_status(client: &CollaboratorClient) -> Value {
    match client.n8n_active_workflows().await {
        Ok(active) => json!({ "status": "connected", "active_workflows": active }),
        Err(e) => json!({ "status": "error", "error": e.to_string() }),
    }
}

/// GET /api/metrics
pub async fn integration_metrics(
    State(state): State<Arc<AppState>>,
) -> Json<BTreeMap<String, IntegrationMetric>> {
    Json(state.hub.registry().list_all())
}

/// GET /api/workflows
pub async fn workflow_executions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LimitQuery>,
) -> Json<Vec<WorkflowExecution>> {
    let limit = query.limit.unwrap_or(DEFAULT_WORKFLOW_LIMIT);
    Json(state.hub.store().snapshot_workflows(limit))
}

/// GET /api/workflows/:workflow_id
pub async fn workflow_execution(
    State(state): State<Arc<AppState>>,
    Path(workflow_id): Path<String>,
) -> Result<Json<WorkflowExecution>, ApiError> {
    Ok(Json(state.hub.store().find_workflow(&workflow_id)?))
}

/// POST /api/workflows/email
pub async fn run_email_workflow(
    State(state): State<Arc<AppState>>,
    Json(email): Json<EmailRequest>,
) -> Result<Json<WorkflowExecution>, ApiError> {
    let session_id = state.engine.session_id("microsoft365");
    let execution = state.email_workflow.execute(email, session_id).await?;
    Ok(Json(execution))
}

/// GET /api/events
pub async fn system_events(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LimitQuery>,
) -> Json<Vec<SystemEvent>> {
    let limit = query.limit.unwrap_or(DEFAULT_EVENT_LIMIT);
    Json(state.hub.store().snapshot_events(limit))
}

/// POST /api/webhook
///
/// The body is parsed by hand so malformed JSON maps to the hub's own 400
/// body and leaves the store untouched.
pub async fn handle_webhook(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    let payload: Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid JSON payload: {}", e)))?;

    let source = webhook_source(&payload).to_string();
    tracing::info!(source = %source, "Webhook received");

    let event = SystemEvent::new(
        event_types::WEBHOOK_RECEIVED,
        format!("Webhook received from {}", source),
        state.hub.now(),
    )
    .with_source(source.as_str())
    .with_data(payload);

    state.hub.store().append_event(event);
    state.metrics.hub().record_webhook(&source);

    Ok(Json(WebhookAck { success: true }))
}

/// The `type` field of an object body, or `unknown`
fn webhook_source(payload: &Value) -> &str {
    payload
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
}

/// GET /metrics
pub async fn prometheus_metrics(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let store = state.hub.store();
    state
        .metrics
        .hub()
        .set_retained(store.event_count(), store.workflow_count());

    let text = state.metrics.encode_text()?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        text,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_status_codes() {
        assert_eq!(
            ApiError::BadRequest("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::NotFound("x".into()).error_code(), "NOT_FOUND");
        assert_eq!(
            ApiError::InternalError("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_hub_error_conversion() {
        let not_found: ApiError = HubError::WorkflowNotFound("wf".into()).into();
        assert!(matches!(not_found, ApiError::NotFound(_)));

        let invalid: ApiError = HubError::invalid_execution("bad").into();
        assert!(matches!(invalid, ApiError::InternalError(_)));
    }

    #[test]
    fn test_webhook_source_degrades_to_unknown() {
        assert_eq!(webhook_source(&json!({"type": "github"})), "github");
        assert_eq!(webhook_source(&json!({"type": 42})), "unknown");
        assert_eq!(webhook_source(&json!({})), "unknown");
        assert_eq!(webhook_source(&json!([1, 2, 3])), "unknown");
        assert_eq!(webhook_source(&json!("push")), "unknown");
    }
}
