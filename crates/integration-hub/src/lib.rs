//! Enterprise Integration Hub
//!
//! Polls collaborator APIs (Shared Context Server, n8n, GitHub, Notion,
//! Microsoft 365 and a handful of external SaaS APIs), relays their health
//! into the shared [`IntegrationHub`](integration_hub_core::IntegrationHub)
//! and serves it through a small read API and dashboard.
//!
//! - `client`: one shared outbound HTTP client
//! - `engine`: concurrent collaborator probes on a fixed interval
//! - `handler`: axum router for the read API, webhooks and dashboard
//! - `workflow`: the email → GitHub → Notion workflow
//! - `telemetry`: Prometheus metrics

pub mod client;
pub mod config;
pub mod engine;
pub mod handler;
pub mod telemetry;
pub mod workflow;

pub use client::{ClientError, CollaboratorClient};
pub use config::HubConfig;
pub use engine::{RefreshEngine, RefreshReport};
pub use handler::{create_router, AppState};
pub use telemetry::HubMetricsRegistry;
pub use workflow::{EmailRequest, EmailWorkflow};
