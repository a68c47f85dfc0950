//! Collaborator probe implementations
//!
//! One probe per registry service. Probes never fail: every outcome,
//! including a network error, is folded into a [`ProbeOutcome`].

use serde_json::{json, Map, Value};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use crate::client::{ClientError, CollaboratorClient};
use crate::engine::CollaboratorProbe;

/// Result of probing one collaborator
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    /// The collaborator answered with a 2xx
    Reachable {
        latency_ms: f64,
        details: Map<String, Value>,
    },
    /// Non-2xx, network failure or timeout
    Failed { latency_ms: f64, error: String },
    /// Credentials present; nothing to call
    Configured { details: Map<String, Value> },
    /// Credentials missing
    NotConfigured { reason: String },
}

impl ProbeOutcome {
    fn from_call(start: Instant, result: Result<Map<String, Value>, ClientError>) -> Self {
        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
        match result {
            Ok(details) => ProbeOutcome::Reachable { latency_ms, details },
            Err(ClientError::NotConfigured(service)) => ProbeOutcome::NotConfigured {
                reason: format!("{}_credentials_not_configured", service),
            },
            Err(e) => ProbeOutcome::Failed {
                latency_ms,
                error: e.to_string(),
            },
        }
    }
}

type ProbeFuture = Pin<Box<dyn Future<Output = ProbeOutcome> + Send>>;

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("response".to_string(), other);
            map
        }
    }
}

/// Shared Context Server `/health`
pub struct ScsProbe;

impl CollaboratorProbe for ScsProbe {
    fn service(&self) -> &'static str {
        "shared-context-server"
    }

    fn probe(&self, client: Arc<CollaboratorClient>) -> ProbeFuture {
        Box::pin(async move {
            let start = Instant::now();
            let result = client.scs_health().await.map(object);
            ProbeOutcome::from_call(start, result)
        })
    }
}

/// n8n `/rest/active`
pub struct N8nProbe;

impl CollaboratorProbe for N8nProbe {
    fn service(&self) -> &'static str {
        "n8n"
    }

    fn probe(&self, client: Arc<CollaboratorClient>) -> ProbeFuture {
        Box::pin(async move {
            let start = Instant::now();
            let url = client.config().n8n.url.clone();
            let result = client.n8n_active_workflows().await.map(|active| {
                object(json!({
                    "active_workflows": active,
                    "url": url,
                }))
            });
            ProbeOutcome::from_call(start, result)
        })
    }
}

/// GitHub `/user` with the configured token
pub struct GithubProbe;

impl CollaboratorProbe for GithubProbe {
    fn service(&self) -> &'static str {
        "github"
    }

    fn probe(&self, client: Arc<CollaboratorClient>) -> ProbeFuture {
        Box::pin(async move {
            let start = Instant::now();
            let enterprise_url = client.config().github.api_url.clone();
            let result = client.github_user().await.map(|user| {
                object(json!({
                    "user": user.get("login").cloned().unwrap_or(Value::Null),
                    "enterprise_url": enterprise_url,
                }))
            });
            ProbeOutcome::from_call(start, result)
        })
    }
}

/// Microsoft 365 is brokered through SCS sessions; only credentials are checked
pub struct Microsoft365Probe;

impl CollaboratorProbe for Microsoft365Probe {
    fn service(&self) -> &'static str {
        "microsoft365"
    }

    fn probe(&self, client: Arc<CollaboratorClient>) -> ProbeFuture {
        Box::pin(async move {
            let ms365 = &client.config().microsoft365;
            match (&ms365.tenant_id, ms365.is_configured()) {
                (Some(tenant), true) => ProbeOutcome::Configured {
                    details: object(json!({ "tenant": tenant })),
                },
                _ => ProbeOutcome::NotConfigured {
                    reason: "credentials_not_configured".to_string(),
                },
            }
        })
    }
}

/// Notion is brokered through SCS sessions; only credentials are checked
pub struct NotionProbe;

impl CollaboratorProbe for NotionProbe {
    fn service(&self) -> &'static str {
        "notion"
    }

    fn probe(&self, client: Arc<CollaboratorClient>) -> ProbeFuture {
        Box::pin(async move {
            let notion = &client.config().notion;
            match (&notion.database_id, notion.is_configured()) {
                (Some(database_id), true) => ProbeOutcome::Configured {
                    details: object(json!({ "database_id": database_id })),
                },
                _ => ProbeOutcome::NotConfigured {
                    reason: "credentials_not_configured".to_string(),
                },
            }
        })
    }
}

/// Slack, Jira and Salesforce, grouped as one service
pub struct ExternalApisProbe;

impl CollaboratorProbe for ExternalApisProbe {
    fn service(&self) -> &'static str {
        "external_apis"
    }

    fn probe(&self, client: Arc<CollaboratorClient>) -> ProbeFuture {
        Box::pin(async move {
            let configured = client.config().external_apis.configured();
            if configured.is_empty() {
                ProbeOutcome::NotConfigured {
                    reason: "no_external_apis_configured".to_string(),
                }
            } else {
                ProbeOutcome::Configured {
                    details: object(json!({ "configured_apis": configured })),
                }
            }
        })
    }
}

/// Probes for every default registry service
pub fn default_probes() -> Vec<Box<dyn CollaboratorProbe>> {
    vec![
        Box::new(ScsProbe),
        Box::new(Microsoft365Probe),
        Box::new(GithubProbe),
        Box::new(NotionProbe),
        Box::new(N8nProbe),
        Box::new(ExternalApisProbe),
    ]
}
