//! Outbound client for collaborator APIs
//!
//! One `reqwest::Client` (and its connection pool) is built at startup and
//! shared by every collaborator call. Dropping the last clone releases the
//! pool.

use reqwest::RequestBuilder;
use serde_json::{json, Value};
use std::time::Duration;

use crate::config::HubConfig;

const SCS_API_KEY_HEADER: &str = "X-API-Key";
const N8N_API_KEY_HEADER: &str = "X-N8N-API-KEY";

/// Client for the Shared Context Server, n8n and GitHub
#[derive(Debug, Clone)]
pub struct CollaboratorClient {
    client: reqwest::Client,
    config: HubConfig,
}

impl CollaboratorClient {
    /// Create new client sharing one connection pool
    pub fn new(config: HubConfig) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("integration-hub/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ClientError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    pub fn request_timeout(&self) -> Duration {
        self.config.request_timeout
    }

    /// GET `{SCS_URL}/health`
    pub async fn scs_health(&self) -> Result<Value, ClientError> {
        let url = format!("{}/health", self.config.scs.url);
        let request = self.with_scs_key(self.client.get(&url));
        send_json(request).await
    }

    /// POST `{SCS_URL}/api/sessions`
    pub async fn create_scs_session(
        &self,
        purpose: &str,
        metadata: Value,
    ) -> Result<Value, ClientError> {
        let url = format!("{}/api/sessions", self.config.scs.url);
        let payload = json!({
            "purpose": purpose,
            "metadata": metadata,
            "auto_generate_session_id": true,
        });
        let request = self.with_scs_key(self.client.post(&url).json(&payload));
        send_json(request).await
    }

    /// POST `{SCS_URL}/api/sessions/messages`
    pub async fn post_scs_message(&self, message: Value) -> Result<Value, ClientError> {
        let url = format!("{}/api/sessions/messages", self.config.scs.url);
        let request = self.with_scs_key(self.client.post(&url).json(&message));
        send_json(request).await
    }

    /// GET `{N8N_URL}/rest/active`, returning the number of active workflows
    pub async fn n8n_active_workflows(&self) -> Result<usize, ClientError> {
        let url = format!("{}/rest/active", self.config.n8n.url);
        let mut request = self.client.get(&url);
        if let Some(key) = &self.config.n8n.api_key {
            request = request.header(N8N_API_KEY_HEADER, key);
        }

        let body = send_json(request).await?;
        Ok(body
            .get("data")
            .and_then(Value::as_array)
            .map(Vec::len)
            .unwrap_or(0))
    }

    /// GET `{GITHUB_URL}/user`
    pub async fn github_user(&self) -> Result<Value, ClientError> {
        let url = format!("{}/user", self.config.github.api_url);
        let request = self.with_github_token(self.client.get(&url))?;
        send_json(request).await
    }

    /// POST `{GITHUB_URL}/repos/{repository}/issues`
    pub async fn create_github_issue(
        &self,
        title: &str,
        body: &str,
        labels: &[&str],
    ) -> Result<Value, ClientError> {
        let url = format!(
            "{}/repos/{}/issues",
            self.config.github.api_url, self.config.github.repository
        );
        let payload = json!({
            "title": title,
            "body": body,
            "labels": labels,
        });
        let request = self.with_github_token(self.client.post(&url).json(&payload))?;
        send_json(request).await
    }

    fn with_scs_key(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.scs.api_key {
            Some(key) => request.header(SCS_API_KEY_HEADER, key),
            None => request,
        }
    }

    fn with_github_token(&self, request: RequestBuilder) -> Result<RequestBuilder, ClientError> {
        let token = self
            .config
            .github
            .token
            .as_ref()
            .ok_or(ClientError::NotConfigured("github"))?;
        Ok(request.header(reqwest::header::AUTHORIZATION, format!("token {}", token)))
    }
}

async fn send_json(request: RequestBuilder) -> Result<Value, ClientError> {
    let response = request
        .send()
        .await
        .map_err(|e| ClientError::Network(e.to_string()))?;

    let status = response.status();
    if status.is_success() {
        response
            .json()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))
    } else {
        let error_text = response.text().await.unwrap_or_default();
        Err(ClientError::Server {
            status: status.as_u16(),
            message: error_text,
        })
    }
}

/// Client errors
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("HTTP {status}: {message}")]
    Server { status: u16, message: String },

    #[error("Credentials not configured for {0}")]
    NotConfigured(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> HubConfig {
        let mut config = HubConfig::default();
        config.scs.url = server.uri();
        config.scs.api_key = Some("scs-key".to_string());
        config.n8n.url = server.uri();
        config.github.api_url = server.uri();
        config
    }

    #[tokio::test]
    async fn test_scs_health_sends_api_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .and(header("X-API-Key", "scs-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "healthy"})))
            .mount(&server)
            .await;

        let client = CollaboratorClient::new(config_for(&server)).unwrap();
        let body = client.scs_health().await.unwrap();
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_n8n_active_workflow_count() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/active"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": ["a", "b", "c"]})))
            .mount(&server)
            .await;

        let client = CollaboratorClient::new(config_for(&server)).unwrap();
        assert_eq!(client.n8n_active_workflows().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_non_success_status_is_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .mount(&server)
            .await;

        let client = CollaboratorClient::new(config_for(&server)).unwrap();
        match client.scs_health().await {
            Err(ClientError::Server { status, message }) => {
                assert_eq!(status, 503);
                assert_eq!(message, "down");
            }
            other => panic!("expected server error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_github_requires_token() {
        let client = CollaboratorClient::new(HubConfig::default()).unwrap();
        assert!(matches!(
            client.github_user().await,
            Err(ClientError::NotConfigured("github"))
        ));
    }
}
