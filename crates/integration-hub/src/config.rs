//! Hub configuration
//!
//! Collaborator base URLs and credentials come from the environment. A
//! collaborator with missing credentials is reported as `disconnected` and is
//! never polled.

use std::time::Duration;

pub const DEFAULT_SCS_URL: &str = "http://localhost:23456";
pub const DEFAULT_N8N_URL: &str = "http://localhost:5678";
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
pub const DEFAULT_GITHUB_REPOSITORY: &str = "omanzanodev/enterprise-integration-hub";
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5000;

/// Shared Context Server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScsConfig {
    pub url: String,
    pub api_key: Option<String>,
}

/// n8n workflow engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct N8nConfig {
    pub url: String,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GithubConfig {
    pub token: Option<String>,
    pub api_url: String,
    /// `owner/name` of the repository issues are filed against
    pub repository: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Microsoft365Config {
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
}

impl Microsoft365Config {
    pub fn is_configured(&self) -> bool {
        self.tenant_id.is_some() && self.client_id.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotionConfig {
    pub token: Option<String>,
    pub database_id: Option<String>,
}

impl NotionConfig {
    pub fn is_configured(&self) -> bool {
        self.token.is_some() && self.database_id.is_some()
    }
}

/// Slack, Jira and Salesforce are only checked for configured credentials
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalApisConfig {
    pub slack_bot_token: Option<String>,
    pub jira_api_token: Option<String>,
    pub jira_url: Option<String>,
    pub salesforce_client_id: Option<String>,
}

impl ExternalApisConfig {
    /// Names of the external APIs that have credentials
    pub fn configured(&self) -> Vec<&'static str> {
        let mut apis = Vec::new();
        if self.slack_bot_token.is_some() {
            apis.push("slack");
        }
        if self.jira_api_token.is_some() && self.jira_url.is_some() {
            apis.push("jira");
        }
        if self.salesforce_client_id.is_some() {
            apis.push("salesforce");
        }
        apis
    }
}

/// Full hub configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubConfig {
    pub scs: ScsConfig,
    pub n8n: N8nConfig,
    pub github: GithubConfig,
    pub microsoft365: Microsoft365Config,
    pub notion: NotionConfig,
    pub external_apis: ExternalApisConfig,

    /// Time between refresh cycles
    pub refresh_interval: Duration,

    /// Upper bound on every outbound collaborator call
    pub request_timeout: Duration,

    /// Perturb response times between polls so the dashboard looks live
    pub synthetic_jitter: bool,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl HubConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let get_or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        Self {
            scs: ScsConfig {
                url: trim_url(get_or("SCS_URL", DEFAULT_SCS_URL)),
                api_key: get("SCS_API_KEY"),
            },
            n8n: N8nConfig {
                url: trim_url(get_or("N8N_URL", DEFAULT_N8N_URL)),
                api_key: get("N8N_API_KEY"),
            },
            github: GithubConfig {
                token: get("GITHUB_TOKEN"),
                api_url: trim_url(get_or("GITHUB_ENTERPRISE_URL", DEFAULT_GITHUB_API_URL)),
                repository: get_or("GITHUB_REPOSITORY", DEFAULT_GITHUB_REPOSITORY),
            },
            microsoft365: Microsoft365Config {
                tenant_id: get("MS365_TENANT_ID"),
                client_id: get("MS365_CLIENT_ID"),
            },
            notion: NotionConfig {
                token: get("NOTION_TOKEN"),
                database_id: get("NOTION_DATABASE_ID"),
            },
            external_apis: ExternalApisConfig {
                slack_bot_token: get("SLACK_BOT_TOKEN"),
                jira_api_token: get("JIRA_API_TOKEN"),
                jira_url: get("JIRA_URL"),
                salesforce_client_id: get("SALESFORCE_CLIENT_ID"),
            },
            refresh_interval: Duration::from_secs(
                get("HUB_REFRESH_INTERVAL_SECS")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_REFRESH_INTERVAL_SECS),
            ),
            request_timeout: Duration::from_millis(
                get("HUB_REQUEST_TIMEOUT_MS")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS),
            ),
            synthetic_jitter: get("HUB_SYNTHETIC_JITTER")
                .map(|v| v.parse().unwrap_or(true))
                .unwrap_or(true),
        }
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

fn trim_url(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = HubConfig::default();
        assert_eq!(config.scs.url, DEFAULT_SCS_URL);
        assert_eq!(config.n8n.url, DEFAULT_N8N_URL);
        assert!(config.scs.api_key.is_none());
        assert!(!config.microsoft365.is_configured());
        assert!(config.external_apis.configured().is_empty());
        assert_eq!(config.refresh_interval, Duration::from_secs(60));
        assert!(config.synthetic_jitter);
    }

    #[test]
    fn test_from_lookup() {
        let config = HubConfig::from_lookup(lookup(&[
            ("SCS_URL", "http://scs.internal:23456/"),
            ("MS365_TENANT_ID", "tenant"),
            ("MS365_CLIENT_ID", "client"),
            ("NOTION_TOKEN", "secret"),
            ("JIRA_API_TOKEN", "jira"),
            ("SLACK_BOT_TOKEN", "xoxb"),
            ("HUB_REFRESH_INTERVAL_SECS", "15"),
            ("HUB_SYNTHETIC_JITTER", "false"),
        ]));

        assert_eq!(config.scs.url, "http://scs.internal:23456");
        assert!(config.microsoft365.is_configured());
        // database id missing
        assert!(!config.notion.is_configured());
        // jira needs both token and url
        assert_eq!(config.external_apis.configured(), vec!["slack"]);
        assert_eq!(config.refresh_interval, Duration::from_secs(15));
        assert!(!config.synthetic_jitter);
    }

    #[test]
    fn test_blank_values_are_unset() {
        let config = HubConfig::from_lookup(lookup(&[("GITHUB_TOKEN", "  ")]));
        assert!(config.github.token.is_none());
    }
}
