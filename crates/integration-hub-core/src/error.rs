//! Error types for the hub core
//!
//! The store and registry never fail on writes; errors only surface from
//! lookups and from constructing malformed workflow records.

use thiserror::Error;

/// Main error type for core hub operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HubError {
    /// The service has never been registered
    #[error("Service not found: {0}")]
    ServiceNotFound(String),

    /// No retained workflow execution has this identifier
    #[error("Workflow execution not found: {0}")]
    WorkflowNotFound(String),

    /// A workflow execution record violates its invariants
    #[error("Invalid workflow execution: {0}")]
    InvalidExecution(String),
}

impl HubError {
    /// Create an invalid execution error
    pub fn invalid_execution(msg: impl Into<String>) -> Self {
        HubError::InvalidExecution(msg.into())
    }

    /// Check if this is a lookup miss (vs a malformed record)
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            HubError::ServiceNotFound(_) | HubError::WorkflowNotFound(_)
        )
    }
}

/// Result type alias for core hub operations
pub type Result<T> = std::result::Result<T, HubError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = HubError::ServiceNotFound("jira".to_string());
        assert_eq!(err.to_string(), "Service not found: jira");
    }

    #[test]
    fn test_is_not_found() {
        assert!(HubError::ServiceNotFound("x".to_string()).is_not_found());
        assert!(HubError::WorkflowNotFound("x".to_string()).is_not_found());
        assert!(!HubError::invalid_execution("x").is_not_found());
    }
}
