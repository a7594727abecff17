//! Long-running operation types
//!
//! Create and update requests are accepted asynchronously. The service hands
//! back an operation location which is then polled until the operation reaches
//! a terminal state.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::time::Duration;

use crate::error_detail::{ErrorDetail, ErrorResponse};

/// Path prefix the service puts in front of a knowledge base id in
/// `resourceLocation`
pub const KNOWLEDGE_BASE_PATH_PREFIX: &str = "/knowledgebases/";

/// Opaque location of an in-flight operation, usually `/operations/<id>`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperationHandle(String);

impl OperationHandle {
    pub fn new(location: impl Into<String>) -> Self {
        Self(location.into())
    }

    /// Build a handle from a bare operation id
    pub fn from_operation_id(operation_id: &str) -> Self {
        Self(format!("/operations/{}", operation_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The trailing path segment, which is the operation id for service
    /// provided locations
    pub fn operation_id(&self) -> &str {
        self.0
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(&self.0)
    }
}

impl fmt::Display for OperationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// State reported by the operation status endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationState {
    NotStarted,
    Running,
    Succeeded,
    Failed,
    /// Any other service-defined value. Terminal.
    Other(String),
}

impl OperationState {
    /// Only `NotStarted` and `Running` keep the poll loop going
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::NotStarted | Self::Running)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::NotStarted => "NotStarted",
            Self::Running => "Running",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::Other(s) => s,
        }
    }
}

impl From<&str> for OperationState {
    fn from(value: &str) -> Self {
        match value {
            "NotStarted" => Self::NotStarted,
            "Running" => Self::Running,
            "Succeeded" => Self::Succeeded,
            "Failed" => Self::Failed,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for OperationState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for OperationState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from(raw.as_str()))
    }
}

/// Body of the operation status endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub operation_state: OperationState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_action_timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_response: Option<ErrorResponse>,
}

impl Operation {
    /// Error detail attached to a failed operation, if the service sent one
    pub fn error_detail(&self) -> Option<&ErrorDetail> {
        self.error_response.as_ref().and_then(|r| r.error.as_ref())
    }
}

/// Raw answer from the status endpoint
#[derive(Debug, Clone)]
pub struct StatusResponse {
    pub operation: Operation,
    /// `Retry-After`, when present and given in whole seconds
    pub retry_after: Option<Duration>,
    pub raw_body: String,
}

/// Outcome of a single status check
#[derive(Debug, Clone)]
pub struct PollResult {
    pub operation: Operation,
    /// How long to wait before the next check
    pub wait_interval: Duration,
    pub raw_body: String,
}

impl PollResult {
    /// Use the service's `Retry-After` or fall back to `default_wait`
    pub fn from_status(status: StatusResponse, default_wait: Duration) -> Self {
        Self {
            wait_interval: status.retry_after.unwrap_or(default_wait),
            operation: status.operation,
            raw_body: status.raw_body,
        }
    }

    pub fn state(&self) -> &OperationState {
        &self.operation.operation_state
    }
}

/// Terminal result of driving an operation to completion
#[derive(Debug, Clone)]
pub enum OperationOutcome {
    Succeeded {
        operation: Operation,
        resource_location: Option<String>,
    },
    Failed {
        operation: Operation,
        error: ErrorDetail,
    },
    /// A terminal state other than `Succeeded` or `Failed`, treated as success
    Completed { operation: Operation },
}

impl OperationOutcome {
    /// Classify a terminal operation
    pub fn from_terminal(operation: Operation) -> Self {
        let state = operation.operation_state.clone();
        match state {
            OperationState::Succeeded => {
                let resource_location = operation.resource_location.clone();
                Self::Succeeded {
                    operation,
                    resource_location,
                }
            }
            OperationState::Failed => {
                let error = operation
                    .error_detail()
                    .cloned()
                    .unwrap_or_else(|| ErrorDetail::with_message("Operation failed"));
                Self::Failed { operation, error }
            }
            _ => Self::Completed { operation },
        }
    }

    pub fn operation(&self) -> &Operation {
        match self {
            Self::Succeeded { operation, .. }
            | Self::Failed { operation, .. }
            | Self::Completed { operation } => operation,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    pub fn resource_location(&self) -> Option<&str> {
        match self {
            Self::Succeeded {
                resource_location, ..
            } => resource_location.as_deref(),
            Self::Completed { operation } => operation.resource_location.as_deref(),
            Self::Failed { .. } => None,
        }
    }

    /// Knowledge base id embedded in the resource location
    pub fn knowledge_base_id(&self) -> Option<String> {
        self.resource_location().map(knowledge_base_id_from_location)
    }

    /// Turn a `Failed` outcome into an error, keeping the full detail tree
    pub fn into_result(self) -> crate::error::Result<Operation> {
        match self {
            Self::Failed { error, .. } => Err(crate::error::CoreError::OperationFailed(error)),
            Self::Succeeded { operation, .. } | Self::Completed { operation } => Ok(operation),
        }
    }
}

/// Strip the `/knowledgebases/` prefix from a resource location
pub fn knowledge_base_id_from_location(location: &str) -> String {
    location.replace(KNOWLEDGE_BASE_PATH_PREFIX, "")
}

/// Parse a `Retry-After` value given in whole seconds
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}
