//! Engine-internal data types

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared::{RunStatus, VerdictCounts};

/// One request against the completion-service boundary.
///
/// The full prompt is kept on the request (and copied into each accepted
/// scenario's origin) so a generation can be reproduced even though the
/// model itself is non-deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub operation_id: String,
    pub prompt: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub desired_count: u32,
}

/// Raw reply from the completion service; untrusted until the generator's
/// schema gate has accepted its candidates
#[derive(Debug, Clone)]
pub struct CompletionReply {
    pub content: String,
    pub model: String,
    pub tokens_used: u32,
    pub latency: Duration,
}

/// Failure classes for a completion request
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompletionFailure {
    /// Transport-level failure: the service cannot be reached at all
    #[error("completion service unreachable: {0}")]
    Unreachable(String),

    #[error("completion request rate limited")]
    RateLimited,

    #[error("completion authentication failed")]
    AuthenticationFailed,

    #[error("completion service error: {0}")]
    ServerError(String),

    #[error("invalid completion reply: {0}")]
    InvalidReply(String),
}

/// Failure classes for a target-system call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request build error: {0}")]
    InvalidRequest(String),
}

/// Filter for querying stored run reports
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportFilter {
    pub status: Option<RunStatus>,
    pub since: Option<DateTime<Utc>>,
}

/// Compact view of a stored run report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub id: Uuid,
    pub run_id: Uuid,
    pub status: RunStatus,
    pub counts: VerdictCounts,
    pub finished_at: DateTime<Utc>,
}
