//! Collaborator trait definitions for dependency injection
//!
//! The pipeline core consumes these seams; real implementations live in
//! `services`, mocks are generated for tests.

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::error::EngineResult;
use crate::types::{
    CompletionFailure, CompletionReply, CompletionRequest, ReportFilter, RunSummary,
    TransportError,
};
use shared::{ApiModel, Operation, RunReport, TargetConfig, TargetResponse};

/// Completion-service boundary (consumed, not produced, by this core).
///
/// Replies must be treated as untrusted input; the generator validates
/// them before anything downstream sees a scenario.
#[mockall::automock]
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Issue one completion request; may take arbitrarily long
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionReply, CompletionFailure>;
}

/// Target-system boundary: plain HTTP/SOAP calls per the operation's
/// declared protocol
#[mockall::automock]
#[async_trait]
pub trait TargetClient: Send + Sync {
    /// Execute one call against the target; a returned response means the
    /// target answered, irrespective of its content
    async fn call(
        &self,
        operation: &Operation,
        input: &Value,
        target: &TargetConfig,
    ) -> Result<TargetResponse, TransportError>;
}

/// Spec-storage collaborator
#[mockall::automock]
#[async_trait]
pub trait SpecStore: Send + Sync {
    /// Persist a parsed specification, returning its id
    async fn save(&self, model: ApiModel) -> EngineResult<Uuid>;

    /// Fetch a previously saved specification; `NotFound` on unknown id
    async fn fetch(&self, id: Uuid) -> EngineResult<ApiModel>;
}

/// Result-storage collaborator
#[mockall::automock]
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Persist a finished run report, returning its id
    async fn persist(&self, report: RunReport) -> EngineResult<Uuid>;

    /// Query stored report summaries
    async fn query(&self, filter: ReportFilter) -> EngineResult<Vec<RunSummary>>;
}
