//! Canonical domain model shared across the pipeline stages
//!
//! Everything downstream of the spec normalizer is protocol-agnostic and
//! works against these types only. Each stage owns the entities it creates
//! until it hands them to the next stage by value.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::errors::{SharedError, SharedResult};

/// Protocol family of an ingested specification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolKind {
    Rest,
    Soap,
}

impl fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolKind::Rest => write!(f, "rest"),
            ProtocolKind::Soap => write!(f, "soap"),
        }
    }
}

/// Canonical representation of a parsed specification.
///
/// Immutable once built; schema references are fully inlined by the
/// normalizer so no later stage ever resolves a pointer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiModel {
    pub protocol: ProtocolKind,
    pub operations: Vec<Operation>,
}

impl ApiModel {
    /// Look up an operation by identifier
    pub fn operation(&self, id: &str) -> Option<&Operation> {
        self.operations.iter().find(|op| op.id == id)
    }

    /// Check model invariants: operation identifiers must be unique
    pub fn validate(&self) -> SharedResult<()> {
        let mut seen = std::collections::HashSet::new();
        for op in &self.operations {
            if !seen.insert(op.id.as_str()) {
                return Err(SharedError::InvalidModel {
                    message: format!("duplicate operation identifier: {}", op.id),
                });
            }
        }
        Ok(())
    }
}

/// How an operation is reached on the wire.
///
/// Exactly two variants, one per supported protocol; there is deliberately
/// no open extension point here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationBinding {
    Rest {
        method: String,
        path: String,
    },
    Soap {
        action: String,
        input_element: String,
        namespace: String,
    },
}

/// Expected or observed response discriminator: an HTTP status for REST,
/// a fault code local name for SOAP
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseCode {
    Status(u16),
    Fault(String),
}

impl ResponseCode {
    /// Build a fault code from a possibly prefix-qualified name
    /// (`soap:Server` and `Server` are the same fault class)
    pub fn fault(code: &str) -> Self {
        let local = code.rsplit(':').next().unwrap_or(code);
        ResponseCode::Fault(local.to_string())
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseCode::Status(s) => write!(f, "{s}"),
            ResponseCode::Fault(c) => write!(f, "fault:{c}"),
        }
    }
}

/// A declared non-success response of an operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: ResponseCode,
    pub schema: Option<Value>,
}

/// One callable unit within an [`ApiModel`].
///
/// Schemas are self-contained JSON Schema values; SOAP message parts are
/// normalized into the same shape so the generator and validator never
/// branch on protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub id: String,
    pub binding: OperationBinding,
    pub input_schema: Value,
    pub output_schema: Value,
    pub success_code: ResponseCode,
    pub error_responses: Vec<ErrorResponse>,
}

impl Operation {
    /// All response codes this operation declares (success first)
    pub fn declared_codes(&self) -> Vec<ResponseCode> {
        let mut codes = vec![self.success_code.clone()];
        codes.extend(self.error_responses.iter().map(|e| e.code.clone()));
        codes
    }
}

/// Intent class of a generated scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioKind {
    Happy,
    Boundary,
    Negative,
}

/// Provenance of a scenario: either the exact completion sub-request that
/// produced it (kept for reproduction), or the deterministic fallback path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioOrigin {
    Model { model: String, prompt: String },
    Fallback,
}

/// Expected payload fragment, in the protocol's native shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadFragment {
    Json(Value),
    Xml(String),
}

/// What a scenario expects back from the target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectedOutcome {
    pub accepted: Vec<ResponseCode>,
    pub payload: Option<PayloadFragment>,
}

/// A concrete generated test case for one operation.
///
/// The input payload has already passed the generator's schema gate by the
/// time a Scenario exists; execution consumes it read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub id: Uuid,
    pub operation_id: String,
    pub kind: ScenarioKind,
    pub input: Value,
    pub expected: ExpectedOutcome,
    pub origin: ScenarioOrigin,
}

/// Per-scenario execution state machine.
///
/// `TransportFailed` and `TimedOut` re-queue to `Pending` while retry
/// budget remains; `Succeeded`, `Failed` and `Skipped` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioState {
    Pending,
    InFlight,
    Succeeded,
    TransportFailed,
    TimedOut,
    Failed,
    Skipped,
}

impl ScenarioState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ScenarioState::Succeeded | ScenarioState::Failed | ScenarioState::Skipped
        )
    }
}

/// Raw response captured from the target system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetResponse {
    pub code: ResponseCode,
    pub content_type: Option<String>,
    pub body: String,
    pub latency: Duration,
}

/// The outcome of running one scenario.
///
/// Created when execution begins, mutated only by the executor (retries)
/// until it reaches a terminal state, then read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub scenario: Scenario,
    pub state: ScenarioState,
    pub attempts: u32,
    pub elapsed: Duration,
    pub response: Option<TargetResponse>,
    pub failure: Option<String>,
}

impl ExecutionRecord {
    /// A response was received (its content is the validator's concern)
    pub fn succeeded(
        scenario: Scenario,
        attempts: u32,
        elapsed: Duration,
        response: TargetResponse,
    ) -> Self {
        Self {
            scenario,
            state: ScenarioState::Succeeded,
            attempts,
            elapsed,
            response: Some(response),
            failure: None,
        }
    }

    /// Retry budget exhausted without ever receiving a response
    pub fn failed(scenario: Scenario, attempts: u32, elapsed: Duration, failure: String) -> Self {
        Self {
            scenario,
            state: ScenarioState::Failed,
            attempts,
            elapsed,
            response: None,
            failure: Some(failure),
        }
    }

    /// Run deadline expired before (or while) this scenario ran
    pub fn skipped(scenario: Scenario, attempts: u32, elapsed: Duration, reason: String) -> Self {
        Self {
            scenario,
            state: ScenarioState::Skipped,
            attempts,
            elapsed,
            response: None,
            failure: Some(reason),
        }
    }
}

/// Verdict classification: `Error` means the comparison could not be
/// performed at all, `Fail` means it was performed and diverged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerdictClass {
    Pass,
    Fail,
    Error,
}

/// One divergence between expected and actual
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mismatch {
    pub path: String,
    pub expected: String,
    pub actual: String,
}

/// Judgment attached to one execution record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub scenario_id: Uuid,
    pub operation_id: String,
    pub classification: VerdictClass,
    pub mismatches: Vec<Mismatch>,
    pub detail: Option<String>,
}

/// Non-fatal note recorded when generation gave up on an operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationNote {
    pub operation_id: String,
    pub reason: String,
}

/// Verdict counts per classification
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictCounts {
    pub passed: usize,
    pub failed: usize,
    pub errored: usize,
}

/// Overall outcome of one pipeline invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunStatus {
    Passed,
    Failed,
    Errored,
    FailedToStart { tag: String },
}

/// Aggregate result of one full pipeline invocation, handed by value to
/// the result-storage collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub counts: VerdictCounts,
    pub verdicts: Vec<Verdict>,
    pub notes: Vec<GenerationNote>,
    pub status: RunStatus,
}

impl RunReport {
    /// Report for a run that died before any scenario existed
    pub fn failed_to_start(
        run_id: Uuid,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        tag: &str,
    ) -> Self {
        Self {
            run_id,
            started_at,
            finished_at,
            counts: VerdictCounts::default(),
            verdicts: Vec::new(),
            notes: Vec::new(),
            status: RunStatus::FailedToStart {
                tag: tag.to_string(),
            },
        }
    }
}

/// Coarse run lifecycle phase exposed for status polling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunPhase {
    Pending,
    Generating,
    Executing,
    Validating,
    Completed,
    Failed,
}

impl RunPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunPhase::Completed | RunPhase::Failed)
    }

    /// Legal phase transitions; anything else is a pipeline bug
    pub fn can_advance_to(&self, next: RunPhase) -> bool {
        use RunPhase::*;
        matches!(
            (self, next),
            (Pending, Generating)
                | (Generating, Executing)
                | (Executing, Validating)
                | (Validating, Completed)
                | (Pending, Failed)
                | (Generating, Failed)
                | (Executing, Failed)
                | (Validating, Failed)
        )
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunPhase::Pending => "pending",
            RunPhase::Generating => "generating",
            RunPhase::Executing => "executing",
            RunPhase::Validating => "validating",
            RunPhase::Completed => "completed",
            RunPhase::Failed => "failed",
        };
        write!(f, "{s}")
    }
}
