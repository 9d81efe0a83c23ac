//! Shared types for the API test-generation pipeline
//!
//! Contains the canonical domain model handed between pipeline stages,
//! run configuration, and logging setup. Component-internal types (like
//! completion request/reply shapes) are kept in their respective crates.

pub mod config;
pub mod errors;
pub mod logging;
pub mod types;

pub use config::*;
pub use errors::*;

// Re-export the domain model handed between stages
pub use types::{
    // Specification side
    ApiModel, ErrorResponse, Operation, OperationBinding, ProtocolKind, ResponseCode,

    // Generated scenarios
    ExpectedOutcome, PayloadFragment, Scenario, ScenarioKind, ScenarioOrigin,

    // Execution and validation outcomes
    ExecutionRecord, GenerationNote, Mismatch, ScenarioState, TargetResponse, Verdict,
    VerdictClass, VerdictCounts,

    // Run-level reporting
    RunPhase, RunReport, RunStatus,
};
