//! Generation-and-execution pipeline for API tests
//!
//! This library turns a machine-readable API description (OpenAPI or
//! WSDL) into executed, validated test runs: specs are normalized into a
//! canonical model, a completion service proposes scenarios, a bounded
//! worker pool runs them against the live target, and responses are
//! diffed into deterministic pass/fail verdicts folded into one report.

pub mod core;
pub mod error;
pub mod pipeline;
pub mod services;
pub mod traits;
pub mod types;

// Re-export main types
pub use core::{
    aggregate, normalize, validate, Executor, GenerationOutput, RunRegistry, ScenarioGenerator,
};
pub use error::{EngineError, EngineResult};
pub use pipeline::Pipeline;
pub use services::*;
pub use traits::*;
pub use types::*;
