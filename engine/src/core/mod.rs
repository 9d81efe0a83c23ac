//! Core pipeline stages
//!
//! Pure and coordinating logic only; everything that touches the network
//! lives behind the traits in `crate::traits` and is implemented in
//! `crate::services`.

pub mod aggregator;
pub mod executor;
pub mod generator;
pub mod normalizer;
pub mod prompt;
pub mod schema;
pub mod state;
pub mod validator;

pub use aggregator::aggregate;
pub use executor::Executor;
pub use generator::{GenerationOutput, ScenarioGenerator};
pub use normalizer::normalize;
pub use state::RunRegistry;
pub use validator::validate;
