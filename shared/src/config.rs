//! Run configuration types shared by the pipeline stages
//!
//! Retry/backoff constants and pool sizes are policy knobs, so they live
//! here as configuration with defaults instead of being hard-coded at the
//! call sites.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{SharedError, SharedResult};

/// Options for the scenario generation stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Upper bound of scenarios requested per operation
    pub per_operation_limit: u32,

    /// Concurrent completion requests (LLM calls are costly and
    /// rate-limited, so this pool is small)
    pub completion_concurrency: usize,

    /// Completion model name
    pub model: String,

    pub temperature: f32,
    pub max_tokens: u32,

    /// Regenerate attempts after a reply yields no usable candidate
    pub regenerate_retries: u32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            per_operation_limit: 3,
            completion_concurrency: 2,
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            max_tokens: 2048,
            regenerate_retries: 2,
        }
    }
}

impl GenerationOptions {
    pub fn validate(&self) -> SharedResult<()> {
        if self.per_operation_limit == 0 {
            return Err(SharedError::InvalidConfig {
                field: "per_operation_limit".to_string(),
                value: "0".to_string(),
            });
        }
        if self.completion_concurrency == 0 {
            return Err(SharedError::InvalidConfig {
                field: "completion_concurrency".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}

/// Options for the execution stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Worker pool size; must be >= 1 and finite so a large generated set
    /// cannot fan out unboundedly against the target
    pub worker_pool: usize,

    /// Retries after a transport failure or timeout (attempts = retries + 1)
    pub max_retries: u32,

    /// Base interval for exponential backoff between attempts
    pub backoff_base: Duration,

    /// Per-scenario timeout, independent of the run deadline
    pub scenario_timeout: Duration,

    /// Overall run deadline
    pub run_deadline: Duration,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            worker_pool: 4,
            max_retries: 2,
            backoff_base: Duration::from_millis(250),
            scenario_timeout: Duration::from_secs(10),
            run_deadline: Duration::from_secs(120),
        }
    }
}

impl ExecutionConfig {
    pub fn validate(&self) -> SharedResult<()> {
        if self.worker_pool == 0 {
            return Err(SharedError::InvalidConfig {
                field: "worker_pool".to_string(),
                value: "0".to_string(),
            });
        }
        if self.scenario_timeout.is_zero() {
            return Err(SharedError::InvalidConfig {
                field: "scenario_timeout".to_string(),
                value: "0".to_string(),
            });
        }
        if self.run_deadline.is_zero() {
            return Err(SharedError::InvalidConfig {
                field: "run_deadline".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}

/// Where and how to reach the system under test
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    pub base_url: String,

    /// Extra headers sent with every request (auth tokens etc.)
    pub headers: Vec<(String, String)>,
}

impl TargetConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Payload comparison strictness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strictness {
    /// Unknown actual fields are ignored
    #[default]
    Lenient,
    /// Unknown actual fields are flagged as mismatches
    Strict,
}

/// Options for the validation stage
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationConfig {
    pub strictness: Strictness,
}
