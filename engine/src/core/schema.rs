//! JSON Schema compilation for the generator's accept/reject gate

use jsonschema::Validator;
use serde_json::Value;

use crate::error::{EngineError, EngineResult};

/// A compiled JSON Schema, reused across all candidates of one operation
pub struct CompiledSchema {
    validator: Validator,
}

impl CompiledSchema {
    pub fn compile(schema: &Value) -> EngineResult<Self> {
        let validator =
            jsonschema::validator_for(schema).map_err(|e| EngineError::UnsupportedFeature {
                feature: format!("schema does not compile: {e}"),
            })?;
        Ok(Self { validator })
    }

    pub fn is_valid(&self, instance: &Value) -> bool {
        self.validator.is_valid(instance)
    }

    /// Validation failures rendered as messages (empty when valid)
    pub fn errors(&self, instance: &Value) -> Vec<String> {
        self.validator
            .iter_errors(instance)
            .map(|e| e.to_string())
            .collect()
    }
}
