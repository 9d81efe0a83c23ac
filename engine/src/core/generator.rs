//! Scenario generation via the completion service
//!
//! Every model reply is untrusted input: candidates are parsed
//! defensively and each input payload must pass the operation's schema
//! gate before a Scenario exists. Operations the model cannot serve fall
//! back to one deterministic schema-derived scenario and a recorded note;
//! only total unreachability of the completion service is fatal.

use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared::{
    ApiModel, ExpectedOutcome, GenerationNote, GenerationOptions, Operation, PayloadFragment,
    ProtocolKind, ResponseCode, Scenario, ScenarioKind, ScenarioOrigin,
};

use crate::core::prompt;
use crate::core::schema::CompiledSchema;
use crate::error::{EngineError, EngineResult};
use crate::traits::CompletionClient;
use crate::types::{CompletionFailure, CompletionReply, CompletionRequest};

/// Result of the generation stage: scenarios that passed the gate plus
/// notes for operations that were given up on
#[derive(Debug, Default)]
pub struct GenerationOutput {
    pub scenarios: Vec<Scenario>,
    pub notes: Vec<GenerationNote>,
}

struct OperationOutcome {
    scenarios: Vec<Scenario>,
    note: Option<GenerationNote>,
}

pub struct ScenarioGenerator<C: CompletionClient> {
    client: Arc<C>,
    options: GenerationOptions,
}

impl<C: CompletionClient> ScenarioGenerator<C> {
    pub fn new(client: Arc<C>, options: GenerationOptions) -> Self {
        Self { client, options }
    }

    /// Generate scenarios for every operation of the model.
    ///
    /// Partial results are fine; an `Err` here means the completion
    /// service is unreachable and the whole run must abort (any scenarios
    /// generated so far are discarded with it).
    pub async fn generate(&self, model: &ApiModel) -> EngineResult<GenerationOutput> {
        self.options.validate()?;

        let pending: Vec<_> = model
            .operations
            .iter()
            .map(|op| self.generate_for_operation(op, model.protocol))
            .collect();
        let outcomes = stream::iter(pending)
            .buffer_unordered(self.options.completion_concurrency)
            .collect::<Vec<_>>()
            .await;

        let mut output = GenerationOutput::default();
        for outcome in outcomes {
            let outcome = outcome?;
            output.scenarios.extend(outcome.scenarios);
            output.notes.extend(outcome.note);
        }

        info!(
            scenarios = output.scenarios.len(),
            notes = output.notes.len(),
            "Scenario generation finished"
        );
        Ok(output)
    }

    async fn generate_for_operation(
        &self,
        op: &Operation,
        protocol: ProtocolKind,
    ) -> EngineResult<OperationOutcome> {
        let gate = match CompiledSchema::compile(&op.input_schema) {
            Ok(gate) => gate,
            Err(e) => {
                warn!(operation = %op.id, error = %e, "Input schema did not compile");
                return Ok(OperationOutcome {
                    scenarios: Vec::new(),
                    note: Some(GenerationNote {
                        operation_id: op.id.clone(),
                        reason: format!("input schema did not compile: {e}"),
                    }),
                });
            }
        };

        let limit = self.options.per_operation_limit;
        let mut rejections: Vec<String> = Vec::new();

        for attempt in 0..=self.options.regenerate_retries {
            let prompt = if attempt == 0 {
                prompt::initial(op, protocol, limit)
            } else {
                prompt::regenerate(op, protocol, limit, &rejections)
            };
            let request = CompletionRequest {
                operation_id: op.id.clone(),
                prompt,
                model: self.options.model.clone(),
                temperature: self.options.temperature,
                max_tokens: self.options.max_tokens,
                desired_count: limit,
            };

            let reply = match self.request_with_probe(&request).await? {
                Ok(reply) => reply,
                Err(failure) => {
                    warn!(operation = %op.id, attempt, error = %failure, "Completion request failed");
                    rejections = vec![format!("completion request failed: {failure}")];
                    continue;
                }
            };

            let (mut accepted, rejected) =
                self.parse_candidates(op, protocol, &gate, &request, &reply);
            if !accepted.is_empty() {
                accepted.truncate(limit as usize);
                debug!(
                    operation = %op.id,
                    accepted = accepted.len(),
                    rejected = rejected.len(),
                    "Candidates accepted"
                );
                return Ok(OperationOutcome {
                    scenarios: accepted,
                    note: None,
                });
            }
            rejections = rejected;
        }

        let note = GenerationNote {
            operation_id: op.id.clone(),
            reason: format!(
                "no usable model candidates after {} attempts: {}",
                self.options.regenerate_retries + 1,
                rejections.join("; ")
            ),
        };
        warn!(operation = %op.id, reason = %note.reason, "Falling back to deterministic scenario");

        Ok(OperationOutcome {
            scenarios: fallback_scenario(op, &gate).into_iter().collect(),
            note: Some(note),
        })
    }

    /// One bounded re-probe on transport-level failure; a second
    /// consecutive miss means the service is down for the whole run
    async fn request_with_probe(
        &self,
        request: &CompletionRequest,
    ) -> EngineResult<Result<CompletionReply, CompletionFailure>> {
        match self.client.complete(request).await {
            Err(CompletionFailure::Unreachable(first)) => {
                warn!(error = %first, "Completion service unreachable, probing once more");
                match self.client.complete(request).await {
                    Err(CompletionFailure::Unreachable(second)) => {
                        Err(EngineError::CompletionServiceUnavailable { message: second })
                    }
                    other => Ok(other),
                }
            }
            other => Ok(other),
        }
    }

    /// Parse a raw reply into gated scenarios plus rejection reasons
    fn parse_candidates(
        &self,
        op: &Operation,
        protocol: ProtocolKind,
        gate: &CompiledSchema,
        request: &CompletionRequest,
        reply: &CompletionReply,
    ) -> (Vec<Scenario>, Vec<String>) {
        let stripped = strip_code_fences(&reply.content);
        let parsed: Value = match serde_json::from_str(stripped) {
            Ok(value) => value,
            Err(e) => return (Vec::new(), vec![format!("reply is not valid JSON: {e}")]),
        };

        let items = match parsed {
            Value::Array(items) => items,
            Value::Object(map) => {
                if let Some(items) = map.get("scenarios").and_then(Value::as_array) {
                    items.clone()
                } else {
                    vec![Value::Object(map)]
                }
            }
            _ => {
                return (
                    Vec::new(),
                    vec!["reply is neither a JSON array nor an object".to_string()],
                )
            }
        };

        let declared = op.declared_codes();
        let mut accepted: Vec<Scenario> = Vec::new();
        let mut rejected = Vec::new();
        for (index, item) in items.iter().enumerate() {
            match candidate_to_scenario(op, protocol, gate, request, &declared, item) {
                Ok(scenario) => {
                    // exact-input-payload dedup only
                    if accepted.iter().any(|s| s.input == scenario.input) {
                        rejected.push(format!("candidate {index}: duplicate input payload"));
                    } else {
                        accepted.push(scenario);
                    }
                }
                Err(reason) => rejected.push(format!("candidate {index}: {reason}")),
            }
        }
        (accepted, rejected)
    }
}

#[derive(Deserialize)]
struct RawCandidate {
    #[serde(default)]
    kind: Option<String>,
    input: Value,
    #[serde(default)]
    expected_status: Option<u16>,
    #[serde(default)]
    expected_fault: Option<String>,
    #[serde(default)]
    expected_payload: Option<Value>,
}

fn candidate_to_scenario(
    op: &Operation,
    protocol: ProtocolKind,
    gate: &CompiledSchema,
    request: &CompletionRequest,
    declared: &[ResponseCode],
    item: &Value,
) -> Result<Scenario, String> {
    let candidate: RawCandidate = serde_json::from_value(item.clone())
        .map_err(|e| format!("unexpected candidate shape: {e}"))?;

    let gate_errors = gate.errors(&candidate.input);
    if !gate_errors.is_empty() {
        return Err(format!("input fails schema: {}", gate_errors.join("; ")));
    }

    let kind = match candidate.kind.as_deref() {
        Some("boundary") => ScenarioKind::Boundary,
        Some("negative") | Some("invalid") => ScenarioKind::Negative,
        _ => ScenarioKind::Happy,
    };

    let code = match (&candidate.expected_fault, candidate.expected_status) {
        (Some(fault), _) => ResponseCode::fault(fault),
        (None, Some(status)) => ResponseCode::Status(status),
        (None, None) => op.success_code.clone(),
    };
    if !declared.contains(&code) {
        return Err(format!("expected code {code} is not declared by the operation"));
    }

    let payload = match protocol {
        ProtocolKind::Rest => candidate.expected_payload.map(PayloadFragment::Json),
        ProtocolKind::Soap => candidate
            .expected_payload
            .as_ref()
            .and_then(Value::as_str)
            .map(|s| PayloadFragment::Xml(s.to_string())),
    };

    Ok(Scenario {
        id: Uuid::new_v4(),
        operation_id: op.id.clone(),
        kind,
        input: candidate.input,
        expected: ExpectedOutcome {
            accepted: vec![code],
            payload,
        },
        origin: ScenarioOrigin::Model {
            model: request.model.clone(),
            prompt: request.prompt.clone(),
        },
    })
}

/// Deterministic schema-derived scenario for operations the model failed
fn fallback_scenario(op: &Operation, gate: &CompiledSchema) -> Option<Scenario> {
    let input = instance_from_schema(&op.input_schema);
    if !gate.is_valid(&input) {
        return None;
    }
    Some(Scenario {
        id: Uuid::new_v4(),
        operation_id: op.id.clone(),
        kind: ScenarioKind::Happy,
        input,
        expected: ExpectedOutcome {
            accepted: vec![op.success_code.clone()],
            payload: None,
        },
        origin: ScenarioOrigin::Fallback,
    })
}

/// Minimal instance satisfying a schema: required fields only, type
/// defaults for leaves
fn instance_from_schema(schema: &Value) -> Value {
    if let Some(first) = schema
        .get("enum")
        .and_then(Value::as_array)
        .and_then(|values| values.first())
    {
        return first.clone();
    }

    let declared_type = schema.get("type").and_then(Value::as_str);
    match declared_type {
        Some("string") => json!("sample"),
        Some("integer") => json!(1),
        Some("number") => json!(1.0),
        Some("boolean") => json!(true),
        Some("array") => {
            let min_items = schema.get("minItems").and_then(Value::as_u64).unwrap_or(0);
            if min_items > 0 {
                let item = schema
                    .get("items")
                    .map(instance_from_schema)
                    .unwrap_or_else(|| json!({}));
                Value::Array(vec![item; min_items as usize])
            } else {
                json!([])
            }
        }
        Some("object") | None => {
            let mut out = Map::new();
            let properties = schema.get("properties").and_then(Value::as_object);
            if let (Some(properties), Some(required)) =
                (properties, schema.get("required").and_then(Value::as_array))
            {
                for name in required.iter().filter_map(Value::as_str) {
                    if let Some(sub) = properties.get(name) {
                        out.insert(name.to_string(), instance_from_schema(sub));
                    }
                }
            }
            Value::Object(out)
        }
        _ => json!({}),
    }
}

fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
    rest.trim_end()
        .strip_suffix("```")
        .unwrap_or(rest)
        .trim()
}
