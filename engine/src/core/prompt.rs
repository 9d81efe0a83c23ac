//! Prompt construction for the completion service
//!
//! Prompts demand strict JSON so replies survive the generator's gate;
//! the regenerate variant feeds rejection reasons back to the model.

use shared::{Operation, OperationBinding, ProtocolKind};

/// Initial request for one operation
pub fn initial(op: &Operation, protocol: ProtocolKind, limit: u32) -> String {
    let binding = describe_binding(&op.binding);
    let schema = op.input_schema.to_string();
    let codes = op
        .declared_codes()
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(", ");

    let payload_rule = match protocol {
        ProtocolKind::Rest => {
            "\"expected_payload\" (optional): a JSON fragment the response body must contain."
        }
        ProtocolKind::Soap => {
            "\"expected_payload\" (optional): an XML string the response body must contain."
        }
    };

    format!(
        "You are an API test generation expert. Generate up to {limit} test scenarios \
         for the operation below.\n\
         \n\
         Operation: {id}\n\
         Binding: {binding}\n\
         Input schema (JSON Schema): {schema}\n\
         Declared response codes: {codes}\n\
         \n\
         Reply with ONLY a JSON array. Each entry is an object with:\n\
         - \"kind\": \"happy\", \"boundary\" or \"negative\"\n\
         - \"input\": the request payload. It MUST validate against the input schema \
         above — for negative scenarios use schema-valid values that the service should \
         still reject (boundary numbers, wrong formats, references to absent resources) \
         and expect one of the declared error codes.\n\
         - \"expected_status\" (REST) or \"expected_fault\" (SOAP): one of the declared \
         response codes.\n\
         - {payload_rule}\n\
         \n\
         Rules: use literal values only, never code expressions; never use null for a \
         missing field, omit it instead; no prose, no markdown fences, JSON only.",
        id = op.id,
    )
}

/// Retry request after every candidate of the previous reply was rejected
pub fn regenerate(op: &Operation, protocol: ProtocolKind, limit: u32, rejections: &[String]) -> String {
    let mut prompt = initial(op, protocol, limit);
    prompt.push_str("\n\nYour previous reply was rejected:\n");
    for reason in rejections.iter().take(5) {
        prompt.push_str("- ");
        prompt.push_str(reason);
        prompt.push('\n');
    }
    prompt.push_str("Fix these problems and reply again with JSON only.");
    prompt
}

fn describe_binding(binding: &OperationBinding) -> String {
    match binding {
        OperationBinding::Rest { method, path } => format!("{method} {path}"),
        OperationBinding::Soap { action, .. } => format!("SOAP action {action}"),
    }
}
