//! OpenAPI 3.x normalization
//!
//! Hand-rolled walk over the JSON document; only the subset the pipeline
//! needs is interpreted. The input schema of an operation is assembled as
//! one object schema: path/query parameters by name plus a `body` property
//! when a JSON request body is declared, so the generator and the target
//! client agree on how a payload splits back into a request.

use serde_json::{json, Map, Value};

use shared::{ApiModel, ErrorResponse, Operation, OperationBinding, ProtocolKind, ResponseCode};

use crate::error::{EngineError, EngineResult};

const METHODS: &[&str] = &["get", "put", "post", "delete", "patch", "head", "options"];

pub(super) fn parse(text: &str) -> EngineResult<ApiModel> {
    let doc: Value = serde_json::from_str(text).map_err(|e| EngineError::MalformedSpec {
        message: format!("invalid JSON: {e}"),
    })?;

    let version = doc
        .get("openapi")
        .and_then(Value::as_str)
        .ok_or_else(|| EngineError::MalformedSpec {
            message: "missing `openapi` version field".to_string(),
        })?;
    if !version.starts_with("3.") {
        return Err(EngineError::UnsupportedFeature {
            feature: format!("OpenAPI version {version} (expected 3.x)"),
        });
    }

    let paths = match doc.get("paths").and_then(Value::as_object) {
        Some(p) => p,
        None => {
            return Ok(ApiModel {
                protocol: ProtocolKind::Rest,
                operations: Vec::new(),
            })
        }
    };

    let mut operations = Vec::new();
    for (path, item) in paths {
        let Some(item_obj) = item.as_object() else {
            continue;
        };
        // path-item-level parameters apply to every method below it
        let shared_params = item_obj
            .get("parameters")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        for (method, op) in item_obj {
            if !METHODS.contains(&method.as_str()) {
                continue;
            }
            let Some(op_obj) = op.as_object() else {
                continue;
            };
            operations.push(parse_operation(&doc, path, method, op_obj, &shared_params)?);
        }
    }

    Ok(ApiModel {
        protocol: ProtocolKind::Rest,
        operations,
    })
}

fn parse_operation(
    doc: &Value,
    path: &str,
    method: &str,
    op: &Map<String, Value>,
    shared_params: &[Value],
) -> EngineResult<Operation> {
    let id = op
        .get("operationId")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("{} {}", method.to_uppercase(), path));

    let mut properties = Map::new();
    let mut required = Vec::new();

    let mut params = shared_params.to_vec();
    if let Some(own) = op.get("parameters").and_then(Value::as_array) {
        params.extend(own.iter().cloned());
    }

    for param in &params {
        let param = resolve(param, doc, &mut Vec::new())?;
        let Some(name) = param.get("name").and_then(Value::as_str) else {
            continue;
        };
        let location = param.get("in").and_then(Value::as_str).unwrap_or("query");
        if location != "path" && location != "query" {
            return Err(EngineError::UnsupportedFeature {
                feature: format!("parameter location `{location}` on {id}"),
            });
        }
        let schema = param.get("schema").cloned().unwrap_or_else(|| json!({}));
        let schema = resolve(&schema, doc, &mut Vec::new())?;
        if location == "path" || param.get("required").and_then(Value::as_bool).unwrap_or(false) {
            required.push(Value::String(name.to_string()));
        }
        properties.insert(name.to_string(), schema);
    }

    if let Some(body) = op.get("requestBody") {
        let body = resolve(body, doc, &mut Vec::new())?;
        match body.pointer("/content/application~1json/schema") {
            Some(schema) => {
                if body.get("required").and_then(Value::as_bool).unwrap_or(false) {
                    required.push(Value::String("body".to_string()));
                }
                properties.insert("body".to_string(), schema.clone());
            }
            None => {
                if body.get("content").is_some() {
                    return Err(EngineError::UnsupportedFeature {
                        feature: format!("non-JSON request body on {id}"),
                    });
                }
            }
        }
    }

    let input_schema = json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false
    });

    let mut success: Option<(u16, Value)> = None;
    let mut error_responses = Vec::new();
    if let Some(responses) = op.get("responses").and_then(Value::as_object) {
        for (code_str, resp) in responses {
            if code_str == "default" {
                continue;
            }
            let code: u16 = code_str
                .parse()
                .map_err(|_| EngineError::UnsupportedFeature {
                    feature: format!("response code pattern `{code_str}` on {id}"),
                })?;
            let resp = resolve(resp, doc, &mut Vec::new())?;
            let schema = resp
                .pointer("/content/application~1json/schema")
                .cloned();
            if (200..300).contains(&code) {
                if success.is_none() {
                    success = Some((code, schema.unwrap_or_else(|| json!({}))));
                }
            } else {
                error_responses.push(ErrorResponse {
                    code: ResponseCode::Status(code),
                    schema,
                });
            }
        }
    }
    let (success_status, output_schema) = success.unwrap_or((200, json!({})));

    Ok(Operation {
        id,
        binding: OperationBinding::Rest {
            method: method.to_uppercase(),
            path: path.to_string(),
        },
        input_schema,
        output_schema,
        success_code: ResponseCode::Status(success_status),
        error_responses,
    })
}

/// Inline every `$ref` in `value`, failing on external, unresolvable or
/// circular references
fn resolve(value: &Value, doc: &Value, stack: &mut Vec<String>) -> EngineResult<Value> {
    match value {
        Value::Object(map) => {
            if let Some(reference) = map.get("$ref").and_then(Value::as_str) {
                let Some(pointer) = reference.strip_prefix('#') else {
                    return Err(EngineError::UnsupportedFeature {
                        feature: format!("external schema reference: {reference}"),
                    });
                };
                if stack.iter().any(|seen| seen == reference) {
                    return Err(EngineError::UnsupportedFeature {
                        feature: format!("circular schema reference: {reference}"),
                    });
                }
                let target = doc.pointer(pointer).ok_or_else(|| {
                    EngineError::UnsupportedFeature {
                        feature: format!("unresolvable schema reference: {reference}"),
                    }
                })?;
                stack.push(reference.to_string());
                let resolved = resolve(target, doc, stack)?;
                stack.pop();
                Ok(resolved)
            } else {
                let mut out = Map::with_capacity(map.len());
                for (key, val) in map {
                    out.insert(key.clone(), resolve(val, doc, stack)?);
                }
                Ok(Value::Object(out))
            }
        }
        Value::Array(items) => Ok(Value::Array(
            items
                .iter()
                .map(|item| resolve(item, doc, stack))
                .collect::<EngineResult<Vec<_>>>()?,
        )),
        other => Ok(other.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users_spec() -> String {
        json!({
            "openapi": "3.0.3",
            "info": {"title": "users", "version": "1.0"},
            "paths": {
                "/users/{id}": {
                    "parameters": [
                        {"name": "id", "in": "path", "required": true,
                         "schema": {"type": "integer"}}
                    ],
                    "get": {
                        "operationId": "getUser",
                        "responses": {
                            "200": {
                                "description": "ok",
                                "content": {"application/json": {
                                    "schema": {"$ref": "#/components/schemas/User"}
                                }}
                            },
                            "404": {"description": "missing"}
                        }
                    }
                },
                "/users": {
                    "post": {
                        "operationId": "createUser",
                        "requestBody": {
                            "required": true,
                            "content": {"application/json": {
                                "schema": {"$ref": "#/components/schemas/User"}
                            }}
                        },
                        "responses": {
                            "201": {"description": "created"},
                            "400": {"description": "invalid"}
                        }
                    }
                }
            },
            "components": {"schemas": {
                "User": {
                    "type": "object",
                    "properties": {
                        "id": {"type": "integer"},
                        "name": {"type": "string"}
                    },
                    "required": ["id", "name"]
                }
            }}
        })
        .to_string()
    }

    #[test]
    fn test_parses_operations_and_inlines_refs() {
        let model = parse(&users_spec()).unwrap();
        assert_eq!(model.operations.len(), 2);

        let get_user = model.operation("getUser").unwrap();
        assert_eq!(
            get_user.binding,
            OperationBinding::Rest {
                method: "GET".to_string(),
                path: "/users/{id}".to_string(),
            }
        );
        assert_eq!(get_user.success_code, ResponseCode::Status(200));
        assert_eq!(get_user.error_responses.len(), 1);

        // the shared path parameter landed in the input schema
        assert_eq!(
            get_user.input_schema.pointer("/properties/id/type"),
            Some(&json!("integer"))
        );

        // refs are gone everywhere
        let serialized = serde_json::to_string(&model).unwrap();
        assert!(!serialized.contains("$ref"));
    }

    #[test]
    fn test_request_body_becomes_body_property() {
        let model = parse(&users_spec()).unwrap();
        let create = model.operation("createUser").unwrap();
        assert_eq!(
            create.input_schema.pointer("/properties/body/type"),
            Some(&json!("object"))
        );
        assert!(create
            .input_schema
            .pointer("/required")
            .unwrap()
            .as_array()
            .unwrap()
            .contains(&json!("body")));
    }

    #[test]
    fn test_malformed_json_is_malformed_spec() {
        let err = parse("{not json").unwrap_err();
        assert!(matches!(err, EngineError::MalformedSpec { .. }));
    }

    #[test]
    fn test_swagger_2_is_unsupported() {
        let err = parse(r#"{"swagger": "2.0", "openapi": "2.0", "paths": {}}"#).unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedFeature { .. }));
    }

    #[test]
    fn test_external_ref_is_unsupported() {
        let spec = json!({
            "openapi": "3.0.0",
            "paths": {"/x": {"get": {
                "operationId": "x",
                "parameters": [{"name": "q", "in": "query",
                    "schema": {"$ref": "https://example.com/schemas.json#/Q"}}],
                "responses": {"200": {"description": "ok"}}
            }}}
        })
        .to_string();
        let err = parse(&spec).unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedFeature { .. }));
    }

    #[test]
    fn test_circular_ref_is_unsupported() {
        let spec = json!({
            "openapi": "3.0.0",
            "paths": {"/x": {"post": {
                "operationId": "x",
                "requestBody": {"content": {"application/json": {
                    "schema": {"$ref": "#/components/schemas/Node"}
                }}},
                "responses": {"200": {"description": "ok"}}
            }}},
            "components": {"schemas": {
                "Node": {"type": "object", "properties": {
                    "next": {"$ref": "#/components/schemas/Node"}
                }}
            }}
        })
        .to_string();
        let err = parse(&spec).unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedFeature { .. }));
    }

    #[test]
    fn test_dangling_ref_is_unsupported() {
        let spec = json!({
            "openapi": "3.0.0",
            "paths": {"/x": {"get": {
                "operationId": "x",
                "responses": {"200": {
                    "description": "ok",
                    "content": {"application/json": {
                        "schema": {"$ref": "#/components/schemas/Ghost"}
                    }}
                }}
            }}}
        })
        .to_string();
        let err = parse(&spec).unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedFeature { .. }));
    }

    #[test]
    fn test_operation_without_2xx_defaults_to_200() {
        let spec = json!({
            "openapi": "3.1.0",
            "paths": {"/ping": {"get": {
                "operationId": "ping",
                "responses": {"503": {"description": "down"}}
            }}}
        })
        .to_string();
        let model = parse(&spec).unwrap();
        let ping = model.operation("ping").unwrap();
        assert_eq!(ping.success_code, ResponseCode::Status(200));
        assert_eq!(ping.error_responses[0].code, ResponseCode::Status(503));
    }
}
