//! WSDL 1.1 normalization
//!
//! Element declarations from the inline XSD are converted into the same
//! JSON-Schema shape the REST side produces, so everything downstream of
//! the normalizer is protocol-agnostic. Only doc/literal and simple
//! RPC-style messages are supported; imports and WSDL 2.0 are not.

use std::collections::HashMap;

use roxmltree::{Document, Node};
use serde_json::{json, Map, Value};

use shared::{ApiModel, ErrorResponse, Operation, OperationBinding, ProtocolKind, ResponseCode};

use crate::error::{EngineError, EngineResult};

const WSDL_NS: &str = "http://schemas.xmlsoap.org/wsdl/";
const SOAP_NS: &str = "http://schemas.xmlsoap.org/wsdl/soap/";
const SOAP12_NS: &str = "http://schemas.xmlsoap.org/wsdl/soap12/";
const XSD_NS: &str = "http://www.w3.org/2001/XMLSchema";
const WSDL20_NS: &str = "http://www.w3.org/ns/wsdl";

pub(super) fn parse(text: &str) -> EngineResult<ApiModel> {
    let doc = Document::parse(text).map_err(|e| EngineError::MalformedSpec {
        message: format!("invalid XML: {e}"),
    })?;

    let root = doc.root_element();
    if root.tag_name().namespace() == Some(WSDL20_NS) {
        return Err(EngineError::UnsupportedFeature {
            feature: "WSDL 2.0 documents".to_string(),
        });
    }
    if !is_named(root, WSDL_NS, "definitions") {
        return Err(EngineError::MalformedSpec {
            message: "root element is not wsdl:definitions".to_string(),
        });
    }
    let target_ns = root.attribute("targetNamespace").unwrap_or("").to_string();

    for node in doc.descendants().filter(|n| n.is_element()) {
        if node.tag_name().name() == "import"
            && matches!(node.tag_name().namespace(), Some(WSDL_NS) | Some(XSD_NS))
        {
            return Err(EngineError::UnsupportedFeature {
                feature: "external import".to_string(),
            });
        }
    }

    let elements = collect_elements(root)?;
    let messages = collect_messages(root, &elements)?;
    let actions = collect_soap_actions(root)?;

    let mut operations = Vec::new();
    for port_type in root
        .children()
        .filter(|n| is_named(*n, WSDL_NS, "portType"))
    {
        for op_node in port_type
            .children()
            .filter(|n| is_named(*n, WSDL_NS, "operation"))
        {
            let Some(name) = op_node.attribute("name") else {
                continue;
            };

            let input = message_shape_for(&messages, op_node, "input", name)?;
            let Some(input) = input else {
                return Err(EngineError::UnsupportedFeature {
                    feature: format!("operation {name} has no input message"),
                });
            };
            let output = message_shape_for(&messages, op_node, "output", name)?;

            let mut error_responses = Vec::new();
            for fault in op_node
                .children()
                .filter(|n| is_named(*n, WSDL_NS, "fault"))
            {
                let fault_name = fault.attribute("name").unwrap_or("Server");
                let schema = fault
                    .attribute("message")
                    .and_then(|m| messages.get(local_name(m)))
                    .map(|shape| shape.schema.clone());
                error_responses.push(ErrorResponse {
                    code: ResponseCode::fault(fault_name),
                    schema,
                });
            }

            operations.push(Operation {
                id: name.to_string(),
                binding: OperationBinding::Soap {
                    action: actions.get(name).cloned().unwrap_or_default(),
                    input_element: input.element.unwrap_or_else(|| name.to_string()),
                    namespace: target_ns.clone(),
                },
                input_schema: input.schema,
                output_schema: output.map(|o| o.schema).unwrap_or_else(|| json!({})),
                success_code: ResponseCode::Status(200),
                error_responses,
            });
        }
    }

    Ok(ApiModel {
        protocol: ProtocolKind::Soap,
        operations,
    })
}

/// Schema plus (for doc/literal) the wrapping element's local name
struct MessageShape {
    schema: Value,
    element: Option<String>,
}

fn message_shape_for(
    messages: &HashMap<String, MessageShape>,
    op_node: Node,
    direction: &str,
    op_name: &str,
) -> EngineResult<Option<MessageShape>> {
    let Some(node) = op_node
        .children()
        .find(|n| is_named(*n, WSDL_NS, direction))
    else {
        return Ok(None);
    };
    let Some(message_ref) = node.attribute("message") else {
        return Ok(None);
    };
    let key = local_name(message_ref);
    match messages.get(key) {
        Some(shape) => Ok(Some(MessageShape {
            schema: shape.schema.clone(),
            element: shape.element.clone(),
        })),
        None => Err(EngineError::UnsupportedFeature {
            feature: format!("unresolvable message `{key}` on operation {op_name}"),
        }),
    }
}

/// Walk `types/xsd:schema` collecting top-level element declarations as
/// JSON-Schema objects
fn collect_elements(root: Node) -> EngineResult<HashMap<String, Value>> {
    let mut complex_types: HashMap<String, Node> = HashMap::new();
    let mut element_nodes: Vec<Node> = Vec::new();

    for types in root.children().filter(|n| is_named(*n, WSDL_NS, "types")) {
        for schema in types.children().filter(|n| is_named(*n, XSD_NS, "schema")) {
            for child in schema.children().filter(|n| n.is_element()) {
                if is_named(child, XSD_NS, "complexType") {
                    if let Some(name) = child.attribute("name") {
                        complex_types.insert(name.to_string(), child);
                    }
                } else if is_named(child, XSD_NS, "element") {
                    element_nodes.push(child);
                }
            }
        }
    }

    let mut elements = HashMap::new();
    for node in element_nodes {
        let Some(name) = node.attribute("name") else {
            continue;
        };
        let schema = schema_for_element(node, &complex_types, &mut Vec::new())?;
        elements.insert(name.to_string(), schema);
    }
    Ok(elements)
}

fn schema_for_element(
    node: Node,
    complex_types: &HashMap<String, Node>,
    stack: &mut Vec<String>,
) -> EngineResult<Value> {
    if let Some(type_ref) = node.attribute("type") {
        let local = local_name(type_ref);
        if let Some(schema) = xsd_simple_schema(local) {
            return Ok(schema);
        }
        let Some(complex) = complex_types.get(local) else {
            return Err(EngineError::UnsupportedFeature {
                feature: format!("unresolvable type reference `{type_ref}`"),
            });
        };
        if stack.iter().any(|seen| seen == local) {
            return Err(EngineError::UnsupportedFeature {
                feature: format!("circular type reference `{type_ref}`"),
            });
        }
        stack.push(local.to_string());
        let schema = schema_for_complex(*complex, complex_types, stack)?;
        stack.pop();
        return Ok(schema);
    }

    if let Some(inline) = node
        .children()
        .find(|n| is_named(*n, XSD_NS, "complexType"))
    {
        return schema_for_complex(inline, complex_types, stack);
    }

    Ok(json!({}))
}

fn schema_for_complex(
    node: Node,
    complex_types: &HashMap<String, Node>,
    stack: &mut Vec<String>,
) -> EngineResult<Value> {
    let Some(sequence) = node
        .children()
        .find(|n| is_named(*n, XSD_NS, "sequence") || is_named(*n, XSD_NS, "all"))
    else {
        return Ok(json!({}));
    };

    let mut properties = Map::new();
    let mut required = Vec::new();
    for member in sequence
        .children()
        .filter(|n| is_named(*n, XSD_NS, "element"))
    {
        let Some(name) = member.attribute("name") else {
            continue;
        };
        let mut schema = schema_for_element(member, complex_types, stack)?;
        if member.attribute("maxOccurs").is_some_and(|m| m != "1") {
            schema = json!({"type": "array", "items": schema});
        }
        if member.attribute("minOccurs") != Some("0") {
            required.push(Value::String(name.to_string()));
        }
        properties.insert(name.to_string(), schema);
    }

    Ok(json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false
    }))
}

/// Join message names to their part schemas.
///
/// A single element-typed part keeps its wrapping element name
/// (doc/literal); typed parts are folded into one object keyed by part
/// name (RPC style).
fn collect_messages(
    root: Node,
    elements: &HashMap<String, Value>,
) -> EngineResult<HashMap<String, MessageShape>> {
    let mut messages = HashMap::new();
    for message in root.children().filter(|n| is_named(*n, WSDL_NS, "message")) {
        let Some(name) = message.attribute("name") else {
            continue;
        };
        let parts: Vec<Node> = message
            .children()
            .filter(|n| is_named(*n, WSDL_NS, "part"))
            .collect();

        let shape = if parts.len() == 1 && parts[0].attribute("element").is_some() {
            let element_ref = parts[0].attribute("element").unwrap();
            let local = local_name(element_ref);
            let Some(schema) = elements.get(local) else {
                return Err(EngineError::UnsupportedFeature {
                    feature: format!("message `{name}` references undeclared element `{local}`"),
                });
            };
            MessageShape {
                schema: schema.clone(),
                element: Some(local.to_string()),
            }
        } else {
            let mut properties = Map::new();
            let mut required = Vec::new();
            for part in &parts {
                let Some(part_name) = part.attribute("name") else {
                    continue;
                };
                let schema = match (part.attribute("element"), part.attribute("type")) {
                    (Some(element_ref), _) => {
                        let local = local_name(element_ref);
                        elements.get(local).cloned().ok_or_else(|| {
                            EngineError::UnsupportedFeature {
                                feature: format!(
                                    "message `{name}` references undeclared element `{local}`"
                                ),
                            }
                        })?
                    }
                    (None, Some(type_ref)) => xsd_simple_schema(local_name(type_ref))
                        .unwrap_or_else(|| json!({})),
                    (None, None) => json!({}),
                };
                required.push(Value::String(part_name.to_string()));
                properties.insert(part_name.to_string(), schema);
            }
            MessageShape {
                schema: json!({
                    "type": "object",
                    "properties": properties,
                    "required": required,
                    "additionalProperties": false
                }),
                element: None,
            }
        };
        messages.insert(name.to_string(), shape);
    }
    Ok(messages)
}

/// SOAPAction values from SOAP 1.1 bindings, keyed by operation name
fn collect_soap_actions(root: Node) -> EngineResult<HashMap<String, String>> {
    let mut actions = HashMap::new();
    let mut saw_soap12 = false;

    for binding in root.children().filter(|n| is_named(*n, WSDL_NS, "binding")) {
        let is_soap11 = binding
            .children()
            .any(|n| is_named(n, SOAP_NS, "binding"));
        if !is_soap11 {
            if binding
                .children()
                .any(|n| is_named(n, SOAP12_NS, "binding"))
            {
                saw_soap12 = true;
            }
            continue;
        }
        for op_node in binding
            .children()
            .filter(|n| is_named(*n, WSDL_NS, "operation"))
        {
            let Some(name) = op_node.attribute("name") else {
                continue;
            };
            if let Some(soap_op) = op_node
                .children()
                .find(|n| is_named(*n, SOAP_NS, "operation"))
            {
                if let Some(action) = soap_op.attribute("soapAction") {
                    actions.insert(name.to_string(), action.to_string());
                }
            }
        }
    }

    if actions.is_empty() && saw_soap12 {
        return Err(EngineError::UnsupportedFeature {
            feature: "SOAP 1.2 bindings".to_string(),
        });
    }
    Ok(actions)
}

fn is_named(node: Node, ns: &str, name: &str) -> bool {
    node.is_element() && node.tag_name().name() == name && node.tag_name().namespace() == Some(ns)
}

/// Strip an optional namespace prefix from a QName value
fn local_name(qname: &str) -> &str {
    qname.rsplit(':').next().unwrap_or(qname)
}

fn xsd_simple_schema(local: &str) -> Option<Value> {
    let schema = match local {
        "string" | "anyURI" | "date" | "dateTime" | "time" | "duration" | "base64Binary"
        | "hexBinary" | "QName" | "token" | "normalizedString" => json!({"type": "string"}),
        "int" | "integer" | "long" | "short" | "byte" | "unsignedInt" | "unsignedLong"
        | "unsignedShort" | "unsignedByte" | "nonNegativeInteger" | "positiveInteger" => {
            json!({"type": "integer"})
        }
        "decimal" | "float" | "double" => json!({"type": "number"}),
        "boolean" => json!({"type": "boolean"}),
        _ => return None,
    };
    Some(schema)
}
