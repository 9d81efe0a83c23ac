//! Response validation
//!
//! A pure function from execution record to verdict: no state, no I/O, so
//! re-validating the same record always yields the same verdict. `Error`
//! strictly means "could not evaluate"; a comparison that ran and
//! diverged is always `Fail`.

use roxmltree::{Document, Node};
use serde_json::Value;

use shared::{
    ExecutionRecord, Mismatch, PayloadFragment, ScenarioState, Strictness, ValidationConfig,
    Verdict, VerdictClass,
};

pub fn validate(record: &ExecutionRecord, config: &ValidationConfig) -> Verdict {
    let scenario = &record.scenario;

    if record.state != ScenarioState::Succeeded {
        return Verdict {
            scenario_id: scenario.id,
            operation_id: scenario.operation_id.clone(),
            classification: VerdictClass::Error,
            mismatches: Vec::new(),
            detail: Some(
                record
                    .failure
                    .clone()
                    .unwrap_or_else(|| format!("no response ({:?})", record.state)),
            ),
        };
    }

    let Some(response) = record.response.as_ref() else {
        return Verdict {
            scenario_id: scenario.id,
            operation_id: scenario.operation_id.clone(),
            classification: VerdictClass::Error,
            mismatches: Vec::new(),
            detail: Some("succeeded record carries no response".to_string()),
        };
    };

    let mut mismatches = Vec::new();

    if !scenario.expected.accepted.contains(&response.code) {
        let expected = scenario
            .expected
            .accepted
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(" | ");
        mismatches.push(Mismatch {
            path: "$status".to_string(),
            expected,
            actual: response.code.to_string(),
        });
    }

    if let Some(fragment) = &scenario.expected.payload {
        match fragment {
            PayloadFragment::Json(expected) => match serde_json::from_str::<Value>(&response.body)
            {
                Ok(actual) => {
                    diff_json(expected, &actual, "$", config.strictness, &mut mismatches)
                }
                Err(e) => mismatches.push(Mismatch {
                    path: "$body".to_string(),
                    expected: "a JSON payload".to_string(),
                    actual: format!("unparseable body: {e}"),
                }),
            },
            PayloadFragment::Xml(expected) => {
                if let Err(detail) =
                    diff_xml(expected, &response.body, config.strictness, &mut mismatches)
                {
                    // the expectation itself is unusable, so no comparison
                    // was performed
                    return Verdict {
                        scenario_id: scenario.id,
                        operation_id: scenario.operation_id.clone(),
                        classification: VerdictClass::Error,
                        mismatches: Vec::new(),
                        detail: Some(detail),
                    };
                }
            }
        }
    }

    Verdict {
        scenario_id: scenario.id,
        operation_id: scenario.operation_id.clone(),
        classification: if mismatches.is_empty() {
            VerdictClass::Pass
        } else {
            VerdictClass::Fail
        },
        mismatches,
        detail: None,
    }
}

/// Structural JSON diff: field-order insensitive, numeric fields compare
/// by value. `Lenient` ignores unexpected actual fields, `Strict` flags
/// them.
fn diff_json(
    expected: &Value,
    actual: &Value,
    path: &str,
    strictness: Strictness,
    out: &mut Vec<Mismatch>,
) {
    match (expected, actual) {
        (Value::Number(e), Value::Number(a)) => {
            if !numbers_equal(e, a) {
                out.push(mismatch(path, expected, actual));
            }
        }
        (Value::Object(e), Value::Object(a)) => {
            for (key, expected_value) in e {
                let child_path = format!("{path}.{key}");
                match a.get(key) {
                    Some(actual_value) => {
                        diff_json(expected_value, actual_value, &child_path, strictness, out)
                    }
                    None => out.push(Mismatch {
                        path: child_path,
                        expected: render(expected_value),
                        actual: "missing".to_string(),
                    }),
                }
            }
            if strictness == Strictness::Strict {
                for (key, actual_value) in a {
                    if !e.contains_key(key) {
                        out.push(Mismatch {
                            path: format!("{path}.{key}"),
                            expected: "absent".to_string(),
                            actual: render(actual_value),
                        });
                    }
                }
            }
        }
        (Value::Array(e), Value::Array(a)) => {
            if e.len() != a.len() {
                out.push(Mismatch {
                    path: path.to_string(),
                    expected: format!("array of {}", e.len()),
                    actual: format!("array of {}", a.len()),
                });
            }
            for (index, (expected_item, actual_item)) in e.iter().zip(a.iter()).enumerate() {
                diff_json(
                    expected_item,
                    actual_item,
                    &format!("{path}[{index}]"),
                    strictness,
                    out,
                );
            }
        }
        _ => {
            if expected != actual {
                out.push(mismatch(path, expected, actual));
            }
        }
    }
}

fn numbers_equal(a: &serde_json::Number, b: &serde_json::Number) -> bool {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x == y;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

fn mismatch(path: &str, expected: &Value, actual: &Value) -> Mismatch {
    Mismatch {
        path: path.to_string(),
        expected: render(expected),
        actual: render(actual),
    }
}

fn render(value: &Value) -> String {
    let mut text = value.to_string();
    if text.len() > 120 {
        text.truncate(117);
        text.push_str("...");
    }
    text
}

/// Structural XML diff over parsed element trees.
///
/// Prefix aliasing is tolerated (elements compare by namespace URI and
/// local name), namespace URI differences are not. `Err` means the
/// expected fragment itself was unusable and no comparison happened.
fn diff_xml(
    expected_xml: &str,
    actual_body: &str,
    strictness: Strictness,
    out: &mut Vec<Mismatch>,
) -> Result<(), String> {
    let expected_doc = Document::parse(expected_xml)
        .map_err(|e| format!("expected XML fragment does not parse: {e}"))?;
    let expected_root = expected_doc.root_element();

    let actual_doc = match Document::parse(actual_body) {
        Ok(doc) => doc,
        Err(e) => {
            out.push(Mismatch {
                path: "$body".to_string(),
                expected: "an XML payload".to_string(),
                actual: format!("unparseable body: {e}"),
            });
            return Ok(());
        }
    };

    // the expectation is usually a fragment of the full response (e.g.
    // the payload element inside a SOAP envelope), so anchor on the first
    // matching element anywhere in the actual tree
    let anchor = actual_doc
        .descendants()
        .find(|n| n.is_element() && same_name(*n, expected_root));
    let Some(anchor) = anchor else {
        out.push(Mismatch {
            path: format!("/{}", expected_root.tag_name().name()),
            expected: "element present".to_string(),
            actual: "not found".to_string(),
        });
        return Ok(());
    };

    diff_element(
        expected_root,
        anchor,
        &format!("/{}", expected_root.tag_name().name()),
        strictness,
        out,
    );
    Ok(())
}

fn diff_element(
    expected: Node,
    actual: Node,
    path: &str,
    strictness: Strictness,
    out: &mut Vec<Mismatch>,
) {
    for attribute in expected.attributes() {
        let actual_value = actual
            .attributes()
            .find(|a| a.name() == attribute.name() && a.namespace() == attribute.namespace())
            .map(|a| a.value());
        match actual_value {
            Some(value) if values_equal(attribute.value(), value) => {}
            Some(value) => out.push(Mismatch {
                path: format!("{path}/@{}", attribute.name()),
                expected: attribute.value().to_string(),
                actual: value.to_string(),
            }),
            None => out.push(Mismatch {
                path: format!("{path}/@{}", attribute.name()),
                expected: attribute.value().to_string(),
                actual: "missing".to_string(),
            }),
        }
    }

    let expected_children: Vec<Node> = expected.children().filter(|n| n.is_element()).collect();
    let actual_children: Vec<Node> = actual.children().filter(|n| n.is_element()).collect();

    if expected_children.is_empty() {
        let expected_text = element_text(expected);
        let actual_text = element_text(actual);
        if !values_equal(&expected_text, &actual_text) {
            out.push(Mismatch {
                path: path.to_string(),
                expected: expected_text,
                actual: actual_text,
            });
        }
        return;
    }

    // order-preserving match of expected children against the actual
    // sequence; extras in between are skipped when lenient
    let mut cursor = 0usize;
    let mut matched = vec![false; actual_children.len()];
    for expected_child in &expected_children {
        let child_path = format!("{path}/{}", expected_child.tag_name().name());
        let found = actual_children[cursor..]
            .iter()
            .position(|candidate| same_name(*candidate, *expected_child));
        match found {
            Some(offset) => {
                let index = cursor + offset;
                matched[index] = true;
                diff_element(*expected_child, actual_children[index], &child_path, strictness, out);
                cursor = index + 1;
            }
            None => out.push(Mismatch {
                path: child_path,
                expected: "element present".to_string(),
                actual: "missing".to_string(),
            }),
        }
    }

    if strictness == Strictness::Strict {
        for (index, actual_child) in actual_children.iter().enumerate() {
            if !matched[index] {
                out.push(Mismatch {
                    path: format!("{path}/{}", actual_child.tag_name().name()),
                    expected: "absent".to_string(),
                    actual: "unexpected element".to_string(),
                });
            }
        }
    }
}

/// Elements match on (namespace URI, local name); the prefix is noise
fn same_name(a: Node, b: Node) -> bool {
    a.tag_name().name() == b.tag_name().name()
        && a.tag_name().namespace() == b.tag_name().namespace()
}

fn element_text(node: Node) -> String {
    node.children()
        .filter_map(|n| n.text())
        .collect::<String>()
        .trim()
        .to_string()
}

/// Text equality with the same numeric-by-value policy as JSON fields
fn values_equal(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    match (a.trim().parse::<f64>(), b.trim().parse::<f64>()) {
        (Ok(x), Ok(y)) => x == y,
        _ => false,
    }
}
