//! Target-system client
//!
//! Builds real HTTP requests out of scenario payloads: path parameters
//! substituted into the template, the `body` property as a JSON body,
//! everything else as query parameters. SOAP payloads are wrapped in a
//! SOAP 1.1 envelope; faults come back as `ResponseCode::Fault`.

use async_trait::async_trait;
use roxmltree::Document;
use serde_json::Value;
use url::Url;

use shared::{Operation, OperationBinding, ResponseCode, TargetConfig, TargetResponse};

use crate::traits::TargetClient;
use crate::types::TransportError;

/// Real target client over HTTP
pub struct HttpTargetClient {
    client: reqwest::Client,
}

impl HttpTargetClient {
    pub fn new() -> Self {
        // per-call timeouts are the executor's job, so the client itself
        // has none
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpTargetClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TargetClient for HttpTargetClient {
    async fn call(
        &self,
        operation: &Operation,
        input: &Value,
        target: &TargetConfig,
    ) -> Result<TargetResponse, TransportError> {
        match &operation.binding {
            OperationBinding::Rest { method, path } => {
                self.call_rest(method, path, input, target).await
            }
            OperationBinding::Soap {
                action,
                input_element,
                namespace,
            } => {
                self.call_soap(action, input_element, namespace, input, target)
                    .await
            }
        }
    }
}

impl HttpTargetClient {
    async fn call_rest(
        &self,
        method: &str,
        path: &str,
        input: &Value,
        target: &TargetConfig,
    ) -> Result<TargetResponse, TransportError> {
        let empty = serde_json::Map::new();
        let fields = input.as_object().unwrap_or(&empty);

        let mut rendered_path = path.to_string();
        let mut query: Vec<(String, String)> = Vec::new();
        let mut body: Option<&Value> = None;
        for (name, value) in fields {
            let placeholder = format!("{{{name}}}");
            if rendered_path.contains(&placeholder) {
                rendered_path = rendered_path.replace(&placeholder, &scalar_text(value));
            } else if name == "body" {
                body = Some(value);
            } else {
                query.push((name.clone(), scalar_text(value)));
            }
        }

        let mut base = target.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base = Url::parse(&base).map_err(|e| {
            TransportError::InvalidRequest(format!("invalid target base url: {e}"))
        })?;
        let url = base
            .join(rendered_path.trim_start_matches('/'))
            .map_err(|e| TransportError::InvalidRequest(format!("invalid request path: {e}")))?;

        let method = reqwest::Method::from_bytes(method.as_bytes())
            .map_err(|e| TransportError::InvalidRequest(format!("invalid method: {e}")))?;

        let mut builder = self.client.request(method, url);
        for (name, value) in &target.headers {
            builder = builder.header(name, value);
        }
        if !query.is_empty() {
            builder = builder.query(&query);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let started = std::time::Instant::now();
        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;
        let latency = started.elapsed();

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Network(format!("failed to read body: {e}")))?;

        Ok(TargetResponse {
            code: ResponseCode::Status(status),
            content_type,
            body,
            latency,
        })
    }

    async fn call_soap(
        &self,
        action: &str,
        input_element: &str,
        namespace: &str,
        input: &Value,
        target: &TargetConfig,
    ) -> Result<TargetResponse, TransportError> {
        let envelope = build_envelope(input_element, namespace, input);

        let mut builder = self
            .client
            .post(&target.base_url)
            .header("Content-Type", "text/xml; charset=utf-8")
            .header("SOAPAction", format!("\"{action}\""))
            .body(envelope);
        for (name, value) in &target.headers {
            builder = builder.header(name, value);
        }

        let started = std::time::Instant::now();
        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;
        let latency = started.elapsed();

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Network(format!("failed to read body: {e}")))?;

        // a SOAP fault outranks the HTTP status it rides on
        let code = match extract_fault_code(&body) {
            Some(fault) => ResponseCode::fault(&fault),
            None => ResponseCode::Status(status),
        };

        Ok(TargetResponse {
            code,
            content_type,
            body,
            latency,
        })
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Wrap an input payload into a SOAP 1.1 envelope
fn build_envelope(element: &str, namespace: &str, input: &Value) -> String {
    let mut body = String::new();
    write_element_body(input, &mut body);
    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\
         <soap:Envelope xmlns:soap=\"http://schemas.xmlsoap.org/soap/envelope/\">\
         <soap:Body>\
         <m:{element} xmlns:m=\"{namespace}\">{body}</m:{element}>\
         </soap:Body>\
         </soap:Envelope>"
    )
}

fn write_element_body(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            for (name, value) in map {
                write_field(name, value, out);
            }
        }
        other => out.push_str(&escape_xml(&scalar_text(other))),
    }
}

fn write_field(name: &str, value: &Value, out: &mut String) {
    match value {
        // repeated elements for arrays
        Value::Array(items) => {
            for item in items {
                write_field(name, item, out);
            }
        }
        Value::Object(_) => {
            out.push_str(&format!("<{name}>"));
            write_element_body(value, out);
            out.push_str(&format!("</{name}>"));
        }
        other => {
            out.push_str(&format!(
                "<{name}>{}</{name}>",
                escape_xml(&scalar_text(other))
            ));
        }
    }
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// SOAP 1.1 fault code from a response body, if it carries one
fn extract_fault_code(body: &str) -> Option<String> {
    let doc = Document::parse(body).ok()?;
    let fault = doc
        .descendants()
        .find(|n| n.is_element() && n.tag_name().name() == "Fault")?;
    let code = fault
        .descendants()
        .find(|n| n.is_element() && n.tag_name().name() == "faultcode")?;
    let text: String = code.children().filter_map(|n| n.text()).collect();
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod envelope_tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_wraps_fields_in_namespaced_element() {
        let envelope = build_envelope(
            "CreateOrder",
            "http://example.com/orders",
            &json!({"customerId": 7, "note": "a<b"}),
        );
        assert!(envelope.contains(r#"<m:CreateOrder xmlns:m="http://example.com/orders">"#));
        assert!(envelope.contains("<customerId>7</customerId>"));
        assert!(envelope.contains("<note>a&lt;b</note>"));
        assert!(envelope.starts_with("<?xml"));
    }

    #[test]
    fn test_arrays_become_repeated_elements() {
        let envelope = build_envelope(
            "Tag",
            "http://example.com",
            &json!({"item": ["a", "b"]}),
        );
        assert!(envelope.contains("<item>a</item><item>b</item>"));
    }

    #[test]
    fn test_fault_code_extraction() {
        let body = r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
            <soap:Body><soap:Fault>
                <faultcode>soap:Client</faultcode>
                <faultstring>bad input</faultstring>
            </soap:Fault></soap:Body></soap:Envelope>"#;
        assert_eq!(extract_fault_code(body), Some("soap:Client".to_string()));
        assert_eq!(extract_fault_code("<ok/>"), None);
        assert_eq!(extract_fault_code("not xml"), None);
    }
}
