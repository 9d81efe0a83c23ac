//! Shared fixtures for engine integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use engine::services::{InMemoryResultStore, InMemorySpecStore};
use engine::traits::CompletionClient;
use engine::types::{CompletionFailure, CompletionReply, CompletionRequest};
use engine::Pipeline;
use shared::{ExecutionConfig, GenerationOptions, TargetConfig, ValidationConfig};

/// Completion client that answers from a fixed script, keyed by
/// operation id. Operations without a script get a server error, which
/// the generator absorbs via its fallback path.
pub struct ScriptedCompletion {
    replies: HashMap<String, String>,
}

impl ScriptedCompletion {
    pub fn new() -> Self {
        Self {
            replies: HashMap::new(),
        }
    }

    pub fn with_reply(mut self, operation_id: &str, content: &str) -> Self {
        self.replies
            .insert(operation_id.to_string(), content.to_string());
        self
    }
}

#[async_trait]
impl CompletionClient for ScriptedCompletion {
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionReply, CompletionFailure> {
        match self.replies.get(&request.operation_id) {
            Some(content) => Ok(CompletionReply {
                content: content.clone(),
                model: request.model.clone(),
                tokens_used: 10,
                latency: Duration::from_millis(5),
            }),
            None => Err(CompletionFailure::ServerError(
                "no scripted reply".to_string(),
            )),
        }
    }
}

/// Completion client whose endpoint is down for the whole run
pub struct DeadCompletion;

#[async_trait]
impl CompletionClient for DeadCompletion {
    async fn complete(
        &self,
        _request: &CompletionRequest,
    ) -> Result<CompletionReply, CompletionFailure> {
        Err(CompletionFailure::Unreachable(
            "connection refused".to_string(),
        ))
    }
}

/// Users API: GET /users/{id} and POST /users over a shared User schema
pub fn users_openapi() -> Vec<u8> {
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
    .into_bytes()
}

/// Orders API: a single POST /orders with free-form input
pub fn orders_openapi() -> Vec<u8> {
    json!({
        "openapi": "3.0.3",
        "info": {"title": "orders", "version": "1.0"},
        "paths": {
            "/orders": {
                "post": {
                    "operationId": "createOrder",
                    "responses": {
                        "201": {"description": "created"},
                        "400": {"description": "invalid"}
                    }
                }
            },
            "/ping": {
                "get": {
                    "operationId": "ping",
                    "responses": {"200": {"description": "ok"}}
                }
            }
        }
    })
    .to_string()
    .into_bytes()
}

pub const ORDERS_WSDL: &str = r#"<?xml version="1.0"?>
<wsdl:definitions name="Orders"
    targetNamespace="http://example.com/orders"
    xmlns:wsdl="http://schemas.xmlsoap.org/wsdl/"
    xmlns:soap="http://schemas.xmlsoap.org/wsdl/soap/"
    xmlns:xsd="http://www.w3.org/2001/XMLSchema"
    xmlns:tns="http://example.com/orders">
  <wsdl:types>
    <xsd:schema targetNamespace="http://example.com/orders">
      <xsd:element name="CreateOrder">
        <xsd:complexType>
          <xsd:sequence>
            <xsd:element name="customerId" type="xsd:int"/>
            <xsd:element name="amount" type="xsd:decimal"/>
          </xsd:sequence>
        </xsd:complexType>
      </xsd:element>
      <xsd:element name="CreateOrderResponse">
        <xsd:complexType>
          <xsd:sequence>
            <xsd:element name="orderId" type="xsd:int"/>
            <xsd:element name="status" type="xsd:string"/>
          </xsd:sequence>
        </xsd:complexType>
      </xsd:element>
      <xsd:element name="OrderFault">
        <xsd:complexType>
          <xsd:sequence>
            <xsd:element name="reason" type="xsd:string"/>
          </xsd:sequence>
        </xsd:complexType>
      </xsd:element>
    </xsd:schema>
  </wsdl:types>
  <wsdl:message name="CreateOrderRequest">
    <wsdl:part name="parameters" element="tns:CreateOrder"/>
  </wsdl:message>
  <wsdl:message name="CreateOrderReply">
    <wsdl:part name="parameters" element="tns:CreateOrderResponse"/>
  </wsdl:message>
  <wsdl:message name="OrderFaultMessage">
    <wsdl:part name="fault" element="tns:OrderFault"/>
  </wsdl:message>
  <wsdl:portType name="OrdersPort">
    <wsdl:operation name="CreateOrder">
      <wsdl:input message="tns:CreateOrderRequest"/>
      <wsdl:output message="tns:CreateOrderReply"/>
      <wsdl:fault name="InvalidOrder" message="tns:OrderFaultMessage"/>
    </wsdl:operation>
  </wsdl:portType>
  <wsdl:binding name="OrdersBinding" type="tns:OrdersPort">
    <soap:binding style="document" transport="http://schemas.xmlsoap.org/soap/http"/>
    <wsdl:operation name="CreateOrder">
      <soap:operation soapAction="http://example.com/orders/CreateOrder"/>
    </wsdl:operation>
  </wsdl:binding>
</wsdl:definitions>"#;

/// Fast knobs so integration runs finish quickly
pub fn fast_execution() -> ExecutionConfig {
    ExecutionConfig {
        worker_pool: 2,
        max_retries: 2,
        backoff_base: Duration::from_millis(5),
        scenario_timeout: Duration::from_secs(5),
        run_deadline: Duration::from_secs(30),
    }
}

pub type TestPipeline<C> =
    Pipeline<C, engine::services::HttpTargetClient, InMemoryResultStore, InMemorySpecStore>;

/// Pipeline wired with the real HTTP target client and in-memory stores
pub fn pipeline_with<C: CompletionClient + 'static>(
    completion: C,
    execution: ExecutionConfig,
) -> (TestPipeline<C>, InMemoryResultStore, InMemorySpecStore) {
    let results = InMemoryResultStore::new();
    let specs = InMemorySpecStore::new();
    let pipeline = Pipeline::new(
        Arc::new(completion),
        Arc::new(engine::services::HttpTargetClient::new()),
        Arc::new(results.clone()),
        Arc::new(specs.clone()),
        GenerationOptions::default(),
        execution,
        ValidationConfig::default(),
    )
    .unwrap();
    (pipeline, results, specs)
}

pub fn target_for(uri: String) -> TargetConfig {
    TargetConfig::new(uri)
}
