//! End-to-end pipeline runs against a stubbed target

mod common;

use std::time::Duration;

use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{
    fast_execution, orders_openapi, pipeline_with, users_openapi, DeadCompletion,
    ScriptedCompletion,
};
use engine::types::ReportFilter;
use engine::traits::ResultStore;
use shared::{ProtocolKind, RunPhase, RunStatus, VerdictClass};

#[tokio::test]
async fn test_rest_run_passes_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            // float form plus an extra field: numeric value equality and
            // lenient comparison both in play
            json!({"id": 5.0, "name": "Ana", "role": "admin"}),
        ))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/users"))
        .and(body_json(json!({"id": 9, "name": "Bo"})))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    let completion = ScriptedCompletion::new()
        .with_reply(
            "getUser",
            r#"[{"kind": "happy", "input": {"id": 5}, "expected_status": 200,
                 "expected_payload": {"id": 5, "name": "Ana"}}]"#,
        )
        .with_reply(
            "createUser",
            r#"[{"kind": "happy", "input": {"body": {"id": 9, "name": "Bo"}},
                 "expected_status": 201}]"#,
        );

    let (pipeline, results, _) = pipeline_with(completion, fast_execution());
    let run_id = Uuid::new_v4();
    let report = pipeline
        .run_raw(
            run_id,
            &users_openapi(),
            ProtocolKind::Rest,
            common::target_for(server.uri()),
        )
        .await
        .unwrap();

    assert_eq!(report.status, RunStatus::Passed);
    assert_eq!(report.counts.passed, 2);
    assert_eq!(report.counts.failed, 0);
    assert_eq!(report.counts.errored, 0);
    assert!(report.notes.is_empty());

    assert_eq!(pipeline.status(run_id).await, Some(RunPhase::Completed));
    let stored = results.query(ReportFilter::default()).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].run_id, run_id);
}

#[tokio::test]
async fn test_divergent_response_fails_the_run() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 5, "name": "Eve"})))
        .mount(&server)
        .await;

    let completion = ScriptedCompletion::new().with_reply(
        "getUser",
        r#"[{"input": {"id": 5}, "expected_status": 200,
             "expected_payload": {"id": 5, "name": "Ana"}}]"#,
    );

    let (pipeline, _, _) = pipeline_with(completion, fast_execution());
    let report = pipeline
        .run_raw(
            Uuid::new_v4(),
            &users_openapi(),
            ProtocolKind::Rest,
            common::target_for(server.uri()),
        )
        .await
        .unwrap();

    assert_eq!(report.status, RunStatus::Failed);
    let fail = report
        .verdicts
        .iter()
        .find(|v| v.operation_id == "getUser")
        .unwrap();
    assert_eq!(fail.classification, VerdictClass::Fail);
    assert!(fail.mismatches.iter().any(|m| m.path == "$.name"));
}

#[tokio::test]
async fn test_timeouts_exhaust_into_errored_run() {
    let server = MockServer::start().await;
    // /orders answers far beyond the scenario timeout; /ping is healthy
    Mock::given(method("POST"))
        .and(path("/orders"))
        .respond_with(ResponseTemplate::new(201).set_delay(Duration::from_secs(20)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ping"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let completion = ScriptedCompletion::new()
        .with_reply(
            "createOrder",
            r#"[{"input": {}, "expected_status": 201}]"#,
        )
        .with_reply("ping", r#"[{"input": {}, "expected_status": 200}]"#);

    let mut execution = fast_execution();
    execution.scenario_timeout = Duration::from_millis(100);
    execution.max_retries = 2;

    let (pipeline, _, _) = pipeline_with(completion, execution);
    let report = pipeline
        .run_raw(
            Uuid::new_v4(),
            &orders_openapi(),
            ProtocolKind::Rest,
            common::target_for(server.uri()),
        )
        .await
        .unwrap();

    // no verdict is fail, one is error: the run is errored
    assert_eq!(report.status, RunStatus::Errored);
    assert_eq!(report.counts.errored, 1);
    assert_eq!(report.counts.passed, 1);
    assert_eq!(report.counts.failed, 0);
}

#[tokio::test]
async fn test_completion_outage_is_failed_to_start() {
    let (pipeline, results, _) = pipeline_with(DeadCompletion, fast_execution());
    let run_id = Uuid::new_v4();
    let report = pipeline
        .run_raw(
            run_id,
            &users_openapi(),
            ProtocolKind::Rest,
            common::target_for("http://127.0.0.1:9".to_string()),
        )
        .await
        .unwrap();

    assert_eq!(
        report.status,
        RunStatus::FailedToStart {
            tag: "CompletionServiceUnavailableError".to_string()
        }
    );
    assert!(report.verdicts.is_empty());
    assert_eq!(pipeline.status(run_id).await, Some(RunPhase::Failed));

    // the persisted report carries no scenario entries either
    let stored = results.query(ReportFilter::default()).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].counts, shared::VerdictCounts::default());
}

#[tokio::test]
async fn test_malformed_spec_is_failed_to_start() {
    let (pipeline, _, _) = pipeline_with(ScriptedCompletion::new(), fast_execution());
    let report = pipeline
        .run_raw(
            Uuid::new_v4(),
            b"{definitely not a spec",
            ProtocolKind::Rest,
            common::target_for("http://127.0.0.1:9".to_string()),
        )
        .await
        .unwrap();

    assert_eq!(
        report.status,
        RunStatus::FailedToStart {
            tag: "MalformedSpecError".to_string()
        }
    );
}

#[tokio::test]
async fn test_submit_and_poll_reaches_completed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ping"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/orders"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    let completion = ScriptedCompletion::new()
        .with_reply("createOrder", r#"[{"input": {}, "expected_status": 201}]"#)
        .with_reply("ping", r#"[{"input": {}, "expected_status": 200}]"#);

    let (pipeline, _, specs) = pipeline_with(completion, fast_execution());
    let model = engine::normalize(&orders_openapi(), ProtocolKind::Rest).unwrap();
    let spec_id = {
        use engine::traits::SpecStore;
        specs.save(model).await.unwrap()
    };

    let run_id = pipeline
        .submit(spec_id, common::target_for(server.uri()), None)
        .await;

    let mut phase = pipeline.status(run_id).await;
    for _ in 0..500 {
        if phase == Some(RunPhase::Completed) || phase == Some(RunPhase::Failed) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        phase = pipeline.status(run_id).await;
    }

    assert_eq!(phase, Some(RunPhase::Completed));
    let report = pipeline.report(run_id).await.unwrap();
    assert_eq!(report.status, RunStatus::Passed);
}

#[tokio::test]
async fn test_submit_unknown_spec_fails_with_not_found() {
    let (pipeline, _, _) = pipeline_with(ScriptedCompletion::new(), fast_execution());
    let run_id = pipeline
        .submit(
            Uuid::new_v4(),
            common::target_for("http://127.0.0.1:9".to_string()),
            None,
        )
        .await;

    let mut phase = pipeline.status(run_id).await;
    for _ in 0..500 {
        if phase == Some(RunPhase::Failed) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        phase = pipeline.status(run_id).await;
    }

    assert_eq!(phase, Some(RunPhase::Failed));
    let report = pipeline.report(run_id).await.unwrap();
    assert_eq!(
        report.status,
        RunStatus::FailedToStart {
            tag: "NotFoundError".to_string()
        }
    );
}
