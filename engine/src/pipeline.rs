//! Pipeline driver with dependency injection
//!
//! Wires the five stages together for one run: normalize → generate →
//! execute → validate → aggregate. Stages run sequentially, but records
//! coming out of the executor are validated as they stream in, while the
//! remaining scenarios are still in flight.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use shared::{
    ApiModel, ExecutionConfig, GenerationOptions, Operation, ProtocolKind, RunPhase, RunReport,
    TargetConfig, ValidationConfig,
};

use crate::core::{aggregate, normalizer, validate, Executor, RunRegistry, ScenarioGenerator};
use crate::error::{EngineError, EngineResult};
use crate::traits::{CompletionClient, ResultStore, SpecStore, TargetClient};

/// Pipeline with dependency injection
pub struct Pipeline<C, T, R, S>
where
    C: CompletionClient + 'static,
    T: TargetClient + 'static,
    R: ResultStore + 'static,
    S: SpecStore + 'static,
{
    completion: Arc<C>,
    target_client: Arc<T>,
    result_store: Arc<R>,
    spec_store: Arc<S>,
    registry: RunRegistry,
    generation: GenerationOptions,
    execution: ExecutionConfig,
    validation: ValidationConfig,
}

impl<C, T, R, S> Clone for Pipeline<C, T, R, S>
where
    C: CompletionClient + 'static,
    T: TargetClient + 'static,
    R: ResultStore + 'static,
    S: SpecStore + 'static,
{
    fn clone(&self) -> Self {
        Self {
            completion: Arc::clone(&self.completion),
            target_client: Arc::clone(&self.target_client),
            result_store: Arc::clone(&self.result_store),
            spec_store: Arc::clone(&self.spec_store),
            registry: self.registry.clone(),
            generation: self.generation.clone(),
            execution: self.execution.clone(),
            validation: self.validation.clone(),
        }
    }
}

impl<C, T, R, S> Pipeline<C, T, R, S>
where
    C: CompletionClient + 'static,
    T: TargetClient + 'static,
    R: ResultStore + 'static,
    S: SpecStore + 'static,
{
    pub fn new(
        completion: Arc<C>,
        target_client: Arc<T>,
        result_store: Arc<R>,
        spec_store: Arc<S>,
        generation: GenerationOptions,
        execution: ExecutionConfig,
        validation: ValidationConfig,
    ) -> EngineResult<Self> {
        generation.validate()?;
        execution.validate()?;
        Ok(Self {
            completion,
            target_client,
            result_store,
            spec_store,
            registry: RunRegistry::new(),
            generation,
            execution,
            validation,
        })
    }

    pub fn registry(&self) -> &RunRegistry {
        &self.registry
    }

    /// Current phase of a run, for status polling
    pub async fn status(&self, run_id: Uuid) -> Option<RunPhase> {
        self.registry.phase(run_id).await
    }

    /// Report of a finished run, if it has one
    pub async fn report(&self, run_id: Uuid) -> Option<RunReport> {
        self.registry.report(run_id).await
    }

    /// Submit a run against a stored specification. Accepted
    /// asynchronously: the returned run id can be polled via `status`.
    /// Generation options apply to this run only; `None` keeps the
    /// pipeline defaults.
    pub async fn submit(
        &self,
        spec_id: Uuid,
        target: TargetConfig,
        options: Option<GenerationOptions>,
    ) -> Uuid {
        let run_id = Uuid::new_v4();
        self.registry.create(run_id).await;

        let mut pipeline = self.clone();
        if let Some(options) = options {
            pipeline.generation = options;
        }
        tokio::spawn(async move {
            match pipeline.spec_store.fetch(spec_id).await {
                Ok(model) => {
                    let _ = pipeline.run(run_id, model, target).await;
                }
                Err(e) => {
                    shared::logging::log_run_error(&run_id, "spec fetch", &e);
                    let now = Utc::now();
                    let report = RunReport::failed_to_start(run_id, now, now, e.tag());
                    let _ = pipeline.result_store.persist(report.clone()).await;
                    pipeline.registry.fail(run_id, Some(report)).await;
                }
            }
        });
        run_id
    }

    /// Normalize a raw specification document, then run against it
    pub async fn run_raw(
        &self,
        run_id: Uuid,
        raw: &[u8],
        kind: ProtocolKind,
        target: TargetConfig,
    ) -> EngineResult<RunReport> {
        let started_at = Utc::now();
        self.ensure_registered(run_id).await;
        match normalizer::normalize(raw, kind) {
            Ok(model) => self.run(run_id, model, target).await,
            Err(e) if e.is_fatal() => self.abort_before_scenarios(run_id, started_at, &e).await,
            Err(e) => Err(e),
        }
    }

    /// Drive one full pipeline invocation over an already-normalized
    /// model. Always yields a report unless a fatal error killed the run
    /// before any scenario existed (reported as failed-to-start) or
    /// result storage itself failed.
    pub async fn run(
        &self,
        run_id: Uuid,
        model: ApiModel,
        target: TargetConfig,
    ) -> EngineResult<RunReport> {
        let started_at = Utc::now();
        self.ensure_registered(run_id).await;
        shared::logging::log_run_started(
            &run_id,
            &format!(
                "{} spec with {} operations",
                model.protocol,
                model.operations.len()
            ),
        );

        self.registry.advance(run_id, RunPhase::Generating).await;
        let generator =
            ScenarioGenerator::new(Arc::clone(&self.completion), self.generation.clone());
        let generated = match generator.generate(&model).await {
            Ok(generated) => generated,
            Err(e) if e.is_fatal() => {
                // scenarios generated before the outage die with the run
                return self.abort_before_scenarios(run_id, started_at, &e).await;
            }
            Err(e) => return Err(e),
        };

        self.registry.advance(run_id, RunPhase::Executing).await;
        let operations: Arc<HashMap<String, Operation>> = Arc::new(
            model
                .operations
                .into_iter()
                .map(|op| (op.id.clone(), op))
                .collect(),
        );
        let executor = Executor::new(Arc::clone(&self.target_client), self.execution.clone());
        let deadline = Instant::now() + self.execution.run_deadline;
        let mut records =
            executor.execute(operations, generated.scenarios, target, deadline);

        // stage 4 is streaming: each record is validated as soon as it
        // completes, interleaved with the executor's remaining work
        let mut verdicts = Vec::new();
        while let Some(record) = records.recv().await {
            let verdict = validate(&record, &self.validation);
            debug!(
                run = %run_id,
                scenario = %verdict.scenario_id,
                classification = ?verdict.classification,
                "Verdict"
            );
            verdicts.push(verdict);
        }

        self.registry.advance(run_id, RunPhase::Validating).await;
        let report = aggregate(run_id, started_at, Utc::now(), verdicts, generated.notes);

        if let Err(e) = self.result_store.persist(report.clone()).await {
            self.registry.fail(run_id, None).await;
            return Err(e);
        }
        self.registry.complete(run_id, report.clone()).await;
        shared::logging::log_run_finished(
            &run_id,
            &format!(
                "{:?} ({} passed, {} failed, {} errored)",
                report.status, report.counts.passed, report.counts.failed, report.counts.errored
            ),
        );
        Ok(report)
    }

    async fn abort_before_scenarios(
        &self,
        run_id: Uuid,
        started_at: chrono::DateTime<Utc>,
        error: &EngineError,
    ) -> EngineResult<RunReport> {
        warn!(run = %run_id, tag = error.tag(), error = %error, "Run failed to start");
        let report = RunReport::failed_to_start(run_id, started_at, Utc::now(), error.tag());
        self.registry.fail(run_id, Some(report.clone())).await;
        self.result_store.persist(report.clone()).await?;
        Ok(report)
    }

    async fn ensure_registered(&self, run_id: Uuid) {
        if self.registry.phase(run_id).await.is_none() {
            self.registry.create(run_id).await;
        }
    }
}
