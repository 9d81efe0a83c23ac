//! Scenario execution against the target system
//!
//! Scenarios fan out over a bounded worker pool fed by a shared work
//! queue; each worker owns its record exclusively until it is emitted.
//! Records stream out in completion order — every record carries its
//! scenario, so submission order stays recoverable downstream.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{sleep_until, timeout, Instant};
use tracing::debug;

use shared::{ExecutionConfig, ExecutionRecord, Operation, Scenario, TargetConfig};

use crate::traits::TargetClient;

pub struct Executor<T: TargetClient + 'static> {
    client: Arc<T>,
    config: ExecutionConfig,
}

impl<T: TargetClient + 'static> Executor<T> {
    pub fn new(client: Arc<T>, config: ExecutionConfig) -> Self {
        Self { client, config }
    }

    /// Run all scenarios against the target, streaming records out as
    /// they complete. The returned channel closes once every scenario
    /// has a terminal record.
    pub fn execute(
        &self,
        operations: Arc<HashMap<String, Operation>>,
        scenarios: Vec<Scenario>,
        target: TargetConfig,
        deadline: Instant,
    ) -> mpsc::Receiver<ExecutionRecord> {
        let capacity = scenarios.len().max(1);
        let (work_tx, work_rx) = mpsc::channel::<Scenario>(capacity);
        for scenario in scenarios {
            // capacity covers the whole set, so this cannot fail
            let _ = work_tx.try_send(scenario);
        }
        drop(work_tx);
        let work_rx = Arc::new(Mutex::new(work_rx));

        let (out_tx, out_rx) = mpsc::channel::<ExecutionRecord>(capacity);
        for worker in 0..self.config.worker_pool.max(1) {
            let work_rx = Arc::clone(&work_rx);
            let out_tx = out_tx.clone();
            let client = Arc::clone(&self.client);
            let operations = Arc::clone(&operations);
            let target = target.clone();
            let config = self.config.clone();
            tokio::spawn(async move {
                loop {
                    let scenario = { work_rx.lock().await.recv().await };
                    let Some(scenario) = scenario else {
                        break;
                    };
                    let record = run_one(
                        client.as_ref(),
                        &operations,
                        &target,
                        &config,
                        scenario,
                        deadline,
                    )
                    .await;
                    debug!(
                        worker,
                        scenario = %record.scenario.id,
                        state = ?record.state,
                        attempts = record.attempts,
                        "Scenario finished"
                    );
                    if out_tx.send(record).await.is_err() {
                        break;
                    }
                }
            });
        }
        out_rx
    }
}

async fn run_one<T: TargetClient + ?Sized>(
    client: &T,
    operations: &HashMap<String, Operation>,
    target: &TargetConfig,
    config: &ExecutionConfig,
    scenario: Scenario,
    deadline: Instant,
) -> ExecutionRecord {
    let started = std::time::Instant::now();

    let Some(operation) = operations.get(&scenario.operation_id) else {
        // the generator guarantees the operation exists; degrade instead
        // of panicking if that invariant ever breaks
        let id = scenario.operation_id.clone();
        return ExecutionRecord::skipped(
            scenario,
            0,
            started.elapsed(),
            format!("unknown operation {id}"),
        );
    };

    if Instant::now() >= deadline {
        return ExecutionRecord::skipped(
            scenario,
            0,
            started.elapsed(),
            "run deadline expired before start".to_string(),
        );
    }

    let mut attempts = 0u32;
    loop {
        attempts += 1;
        debug!(scenario = %scenario.id, attempts, "Scenario in flight");

        let outcome = tokio::select! {
            result = timeout(
                config.scenario_timeout,
                client.call(operation, &scenario.input, target),
            ) => Some(result),
            _ = sleep_until(deadline) => None,
        };

        let failure = match outcome {
            None => {
                // cancelled cooperatively; whatever the call would have
                // returned is discarded
                return ExecutionRecord::skipped(
                    scenario,
                    attempts,
                    started.elapsed(),
                    "run deadline expired in flight".to_string(),
                );
            }
            Some(Ok(Ok(response))) => {
                return ExecutionRecord::succeeded(scenario, attempts, started.elapsed(), response);
            }
            Some(Ok(Err(transport))) => {
                debug!(scenario = %scenario.id, attempts, error = %transport, "Transport failed");
                transport.to_string()
            }
            Some(Err(_)) => {
                debug!(scenario = %scenario.id, attempts, "Scenario timed out");
                "scenario timeout elapsed".to_string()
            }
        };

        if attempts > config.max_retries {
            return ExecutionRecord::failed(scenario, attempts, started.elapsed(), failure);
        }

        let backoff = backoff_delay(config.backoff_base, attempts);
        tokio::select! {
            _ = tokio::time::sleep(backoff) => {}
            _ = sleep_until(deadline) => {
                return ExecutionRecord::skipped(
                    scenario,
                    attempts,
                    started.elapsed(),
                    "run deadline expired during backoff".to_string(),
                );
            }
        }
    }
}

/// Exponential backoff from the configured base, with a little jitter so
/// retries do not stampede the target
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let exp = base.saturating_mul(1u32 << (attempt - 1).min(8));
    let jitter_bound = (base.as_millis() as u64 / 4).max(1);
    let jitter = rand::thread_rng().gen_range(0..jitter_bound);
    exp + Duration::from_millis(jitter)
}
