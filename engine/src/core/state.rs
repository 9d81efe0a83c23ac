//! Per-run state registry
//!
//! Process-wide status keyed by run id, for the inbound trigger's
//! polling surface. Entries are created on submit, transitioned only by
//! the pipeline stages, and archived once the report is persisted — no
//! ambient globals shared across concurrent runs.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use shared::{RunPhase, RunReport};

#[derive(Debug, Clone)]
struct RunEntry {
    phase: RunPhase,
    report: Option<RunReport>,
}

/// Registry of active (and recently finished) runs
#[derive(Clone, Default)]
pub struct RunRegistry {
    inner: Arc<RwLock<HashMap<Uuid, RunEntry>>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly submitted run in `Pending`
    pub async fn create(&self, run_id: Uuid) {
        let mut runs = self.inner.write().await;
        let previous = runs.insert(
            run_id,
            RunEntry {
                phase: RunPhase::Pending,
                report: None,
            },
        );
        debug_assert!(previous.is_none(), "run id registered twice");
        debug!(run = %run_id, "Run registered");
    }

    /// Advance a run to its next phase; illegal transitions are logged
    /// and ignored (they indicate a pipeline bug, not a user error)
    pub async fn advance(&self, run_id: Uuid, next: RunPhase) {
        let mut runs = self.inner.write().await;
        let Some(entry) = runs.get_mut(&run_id) else {
            warn!(run = %run_id, "Advance on unknown run");
            return;
        };
        if !entry.phase.can_advance_to(next) {
            warn!(run = %run_id, from = %entry.phase, to = %next, "Illegal phase transition");
            debug_assert!(false, "illegal phase transition");
            return;
        }
        debug!(run = %run_id, from = %entry.phase, to = %next, "Run phase advanced");
        entry.phase = next;
    }

    /// Terminal success: store the report alongside `Completed`
    pub async fn complete(&self, run_id: Uuid, report: RunReport) {
        let mut runs = self.inner.write().await;
        if let Some(entry) = runs.get_mut(&run_id) {
            entry.phase = RunPhase::Completed;
            entry.report = Some(report);
        }
    }

    /// Terminal failure; a failed-to-start report may still be attached
    pub async fn fail(&self, run_id: Uuid, report: Option<RunReport>) {
        let mut runs = self.inner.write().await;
        if let Some(entry) = runs.get_mut(&run_id) {
            entry.phase = RunPhase::Failed;
            entry.report = report;
        }
    }

    /// Current phase for status polling
    pub async fn phase(&self, run_id: Uuid) -> Option<RunPhase> {
        self.inner.read().await.get(&run_id).map(|e| e.phase)
    }

    /// Report of a finished run, if any
    pub async fn report(&self, run_id: Uuid) -> Option<RunReport> {
        self.inner
            .read()
            .await
            .get(&run_id)
            .and_then(|e| e.report.clone())
    }

    /// Tear down a run once its report has been handed to storage
    pub async fn archive(&self, run_id: Uuid) -> Option<RunReport> {
        self.inner
            .write()
            .await
            .remove(&run_id)
            .and_then(|e| e.report)
    }
}
