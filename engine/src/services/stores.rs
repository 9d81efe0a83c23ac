//! In-memory spec and result stores
//!
//! The real collaborators are external; these back the binary and the
//! test suites.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use shared::{ApiModel, RunReport};

use crate::error::{EngineError, EngineResult};
use crate::traits::{ResultStore, SpecStore};
use crate::types::{ReportFilter, RunSummary};

/// Spec storage backed by a process-local map
#[derive(Default, Clone)]
pub struct InMemorySpecStore {
    specs: Arc<RwLock<HashMap<Uuid, ApiModel>>>,
}

impl InMemorySpecStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SpecStore for InMemorySpecStore {
    async fn save(&self, model: ApiModel) -> EngineResult<Uuid> {
        let id = Uuid::new_v4();
        self.specs.write().await.insert(id, model);
        Ok(id)
    }

    async fn fetch(&self, id: Uuid) -> EngineResult<ApiModel> {
        self.specs
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound {
                what: "specification".to_string(),
                id: id.to_string(),
            })
    }
}

/// Result storage backed by a process-local map
#[derive(Default, Clone)]
pub struct InMemoryResultStore {
    reports: Arc<RwLock<HashMap<Uuid, RunReport>>>,
}

impl InMemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full report lookup, used by tests and the binary
    pub async fn get(&self, id: Uuid) -> Option<RunReport> {
        self.reports.read().await.get(&id).cloned()
    }
}

#[async_trait]
impl ResultStore for InMemoryResultStore {
    async fn persist(&self, report: RunReport) -> EngineResult<Uuid> {
        let id = Uuid::new_v4();
        self.reports.write().await.insert(id, report);
        Ok(id)
    }

    async fn query(&self, filter: ReportFilter) -> EngineResult<Vec<RunSummary>> {
        let reports = self.reports.read().await;
        let mut summaries: Vec<RunSummary> = reports
            .iter()
            .filter(|(_, report)| {
                filter
                    .status
                    .as_ref()
                    .map(|status| &report.status == status)
                    .unwrap_or(true)
                    && filter
                        .since
                        .map(|since| report.finished_at >= since)
                        .unwrap_or(true)
            })
            .map(|(id, report)| RunSummary {
                id: *id,
                run_id: report.run_id,
                status: report.status.clone(),
                counts: report.counts,
                finished_at: report.finished_at,
            })
            .collect();
        summaries.sort_by_key(|summary| summary.finished_at);
        Ok(summaries)
    }
}
