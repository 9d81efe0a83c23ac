//! Run-level result aggregation
//!
//! A pure fold over verdicts; the outcome must not depend on the order
//! records happened to complete in.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use shared::{GenerationNote, RunReport, RunStatus, Verdict, VerdictClass, VerdictCounts};

/// Fold per-scenario verdicts into the run report.
///
/// Run status rule: `failed` if any verdict is `fail`, else `errored` if
/// any is `error`, else `passed`.
pub fn aggregate(
    run_id: Uuid,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    verdicts: Vec<Verdict>,
    notes: Vec<GenerationNote>,
) -> RunReport {
    let mut counts = VerdictCounts::default();
    for verdict in &verdicts {
        match verdict.classification {
            VerdictClass::Pass => counts.passed += 1,
            VerdictClass::Fail => counts.failed += 1,
            VerdictClass::Error => counts.errored += 1,
        }
    }

    let status = if counts.failed > 0 {
        RunStatus::Failed
    } else if counts.errored > 0 {
        RunStatus::Errored
    } else {
        RunStatus::Passed
    };

    RunReport {
        run_id,
        started_at,
        finished_at,
        counts,
        verdicts,
        notes,
        status,
    }
}
