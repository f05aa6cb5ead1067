//! Daily sweep driver: advances every eligible series, isolating failures.

use tracing::{info, warn};

use crate::engine::ContinuityEngine;
use crate::error::StoreResult;
use crate::store::ComicStore;

/// Retry policy for failed cycles within one sweep.
///
/// The default is a single attempt: a failed series is skipped until the next
/// scheduled sweep rather than retried the same day.
#[derive(Debug, Clone)]
pub struct SweepPolicy {
    pub max_attempts: u32,
}

impl Default for SweepPolicy {
    fn default() -> Self {
        Self { max_attempts: 1 }
    }
}

/// Summary of one sweep run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub attempted: usize,
    pub processed: usize,
}

/// Advance every series with an owner email, once each.
///
/// One series' failure never aborts the sweep for the others; failures are
/// logged with the series identity and counted against the report.
pub async fn run_sweep(
    engine: &ContinuityEngine,
    store: &dyn ComicStore,
    policy: &SweepPolicy,
) -> StoreResult<SweepReport> {
    let eligible = store.eligible_comics().await?;
    let mut report = SweepReport {
        attempted: 0,
        processed: 0,
    };

    for comic in eligible {
        report.attempted += 1;
        for attempt in 1..=policy.max_attempts.max(1) {
            match engine.advance(&comic.id).await {
                Ok(advanced) => {
                    report.processed += 1;
                    info!(
                        comic = %comic.id,
                        issue_number = advanced.issue_number,
                        "sweep item processed"
                    );
                    break;
                }
                Err(error) => {
                    warn!(comic = %comic.id, attempt, %error, "sweep item failed");
                }
            }
        }
    }

    info!(
        attempted = report.attempted,
        processed = report.processed,
        "sweep finished"
    );
    Ok(report)
}
