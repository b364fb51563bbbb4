// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodically deletes WorkItems and WorkflowSteps belonging to old
//! terminal jobs, in small batches to bound transaction size. The Job
//! record itself is retained.

use std::time::Duration;

use cw_core::Clock;
use cw_store::Store;
use tokio_util::sync::CancellationToken;

use crate::error::ReconcileError;

#[derive(Debug, Clone)]
pub struct ReaperConfig {
    /// `WORK_REAPER_PERIOD_SEC`
    pub period_sec: u64,
    /// `REAPABLE_WORK_AGE_MINUTES`
    pub reapable_work_age_minutes: i64,
    /// `WORK_REAPER_BATCH_SIZE`
    pub batch_size: i64,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            period_sec: 300,
            reapable_work_age_minutes: 10_080,
            batch_size: 500,
        }
    }
}

pub struct WorkReaper<C: Clock> {
    store: Store,
    config: ReaperConfig,
    clock: C,
}

impl<C: Clock> WorkReaper<C> {
    pub fn new(store: Store, config: ReaperConfig, clock: C) -> Self {
        Self { store, config, clock }
    }

    /// Runs reaper cycles on `period_sec` intervals until `shutdown` fires.
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.config.period_sec));
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    if let Err(err) = self.run_cycle().await {
                        tracing::error!(error = %err, "work reaper cycle failed");
                    }
                }
            }
        }
    }

    /// One pass over every currently-reapable job, deleting its work items
    /// then its workflow steps in `batch_size` chunks.
    pub async fn run_cycle(&self) -> Result<u64, ReconcileError> {
        let now_epoch_ms = self.clock.epoch_ms();
        let older_than =
            now_epoch_ms.saturating_sub(self.config.reapable_work_age_minutes as u64 * 60_000);

        let jobs = cw_store::find_reapable_jobs(self.store.pool(), older_than).await?;
        let mut total_deleted = 0u64;

        for job_id in jobs {
            let mut conn = self.store.acquire().await?;

            loop {
                let deleted = cw_store::delete_items_batch(&mut conn, job_id, self.config.batch_size).await?;
                total_deleted += deleted;
                if deleted == 0 {
                    break;
                }
                tracing::info!(job_id = %job_id, deleted, "work reaper deleted work item batch");
                tokio::task::yield_now().await;
            }

            loop {
                let deleted =
                    cw_store::delete_workflow_steps_batch(&mut conn, job_id, self.config.batch_size).await?;
                total_deleted += deleted;
                if deleted == 0 {
                    break;
                }
                tracing::info!(job_id = %job_id, deleted, "work reaper deleted workflow step batch");
                tokio::task::yield_now().await;
            }
        }

        Ok(total_deleted)
    }
}
