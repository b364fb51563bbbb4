// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodically detects RUNNING work items that have stalled and synthesizes
//! FAILED updates for them, handing each to the update processor.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use cw_core::{Clock, JobId, WorkItemUpdate};
use cw_processor::ProcessorConfig;
use cw_queue::Queue;
use cw_store::Store;
use tokio_util::sync::CancellationToken;

use crate::error::ReconcileError;

#[derive(Debug, Clone)]
pub struct FailerConfig {
    /// `WORK_FAILER_PERIOD_SEC`
    pub period_sec: u64,
    /// `FAILABLE_WORK_AGE_MINUTES`
    pub failable_work_age_minutes: i64,
    /// How many recent successful durations feed the threshold calculation.
    pub recent_duration_sample_size: i64,
}

impl Default for FailerConfig {
    fn default() -> Self {
        Self {
            period_sec: 60,
            failable_work_age_minutes: 60,
            recent_duration_sample_size: 20,
        }
    }
}

/// Outlier bound over recent successful durations for one
/// `(jobID, serviceID, stepIndex)` tuple: `median + 3 * 1.4826 * MAD`,
/// floored at `floor_ms` so a tuple with little or no history still gets a
/// usable bound instead of threshold zero.
pub fn duration_threshold_ms(recent_durations_ms: &[i64], floor_ms: i64) -> i64 {
    if recent_durations_ms.is_empty() {
        return floor_ms;
    }
    let med = median(recent_durations_ms);
    let deviations: Vec<i64> = recent_durations_ms
        .iter()
        .map(|d| (*d as f64 - med).abs() as i64)
        .collect();
    let mad = median(&deviations);
    let threshold = med + 3.0 * 1.4826 * mad;
    (threshold.round() as i64).max(floor_ms)
}

fn median(values: &[i64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) as f64 / 2.0
    } else {
        sorted[mid] as f64
    }
}

pub struct WorkFailer<C: Clock> {
    store: Store,
    scheduler_queue: Arc<dyn Queue>,
    processor_config: ProcessorConfig,
    config: FailerConfig,
    clock: C,
}

impl<C: Clock> WorkFailer<C> {
    pub fn new(
        store: Store,
        scheduler_queue: Arc<dyn Queue>,
        processor_config: ProcessorConfig,
        config: FailerConfig,
        clock: C,
    ) -> Self {
        Self { store, scheduler_queue, processor_config, config, clock }
    }

    /// Runs failer cycles on `period_sec` intervals until `shutdown` fires.
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.config.period_sec));
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    if let Err(err) = self.run_cycle().await {
                        tracing::error!(error = %err, "work failer cycle failed");
                    }
                }
            }
        }
    }

    /// One pass: find stalled items, fail the ones past their threshold,
    /// batched per job with a cooperative yield between jobs.
    pub async fn run_cycle(&self) -> Result<u64, ReconcileError> {
        let now_epoch_ms = self.clock.epoch_ms();
        let older_than = now_epoch_ms.saturating_sub(self.config.failable_work_age_minutes as u64 * 60_000);

        let stalled = cw_store::find_stalled_running_items(self.store.pool(), older_than).await?;
        let mut by_job: BTreeMap<JobId, Vec<cw_core::WorkItem>> = BTreeMap::new();
        for item in stalled {
            by_job.entry(item.job_id).or_default().push(item);
        }

        let mut failed_count = 0u64;
        for (job_id, items) in by_job {
            for item in items {
                let Some(started_at) = item.started_at_epoch_ms else {
                    continue;
                };
                let recent = cw_store::recent_successful_durations_ms(
                    self.store.pool(),
                    job_id,
                    item.workflow_step_index,
                    self.config.recent_duration_sample_size,
                )
                .await?;
                let threshold = duration_threshold_ms(&recent, self.config.failable_work_age_minutes * 60_000);
                let elapsed = now_epoch_ms.saturating_sub(started_at) as i64;
                if elapsed <= threshold {
                    continue;
                }

                let update = WorkItemUpdate {
                    work_item_id: item.id,
                    status: cw_core::WorkItemStatus::Failed,
                    results: Vec::new(),
                    error_message: Some(format!(
                        "Work item {} exceeded {} ms threshold",
                        item.id, threshold
                    )),
                    total_items_size: None,
                    scroll_id: None,
                    output_item_sizes: Vec::new(),
                };
                cw_processor::apply_update(
                    &self.store,
                    self.scheduler_queue.as_ref(),
                    self.processor_config,
                    &update,
                    now_epoch_ms,
                )
                .await?;
                failed_count += 1;
            }
            tokio::task::yield_now().await;
        }

        if failed_count > 0 {
            tracing::info!(failed_count, "work failer failed stalled items");
        }
        Ok(failed_count)
    }
}
