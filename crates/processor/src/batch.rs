// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Batched application of worker updates, grouped by job so that one job's
//! updates apply in the order they were reported.

use std::collections::BTreeMap;

use cw_core::{JobId, WorkItemUpdate};
use cw_queue::Queue;
use cw_store::Store;

use crate::config::ProcessorConfig;
use crate::error::ProcessorError;
use crate::outcome::UpdateOutcome;
use crate::pipeline::apply_update;

/// One update's outcome, paired with the update it came from, for callers
/// that need to correlate results back to their batch input.
pub struct BatchResult {
    pub update: WorkItemUpdate,
    pub outcome: Result<UpdateOutcome, ProcessorError>,
}

/// Apply a batch of updates, grouping by job so a burst of updates for the
/// same job is applied sequentially rather than racing each other across
/// separate transactions. Updates for distinct jobs have no ordering
/// requirement between them.
pub async fn apply_batch(
    store: &Store,
    scheduler_queue: &dyn Queue,
    config: ProcessorConfig,
    updates: Vec<WorkItemUpdate>,
    now_epoch_ms: u64,
) -> Vec<BatchResult> {
    let mut by_job: BTreeMap<JobId, Vec<WorkItemUpdate>> = BTreeMap::new();
    let mut unassigned = Vec::new();

    for update in updates {
        match cw_store::get_work_item(store.pool(), update.work_item_id).await {
            Ok(item) => by_job.entry(item.job_id).or_default().push(update),
            Err(_) => unassigned.push(update),
        }
    }

    let mut results = Vec::new();

    for update in unassigned {
        let outcome = apply_update(store, scheduler_queue, config, &update, now_epoch_ms).await;
        results.push(BatchResult { update, outcome });
    }

    for (_job_id, job_updates) in by_job {
        for update in job_updates {
            let outcome = apply_update(store, scheduler_queue, config, &update, now_epoch_ms).await;
            results.push(BatchResult { update, outcome });
        }
    }

    results
}
