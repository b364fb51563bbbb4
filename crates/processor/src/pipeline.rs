// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The update processor: one `WorkItemUpdate` in, one database transaction,
//! the owning job advanced as far as that single update allows.

use std::collections::BTreeSet;

use cw_core::{
    is_granule_discovery_service, Job, JobEvent, JobId, JobLink, JobStatus, NewWorkItem,
    ServiceId, WorkItemStatus, WorkItemUpdate, WorkflowStep,
};
use cw_queue::Queue;
use cw_store::Store;

use crate::config::ProcessorConfig;
use crate::error::ProcessorError;
use crate::outcome::UpdateOutcome;

/// Apply one worker-reported outcome to its owning job, then notify the
/// scheduler queue of every service that received new READY work.
pub async fn apply_update(
    store: &Store,
    scheduler_queue: &dyn Queue,
    config: ProcessorConfig,
    update: &WorkItemUpdate,
    now_epoch_ms: u64,
) -> Result<UpdateOutcome, ProcessorError> {
    let mut tx = store.begin().await?;

    let item = match cw_store::lock_work_item(&mut tx, update.work_item_id).await? {
        Some(item) => item,
        None => {
            tracing::info!(work_item_id = %update.work_item_id, "update for unknown work item dropped");
            return Ok(UpdateOutcome::NotFound { work_item_id: update.work_item_id });
        }
    };

    if item.status.is_terminal() {
        if !update.status.is_terminal() {
            tracing::info!(work_item_id = %item.id, "update for terminal item with non-terminal status dropped");
            return Ok(UpdateOutcome::Idempotent { work_item_id: item.id });
        }
        if update.status == item.status {
            return Ok(UpdateOutcome::Idempotent { work_item_id: item.id });
        }
        tracing::warn!(
            work_item_id = %item.id,
            stored = %item.status,
            incoming = %update.status,
            "conflicting terminal update rejected"
        );
        return Err(ProcessorError::ConflictingTerminalUpdate { work_item_id: item.id });
    }

    let mut job = cw_store::lock_job(&mut tx, item.job_id).await?;

    if job.status == JobStatus::Canceled {
        cw_store::write_item_status(
            &mut tx,
            item.id,
            WorkItemStatus::Canceled,
            None,
            &item.output_item_sizes,
            now_epoch_ms,
        )
        .await?;
        rebalance_counters(&mut tx, &item, &job, now_epoch_ms).await?;
        tx.commit().await.map_err(cw_store::StoreError::from)?;
        return Ok(UpdateOutcome::Applied { spawned: Vec::new() });
    }

    rebalance_counters(&mut tx, &item, &job, now_epoch_ms).await?;

    cw_store::write_item_status(
        &mut tx,
        item.id,
        update.status,
        update.error_message.as_deref(),
        &update.output_item_sizes,
        now_epoch_ms,
    )
    .await?;

    let mut spawned: BTreeSet<ServiceId> = BTreeSet::new();
    let mut job_failed_outright = false;

    match update.status {
        WorkItemStatus::Successful => {
            let last_step_index = cw_store::max_step_index(&mut *tx, job.id).await?;
            if item.workflow_step_index == last_step_index {
                for result in &update.results {
                    cw_store::append_job_link(&mut *tx, &JobLink::data(job.id, result.clone())).await?;
                }
            } else {
                let next_step_index = item.workflow_step_index + 1;
                let current_step =
                    cw_store::get_workflow_step(&mut *tx, job.id, item.workflow_step_index).await?;
                let next_step = cw_store::get_workflow_step(&mut *tx, job.id, next_step_index).await?;

                for (idx, result) in update.results.iter().enumerate() {
                    let bytes = update.output_item_sizes.get(idx).copied().unwrap_or(0);
                    spawn_downstream_item(
                        &mut tx,
                        &job,
                        &next_step,
                        item.workflow_step_index,
                        item.id,
                        idx as i32,
                        result,
                        bytes,
                        now_epoch_ms,
                        &mut spawned,
                    )
                    .await?;
                }

                if next_step.has_aggregated_output
                    && cw_store::step_has_no_outstanding_items(
                        &mut *tx,
                        job.id,
                        item.workflow_step_index,
                    )
                    .await?
                {
                    let sealed_batches = cw_store::seal_trailing_batch(
                        &mut tx,
                        job.id,
                        next_step_index,
                        next_step.effective_batch_size(),
                        next_step.effective_max_batch_bytes(),
                    )
                    .await?;
                    for sealed in sealed_batches {
                        spawn_aggregated_item(&mut tx, &job, &next_step, sealed, now_epoch_ms, &mut spawned)
                            .await?;
                    }
                }

                if is_granule_discovery_service(&current_step.service_id) {
                    maybe_continue_discovery(
                        &mut tx,
                        &job,
                        &current_step,
                        update,
                        next_step_index,
                        now_epoch_ms,
                        &mut spawned,
                    )
                    .await?;
                }
            }
        }
        WorkItemStatus::Failed => {
            let new_error_count = cw_store::increment_job_error_count(&mut tx, job.id).await?;
            job.error_count = new_error_count as u32;

            if new_error_count < config.max_errors_for_job && job.ignore_errors {
                if job.status == JobStatus::Running {
                    cw_store::write_job_status(
                        &mut tx,
                        job.id,
                        JobStatus::RunningWithErrors,
                        job.message.as_deref(),
                        now_epoch_ms,
                    )
                    .await?;
                    job.status = JobStatus::RunningWithErrors;
                }
            } else if matches!(job.status, JobStatus::Running | JobStatus::RunningWithErrors) {
                // Fail is only a legal job transition from these two statuses;
                // a PAUSED job keeps its items running, so a failed report
                // against it just lands the item's own status above.
                let failed_status = cw_core::apply_transition(job.status, JobEvent::Fail)?;
                cw_store::mark_job_terminal(&mut tx, job.id, failed_status, now_epoch_ms).await?;
                cw_store::cancel_non_terminal_items(&mut tx, job.id, now_epoch_ms).await?;
                cw_store::zero_counts_for_job(&mut tx, job.id).await?;
                job.status = failed_status;
                job_failed_outright = true;
            }
        }
        _ => {}
    }

    if !job_failed_outright {
        recompute_progress(&mut tx, job.id, now_epoch_ms).await?;
        maybe_complete_job(&mut tx, &job, now_epoch_ms).await?;
    }

    tx.commit().await.map_err(cw_store::StoreError::from)?;

    for service_id in &spawned {
        scheduler_queue
            .send_message(service_id.as_str().to_string(), None)
            .await?;
    }

    Ok(UpdateOutcome::Applied { spawned: spawned.into_iter().collect() })
}

async fn rebalance_counters(
    conn: &mut sqlx::PgConnection,
    item: &cw_core::WorkItem,
    job: &Job,
    now_epoch_ms: u64,
) -> Result<(), ProcessorError> {
    match item.status {
        WorkItemStatus::Running => {
            cw_store::decrement_running_count(conn, item.job_id, &item.service_id, &job.username).await?;
        }
        WorkItemStatus::Ready => {
            cw_store::decrement_ready_count(conn, item.job_id, &item.service_id, &job.username).await?;
        }
        _ => {}
    }
    let _ = now_epoch_ms;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn spawn_downstream_item(
    conn: &mut sqlx::PgConnection,
    job: &Job,
    next_step: &WorkflowStep,
    source_step_index: i32,
    producing_item_id: cw_core::WorkItemId,
    output_index: i32,
    result: &str,
    bytes: i64,
    now_epoch_ms: u64,
    spawned: &mut BTreeSet<ServiceId>,
) -> Result<(), ProcessorError> {
    if next_step.has_aggregated_output {
        let sealed_batches = cw_store::append_aggregation_input(
            conn,
            job.id,
            next_step.step_index,
            source_step_index,
            producing_item_id.0,
            output_index,
            result,
            bytes,
            next_step.effective_batch_size(),
            next_step.effective_max_batch_bytes(),
        )
        .await?;
        for sealed in sealed_batches {
            spawn_aggregated_item(conn, job, next_step, sealed, now_epoch_ms, spawned).await?;
        }
        return Ok(());
    }

    let new_item = NewWorkItem::new(job.id, next_step.service_id.clone(), next_step.step_index)
        .with_input(result);
    cw_store::insert_ready_item(conn, &new_item, now_epoch_ms).await?;
    cw_store::increment_ready_count(conn, job.id, &next_step.service_id, &job.username).await?;
    cw_store::increment_work_item_count(conn, job.id, next_step.step_index, 1).await?;
    spawned.insert(next_step.service_id.clone());
    Ok(())
}

async fn spawn_aggregated_item(
    conn: &mut sqlx::PgConnection,
    job: &Job,
    next_step: &WorkflowStep,
    sealed: cw_store::SealedBatch,
    now_epoch_ms: u64,
    spawned: &mut BTreeSet<ServiceId>,
) -> Result<(), ProcessorError> {
    let catalog = serde_json::to_string(&sealed.inputs)?;
    let new_item = NewWorkItem::new(job.id, next_step.service_id.clone(), next_step.step_index)
        .with_input(catalog);
    cw_store::insert_ready_item(conn, &new_item, now_epoch_ms).await?;
    cw_store::increment_ready_count(conn, job.id, &next_step.service_id, &job.username).await?;
    cw_store::increment_work_item_count(conn, job.id, next_step.step_index, 1).await?;
    spawned.insert(next_step.service_id.clone());
    Ok(())
}

/// Spawns another READY item on the discovery step with the same scroll ID
/// when the cumulative spawned count on the next step hasn't yet reached the
/// discovery step's (possibly just-revised) total granule estimate.
async fn maybe_continue_discovery(
    conn: &mut sqlx::PgConnection,
    job: &Job,
    current_step: &WorkflowStep,
    update: &WorkItemUpdate,
    next_step_index: i32,
    now_epoch_ms: u64,
    spawned: &mut BTreeSet<ServiceId>,
) -> Result<(), ProcessorError> {
    let Some(scroll_id) = update.scroll_id.as_ref() else {
        return Ok(());
    };

    let mut target_total = current_step.work_item_count;
    if let Some(hint) = update.total_items_size {
        if hint > target_total {
            cw_store::raise_work_item_count(conn, job.id, current_step.step_index, hint).await?;
            target_total = hint;
        }
    }

    let spawned_on_next = cw_store::count_items_for_step(&mut *conn, job.id, next_step_index).await?;
    if spawned_on_next >= target_total {
        return Ok(());
    }

    let continuation = NewWorkItem::new(job.id, current_step.service_id.clone(), current_step.step_index)
        .with_scroll_id(scroll_id.clone());
    cw_store::insert_ready_item(conn, &continuation, now_epoch_ms).await?;
    cw_store::increment_ready_count(conn, job.id, &current_step.service_id, &job.username).await?;
    spawned.insert(current_step.service_id.clone());
    Ok(())
}

async fn recompute_progress(
    conn: &mut sqlx::PgConnection,
    job_id: JobId,
    now_epoch_ms: u64,
) -> Result<(), ProcessorError> {
    let last_step_index = cw_store::max_step_index(&mut *conn, job_id).await?;
    let completed = cw_store::count_successful_items(&mut *conn, job_id, last_step_index).await?;
    let last_step = cw_store::get_workflow_step(&mut *conn, job_id, last_step_index).await?;
    cw_store::update_job_progress(conn, job_id, completed, last_step.work_item_count, now_epoch_ms).await?;
    Ok(())
}

async fn maybe_complete_job(
    conn: &mut sqlx::PgConnection,
    job: &Job,
    now_epoch_ms: u64,
) -> Result<(), ProcessorError> {
    if !job.status.is_running_family() {
        return Ok(());
    }

    let last_step_index = cw_store::max_step_index(&mut *conn, job.id).await?;
    let last_step = cw_store::get_workflow_step(&mut *conn, job.id, last_step_index).await?;
    if last_step.work_item_count <= 0 {
        return Ok(());
    }
    let successful = cw_store::count_successful_items(&mut *conn, job.id, last_step_index).await?;
    if successful != last_step.work_item_count {
        return Ok(());
    }
    if !cw_store::job_has_no_outstanding_items(&mut *conn, job.id).await? {
        return Ok(());
    }

    let complete_status = cw_core::apply_transition(job.status, JobEvent::Complete)?;
    cw_store::mark_job_terminal(conn, job.id, complete_status, now_epoch_ms).await?;
    Ok(())
}
