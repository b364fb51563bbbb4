// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use cw_core::{JobId, WorkflowStep};
use sqlx::PgPool;

use crate::error::StoreError;
use crate::models::WorkflowStepRow;

pub async fn insert_workflow_step(pool: &PgPool, step: &WorkflowStep) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO workflow_steps (job_id, step_index, service_id, operation, \
         work_item_count, has_aggregated_output, batch_size, max_batch_size_bytes, is_sequential) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(step.job_id.as_uuid())
    .bind(step.step_index)
    .bind(step.service_id.as_str())
    .bind(&step.operation)
    .bind(step.work_item_count)
    .bind(step.has_aggregated_output)
    .bind(step.batch_size)
    .bind(step.max_batch_size_bytes)
    .bind(step.is_sequential)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_workflow_step<'e, E>(
    executor: E,
    job_id: JobId,
    step_index: i32,
) -> Result<WorkflowStep, StoreError>
where
    E: sqlx::PgExecutor<'e>,
{
    let row: WorkflowStepRow = sqlx::query_as(
        "SELECT job_id, step_index, service_id, operation, work_item_count, \
         has_aggregated_output, batch_size, max_batch_size_bytes, is_sequential \
         FROM workflow_steps WHERE job_id = $1 AND step_index = $2",
    )
    .bind(job_id.as_uuid())
    .bind(step_index)
    .fetch_optional(executor)
    .await?
    .ok_or_else(|| StoreError::WorkflowStepNotFound {
        job_id: job_id.to_string(),
        step_index,
    })?;
    Ok(row.into())
}

/// Raises `work_item_count` to `at_least` if the stored value is lower.
/// Used by the discovery-continuation handler, which may learn a larger
/// total item count partway through a multi-page discovery scan.
pub async fn raise_work_item_count(
    conn: &mut sqlx::PgConnection,
    job_id: JobId,
    step_index: i32,
    at_least: i64,
) -> Result<(), StoreError> {
    sqlx::query(
        "UPDATE workflow_steps SET work_item_count = GREATEST(work_item_count, $3) \
         WHERE job_id = $1 AND step_index = $2",
    )
    .bind(job_id.as_uuid())
    .bind(step_index)
    .bind(at_least)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Adds `by` to a step's `work_item_count`, for downstream steps whose
/// total is unknown up front and instead grows as the processor spawns
/// items onto them.
pub async fn increment_work_item_count(
    conn: &mut sqlx::PgConnection,
    job_id: JobId,
    step_index: i32,
    by: i64,
) -> Result<(), StoreError> {
    sqlx::query("UPDATE workflow_steps SET work_item_count = work_item_count + $3 WHERE job_id = $1 AND step_index = $2")
        .bind(job_id.as_uuid())
        .bind(step_index)
        .bind(by)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn count_successful_items(
    executor: impl sqlx::PgExecutor<'_>,
    job_id: JobId,
    step_index: i32,
) -> Result<i64, StoreError> {
    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM work_items \
         WHERE job_id = $1 AND workflow_step_index = $2 AND status = 'SUCCESSFUL'",
    )
    .bind(job_id.as_uuid())
    .bind(step_index)
    .fetch_one(executor)
    .await?;
    Ok(count)
}

pub async fn max_step_index(executor: impl sqlx::PgExecutor<'_>, job_id: JobId) -> Result<i32, StoreError> {
    let (max,): (Option<i32>,) =
        sqlx::query_as("SELECT MAX(step_index) FROM workflow_steps WHERE job_id = $1")
            .bind(job_id.as_uuid())
            .fetch_one(executor)
            .await?;
    Ok(max.unwrap_or(0))
}

/// True when no WorkItem belonging to this job is in a non-terminal state.
pub async fn job_has_no_outstanding_items(
    executor: impl sqlx::PgExecutor<'_>,
    job_id: JobId,
) -> Result<bool, StoreError> {
    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM work_items \
         WHERE job_id = $1 AND status IN ('READY', 'QUEUED', 'RUNNING')",
    )
    .bind(job_id.as_uuid())
    .fetch_one(executor)
    .await?;
    Ok(count == 0)
}

/// True when no WorkItem for this one step is in a non-terminal state, used
/// to decide whether an aggregation step's trailing batch must be sealed.
pub async fn step_has_no_outstanding_items(
    executor: impl sqlx::PgExecutor<'_>,
    job_id: JobId,
    step_index: i32,
) -> Result<bool, StoreError> {
    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM work_items \
         WHERE job_id = $1 AND workflow_step_index = $2 AND status IN ('READY', 'QUEUED', 'RUNNING')",
    )
    .bind(job_id.as_uuid())
    .bind(step_index)
    .fetch_one(executor)
    .await?;
    Ok(count == 0)
}

/// Total items ever created for a step, regardless of status, for the
/// discovery-continuation check (how many downstream items have been
/// spawned so far across all pages).
/// Delete up to `batch_size` workflow steps with the smallest `step_index`
/// for `job_id`, mirroring [`crate::work_items::delete_items_batch`] for the
/// work reaper's incremental cleanup. Returns the number deleted.
pub async fn delete_workflow_steps_batch(
    conn: &mut sqlx::PgConnection,
    job_id: JobId,
    batch_size: i64,
) -> Result<u64, StoreError> {
    let result = sqlx::query(
        "DELETE FROM workflow_steps WHERE (job_id, step_index) IN ( \
            SELECT job_id, step_index FROM workflow_steps \
            WHERE job_id = $1 ORDER BY step_index ASC LIMIT $2 \
         )",
    )
    .bind(job_id.as_uuid())
    .bind(batch_size)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected())
}

pub async fn count_items_for_step(
    executor: impl sqlx::PgExecutor<'_>,
    job_id: JobId,
    step_index: i32,
) -> Result<i64, StoreError> {
    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM work_items WHERE job_id = $1 AND workflow_step_index = $2",
    )
    .bind(job_id.as_uuid())
    .bind(step_index)
    .fetch_one(executor)
    .await?;
    Ok(count)
}
