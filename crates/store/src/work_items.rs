// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use cw_core::{JobId, NewWorkItem, WorkItem, WorkItemId, WorkItemStatus};
use sqlx::PgPool;

use crate::error::StoreError;
use crate::models::{work_item_status_text, WorkItemRow};

/// Insert a new item in READY, returning its assigned id.
pub async fn insert_ready_item(
    conn: &mut sqlx::PgConnection,
    item: &NewWorkItem,
    now_epoch_ms: u64,
) -> Result<WorkItemId, StoreError> {
    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO work_items (job_id, service_id, workflow_step_index, status, \
         stac_catalog_location, scroll_id, output_item_sizes, updated_at_epoch_ms) \
         VALUES ($1, $2, $3, $4, $5, $6, '[]', $7) RETURNING id",
    )
    .bind(item.job_id.as_uuid())
    .bind(item.service_id.as_str())
    .bind(item.workflow_step_index)
    .bind(work_item_status_text(WorkItemStatus::Ready))
    .bind(&item.stac_catalog_location)
    .bind(&item.scroll_id)
    .bind(now_epoch_ms as i64)
    .fetch_one(&mut *conn)
    .await?;
    Ok(WorkItemId::from(id))
}

pub async fn get_work_item(
    executor: impl sqlx::PgExecutor<'_>,
    id: WorkItemId,
) -> Result<WorkItem, StoreError> {
    let row: WorkItemRow = sqlx::query_as(
        "SELECT id, job_id, service_id, workflow_step_index, status, stac_catalog_location, \
         scroll_id, error_message, output_item_sizes, started_at_epoch_ms, updated_at_epoch_ms \
         FROM work_items WHERE id = $1",
    )
    .bind(id.0)
    .fetch_optional(executor)
    .await?
    .ok_or(StoreError::WorkItemNotFound(id.0))?;
    row.into_work_item()
}

/// Lock the item row for update within a transaction, as the first step
/// of the update processor's pipeline.
pub async fn lock_work_item(
    conn: &mut sqlx::PgConnection,
    id: WorkItemId,
) -> Result<Option<WorkItem>, StoreError> {
    let row: Option<WorkItemRow> = sqlx::query_as(
        "SELECT id, job_id, service_id, workflow_step_index, status, stac_catalog_location, \
         scroll_id, error_message, output_item_sizes, started_at_epoch_ms, updated_at_epoch_ms \
         FROM work_items WHERE id = $1 FOR UPDATE",
    )
    .bind(id.0)
    .fetch_optional(&mut *conn)
    .await?;
    row.map(WorkItemRow::into_work_item).transpose()
}

pub async fn write_item_status(
    conn: &mut sqlx::PgConnection,
    id: WorkItemId,
    status: WorkItemStatus,
    error_message: Option<&str>,
    output_item_sizes: &[i64],
    now_epoch_ms: u64,
) -> Result<(), StoreError> {
    sqlx::query(
        "UPDATE work_items SET status = $2, error_message = $3, output_item_sizes = $4, \
         updated_at_epoch_ms = $5 WHERE id = $1",
    )
    .bind(id.0)
    .bind(work_item_status_text(status))
    .bind(error_message)
    .bind(serde_json::json!(output_item_sizes))
    .bind(now_epoch_ms as i64)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn mark_started(
    conn: &mut sqlx::PgConnection,
    id: WorkItemId,
    now_epoch_ms: u64,
) -> Result<(), StoreError> {
    sqlx::query(
        "UPDATE work_items SET status = $2, started_at_epoch_ms = $3, updated_at_epoch_ms = $3 \
         WHERE id = $1",
    )
    .bind(id.0)
    .bind(work_item_status_text(WorkItemStatus::Running))
    .bind(now_epoch_ms as i64)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Cancel every non-terminal item belonging to `job_id` (used both by the
/// lifecycle CANCEL event and defensively by the failer).
pub async fn cancel_non_terminal_items(
    conn: &mut sqlx::PgConnection,
    job_id: JobId,
    now_epoch_ms: u64,
) -> Result<u64, StoreError> {
    let result = sqlx::query(
        "UPDATE work_items SET status = $2, updated_at_epoch_ms = $3 \
         WHERE job_id = $1 AND status IN ('READY', 'QUEUED', 'RUNNING')",
    )
    .bind(job_id.as_uuid())
    .bind(work_item_status_text(WorkItemStatus::Canceled))
    .bind(now_epoch_ms as i64)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected())
}

/// Items RUNNING longer than `older_than_epoch_ms`, for jobs in
/// RUNNING/RUNNING_WITH_ERRORS, for the work failer's stall scan.
pub async fn find_stalled_running_items(
    pool: &PgPool,
    older_than_epoch_ms: u64,
) -> Result<Vec<WorkItem>, StoreError> {
    let rows: Vec<WorkItemRow> = sqlx::query_as(
        "SELECT wi.id, wi.job_id, wi.service_id, wi.workflow_step_index, wi.status, \
         wi.stac_catalog_location, wi.scroll_id, wi.error_message, wi.output_item_sizes, \
         wi.started_at_epoch_ms, wi.updated_at_epoch_ms \
         FROM work_items wi JOIN jobs j ON j.id = wi.job_id \
         WHERE wi.status = 'RUNNING' AND wi.started_at_epoch_ms < $1 \
         AND j.status IN ('RUNNING', 'RUNNING_WITH_ERRORS') \
         ORDER BY wi.job_id, wi.id",
    )
    .bind(older_than_epoch_ms as i64)
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(WorkItemRow::into_work_item).collect()
}

/// Recent SUCCESSFUL durations (ms) for a `(jobID, serviceID, stepIndex)`
/// tuple, feeding the failer's per-step stall threshold calculation.
pub async fn recent_successful_durations_ms(
    pool: &PgPool,
    job_id: JobId,
    step_index: i32,
    limit: i64,
) -> Result<Vec<i64>, StoreError> {
    let rows: Vec<(i64,)> = sqlx::query_as(
        "SELECT (updated_at_epoch_ms - started_at_epoch_ms) AS duration_ms FROM work_items \
         WHERE job_id = $1 AND workflow_step_index = $2 AND status = 'SUCCESSFUL' \
         AND started_at_epoch_ms IS NOT NULL \
         ORDER BY updated_at_epoch_ms DESC LIMIT $3",
    )
    .bind(job_id.as_uuid())
    .bind(step_index)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|(d,)| d).collect())
}

/// Delete up to `batch_size` items with the smallest ids for `job_id`, for
/// the work reaper's incremental cleanup. Returns the number deleted.
pub async fn delete_items_batch(
    conn: &mut sqlx::PgConnection,
    job_id: JobId,
    batch_size: i64,
) -> Result<u64, StoreError> {
    let result = sqlx::query(
        "DELETE FROM work_items WHERE id IN ( \
            SELECT id FROM work_items WHERE job_id = $1 ORDER BY id ASC LIMIT $2 \
         )",
    )
    .bind(job_id.as_uuid())
    .bind(batch_size)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected())
}
