// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use cw_core::{Job, JobEvent, JobId, JobLink, JobStatus};
use sqlx::PgPool;

use crate::error::StoreError;
use crate::job_links::fetch_job_links;
use crate::models::{job_status_text, JobRow};

/// Insert a freshly created job (status ACCEPTED, no links yet).
pub async fn insert_job(pool: &PgPool, job: &Job) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO jobs (id, username, status, message, progress, num_input_granules, \
         is_async, request, error_count, ignore_errors, created_at_epoch_ms, updated_at_epoch_ms) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
    )
    .bind(job.id.as_uuid())
    .bind(&job.username)
    .bind(job_status_text(job.status))
    .bind(&job.message)
    .bind(job.progress as i16)
    .bind(job.num_input_granules)
    .bind(job.is_async)
    .bind(&job.request)
    .bind(job.error_count as i32)
    .bind(job.ignore_errors)
    .bind(job.created_at_epoch_ms as i64)
    .bind(job.updated_at_epoch_ms as i64)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_job(pool: &PgPool, job_id: JobId) -> Result<Job, StoreError> {
    let row: JobRow = sqlx::query_as(
        "SELECT id, username, status, message, progress, num_input_granules, is_async, \
         request, error_count, ignore_errors, created_at_epoch_ms, updated_at_epoch_ms \
         FROM jobs WHERE id = $1",
    )
    .bind(job_id.as_uuid())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| StoreError::JobNotFound(job_id.to_string()))?;

    let links = fetch_job_links(pool, job_id).await?;
    row.into_job(links)
}

/// Apply a lifecycle event to a job within one transaction. On CANCEL,
/// also cancels non-terminal work items and zeroes UserWork rows for the
/// job, so no item can enter RUNNING once the job is canceled.
pub async fn apply_job_event(
    pool: &PgPool,
    job_id: JobId,
    event: JobEvent,
    now_epoch_ms: u64,
) -> Result<Job, StoreError> {
    let mut tx = pool.begin().await?;

    let row: JobRow = sqlx::query_as(
        "SELECT id, username, status, message, progress, num_input_granules, is_async, \
         request, error_count, ignore_errors, created_at_epoch_ms, updated_at_epoch_ms \
         FROM jobs WHERE id = $1 FOR UPDATE",
    )
    .bind(job_id.as_uuid())
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| StoreError::JobNotFound(job_id.to_string()))?;

    let links = fetch_job_links(&mut *tx, job_id).await?;
    let mut job = row.into_job(links)?;
    job.apply_event(event, now_epoch_ms)?;

    sqlx::query(
        "UPDATE jobs SET status = $2, progress = $3, updated_at_epoch_ms = $4 WHERE id = $1",
    )
    .bind(job_id.as_uuid())
    .bind(job_status_text(job.status))
    .bind(job.progress as i16)
    .bind(job.updated_at_epoch_ms as i64)
    .execute(&mut *tx)
    .await?;

    if event == JobEvent::Cancel {
        sqlx::query(
            "UPDATE work_items SET status = $2, updated_at_epoch_ms = $3 \
             WHERE job_id = $1 AND status IN ('READY', 'QUEUED', 'RUNNING')",
        )
        .bind(job_id.as_uuid())
        .bind(crate::models::work_item_status_text(cw_core::WorkItemStatus::Canceled))
        .bind(now_epoch_ms as i64)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE user_work SET ready_count = 0, running_count = 0 WHERE job_id = $1",
        )
        .bind(job_id.as_uuid())
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(job)
}

/// Lock the job row for update within a caller-supplied transaction, so the
/// update processor's pipeline can read and mutate job state alongside the
/// work item in one commit.
pub async fn lock_job(conn: &mut sqlx::PgConnection, job_id: JobId) -> Result<Job, StoreError> {
    let row: JobRow = sqlx::query_as(
        "SELECT id, username, status, message, progress, num_input_granules, is_async, \
         request, error_count, ignore_errors, created_at_epoch_ms, updated_at_epoch_ms \
         FROM jobs WHERE id = $1 FOR UPDATE",
    )
    .bind(job_id.as_uuid())
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| StoreError::JobNotFound(job_id.to_string()))?;

    let links = fetch_job_links(&mut *conn, job_id).await?;
    row.into_job(links)
}

/// Write a job's `status` and `message` without touching progress, for
/// callers (the update processor) that already hold the row locked and
/// compute progress separately.
pub async fn write_job_status(
    conn: &mut sqlx::PgConnection,
    job_id: JobId,
    status: JobStatus,
    message: Option<&str>,
    now_epoch_ms: u64,
) -> Result<(), StoreError> {
    sqlx::query(
        "UPDATE jobs SET status = $2, message = $3, updated_at_epoch_ms = $4 WHERE id = $1",
    )
    .bind(job_id.as_uuid())
    .bind(job_status_text(status))
    .bind(message)
    .bind(now_epoch_ms as i64)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn append_job_link(
    executor: impl sqlx::PgExecutor<'_>,
    link: &JobLink,
) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO job_links (job_id, href, rel, type, title, bbox, temporal) \
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(link.job_id.as_uuid())
    .bind(&link.href)
    .bind(&link.rel)
    .bind(&link.r#type)
    .bind(&link.title)
    .bind(link.bbox.map(|b| serde_json::json!(b)))
    .bind(link.temporal.as_ref().map(|t| serde_json::json!(t)))
    .execute(executor)
    .await?;
    Ok(())
}

/// Recompute and persist job progress from completed/total leaf item
/// counts, without changing status.
pub async fn update_job_progress(
    pool: &mut sqlx::PgConnection,
    job_id: JobId,
    completed: i64,
    total: i64,
    now_epoch_ms: u64,
) -> Result<(), StoreError> {
    let row: JobRow = sqlx::query_as(
        "SELECT id, username, status, message, progress, num_input_granules, is_async, \
         request, error_count, ignore_errors, created_at_epoch_ms, updated_at_epoch_ms \
         FROM jobs WHERE id = $1 FOR UPDATE",
    )
    .bind(job_id.as_uuid())
    .fetch_optional(&mut *pool)
    .await?
    .ok_or_else(|| StoreError::JobNotFound(job_id.to_string()))?;

    let mut job = row.into_job(Vec::new())?;
    job.set_progress_from_counts(completed, total);
    job.updated_at_epoch_ms = now_epoch_ms;

    sqlx::query("UPDATE jobs SET progress = $2, updated_at_epoch_ms = $3 WHERE id = $1")
        .bind(job_id.as_uuid())
        .bind(job.progress as i16)
        .bind(job.updated_at_epoch_ms as i64)
        .execute(&mut *pool)
        .await?;
    Ok(())
}

/// Mark the job terminal (SUCCESSFUL or COMPLETE_WITH_ERRORS) with
/// progress stamped to 100, within a caller-supplied transaction.
pub async fn mark_job_terminal(
    conn: &mut sqlx::PgConnection,
    job_id: JobId,
    status: JobStatus,
    now_epoch_ms: u64,
) -> Result<(), StoreError> {
    sqlx::query("UPDATE jobs SET status = $2, progress = 100, updated_at_epoch_ms = $3 WHERE id = $1")
        .bind(job_id.as_uuid())
        .bind(job_status_text(status))
        .bind(now_epoch_ms as i64)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Jobs in a terminal state whose `updated_at_epoch_ms` is older than
/// `older_than_epoch_ms`, for the work reaper's cleanup scan.
pub async fn find_reapable_jobs(
    pool: &PgPool,
    older_than_epoch_ms: u64,
) -> Result<Vec<JobId>, StoreError> {
    let rows: Vec<(uuid::Uuid,)> = sqlx::query_as(
        "SELECT id FROM jobs \
         WHERE status IN ('SUCCESSFUL', 'FAILED', 'CANCELED', 'COMPLETE_WITH_ERRORS') \
         AND updated_at_epoch_ms < $1 \
         ORDER BY id",
    )
    .bind(older_than_epoch_ms as i64)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|(id,)| JobId::from_uuid(id)).collect())
}

pub async fn increment_job_error_count(
    conn: &mut sqlx::PgConnection,
    job_id: JobId,
) -> Result<i32, StoreError> {
    let (error_count,): (i32,) = sqlx::query_as(
        "UPDATE jobs SET error_count = error_count + 1 WHERE id = $1 RETURNING error_count",
    )
    .bind(job_id.as_uuid())
    .fetch_one(&mut *conn)
    .await?;
    Ok(error_count)
}
