// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use cw_core::{JobId, ServiceId, UserWork};
use sqlx::PgPool;

use crate::error::StoreError;

#[derive(sqlx::FromRow)]
struct UserWorkRow {
    job_id: uuid::Uuid,
    service_id: String,
    username: String,
    ready_count: i64,
    running_count: i64,
    last_worked_epoch_ms: i64,
}

impl From<UserWorkRow> for UserWork {
    fn from(row: UserWorkRow) -> Self {
        UserWork {
            job_id: JobId::from_uuid(row.job_id),
            service_id: ServiceId::new(row.service_id),
            username: row.username,
            ready_count: row.ready_count,
            running_count: row.running_count,
            last_worked_epoch_ms: row.last_worked_epoch_ms as u64,
        }
    }
}

pub async fn get(
    executor: impl sqlx::PgExecutor<'_>,
    job_id: JobId,
    service_id: &ServiceId,
    username: &str,
) -> Result<Option<UserWork>, StoreError> {
    let row: Option<UserWorkRow> = sqlx::query_as(
        "SELECT job_id, service_id, username, ready_count, running_count, last_worked_epoch_ms \
         FROM user_work WHERE job_id = $1 AND service_id = $2 AND username = $3",
    )
    .bind(job_id.as_uuid())
    .bind(service_id.as_str())
    .bind(username)
    .fetch_optional(executor)
    .await?;
    Ok(row.map(UserWork::from))
}

/// Increment `ready_count`, creating the row if it doesn't exist yet.
pub async fn increment_ready_count(
    conn: &mut sqlx::PgConnection,
    job_id: JobId,
    service_id: &ServiceId,
    username: &str,
) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO user_work (job_id, service_id, username, ready_count, running_count, last_worked_epoch_ms) \
         VALUES ($1, $2, $3, 1, 0, 0) \
         ON CONFLICT (job_id, service_id, username) \
         DO UPDATE SET ready_count = user_work.ready_count + 1",
    )
    .bind(job_id.as_uuid())
    .bind(service_id.as_str())
    .bind(username)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn decrement_ready_count(
    conn: &mut sqlx::PgConnection,
    job_id: JobId,
    service_id: &ServiceId,
    username: &str,
) -> Result<(), StoreError> {
    sqlx::query(
        "UPDATE user_work SET ready_count = GREATEST(ready_count - 1, 0) \
         WHERE job_id = $1 AND service_id = $2 AND username = $3",
    )
    .bind(job_id.as_uuid())
    .bind(service_id.as_str())
    .bind(username)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn decrement_running_count(
    conn: &mut sqlx::PgConnection,
    job_id: JobId,
    service_id: &ServiceId,
    username: &str,
) -> Result<(), StoreError> {
    sqlx::query(
        "UPDATE user_work SET running_count = GREATEST(running_count - 1, 0) \
         WHERE job_id = $1 AND service_id = $2 AND username = $3",
    )
    .bind(job_id.as_uuid())
    .bind(service_id.as_str())
    .bind(username)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Flip up to `count` items from READY to RUNNING for `(job_id,
/// service_id)` and rebalance counters, atomically claiming a job's share
/// of a scheduling round. Returns the ids flipped.
pub async fn claim_ready_items(
    conn: &mut sqlx::PgConnection,
    job_id: JobId,
    service_id: &ServiceId,
    count: i64,
    now_epoch_ms: u64,
) -> Result<Vec<i64>, StoreError> {
    let rows: Vec<(i64,)> = sqlx::query_as(
        "UPDATE work_items SET status = 'RUNNING', started_at_epoch_ms = $4, updated_at_epoch_ms = $4 \
         WHERE id IN ( \
             SELECT id FROM work_items \
             WHERE job_id = $1 AND service_id = $2 AND status = 'READY' \
             ORDER BY id ASC LIMIT $3 \
             FOR UPDATE SKIP LOCKED \
         ) RETURNING id",
    )
    .bind(job_id.as_uuid())
    .bind(service_id.as_str())
    .bind(count)
    .bind(now_epoch_ms as i64)
    .fetch_all(&mut *conn)
    .await?;

    let claimed = rows.len() as i64;
    if claimed > 0 {
        sqlx::query(
            "UPDATE user_work SET ready_count = GREATEST(ready_count - $3, 0), \
             running_count = running_count + $3, last_worked_epoch_ms = $4 \
             WHERE job_id = $1 AND service_id = $2",
        )
        .bind(job_id.as_uuid())
        .bind(service_id.as_str())
        .bind(claimed)
        .bind(now_epoch_ms as i64)
        .execute(&mut *conn)
        .await?;
    }

    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Rescans `work_items` for the tuple and overwrites the counters,
/// correcting for any drift between `user_work` and actual item states.
pub async fn reconcile_counts(
    conn: &mut sqlx::PgConnection,
    job_id: JobId,
    service_id: &ServiceId,
    username: &str,
) -> Result<(), StoreError> {
    let (ready, running): (i64, i64) = sqlx::query_as(
        "SELECT \
           COUNT(*) FILTER (WHERE status = 'READY'), \
           COUNT(*) FILTER (WHERE status = 'RUNNING') \
         FROM work_items WHERE job_id = $1 AND service_id = $2",
    )
    .bind(job_id.as_uuid())
    .bind(service_id.as_str())
    .fetch_one(&mut *conn)
    .await?;

    sqlx::query(
        "INSERT INTO user_work (job_id, service_id, username, ready_count, running_count, last_worked_epoch_ms) \
         VALUES ($1, $2, $3, $4, $5, 0) \
         ON CONFLICT (job_id, service_id, username) \
         DO UPDATE SET ready_count = EXCLUDED.ready_count, running_count = EXCLUDED.running_count",
    )
    .bind(job_id.as_uuid())
    .bind(service_id.as_str())
    .bind(username)
    .bind(ready)
    .bind(running)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Same as [`reconcile_counts`], but looks up `username` from the owning
/// job instead of requiring the caller to supply it — useful to callers
/// (the scheduler's fair selector) that only have `(job_id, service_id)`.
pub async fn reconcile_counts_for_job(
    conn: &mut sqlx::PgConnection,
    job_id: JobId,
    service_id: &ServiceId,
) -> Result<(), StoreError> {
    let (username,): (String,) = sqlx::query_as("SELECT username FROM jobs WHERE id = $1")
        .bind(job_id.as_uuid())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| StoreError::JobNotFound(job_id.to_string()))?;
    reconcile_counts(conn, job_id, service_id, &username).await
}

/// Zero both counters for every `user_work` row belonging to `job_id`, used
/// when a job is canceled or fails so no stale ready/running count survives
/// it.
pub async fn zero_counts_for_job(conn: &mut sqlx::PgConnection, job_id: JobId) -> Result<(), StoreError> {
    sqlx::query("UPDATE user_work SET ready_count = 0, running_count = 0 WHERE job_id = $1")
        .bind(job_id.as_uuid())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

#[cfg(any(test, feature = "test-support"))]
pub async fn fetch_for_test(
    pool: &PgPool,
    job_id: JobId,
    service_id: &ServiceId,
    username: &str,
) -> Result<Option<UserWork>, StoreError> {
    get(pool, job_id, service_id, username).await
}
