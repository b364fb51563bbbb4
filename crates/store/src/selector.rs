// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The database-facing half of the fair selector. The shuffle and per-job
//! share arithmetic are pure and live in `cw-scheduler`; this module only
//! does the locked reads/writes.

use cw_core::{JobId, ServiceId};
use sqlx::PgPool;

use crate::error::StoreError;

/// Up to `limit` distinct jobs with ready work for `service_id`, ordered by
/// `last_worked ASC, running_count ASC`. Row-level locks are taken
/// per-job later, at claim time, not here — this is a plain read.
pub async fn candidate_jobs_for_service(
    pool: &PgPool,
    service_id: &ServiceId,
    limit: i64,
) -> Result<Vec<JobId>, StoreError> {
    let rows: Vec<(uuid::Uuid,)> = sqlx::query_as(
        "SELECT uw.job_id FROM user_work uw \
         JOIN jobs j ON j.id = uw.job_id \
         WHERE uw.service_id = $1 AND uw.ready_count > 0 \
         AND j.status IN ('RUNNING', 'RUNNING_WITH_ERRORS') \
         ORDER BY uw.last_worked_epoch_ms ASC, uw.running_count ASC \
         LIMIT $2",
    )
    .bind(service_id.as_str())
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|(id,)| JobId::from_uuid(id)).collect())
}
