// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The fair selector: pick up to `total_requested` READY items for a
//! service, spread evenly and randomly across the jobs that have work
//! waiting, so no single job can monopolize a service's throughput.

use cw_core::{JobId, ServiceId};
use rand::seq::SliceRandom;
use sqlx::PgPool;

use crate::error::SchedulerError;

/// Claim up to `total_requested` items across the jobs with ready work for
/// `service_id`. Returns the claimed item ids.
pub async fn select_fair_items(
    pool: &PgPool,
    service_id: &ServiceId,
    total_requested: i64,
    now_epoch_ms: u64,
) -> Result<Vec<i64>, SchedulerError> {
    if total_requested <= 0 {
        return Ok(Vec::new());
    }

    let mut candidate_jobs = cw_store::candidate_jobs_for_service(pool, service_id, total_requested).await?;
    candidate_jobs.shuffle(&mut rand::thread_rng());

    let mut claimed = Vec::new();
    let mut remaining_batch = total_requested;
    let mut remaining_jobs = candidate_jobs.len() as i64;

    for job_id in candidate_jobs {
        if remaining_batch <= 0 || remaining_jobs <= 0 {
            break;
        }
        let share = div_ceil(remaining_batch, remaining_jobs);
        let ids = claim_job_share(pool, job_id, service_id, share, now_epoch_ms).await?;

        remaining_batch -= ids.len() as i64;
        remaining_jobs -= 1;
        claimed.extend(ids);
    }

    Ok(claimed)
}

/// Claim up to `share` items for one job, reconciling `user_work` counters
/// if fewer items were actually claimable than the cached `ready_count`
/// implied — a sign the cache drifted from the live item rows.
async fn claim_job_share(
    pool: &PgPool,
    job_id: JobId,
    service_id: &ServiceId,
    share: i64,
    now_epoch_ms: u64,
) -> Result<Vec<i64>, SchedulerError> {
    let mut conn = pool.acquire().await.map_err(cw_store::StoreError::from)?;
    let ids = cw_store::claim_ready_items(&mut conn, job_id, service_id, share, now_epoch_ms).await?;
    if (ids.len() as i64) < share {
        cw_store::reconcile_counts_for_job(&mut conn, job_id, service_id).await?;
    }
    Ok(ids)
}

fn div_ceil(a: i64, b: i64) -> i64 {
    (a + b - 1) / b
}
