// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use cw_core::{JobId, JobLink};

use crate::error::StoreError;
use crate::models::JobLinkRow;

pub async fn fetch_job_links<'e, E>(executor: E, job_id: JobId) -> Result<Vec<JobLink>, StoreError>
where
    E: sqlx::PgExecutor<'e>,
{
    let rows: Vec<JobLinkRow> = sqlx::query_as(
        "SELECT job_id, href, rel, type, title, bbox, temporal FROM job_links \
         WHERE job_id = $1 ORDER BY id ASC",
    )
    .bind(job_id.as_uuid())
    .fetch_all(executor)
    .await?;

    rows.into_iter().map(JobLinkRow::into_job_link).collect()
}
