// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cw-store: the Postgres persistence layer backing the work orchestration
//! core. Each module owns one table (or one cross-table concern, for
//! `selector` and `aggregation`) and exposes plain async functions rather
//! than a repository trait, since there is exactly one backing store.

mod aggregation;
mod codec;
mod error;
mod job_links;
mod jobs;
mod models;
mod selector;
mod user_work;
mod work_items;
mod workflow_steps;

pub use aggregation::SealedBatch;
pub use error::StoreError;

pub use jobs::{
    append_job_link, apply_job_event, find_reapable_jobs, get_job, increment_job_error_count,
    insert_job, lock_job, mark_job_terminal, update_job_progress, write_job_status,
};
pub use job_links::fetch_job_links;
pub use workflow_steps::{
    count_items_for_step, count_successful_items, delete_workflow_steps_batch, get_workflow_step,
    increment_work_item_count, insert_workflow_step, job_has_no_outstanding_items, max_step_index,
    raise_work_item_count, step_has_no_outstanding_items,
};
pub use work_items::{
    cancel_non_terminal_items, delete_items_batch, find_stalled_running_items, get_work_item,
    insert_ready_item, lock_work_item, mark_started, recent_successful_durations_ms,
    write_item_status,
};
pub use user_work::{
    claim_ready_items, decrement_ready_count, decrement_running_count, get as get_user_work,
    increment_ready_count, reconcile_counts, reconcile_counts_for_job, zero_counts_for_job,
};
pub use selector::candidate_jobs_for_service;
pub use aggregation::{append_input as append_aggregation_input, seal_trailing_batch};

#[cfg(any(test, feature = "test-support"))]
pub use user_work::fetch_for_test as fetch_user_work_for_test;

/// A connected, migrated Postgres pool for the work orchestration core.
#[derive(Clone)]
pub struct Store {
    pool: sqlx::PgPool,
}

impl Store {
    /// Connect to `database_url`, applying any pending migrations.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Store { pool })
    }

    /// Wrap an already-connected, already-migrated pool (used by tests that
    /// share one pool across many `Store` instances).
    pub fn from_pool(pool: sqlx::PgPool) -> Self {
        Store { pool }
    }

    pub fn pool(&self) -> &sqlx::PgPool {
        &self.pool
    }

    pub async fn acquire(&self) -> Result<sqlx::pool::PoolConnection<sqlx::Postgres>, StoreError> {
        Ok(self.pool.acquire().await?)
    }

    pub async fn begin(&self) -> Result<sqlx::Transaction<'_, sqlx::Postgres>, StoreError> {
        Ok(self.pool.begin().await?)
    }
}
