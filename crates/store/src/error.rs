// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    Core(#[from] cw_core::CoreError),

    #[error("job {0} not found")]
    JobNotFound(String),

    #[error("work item {0} not found")]
    WorkItemNotFound(i64),

    #[error("workflow step {step_index} not found for job {job_id}")]
    WorkflowStepNotFound { job_id: String, step_index: i32 },

    #[error("status codec error: {0}")]
    Codec(#[from] serde_json::Error),
}
