// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error kinds surfaced by the core.

use thiserror::Error;

/// Domain-level errors that can be returned from state-machine and model
/// operations. Transport/persistence errors (DB transient, broker transient)
/// are defined in the crates that own those concerns (`cw-store`, `cw-queue`)
/// and wrap a [`CoreError`] where a domain rule was the actual cause.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Attempt to move a job or item into a disallowed state.
    #[error("cannot apply event '{event}' to status '{from}'")]
    InvalidTransition { from: String, event: String },

    /// A work item's step template could not be loaded; fatal for the job.
    #[error("operation template missing for job {job_id} step {step_index}")]
    OperationTemplateMissing { job_id: String, step_index: i32 },

    /// No `WorkflowStep` exists for the referenced step index.
    #[error("job {job_id} has no workflow step at index {step_index}")]
    UnknownStep { job_id: String, step_index: i32 },
}
