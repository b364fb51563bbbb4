// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job identifier, status, and the lifecycle state machine.

use crate::error::CoreError;
use crate::job_link::JobLink;
use serde::{Deserialize, Serialize};

crate::define_uuid_id! {
    /// Stable identifier for a submitted transformation request.
    ///
    /// Assigned by the external request-parsing frontend before the job
    /// reaches the core; the core never generates a `JobId` itself.
    pub struct JobId;
}

/// Aggregate status of a [`Job`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Accepted,
    Previewing,
    Running,
    RunningWithErrors,
    CompleteWithErrors,
    Successful,
    Failed,
    Canceled,
    Paused,
}

crate::simple_display! {
    JobStatus {
        Accepted => "accepted",
        Previewing => "previewing",
        Running => "running",
        RunningWithErrors => "running_with_errors",
        CompleteWithErrors => "complete_with_errors",
        Successful => "successful",
        Failed => "failed",
        Canceled => "canceled",
        Paused => "paused",
    }
}

impl JobStatus {
    /// Terminal states from which no further transition is legal.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Successful
                | JobStatus::Failed
                | JobStatus::Canceled
                | JobStatus::CompleteWithErrors
        )
    }

    pub fn is_running_family(self) -> bool {
        matches!(self, JobStatus::Running | JobStatus::RunningWithErrors)
    }
}

/// Lifecycle events accepted by the job state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobEvent {
    SkipPreview,
    Cancel,
    Pause,
    Resume,
    Fail,
    Complete,
}

crate::simple_display! {
    JobEvent {
        SkipPreview => "skip_preview",
        Cancel => "cancel",
        Pause => "pause",
        Resume => "resume",
        Fail => "fail",
        Complete => "complete",
    }
}

/// Applies the job lifecycle transition table. Returns the resulting status
/// or `InvalidTransition` if the (status, event) pair is not in the table.
///
/// `Complete` is ambiguous between RUNNING→SUCCESSFUL and
/// RUNNING_WITH_ERRORS→COMPLETE_WITH_ERRORS; both rows are encoded explicitly
/// below rather than inferred, so the table stays the single source of truth.
pub fn apply_transition(
    status: JobStatus,
    event: JobEvent,
) -> Result<JobStatus, CoreError> {
    use JobEvent::*;
    use JobStatus::*;
    let next = match (status, event) {
        (Accepted, SkipPreview) => Running,
        (Accepted | Previewing | Running | RunningWithErrors | Paused, Cancel) => Canceled,
        (Running | RunningWithErrors, Pause) => Paused,
        (Paused, Resume) => Running,
        (Running | RunningWithErrors, Fail) => Failed,
        (RunningWithErrors, Complete) => CompleteWithErrors,
        (Running, Complete) => Successful,
        _ => {
            return Err(CoreError::InvalidTransition {
                from: status.to_string(),
                event: event.to_string(),
            })
        }
    };
    Ok(next)
}

/// Configuration used to create a new job record.
#[derive(Debug, Clone)]
pub struct JobConfig {
    pub id: JobId,
    pub username: String,
    pub request: String,
    pub is_async: bool,
    pub num_input_granules: i64,
}

impl JobConfig {
    pub fn builder(username: impl Into<String>, request: impl Into<String>) -> JobConfigBuilder {
        JobConfigBuilder {
            id: JobId::new(),
            username: username.into(),
            request: request.into(),
            is_async: true,
            num_input_granules: 0,
        }
    }
}

pub struct JobConfigBuilder {
    id: JobId,
    username: String,
    request: String,
    is_async: bool,
    num_input_granules: i64,
}

impl JobConfigBuilder {
    crate::setters! {
        set {
            id: JobId,
            is_async: bool,
            num_input_granules: i64,
        }
    }

    pub fn build(self) -> JobConfig {
        JobConfig {
            id: self.id,
            username: self.username,
            request: self.request,
            is_async: self.is_async,
            num_input_granules: self.num_input_granules,
        }
    }
}

/// A submitted transformation request and its aggregate progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub username: String,
    pub status: JobStatus,
    pub message: Option<String>,
    /// Clamped to `[0, 99]` until the job reaches a terminal state, at which
    /// point it jumps to 100. Never regresses.
    pub progress: u8,
    pub num_input_granules: i64,
    pub is_async: bool,
    pub request: String,
    pub error_count: u32,
    pub ignore_errors: bool,
    pub created_at_epoch_ms: u64,
    pub updated_at_epoch_ms: u64,
    #[serde(default)]
    pub links: Vec<JobLink>,
}

impl Job {
    pub fn new(config: JobConfig, epoch_ms: u64) -> Self {
        Self {
            id: config.id,
            username: config.username,
            status: JobStatus::Accepted,
            message: None,
            progress: 0,
            num_input_granules: config.num_input_granules,
            is_async: config.is_async,
            request: config.request,
            error_count: 0,
            ignore_errors: false,
            created_at_epoch_ms: epoch_ms,
            updated_at_epoch_ms: epoch_ms,
            links: Vec::new(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Applies a lifecycle event, mutating `status`/`updated_at_epoch_ms` in
    /// place. Returns the same [`CoreError`] as [`apply_transition`] if the
    /// transition is illegal; the job is left unmodified in that case.
    pub fn apply_event(&mut self, event: JobEvent, epoch_ms: u64) -> Result<(), CoreError> {
        let next = apply_transition(self.status, event)?;
        self.status = next;
        self.updated_at_epoch_ms = epoch_ms;
        if next.is_terminal() {
            self.progress = 100;
        }
        Ok(())
    }

    /// Recompute progress from completed/total leaf items.
    /// Never regresses progress and never reports 100 while non-terminal.
    pub fn set_progress_from_counts(&mut self, completed: i64, total: i64) {
        if total <= 0 {
            return;
        }
        let pct = (100 * completed / total).clamp(0, 99) as u8;
        if pct > self.progress {
            self.progress = pct;
        }
    }

    pub fn append_link(&mut self, link: JobLink) {
        self.links.push(link);
    }
}

crate::builder! {
    pub struct JobBuilder => Job {
        into {
            username: String = "alice",
            request: String = "https://harmony.example/subset?collection=C123",
        }
        set {
            status: JobStatus = JobStatus::Accepted,
            progress: u8 = 0,
            num_input_granules: i64 = 1,
            is_async: bool = true,
            error_count: u32 = 0,
            ignore_errors: bool = false,
            created_at_epoch_ms: u64 = 0,
            updated_at_epoch_ms: u64 = 0,
            links: Vec<JobLink> = Vec::new(),
        }
        option {
            message: String = None,
        }
        computed {
            id: JobId = JobId::new(),
        }
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
