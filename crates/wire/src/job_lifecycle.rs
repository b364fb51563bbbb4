// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job lifecycle DTOs — `POST /jobs/:jobID/{cancel|pause|resume|skip-preview}`.

use cw_core::{Job, JobLink, JobStatus};
use serde::{Deserialize, Serialize};

/// Lifecycle action requested against a job. The job id itself comes from
/// the URL path, not the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobLifecycleEvent {
    Cancel,
    Pause,
    Resume,
    SkipPreview,
}

impl From<JobLifecycleEvent> for cw_core::JobEvent {
    fn from(event: JobLifecycleEvent) -> Self {
        match event {
            JobLifecycleEvent::Cancel => cw_core::JobEvent::Cancel,
            JobLifecycleEvent::Pause => cw_core::JobEvent::Pause,
            JobLifecycleEvent::Resume => cw_core::JobEvent::Resume,
            JobLifecycleEvent::SkipPreview => cw_core::JobEvent::SkipPreview,
        }
    }
}

/// Serialized job returned on successful lifecycle transitions and from the
/// job-status endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobView {
    pub id: String,
    pub username: String,
    pub status: JobStatus,
    pub message: Option<String>,
    pub progress: u8,
    pub num_input_granules: i64,
    pub error_count: u32,
    pub created_at_epoch_ms: u64,
    pub updated_at_epoch_ms: u64,
    pub links: Vec<JobLinkView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobLinkView {
    pub href: String,
    pub rel: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl From<&JobLink> for JobLinkView {
    fn from(link: &JobLink) -> Self {
        Self {
            href: link.href.clone(),
            rel: link.rel.clone(),
            r#type: link.r#type.clone(),
            title: link.title.clone(),
        }
    }
}

impl From<&Job> for JobView {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id.to_string(),
            username: job.username.clone(),
            status: job.status,
            message: job.message.clone(),
            progress: job.progress,
            num_input_granules: job.num_input_granules,
            error_count: job.error_count,
            created_at_epoch_ms: job.created_at_epoch_ms,
            updated_at_epoch_ms: job.updated_at_epoch_ms,
            links: job.links.iter().map(JobLinkView::from).collect(),
        }
    }
}
