// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `sqlx::FromRow` row shapes and their conversions to/from `cw-core` domain
//! types. Kept separate from the domain types themselves so `cw-core` stays
//! free of a `sqlx` dependency.

use cw_core::{
    Bbox, Job, JobId, JobLink, JobStatus, ServiceId, Temporal, WorkItem, WorkItemId,
    WorkItemStatus, WorkflowStep,
};
use uuid::Uuid;

use crate::codec;
use crate::error::StoreError;

#[derive(sqlx::FromRow)]
pub(crate) struct JobRow {
    pub id: Uuid,
    pub username: String,
    pub status: String,
    pub message: Option<String>,
    pub progress: i16,
    pub num_input_granules: i64,
    pub is_async: bool,
    pub request: String,
    pub error_count: i32,
    pub ignore_errors: bool,
    pub created_at_epoch_ms: i64,
    pub updated_at_epoch_ms: i64,
}

impl JobRow {
    pub(crate) fn into_job(self, links: Vec<JobLink>) -> Result<Job, StoreError> {
        Ok(Job {
            id: JobId::from_uuid(self.id),
            username: self.username,
            status: codec::decode::<JobStatus>(&self.status)?,
            message: self.message,
            progress: self.progress as u8,
            num_input_granules: self.num_input_granules,
            is_async: self.is_async,
            request: self.request,
            error_count: self.error_count as u32,
            ignore_errors: self.ignore_errors,
            created_at_epoch_ms: self.created_at_epoch_ms as u64,
            updated_at_epoch_ms: self.updated_at_epoch_ms as u64,
            links,
        })
    }
}

pub(crate) fn job_status_text(status: JobStatus) -> String {
    codec::encode(&status)
}

#[derive(sqlx::FromRow)]
pub(crate) struct WorkflowStepRow {
    pub job_id: Uuid,
    pub step_index: i32,
    pub service_id: String,
    pub operation: serde_json::Value,
    pub work_item_count: i64,
    pub has_aggregated_output: bool,
    pub batch_size: Option<i64>,
    pub max_batch_size_bytes: Option<i64>,
    pub is_sequential: bool,
}

impl From<WorkflowStepRow> for WorkflowStep {
    fn from(row: WorkflowStepRow) -> Self {
        WorkflowStep {
            job_id: JobId::from_uuid(row.job_id),
            step_index: row.step_index,
            service_id: ServiceId::new(row.service_id),
            operation: row.operation,
            work_item_count: row.work_item_count,
            has_aggregated_output: row.has_aggregated_output,
            batch_size: row.batch_size,
            max_batch_size_bytes: row.max_batch_size_bytes,
            is_sequential: row.is_sequential,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct WorkItemRow {
    pub id: i64,
    pub job_id: Uuid,
    pub service_id: String,
    pub workflow_step_index: i32,
    pub status: String,
    pub stac_catalog_location: Option<String>,
    pub scroll_id: Option<String>,
    pub error_message: Option<String>,
    pub output_item_sizes: serde_json::Value,
    pub started_at_epoch_ms: Option<i64>,
    pub updated_at_epoch_ms: i64,
}

impl WorkItemRow {
    pub(crate) fn into_work_item(self) -> Result<WorkItem, StoreError> {
        let output_item_sizes: Vec<i64> = serde_json::from_value(self.output_item_sizes)?;
        Ok(WorkItem {
            id: WorkItemId::from(self.id),
            job_id: JobId::from_uuid(self.job_id),
            service_id: ServiceId::new(self.service_id),
            workflow_step_index: self.workflow_step_index,
            status: codec::decode::<WorkItemStatus>(&self.status)?,
            stac_catalog_location: self.stac_catalog_location,
            scroll_id: self.scroll_id,
            error_message: self.error_message,
            output_item_sizes,
            started_at_epoch_ms: self.started_at_epoch_ms.map(|v| v as u64),
            updated_at_epoch_ms: self.updated_at_epoch_ms as u64,
        })
    }
}

pub(crate) fn work_item_status_text(status: WorkItemStatus) -> String {
    codec::encode(&status)
}

#[derive(sqlx::FromRow)]
pub(crate) struct JobLinkRow {
    pub job_id: Uuid,
    pub href: String,
    pub rel: String,
    pub r#type: Option<String>,
    pub title: Option<String>,
    pub bbox: Option<serde_json::Value>,
    pub temporal: Option<serde_json::Value>,
}

impl JobLinkRow {
    pub(crate) fn into_job_link(self) -> Result<JobLink, StoreError> {
        let bbox: Option<Bbox> = match self.bbox {
            Some(v) => Some(serde_json::from_value(v)?),
            None => None,
        };
        let temporal: Option<Temporal> = match self.temporal {
            Some(v) => Some(serde_json::from_value(v)?),
            None => None,
        };
        Ok(JobLink {
            job_id: JobId::from_uuid(self.job_id),
            href: self.href,
            rel: self.rel,
            r#type: self.r#type,
            title: self.title,
            bbox,
            temporal,
        })
    }
}
