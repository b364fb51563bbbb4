// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One atomic unit of work executed by one worker invocation.

use crate::id::WorkItemId;
use crate::job::JobId;
use crate::workflow_step::ServiceId;
use serde::{Deserialize, Serialize};

/// Status of a [`WorkItem`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkItemStatus {
    Ready,
    Queued,
    Running,
    Successful,
    Failed,
    Canceled,
    Warning,
}

crate::simple_display! {
    WorkItemStatus {
        Ready => "ready",
        Queued => "queued",
        Running => "running",
        Successful => "successful",
        Failed => "failed",
        Canceled => "canceled",
        Warning => "warning",
    }
}

impl WorkItemStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            WorkItemStatus::Successful
                | WorkItemStatus::Failed
                | WorkItemStatus::Canceled
                | WorkItemStatus::Warning
        )
    }
}

/// One atomic unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: WorkItemId,
    pub job_id: JobId,
    pub service_id: ServiceId,
    pub workflow_step_index: i32,
    pub status: WorkItemStatus,
    pub stac_catalog_location: Option<String>,
    /// Pagination continuation token; only meaningful for the
    /// granule-discovery step.
    pub scroll_id: Option<String>,
    pub error_message: Option<String>,
    /// Byte sizes of this item's output results, in the order produced.
    /// Used by aggregation batching to enforce `maxBatchSizeBytes`.
    pub output_item_sizes: Vec<i64>,
    pub started_at_epoch_ms: Option<u64>,
    pub updated_at_epoch_ms: u64,
}

/// A new work item not yet assigned a database id. Spawned by the update
/// processor in the READY state, before the insert that assigns its id.
#[derive(Debug, Clone)]
pub struct NewWorkItem {
    pub job_id: JobId,
    pub service_id: ServiceId,
    pub workflow_step_index: i32,
    pub stac_catalog_location: Option<String>,
    pub scroll_id: Option<String>,
}

impl NewWorkItem {
    pub fn new(job_id: JobId, service_id: ServiceId, workflow_step_index: i32) -> Self {
        Self {
            job_id,
            service_id,
            workflow_step_index,
            stac_catalog_location: None,
            scroll_id: None,
        }
    }

    pub fn with_input(mut self, stac_catalog_location: impl Into<String>) -> Self {
        self.stac_catalog_location = Some(stac_catalog_location.into());
        self
    }

    pub fn with_scroll_id(mut self, scroll_id: impl Into<String>) -> Self {
        self.scroll_id = Some(scroll_id.into());
        self
    }
}

/// Outcome reported by a worker for a single work item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItemUpdate {
    pub work_item_id: WorkItemId,
    pub status: WorkItemStatus,
    #[serde(default)]
    pub results: Vec<String>,
    pub error_message: Option<String>,
    pub total_items_size: Option<i64>,
    pub scroll_id: Option<String>,
    #[serde(default)]
    pub output_item_sizes: Vec<i64>,
}
