// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One stage of a job's processing chain.

use crate::job::JobId;
use serde::{Deserialize, Serialize};

crate::define_string_id! {
    /// A container image tag identifying the service that executes a step,
    /// e.g. `"ghcr.io/org/subsetter-service:v1.2.3"`.
    pub struct ServiceId;
}

/// The well-known service ID for the granule-discovery ("query-cmr") step.
pub fn is_granule_discovery_service(service_id: &ServiceId) -> bool {
    service_id.as_str().contains("query-cmr") || service_id.as_str().contains("harmony-service")
}

/// One stage of a job's processing chain.
///
/// `(job_id, step_index)` is the natural key; `step_index` starts at 1 and is
/// dense within a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub job_id: JobId,
    pub step_index: i32,
    pub service_id: ServiceId,
    /// Opaque, serialized operation payload handed to workers verbatim.
    /// Treated as an immutable blob by the core.
    pub operation: serde_json::Value,
    /// Expected number of SUCCESSFUL items for this step once all upstream
    /// work completes. May be revised upward for the granule-discovery step
    /// as pagination reveals the true total (see DESIGN.md for why we update
    /// this lazily rather than eagerly reconciling every page).
    pub work_item_count: i64,
    pub has_aggregated_output: bool,
    pub batch_size: Option<i64>,
    pub max_batch_size_bytes: Option<i64>,
    pub is_sequential: bool,
}

impl WorkflowStep {
    pub fn new(
        job_id: JobId,
        step_index: i32,
        service_id: ServiceId,
        operation: serde_json::Value,
        work_item_count: i64,
    ) -> Self {
        Self {
            job_id,
            step_index,
            service_id,
            operation,
            work_item_count,
            has_aggregated_output: false,
            batch_size: None,
            max_batch_size_bytes: None,
            is_sequential: false,
        }
    }

    /// Effective per-item-count batching cap, unbounded by default.
    pub fn effective_batch_size(&self) -> i64 {
        self.batch_size.unwrap_or(i64::MAX)
    }

    /// Effective cumulative-bytes batching cap.
    pub fn effective_max_batch_bytes(&self) -> i64 {
        // 5 GiB default ceiling; generous enough that item-count is normally
        // the binding constraint.
        self.max_batch_size_bytes.unwrap_or(5 * 1024 * 1024 * 1024)
    }
}
