// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker protocol DTOs — `GET /work`, `PUT /work/:id`.

use cw_core::{WorkItemId, WorkItemStatus};
use serde::{Deserialize, Serialize};

/// Body of `GET /work?serviceID=<image:tag>` on success.
///
/// `max_cmr_granules` is only populated for the granule-discovery service;
/// it tells the worker how many granules to request per page so its scroll
/// cadence matches the next step's `workItemCount` estimate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetWorkResponse {
    pub work_item: WorkItemView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_cmr_granules: Option<i64>,
}

/// Work item as handed to a worker. Carries the resolved operation template
/// inline so the worker doesn't need a second round trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItemView {
    pub id: WorkItemId,
    pub job_id: String,
    pub service_id: String,
    pub workflow_step_index: i32,
    pub stac_catalog_location: Option<String>,
    pub scroll_id: Option<String>,
    pub operation: serde_json::Value,
}

/// Body of `PUT /work/:id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutWorkItemBody {
    pub status: WorkItemStatus,
    #[serde(default)]
    pub results: Vec<String>,
    pub error_message: Option<String>,
    #[serde(default)]
    pub output_item_sizes: Vec<i64>,
    pub scroll_id: Option<String>,
    pub total_items_size: Option<i64>,
}

impl PutWorkItemBody {
    pub fn into_update(self, work_item_id: WorkItemId) -> cw_core::WorkItemUpdate {
        cw_core::WorkItemUpdate {
            work_item_id,
            status: self.status,
            results: self.results,
            error_message: self.error_message,
            total_items_size: self.total_items_size,
            scroll_id: self.scroll_id,
            output_item_sizes: self.output_item_sizes,
        }
    }
}
