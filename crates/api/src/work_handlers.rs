// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `GET /work` and `PUT /work/:id` — the worker-facing protocol.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use cw_core::{is_granule_discovery_service, Clock, ServiceId, WorkItemId};
use cw_queue::Queue;
use cw_wire::{GetWorkResponse, PutWorkItemBody, WorkItemView};
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::ApiState;

#[derive(Debug, Deserialize)]
pub struct GetWorkQuery {
    #[serde(rename = "serviceID")]
    pub service_id: String,
}

/// `GET /work?serviceID=<id>`. Tries the service queue first; on a miss,
/// posts a schedule-request and long-polls once more before giving up.
pub async fn get_work<C: Clock>(
    State(state): State<Arc<ApiState<C>>>,
    Query(params): Query<GetWorkQuery>,
) -> Result<Json<GetWorkResponse>, ApiError> {
    let service_id = ServiceId::new(params.service_id);
    let queue = state.service_queues.queue_for(&service_id).await;

    let mut messages = queue.get_messages(1, 0).await?;
    if messages.is_empty() {
        state.scheduler_queue.send_message(service_id.as_str().to_string(), None).await?;
        messages = queue.get_messages(1, state.config.long_poll_wait_seconds).await?;
    }

    let Some(message) = messages.into_iter().next() else {
        return Err(ApiError::NoWorkAvailable(service_id.as_str().to_string()));
    };

    let item_id = WorkItemId(message.body.parse().map_err(|_| {
        ApiError::NoWorkAvailable(service_id.as_str().to_string())
    })?);

    let now_epoch_ms = state.clock.epoch_ms();
    let mut tx = state.store.begin().await?;
    let item = cw_store::lock_work_item(&mut tx, item_id).await?;

    let Some(item) = item.filter(|item| item.status != cw_core::WorkItemStatus::Canceled) else {
        tx.commit().await.map_err(cw_store::StoreError::from)?;
        queue.delete_message(&message.receipt).await?;
        return Err(ApiError::NoWorkAvailable(service_id.as_str().to_string()));
    };

    cw_store::mark_started(&mut tx, item_id, now_epoch_ms).await?;
    tx.commit().await.map_err(cw_store::StoreError::from)?;
    queue.delete_message(&message.receipt).await?;

    let operation = match state.operation_cache.get(item.job_id, &service_id).await {
        Some(op) => op,
        None => {
            let step =
                cw_store::get_workflow_step(state.store.pool(), item.job_id, item.workflow_step_index).await?;
            state.operation_cache.put(item.job_id, &service_id, step.operation.clone()).await;
            step.operation
        }
    };

    let max_cmr_granules = if is_granule_discovery_service(&service_id) {
        cw_store::get_workflow_step(state.store.pool(), item.job_id, item.workflow_step_index + 1)
            .await
            .ok()
            .map(|next_step| next_step.work_item_count)
    } else {
        None
    };

    Ok(Json(GetWorkResponse {
        work_item: WorkItemView {
            id: item.id,
            job_id: item.job_id.to_string(),
            service_id: item.service_id.as_str().to_string(),
            workflow_step_index: item.workflow_step_index,
            stac_catalog_location: item.stac_catalog_location,
            scroll_id: item.scroll_id,
            operation,
        },
        max_cmr_granules,
    }))
}

/// `PUT /work/:id`. Forwards the reported outcome to the update processor,
/// which commits the owning job's next state and notifies the scheduler
/// queue itself of any service that received new READY work.
pub async fn put_work_item<C: Clock>(
    State(state): State<Arc<ApiState<C>>>,
    Path(id): Path<i64>,
    Json(body): Json<PutWorkItemBody>,
) -> Result<StatusCode, ApiError> {
    let update = body.into_update(WorkItemId(id));
    let now_epoch_ms = state.clock.epoch_ms();

    cw_processor::apply_update(
        &state.store,
        state.scheduler_queue.as_ref(),
        state.processor_config,
        &update,
        now_epoch_ms,
    )
    .await?;

    Ok(StatusCode::NO_CONTENT)
}
