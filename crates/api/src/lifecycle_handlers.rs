// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `POST /jobs/:jobID/{cancel|pause|resume|skip-preview}`.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use cw_core::{Clock, JobId};
use cw_wire::{JobLifecycleEvent, JobView};

use crate::error::ApiError;
use crate::state::ApiState;

pub async fn apply_lifecycle_event<C: Clock>(
    State(state): State<Arc<ApiState<C>>>,
    Path((job_id, event)): Path<(JobId, JobLifecycleEvent)>,
) -> Result<Json<JobView>, ApiError> {
    let now_epoch_ms = state.clock.epoch_ms();
    let job = cw_store::apply_job_event(state.store.pool(), job_id, event.into(), now_epoch_ms).await?;
    Ok(Json(JobView::from(&job)))
}
