// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cw-api: the HTTP surface over the work orchestration core — the worker
//! polling protocol (`GET /work`, `PUT /work/:id`) and the job lifecycle
//! API (`POST /jobs/:jobID/{cancel|pause|resume|skip-preview}`).

mod error;
mod lifecycle_handlers;
mod operation_cache;
mod state;
mod work_handlers;

use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;
use cw_core::Clock;
use tower_http::trace::TraceLayer;

pub use error::ApiError;
pub use operation_cache::OperationCache;
pub use state::{ApiConfig, ApiState};

#[cfg(any(test, feature = "test-support"))]
pub use lifecycle_handlers::apply_lifecycle_event;
#[cfg(any(test, feature = "test-support"))]
pub use work_handlers::{get_work, put_work_item, GetWorkQuery};

/// Builds the full router over a shared, already-constructed [`ApiState`].
pub fn router<C: Clock + 'static>(state: Arc<ApiState<C>>) -> Router {
    Router::new()
        .route("/work", get(work_handlers::get_work::<C>))
        .route("/work/:id", put(work_handlers::put_work_item::<C>))
        .route("/jobs/:job_id/:event", post(lifecycle_handlers::apply_lifecycle_event::<C>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
