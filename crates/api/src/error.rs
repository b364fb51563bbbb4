// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Maps the lower crates' error enums onto HTTP status codes at the
//! boundary. Everywhere else in the workspace errors propagate with `?`;
//! this is the one place they terminate into a response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Store(#[from] cw_store::StoreError),

    #[error(transparent)]
    Queue(#[from] cw_queue::QueueError),

    #[error(transparent)]
    Processor(#[from] cw_processor::ProcessorError),

    #[error(transparent)]
    Core(#[from] cw_core::CoreError),

    #[error("no work available for service {0}")]
    NoWorkAvailable(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Store(cw_store::StoreError::JobNotFound(_))
            | ApiError::Store(cw_store::StoreError::WorkItemNotFound(_))
            | ApiError::Store(cw_store::StoreError::WorkflowStepNotFound { .. })
            | ApiError::NoWorkAvailable(_) => (StatusCode::NOT_FOUND, self.to_string()),

            ApiError::Core(cw_core::CoreError::InvalidTransition { .. })
            | ApiError::Store(cw_store::StoreError::Core(cw_core::CoreError::InvalidTransition { .. })) => {
                (StatusCode::CONFLICT, self.to_string())
            }

            ApiError::Processor(cw_processor::ProcessorError::ConflictingTerminalUpdate { .. }) => {
                (StatusCode::CONFLICT, self.to_string())
            }

            _ => {
                tracing::error!(error = %self, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
