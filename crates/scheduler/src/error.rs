// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Store(#[from] cw_store::StoreError),

    #[error(transparent)]
    Queue(#[from] cw_queue::QueueError),

    #[error("pod count lookup failed: {0}")]
    PodLookup(#[from] kube::Error),

    #[error("malformed schedule-request message: {0}")]
    MalformedMessage(String),
}
