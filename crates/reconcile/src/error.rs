// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Store(#[from] cw_store::StoreError),

    #[error(transparent)]
    Queue(#[from] cw_queue::QueueError),

    #[error(transparent)]
    Processor(#[from] cw_processor::ProcessorError),
}
