// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use cw_core::WorkItemId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error(transparent)]
    Store(#[from] cw_store::StoreError),

    #[error(transparent)]
    Queue(#[from] cw_queue::QueueError),

    #[error(transparent)]
    Core(#[from] cw_core::CoreError),

    #[error(transparent)]
    Codec(#[from] serde_json::Error),

    /// A retried update for `work_item_id` carried a terminal status that
    /// disagrees with the one already committed.
    #[error("work item {work_item_id} already terminal with a different outcome than reported")]
    ConflictingTerminalUpdate { work_item_id: WorkItemId },
}
