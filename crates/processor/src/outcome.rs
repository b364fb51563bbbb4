// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use cw_core::{ServiceId, WorkItemId};

/// What happened to one [`cw_core::WorkItemUpdate`] after running the
/// pipeline. Returned instead of `()` so callers (and tests) can assert on
/// idempotent/dropped paths without inspecting logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The update was committed. `spawned` lists the service IDs that
    /// received at least one new READY item, for the caller to notify the
    /// scheduler queue about.
    Applied { spawned: Vec<ServiceId> },
    /// No matching work item exists; the update was ignored.
    NotFound { work_item_id: WorkItemId },
    /// The item was already terminal and the incoming status was
    /// non-terminal, or it matched the stored terminal status exactly.
    Idempotent { work_item_id: WorkItemId },
}
