// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Denormalized per-(job, service, user) scheduling counters.
//!
//! These rows are a cache over `WorkItem.status`, not a second source of
//! truth: they must equal the live count at every committed transaction
//! boundary. They exist purely so fair selection can run without scanning
//! `work_items`.

use crate::job::JobId;
use crate::workflow_step::ServiceId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserWork {
    pub job_id: JobId,
    pub service_id: ServiceId,
    pub username: String,
    pub ready_count: i64,
    pub running_count: i64,
    pub last_worked_epoch_ms: u64,
}

impl UserWork {
    pub fn new(job_id: JobId, service_id: ServiceId, username: impl Into<String>) -> Self {
        Self {
            job_id,
            service_id,
            username: username.into(),
            ready_count: 0,
            running_count: 0,
            last_worked_epoch_ms: 0,
        }
    }

    /// `ready_count > 0` is the signal the fair selector checks before
    /// trusting a row over a direct count.
    pub fn claims_ready_work(&self) -> bool {
        self.ready_count > 0
    }
}
