// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process cache of `WorkflowStep.operation` templates, keyed by
//! `(jobID, serviceID)`. Avoids a database read on every `GET /work` since
//! the template is immutable once a step is created; staleness is bounded
//! by the TTL alone.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use cw_core::{JobId, ServiceId};
use tokio::sync::RwLock;

struct CacheEntry {
    operation: serde_json::Value,
    fetched_at: Instant,
}

pub struct OperationCache {
    ttl: Duration,
    entries: RwLock<HashMap<(JobId, ServiceId), CacheEntry>>,
}

impl OperationCache {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entries: RwLock::new(HashMap::new()) }
    }

    /// Returns the cached operation template for `(job_id, service_id)`, or
    /// `None` if absent or expired, so the caller can fall back to a store
    /// read and repopulate via [`Self::put`].
    pub async fn get(&self, job_id: JobId, service_id: &ServiceId) -> Option<serde_json::Value> {
        let key = (job_id, service_id.clone());
        let entries = self.entries.read().await;
        let entry = entries.get(&key)?;
        if entry.fetched_at.elapsed() >= self.ttl {
            return None;
        }
        Some(entry.operation.clone())
    }

    pub async fn put(&self, job_id: JobId, service_id: &ServiceId, operation: serde_json::Value) {
        let key = (job_id, service_id.clone());
        self.entries
            .write()
            .await
            .insert(key, CacheEntry { operation, fetched_at: Instant::now() });
    }
}
