// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Running-pod-count lookups for a service, cached with a short TTL so the
//! scheduler doesn't hit the Kubernetes API once per scheduling cycle.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use cw_core::ServiceId;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, ListParams};
use kube::Client;
use tokio::sync::RwLock;

use crate::error::SchedulerError;

struct CacheEntry {
    count: i64,
    fetched_at: Instant,
}

/// Caches `kube`-backed pod counts per service, label-selected by
/// `app=<serviceID>` (the image tag sanitized into a label value).
pub struct PodCountCache {
    client: Client,
    namespace: String,
    ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl PodCountCache {
    pub async fn try_default(namespace: impl Into<String>, ttl: Duration) -> Result<Self, SchedulerError> {
        let client = Client::try_default().await?;
        Ok(Self {
            client,
            namespace: namespace.into(),
            ttl,
            entries: RwLock::new(HashMap::new()),
        })
    }

    pub fn new(client: Client, namespace: impl Into<String>, ttl: Duration) -> Self {
        Self {
            client,
            namespace: namespace.into(),
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Number of running pods backing `service_id`, refreshed if the cached
    /// value is older than the configured TTL.
    pub async fn running_pods(&self, service_id: &ServiceId) -> Result<i64, SchedulerError> {
        let key = service_label(service_id);

        if let Some(entry) = self.entries.read().await.get(&key) {
            if entry.fetched_at.elapsed() < self.ttl {
                return Ok(entry.count);
            }
        }

        let pods: Api<Pod> = Api::namespaced(self.client.clone(), &self.namespace);
        let lp = ListParams::default().labels(&format!("app={key}"));
        let list = pods.list(&lp).await?;
        let count = list
            .items
            .iter()
            .filter(|p| {
                p.status
                    .as_ref()
                    .and_then(|s| s.phase.as_deref())
                    .map(|phase| phase == "Running")
                    .unwrap_or(false)
            })
            .count() as i64;

        self.entries.write().await.insert(
            key,
            CacheEntry {
                count,
                fetched_at: Instant::now(),
            },
        );
        Ok(count)
    }
}

/// Kubernetes label values can't contain `/` or `:`; service IDs are image
/// tags like `ghcr.io/org/subsetter-service:v1.2.3`.
fn service_label(service_id: &ServiceId) -> String {
    service_id.as_str().replace(['/', ':'], "-")
}
