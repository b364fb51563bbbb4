// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resolves a [`cw_scheduler::QueueFactory`] to a distinct SQS queue per
//! service, memoized so a repeated lookup doesn't rebuild the client.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use cw_core::ServiceId;
use cw_queue::{Queue, SqsQueue};
use cw_scheduler::QueueFactory;
use tokio::sync::RwLock;

/// Kubernetes label values can't contain `/` or `:`; service IDs are image
/// tags like `ghcr.io/org/subsetter-service:v1.2.3`.
fn sanitize_service_label(service_id: &ServiceId) -> String {
    service_id.as_str().replace(['/', ':'], "-")
}

/// Derives each service's queue URL from `url_template`'s `{service}`
/// placeholder, building and caching one [`SqsQueue`] client per service.
pub struct TemplatedSqsQueueFactory {
    url_template: String,
    queues: RwLock<HashMap<ServiceId, Arc<dyn Queue>>>,
}

impl TemplatedSqsQueueFactory {
    pub fn new(url_template: impl Into<String>) -> Self {
        Self {
            url_template: url_template.into(),
            queues: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl QueueFactory for TemplatedSqsQueueFactory {
    async fn queue_for(&self, service_id: &ServiceId) -> Arc<dyn Queue> {
        if let Some(queue) = self.queues.read().await.get(service_id) {
            return queue.clone();
        }

        let queue_url = self.url_template.replace("{service}", &sanitize_service_label(service_id));
        let queue: Arc<dyn Queue> = Arc::new(SqsQueue::from_env(queue_url).await);

        self.queues.write().await.insert(service_id.clone(), queue.clone());
        queue
    }
}
