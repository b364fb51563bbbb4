// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The scheduler loop: drain the scheduler queue, compute a batch size per
//! service, pull ready items fairly, and push them to each service's queue.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use cw_core::{is_granule_discovery_service, Clock, ServiceId};
use cw_queue::Queue;
use cw_store::Store;
use tokio_util::sync::CancellationToken;

use crate::batch_size::calculate_num_items_to_queue;
use crate::error::SchedulerError;
use crate::pods::PodCountCache;
use crate::select::select_fair_items;

/// Resolves the backing [`Queue`] for a given service's work-item queue.
/// Usually one SQS queue per `serviceID`, memoized by the implementation.
#[async_trait]
pub trait QueueFactory: Send + Sync {
    async fn queue_for(&self, service_id: &ServiceId) -> Arc<dyn Queue>;
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// `WORK_ITEM_SCHEDULER_QUEUE_MAX_BATCH_SIZE`
    pub max_batch_size: u32,
    /// `WORK_ITEM_SCHEDULER_QUEUE_MAX_GET_MESSAGE_REQUESTS`
    pub max_get_message_requests: u32,
    /// `SERVICE_QUEUE_BATCH_SIZE_COEFFICIENT`
    pub scale_factor: f64,
    /// `FAST_SERVICE_QUEUE_BATCH_SIZE_COEFFICIENT`
    pub fast_scale_factor: f64,
    /// `MAX_WORK_ITEMS_ON_UPDATE_QUEUE`, -1 disables.
    pub max_work_items_on_update_queue: i64,
    pub scheduler_replicas: i64,
    pub long_poll_wait_seconds: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 10,
            max_get_message_requests: 3,
            scale_factor: 1.1,
            fast_scale_factor: 1.1,
            max_work_items_on_update_queue: -1,
            scheduler_replicas: 1,
            long_poll_wait_seconds: 20,
        }
    }
}

pub struct Scheduler<C: Clock> {
    store: Store,
    scheduler_queue: Arc<dyn Queue>,
    service_queues: Arc<dyn QueueFactory>,
    update_queue: Arc<dyn Queue>,
    pods: PodCountCache,
    config: SchedulerConfig,
    clock: C,
}

impl<C: Clock> Scheduler<C> {
    pub fn new(
        store: Store,
        scheduler_queue: Arc<dyn Queue>,
        service_queues: Arc<dyn QueueFactory>,
        update_queue: Arc<dyn Queue>,
        pods: PodCountCache,
        config: SchedulerConfig,
        clock: C,
    ) -> Self {
        Self {
            store,
            scheduler_queue,
            service_queues,
            update_queue,
            pods,
            config,
            clock,
        }
    }

    /// Runs scheduling cycles until `shutdown` is cancelled.
    pub async fn run(&self, shutdown: CancellationToken) {
        while !shutdown.is_cancelled() {
            let span = tracing::info_span!("scheduling_cycle");
            let _guard = span.enter();
            if let Err(err) = self.run_cycle().await {
                tracing::error!(error = %err, "scheduling cycle failed");
            }
        }
    }

    /// One pass: drain the scheduler queue, dispatch per service, return.
    pub async fn run_cycle(&self) -> Result<(), SchedulerError> {
        if self.back_pressured().await? {
            tracing::info!("update queue over threshold, skipping cycle");
            return Ok(());
        }

        let messages = self.drain_scheduler_queue().await?;
        if messages.is_empty() {
            return Ok(());
        }

        let mut by_service: HashMap<String, (i64, Vec<String>)> = HashMap::new();
        for msg in &messages {
            let entry = by_service.entry(msg.body.clone()).or_insert((0, Vec::new()));
            entry.0 += 1;
            entry.1.push(msg.receipt.clone());
        }

        for (service_id_str, (received, receipts)) in by_service {
            let service_id = ServiceId::new(service_id_str);
            let dispatched = self.dispatch_for_service(&service_id, received).await?;
            tracing::info!(
                service_id = service_id.as_str(),
                received,
                dispatched,
                "scheduling cycle dispatched items"
            );
            self.scheduler_queue.delete_messages(&receipts).await?;
        }

        Ok(())
    }

    async fn back_pressured(&self) -> Result<bool, SchedulerError> {
        if self.config.max_work_items_on_update_queue < 0 {
            return Ok(false);
        }
        let depth = self.update_queue.approximate_number_of_messages().await?;
        Ok(depth as i64 > self.config.max_work_items_on_update_queue)
    }

    async fn drain_scheduler_queue(&self) -> Result<Vec<cw_queue::Message>, SchedulerError> {
        let mut all = Vec::new();
        let mut batch = self
            .scheduler_queue
            .get_messages(self.config.max_batch_size, self.config.long_poll_wait_seconds)
            .await?;
        all.append(&mut batch);

        let mut rounds = 0;
        while all.len() < self.config.max_batch_size as usize
            && rounds < self.config.max_get_message_requests
        {
            let mut more = self.scheduler_queue.get_messages(self.config.max_batch_size, 0).await?;
            if more.is_empty() {
                break;
            }
            all.append(&mut more);
            rounds += 1;
        }
        Ok(all)
    }

    async fn dispatch_for_service(
        &self,
        service_id: &ServiceId,
        received: i64,
    ) -> Result<i64, SchedulerError> {
        let service_queue = self.service_queues.queue_for(service_id).await;
        let queued = service_queue.approximate_number_of_messages().await? as i64;
        let pods = self.pods.running_pods(service_id).await?;
        let scale_factor = if is_granule_discovery_service(service_id) {
            self.config.fast_scale_factor
        } else {
            self.config.scale_factor
        };

        let num_to_queue = calculate_num_items_to_queue(
            pods,
            self.config.scheduler_replicas,
            queued,
            scale_factor,
            received,
        );

        let claimed = select_fair_items(
            self.store.pool(),
            service_id,
            num_to_queue,
            self.clock.epoch_ms(),
        )
        .await?;

        for item_id in &claimed {
            service_queue.send_message(item_id.to_string(), None).await?;
        }

        Ok(claimed.len() as i64)
    }
}

/// Convenience for tests and single-queue deployments: every service shares
/// one backing queue instance.
pub struct StaticQueueFactory {
    queue: Arc<dyn Queue>,
}

impl StaticQueueFactory {
    pub fn new(queue: Arc<dyn Queue>) -> Self {
        Self { queue }
    }
}

#[async_trait]
impl QueueFactory for StaticQueueFactory {
    async fn queue_for(&self, _service_id: &ServiceId) -> Arc<dyn Queue> {
        self.queue.clone()
    }
}
