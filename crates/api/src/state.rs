// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use cw_core::Clock;
use cw_processor::ProcessorConfig;
use cw_queue::Queue;
use cw_scheduler::QueueFactory;
use cw_store::Store;

use crate::operation_cache::OperationCache;

#[derive(Debug, Clone, Copy)]
pub struct ApiConfig {
    /// Seconds the `GET /work` fallback long-poll waits on the service
    /// queue after a schedule-request is posted.
    pub long_poll_wait_seconds: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self { long_poll_wait_seconds: 20 }
    }
}

/// Shared state behind every handler. Generic over [`Clock`] so tests can
/// swap in a [`cw_core::FakeClock`] the same way `cw-scheduler` and
/// `cw-reconcile` do.
pub struct ApiState<C: Clock> {
    pub store: Store,
    pub service_queues: Arc<dyn QueueFactory>,
    pub scheduler_queue: Arc<dyn Queue>,
    pub operation_cache: OperationCache,
    pub processor_config: ProcessorConfig,
    pub config: ApiConfig,
    pub clock: C,
}

impl<C: Clock> ApiState<C> {
    pub fn new(
        store: Store,
        service_queues: Arc<dyn QueueFactory>,
        scheduler_queue: Arc<dyn Queue>,
        operation_cache: OperationCache,
        processor_config: ProcessorConfig,
        config: ApiConfig,
        clock: C,
    ) -> Self {
        Self {
            store,
            service_queues,
            scheduler_queue,
            operation_cache,
            processor_config,
            config,
            clock,
        }
    }
}
