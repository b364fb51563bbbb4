// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon binary. Every
//! tunable is read once at startup into [`Config`]; nothing downstream
//! touches `std::env` directly.

use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use cw_api::ApiConfig;
use cw_processor::ProcessorConfig;
use cw_reconcile::{FailerConfig, ReaperConfig};
use cw_scheduler::SchedulerConfig;

fn parse_env<T>(name: &str, default: T) -> T
where
    T: FromStr,
    T::Err: Display,
{
    match std::env::var(name) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(name, value = raw.as_str(), error = %err, "unparseable env var, using default");
                default
            }
        },
        Err(_) => default,
    }
}

fn env_string(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Which `cw_scheduler::QueueFactory` backs per-service work-item queues.
/// `USE_SERVICE_QUEUES=false` runs every service off one shared queue,
/// the single-queue deployment shape `StaticQueueFactory` exists for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueBackend {
    PerServiceSqs,
    SharedQueue,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub http_bind_addr: String,
    pub scheduler_queue_url: String,
    pub update_queue_url: String,
    /// SQS queue URL template for `QueueBackend::PerServiceSqs`, with a
    /// `{service}` placeholder replaced by the sanitized service label.
    pub service_queue_url_template: String,
    pub kube_namespace: String,
    pub queue_backend: QueueBackend,
    pub pod_count_cache_ttl: Duration,
    pub scheduler: SchedulerConfig,
    pub failer: FailerConfig,
    pub reaper: ReaperConfig,
    pub processor: ProcessorConfig,
    pub api: ApiConfig,
    /// `WORK_ITEM_SCHEDULER_BATCH_SIZE`: recognized for forward
    /// compatibility with a future chunked selector; the current fair
    /// selector (`cw_scheduler::select_fair_items`) splits a cycle's total
    /// requested count evenly across candidate jobs and needs no separate
    /// chunk size.
    pub work_item_scheduler_batch_size: i64,
    /// `LARGE_WORK_ITEM_UPDATE_QUEUE_MAX_BATCH_SIZE`: recognized; aggregation
    /// batch sizing is authored per-`WorkflowStep` (`batchSize`), not tuned
    /// globally via the environment.
    pub large_work_item_update_queue_max_batch_size: i64,
}

impl Config {
    pub fn from_env() -> Self {
        let scheduler = SchedulerConfig {
            max_batch_size: parse_env("WORK_ITEM_SCHEDULER_QUEUE_MAX_BATCH_SIZE", 10),
            max_get_message_requests: parse_env("WORK_ITEM_SCHEDULER_QUEUE_MAX_GET_MESSAGE_REQUESTS", 3),
            scale_factor: parse_env("SERVICE_QUEUE_BATCH_SIZE_COEFFICIENT", 1.1),
            fast_scale_factor: parse_env("FAST_SERVICE_QUEUE_BATCH_SIZE_COEFFICIENT", 1.1),
            max_work_items_on_update_queue: parse_env("MAX_WORK_ITEMS_ON_UPDATE_QUEUE", -1),
            scheduler_replicas: parse_env("SCHEDULER_REPLICAS", 1),
            long_poll_wait_seconds: parse_env("WORK_ITEM_SCHEDULER_QUEUE_WAIT_SECONDS", 20),
        };

        let failer = FailerConfig {
            period_sec: parse_env("WORK_FAILER_PERIOD_SEC", 60),
            failable_work_age_minutes: parse_env("FAILABLE_WORK_AGE_MINUTES", 60),
            recent_duration_sample_size: parse_env("FAILER_DURATION_SAMPLE_SIZE", 20),
        };

        let reaper = ReaperConfig {
            period_sec: parse_env("WORK_REAPER_PERIOD_SEC", 300),
            reapable_work_age_minutes: parse_env("REAPABLE_WORK_AGE_MINUTES", 10_080),
            batch_size: parse_env("WORK_REAPER_BATCH_SIZE", 500),
        };

        let processor = ProcessorConfig {
            max_errors_for_job: parse_env("MAX_ERRORS_FOR_JOB", 5),
        };

        let api = ApiConfig {
            long_poll_wait_seconds: parse_env("WORK_ITEM_SCHEDULER_QUEUE_WAIT_SECONDS", 20),
        };

        let queue_backend = if parse_env("USE_SERVICE_QUEUES", true) {
            QueueBackend::PerServiceSqs
        } else {
            QueueBackend::SharedQueue
        };

        Self {
            database_url: env_string("DATABASE_URL", ""),
            http_bind_addr: env_string("HTTP_BIND_ADDR", "0.0.0.0:8080"),
            scheduler_queue_url: env_string("SCHEDULER_QUEUE_URL", ""),
            update_queue_url: env_string("UPDATE_QUEUE_URL", ""),
            service_queue_url_template: env_string("SERVICE_QUEUE_URL_TEMPLATE", ""),
            kube_namespace: env_string("KUBE_NAMESPACE", "default"),
            queue_backend,
            pod_count_cache_ttl: Duration::from_secs(parse_env("POD_COUNT_CACHE_TTL", 30)),
            scheduler,
            failer,
            reaper,
            processor,
            api,
            work_item_scheduler_batch_size: parse_env("WORK_ITEM_SCHEDULER_BATCH_SIZE", 10),
            large_work_item_update_queue_max_batch_size: parse_env(
                "LARGE_WORK_ITEM_UPDATE_QUEUE_MAX_BATCH_SIZE",
                25,
            ),
        }
    }
}
