// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Binary entry point: wires the store, the queues, and the four
//! cooperative loops (scheduler, failer, reaper, HTTP API) together and
//! runs them until SIGTERM/SIGINT.

mod queues;

use std::sync::Arc;
use std::time::Duration;

use cw_api::{ApiState, OperationCache};
use cw_core::SystemClock;
use cw_daemon::{Config, QueueBackend};
use cw_queue::InMemoryQueue;
use cw_reconcile::{WorkFailer, WorkReaper};
use cw_scheduler::{PodCountCache, QueueFactory, Scheduler, StaticQueueFactory};
use cw_store::Store;
use queues::TemplatedSqsQueueFactory;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let clock = SystemClock;

    let store = Store::connect(&config.database_url).await?;

    let scheduler_queue: Arc<dyn cw_queue::Queue> = if config.scheduler_queue_url.is_empty() {
        Arc::new(InMemoryQueue::new())
    } else {
        Arc::new(cw_queue::SqsQueue::from_env(config.scheduler_queue_url.clone()).await)
    };
    let update_queue: Arc<dyn cw_queue::Queue> = if config.update_queue_url.is_empty() {
        Arc::new(InMemoryQueue::new())
    } else {
        Arc::new(cw_queue::SqsQueue::from_env(config.update_queue_url.clone()).await)
    };

    let service_queues: Arc<dyn QueueFactory> = match config.queue_backend {
        QueueBackend::PerServiceSqs if !config.service_queue_url_template.is_empty() => {
            Arc::new(TemplatedSqsQueueFactory::new(config.service_queue_url_template.clone()))
        }
        _ => Arc::new(StaticQueueFactory::new(Arc::new(InMemoryQueue::new()))),
    };

    let pods = PodCountCache::try_default(config.kube_namespace.clone(), config.pod_count_cache_ttl).await?;

    let shutdown = CancellationToken::new();

    let scheduler = Scheduler::new(
        store.clone(),
        scheduler_queue.clone(),
        service_queues.clone(),
        update_queue.clone(),
        pods,
        config.scheduler.clone(),
        clock.clone(),
    );

    let failer = WorkFailer::new(
        store.clone(),
        scheduler_queue.clone(),
        config.processor,
        config.failer.clone(),
        clock.clone(),
    );

    let reaper = WorkReaper::new(store.clone(), config.reaper.clone(), clock.clone());

    let api_state = Arc::new(ApiState::new(
        store.clone(),
        service_queues.clone(),
        scheduler_queue.clone(),
        OperationCache::new(Duration::from_secs(60)),
        config.processor,
        config.api,
        clock.clone(),
    ));
    let router = cw_api::router(api_state);
    let listener = tokio::net::TcpListener::bind(&config.http_bind_addr).await?;
    tracing::info!(addr = %config.http_bind_addr, "http listener bound");

    let scheduler_task = tokio::spawn({
        let shutdown = shutdown.clone();
        async move { scheduler.run(shutdown).await }
    });
    let failer_task = tokio::spawn({
        let shutdown = shutdown.clone();
        async move { failer.run(shutdown).await }
    });
    let reaper_task = tokio::spawn({
        let shutdown = shutdown.clone();
        async move { reaper.run(shutdown).await }
    });
    let server_task = tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await
        }
    });

    wait_for_shutdown_signal().await;
    tracing::info!("shutdown signal received, draining loops");
    shutdown.cancel();

    let _ = tokio::join!(scheduler_task, failer_task, reaper_task, server_task);
    tracing::info!("shutdown complete");

    Ok(())
}

/// Waits for SIGTERM (orchestrator-issued) or SIGINT (Ctrl-C, local runs).
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        let Ok(mut sig) = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) else {
            std::future::pending::<()>().await;
            return;
        };
        sig.recv().await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
