// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue abstraction over pluggable message-broker transports.
//!
//! Two implementations: an in-memory queue for tests and single-process
//! deployments, and a broker-backed queue over SQS for multi-replica
//! deployments. Neither promises more than at-least-once delivery; callers
//! (`cw-processor`'s idempotent update pipeline) must tolerate redelivery.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod error;
mod memory;
mod message;
mod sqs;

pub use error::QueueError;
pub use memory::InMemoryQueue;
pub use message::Message;
pub use sqs::SqsQueue;

use async_trait::async_trait;

/// Uniform surface over a message queue. `groupKey` is advisory: transports
/// that support ordered delivery groups (SQS FIFO message groups) honor it;
/// others ignore it. No ordering beyond intra-work-item retries is required.
#[async_trait]
pub trait Queue: Send + Sync {
    async fn send_message(&self, body: String, group_key: Option<&str>) -> Result<(), QueueError>;

    async fn get_messages(
        &self,
        max_messages: u32,
        wait_seconds: u32,
    ) -> Result<Vec<Message>, QueueError>;

    async fn delete_message(&self, receipt: &str) -> Result<(), QueueError>;

    async fn delete_messages(&self, receipts: &[String]) -> Result<(), QueueError> {
        for receipt in receipts {
            self.delete_message(receipt).await?;
        }
        Ok(())
    }

    async fn purge(&self) -> Result<(), QueueError>;

    async fn approximate_number_of_messages(&self) -> Result<u64, QueueError>;
}
