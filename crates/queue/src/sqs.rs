// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SQS-backed queue. Used for both service queues and the scheduler queue
//! in multi-replica deployments; standard (non-FIFO) queues are sufficient
//! since no cross-group ordering is required.

use async_trait::async_trait;
use aws_sdk_sqs::Client;

use crate::{Message, Queue, QueueError};

pub struct SqsQueue {
    client: Client,
    queue_url: String,
}

impl SqsQueue {
    pub fn new(client: Client, queue_url: impl Into<String>) -> Self {
        Self {
            client,
            queue_url: queue_url.into(),
        }
    }

    /// Build a client from the standard AWS SDK credential/region discovery
    /// chain (env vars, shared config, IRSA/instance role).
    pub async fn from_env(queue_url: impl Into<String>) -> Self {
        let config = aws_config::load_from_env().await;
        Self::new(Client::new(&config), queue_url)
    }
}

#[async_trait]
impl Queue for SqsQueue {
    async fn send_message(&self, body: String, group_key: Option<&str>) -> Result<(), QueueError> {
        let mut request = self.client.send_message().queue_url(&self.queue_url).message_body(body);
        if let Some(group_key) = group_key {
            request = request.message_group_id(group_key);
        }
        request
            .send()
            .await
            .map_err(|err| QueueError::Transport(err.to_string()))?;
        Ok(())
    }

    async fn get_messages(
        &self,
        max_messages: u32,
        wait_seconds: u32,
    ) -> Result<Vec<Message>, QueueError> {
        let response = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(max_messages.min(10) as i32)
            .wait_time_seconds(wait_seconds.min(20) as i32)
            .send()
            .await
            .map_err(|err| QueueError::Transport(err.to_string()))?;

        let messages = response
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|msg| {
                let body = msg.body?;
                let receipt = msg.receipt_handle?;
                Some(Message { body, receipt })
            })
            .collect();
        Ok(messages)
    }

    async fn delete_message(&self, receipt: &str) -> Result<(), QueueError> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt)
            .send()
            .await
            .map_err(|err| QueueError::Transport(err.to_string()))?;
        Ok(())
    }

    async fn purge(&self) -> Result<(), QueueError> {
        self.client
            .purge_queue()
            .queue_url(&self.queue_url)
            .send()
            .await
            .map_err(|err| QueueError::Transport(err.to_string()))?;
        Ok(())
    }

    async fn approximate_number_of_messages(&self) -> Result<u64, QueueError> {
        let response = self
            .client
            .get_queue_attributes()
            .queue_url(&self.queue_url)
            .attribute_names(aws_sdk_sqs::types::QueueAttributeName::ApproximateNumberOfMessages)
            .send()
            .await
            .map_err(|err| QueueError::Transport(err.to_string()))?;
        let count = response
            .attributes
            .and_then(|attrs| {
                attrs
                    .get(&aws_sdk_sqs::types::QueueAttributeName::ApproximateNumberOfMessages)
                    .cloned()
            })
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(0);
        Ok(count)
    }
}
