// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process queue for tests and single-process deployments. Visible
//! messages are handed out on `get_messages` and stay "in flight" (not
//! redelivered) until deleted, mirroring at-least-once broker semantics
//! closely enough for deterministic tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{Message, Queue, QueueError};

struct InFlight {
    body: String,
}

pub struct InMemoryQueue {
    visible: Mutex<VecDeque<String>>,
    in_flight: Mutex<std::collections::HashMap<String, InFlight>>,
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self {
            visible: Mutex::new(VecDeque::new()),
            in_flight: Mutex::new(std::collections::HashMap::new()),
        }
    }
}

#[async_trait]
impl Queue for InMemoryQueue {
    async fn send_message(&self, body: String, _group_key: Option<&str>) -> Result<(), QueueError> {
        self.visible
            .lock()
            .map_err(|_| QueueError::Transport("poisoned lock".to_string()))?
            .push_back(body);
        Ok(())
    }

    async fn get_messages(
        &self,
        max_messages: u32,
        _wait_seconds: u32,
    ) -> Result<Vec<Message>, QueueError> {
        let mut visible = self
            .visible
            .lock()
            .map_err(|_| QueueError::Transport("poisoned lock".to_string()))?;
        let mut in_flight = self
            .in_flight
            .lock()
            .map_err(|_| QueueError::Transport("poisoned lock".to_string()))?;
        let mut out = Vec::new();
        for _ in 0..max_messages {
            let Some(body) = visible.pop_front() else {
                break;
            };
            let receipt = Uuid::new_v4().to_string();
            in_flight.insert(receipt.clone(), InFlight { body: body.clone() });
            out.push(Message { body, receipt });
        }
        Ok(out)
    }

    async fn delete_message(&self, receipt: &str) -> Result<(), QueueError> {
        let mut in_flight = self
            .in_flight
            .lock()
            .map_err(|_| QueueError::Transport("poisoned lock".to_string()))?;
        in_flight
            .remove(receipt)
            .ok_or_else(|| QueueError::UnknownReceipt(receipt.to_string()))?;
        Ok(())
    }

    async fn purge(&self) -> Result<(), QueueError> {
        self.visible
            .lock()
            .map_err(|_| QueueError::Transport("poisoned lock".to_string()))?
            .clear();
        self.in_flight
            .lock()
            .map_err(|_| QueueError::Transport("poisoned lock".to_string()))?
            .clear();
        Ok(())
    }

    async fn approximate_number_of_messages(&self) -> Result<u64, QueueError> {
        Ok(self
            .visible
            .lock()
            .map_err(|_| QueueError::Transport("poisoned lock".to_string()))?
            .len() as u64)
    }
}
