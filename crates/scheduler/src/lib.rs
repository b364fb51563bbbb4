// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cw-scheduler: decides which work item goes to which service's queue,
//! fairly across jobs and bounded by per-service capacity.

mod batch_size;
mod dispatch;
mod error;
mod pods;
mod select;

pub use batch_size::calculate_num_items_to_queue;
pub use dispatch::{QueueFactory, Scheduler, SchedulerConfig, StaticQueueFactory};
pub use error::SchedulerError;
pub use pods::PodCountCache;
pub use select::select_fair_items;
