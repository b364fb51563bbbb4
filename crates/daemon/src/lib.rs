// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! cw-daemon: binary wiring for the work orchestration core. Constructs the
//! store, the queues, and the four cooperative loops (scheduler, failer,
//! reaper, HTTP API) and runs them until a shutdown signal arrives.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod env;

pub use env::{Config, QueueBackend};
