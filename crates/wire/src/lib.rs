// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire types for the worker and job-lifecycle HTTP/JSON protocols.
//!
//! This crate has no business logic — it only defines the request/response
//! shapes shared between `cw-api` (the HTTP surface) and any worker or
//! client implementation. Keeping it separate from `cw-core` means the
//! domain model can evolve its internal representation without breaking the
//! wire format, and vice versa.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod job_lifecycle;
mod work;

pub use job_lifecycle::{JobLifecycleEvent, JobView, JobLinkView};
pub use work::{GetWorkResponse, PutWorkItemBody, WorkItemView};
