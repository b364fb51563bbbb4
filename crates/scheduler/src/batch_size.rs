// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-service batch-size formula: how many work items to push to a
//! service's queue this cycle, given current pod count and queue depth.

/// Starvation branch kicks in once `queued` falls to (or below) 10% of the
/// running pod count for the service.
pub fn calculate_num_items_to_queue(
    pods: i64,
    schedulers: i64,
    queued: i64,
    scale_factor: f64,
    received: i64,
) -> i64 {
    let starvation_threshold = 0.1 * pods as f64;
    if queued as f64 <= starvation_threshold {
        return (pods - queued).min(received).max(1);
    }

    let raw = scale_factor * pods as f64 / schedulers.max(1) as f64 - queued as f64;
    let n = raw.floor().max(0.0) as i64;
    if n == 0 && queued == 0 {
        1
    } else {
        n
    }
}
