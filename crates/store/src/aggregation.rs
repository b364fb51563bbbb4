// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistent partial-batch tracking for aggregation steps. Each input
//! carries its producing item's id and output index, and batches are cut
//! by walking the pool in `(item_id, output_index)` order rather than
//! commit order, so out-of-order completion of upstream items still
//! produces the same batch composition. An entry only counts toward a cut
//! once no still-pending upstream item could complete with a lower sort
//! key than it — the prefix ahead of the oldest pending item is the only
//! part of the pool safe to finalize at any given call.

use cw_core::JobId;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Entry {
    item_id: i64,
    output_index: i32,
    input: String,
    bytes: i64,
}

#[derive(sqlx::FromRow)]
struct BatchRow {
    batch_ordinal: i32,
    inputs: serde_json::Value,
}

/// A batch that has just been sealed and is ready to become a READY item.
pub struct SealedBatch {
    pub ordinal: i32,
    pub inputs: Vec<String>,
}

async fn fetch_open_batch(
    conn: &mut sqlx::PgConnection,
    job_id: JobId,
    step_index: i32,
) -> Result<Option<BatchRow>, StoreError> {
    let row: Option<BatchRow> = sqlx::query_as(
        "SELECT batch_ordinal, inputs FROM aggregation_batches \
         WHERE job_id = $1 AND step_index = $2 AND sealed = FALSE \
         FOR UPDATE",
    )
    .bind(job_id.as_uuid())
    .bind(step_index)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row)
}

async fn upsert_batch_row(
    conn: &mut sqlx::PgConnection,
    job_id: JobId,
    step_index: i32,
    ordinal: i32,
    entries: &[Entry],
    sealed: bool,
) -> Result<(), StoreError> {
    let total_bytes: i64 = entries.iter().map(|e| e.bytes).sum();
    sqlx::query(
        "INSERT INTO aggregation_batches (job_id, step_index, batch_ordinal, inputs, total_bytes, sealed) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         ON CONFLICT (job_id, step_index, batch_ordinal) \
         DO UPDATE SET inputs = EXCLUDED.inputs, total_bytes = EXCLUDED.total_bytes, sealed = EXCLUDED.sealed",
    )
    .bind(job_id.as_uuid())
    .bind(step_index)
    .bind(ordinal)
    .bind(serde_json::to_value(entries)?)
    .bind(total_bytes)
    .bind(sealed)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// The smallest id among still-non-terminal items on `source_step_index`, if
/// any. Entries produced by items at or above this id might still be
/// overtaken by a lower-id completion and can't be finalized yet.
async fn min_pending_source_item_id(
    conn: &mut sqlx::PgConnection,
    job_id: JobId,
    source_step_index: i32,
) -> Result<Option<i64>, StoreError> {
    let (min_id,): (Option<i64>,) = sqlx::query_as(
        "SELECT MIN(id) FROM work_items WHERE job_id = $1 AND workflow_step_index = $2 \
         AND status IN ('READY', 'QUEUED', 'RUNNING')",
    )
    .bind(job_id.as_uuid())
    .bind(source_step_index)
    .fetch_one(&mut *conn)
    .await?;
    Ok(min_id)
}

/// Walks `entries[..safe_len]` in order, grouping into batches that stay
/// under `cap_count` items and `cap_bytes` total bytes, sealing a group the
/// moment the next entry would overflow it. Entries past `safe_len`, plus
/// whatever group is still open when the walk ends, are returned as the
/// pool to persist for next time.
fn partition_into_batches(
    entries: Vec<Entry>,
    safe_len: usize,
    cap_count: i64,
    cap_bytes: i64,
) -> (Vec<Vec<Entry>>, Vec<Entry>) {
    let mut sealed = Vec::new();
    let mut current = Vec::new();
    let mut current_bytes = 0i64;
    let mut rest = Vec::new();

    for (i, entry) in entries.into_iter().enumerate() {
        if i >= safe_len {
            rest.push(entry);
            continue;
        }
        let would_exceed =
            !current.is_empty() && (current.len() as i64 + 1 > cap_count || current_bytes + entry.bytes > cap_bytes);
        if would_exceed {
            sealed.push(std::mem::take(&mut current));
            current_bytes = 0;
        }
        current_bytes += entry.bytes;
        current.push(entry);
    }

    let mut remaining = current;
    remaining.extend(rest);
    (sealed, remaining)
}

fn to_sealed_batches(base_ordinal: i32, groups: Vec<Vec<Entry>>) -> Vec<SealedBatch> {
    groups
        .into_iter()
        .enumerate()
        .map(|(i, group)| SealedBatch {
            ordinal: base_ordinal + i as i32,
            inputs: group.into_iter().map(|e| e.input).collect(),
        })
        .collect()
}

/// Append one output to the pool for `(job_id, step_index)`, cutting and
/// persisting any batches that this entry's arrival makes final. Returns
/// every batch sealed by this call, in ordinal order — usually zero or one,
/// but a completion that unblocks a long-pending low-id item can seal
/// several at once.
#[allow(clippy::too_many_arguments)]
pub async fn append_input(
    conn: &mut sqlx::PgConnection,
    job_id: JobId,
    step_index: i32,
    source_step_index: i32,
    producing_item_id: i64,
    output_index: i32,
    input: &str,
    bytes: i64,
    batch_size_cap: i64,
    max_bytes_cap: i64,
) -> Result<Vec<SealedBatch>, StoreError> {
    let open = fetch_open_batch(conn, job_id, step_index).await?;
    let base_ordinal = open.as_ref().map(|row| row.batch_ordinal).unwrap_or(0);
    let mut entries = match open {
        Some(row) => serde_json::from_value::<Vec<Entry>>(row.inputs)?,
        None => Vec::new(),
    };

    entries.push(Entry {
        item_id: producing_item_id,
        output_index,
        input: input.to_string(),
        bytes,
    });
    entries.sort_by_key(|e| (e.item_id, e.output_index));

    let min_pending = min_pending_source_item_id(conn, job_id, source_step_index).await?;
    let safe_len = match min_pending {
        Some(min_id) => entries.partition_point(|e| e.item_id < min_id),
        None => entries.len(),
    };

    let (sealed_groups, remaining) = partition_into_batches(entries, safe_len, batch_size_cap, max_bytes_cap);

    for (i, group) in sealed_groups.iter().enumerate() {
        upsert_batch_row(conn, job_id, step_index, base_ordinal + i as i32, group, true).await?;
    }
    upsert_batch_row(conn, job_id, step_index, base_ordinal + sealed_groups.len() as i32, &remaining, false).await?;

    Ok(to_sealed_batches(base_ordinal, sealed_groups))
}

/// Force-seal whatever is in the pool for `(job_id, step_index)`, for when
/// the upstream step has fully completed — every remaining entry is now
/// safe, so this can cut more than one batch if the pool grew past a
/// single cap's worth while waiting on a slow low-id item. No-op if the
/// pool is empty.
pub async fn seal_trailing_batch(
    conn: &mut sqlx::PgConnection,
    job_id: JobId,
    step_index: i32,
    batch_size_cap: i64,
    max_bytes_cap: i64,
) -> Result<Vec<SealedBatch>, StoreError> {
    let Some(open) = fetch_open_batch(conn, job_id, step_index).await? else {
        return Ok(Vec::new());
    };
    let mut entries = serde_json::from_value::<Vec<Entry>>(open.inputs)?;
    if entries.is_empty() {
        return Ok(Vec::new());
    }
    entries.sort_by_key(|e| (e.item_id, e.output_index));

    let len = entries.len();
    let (mut sealed_groups, remaining) = partition_into_batches(entries, len, batch_size_cap, max_bytes_cap);
    if !remaining.is_empty() {
        sealed_groups.push(remaining);
    }

    let base_ordinal = open.batch_ordinal;
    for (i, group) in sealed_groups.iter().enumerate() {
        upsert_batch_row(conn, job_id, step_index, base_ordinal + i as i32, group, true).await?;
    }

    Ok(to_sealed_batches(base_ordinal, sealed_groups))
}
