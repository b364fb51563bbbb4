// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Output links attached to a job.

use crate::job::JobId;
use serde::{Deserialize, Serialize};

/// Bounding box as `[west, south, east, north]`.
pub type Bbox = [f64; 4];

/// Temporal extent as ISO-8601 start/end instants (either may be open-ended).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Temporal {
    pub start: Option<String>,
    pub end: Option<String>,
}

/// An append-only output reference on a [`crate::job::Job`].
///
/// Rows are never updated or removed once written; job materialization only
/// appends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobLink {
    pub job_id: JobId,
    pub href: String,
    pub rel: String,
    pub r#type: Option<String>,
    pub title: Option<String>,
    pub bbox: Option<Bbox>,
    pub temporal: Option<Temporal>,
}

impl JobLink {
    pub fn data(job_id: JobId, href: impl Into<String>) -> Self {
        Self {
            job_id,
            href: href.into(),
            rel: "data".to_string(),
            r#type: None,
            title: None,
            bbox: None,
            temporal: None,
        }
    }
}
