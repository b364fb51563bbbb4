// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ID types for the work orchestration core.
//!
//! `JobId` is a stable UUID assigned by the request frontend before the job
//! reaches the core. `WorkItemId` is a monotonic integer primary key assigned
//! by the database on insert, mirroring the `work_items.id` surrogate key.
//! Service and user identifiers are plain interned strings — a service ID is
//! a container image tag, a username comes from the authenticated request.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Define a newtype wrapper around [`uuid::Uuid`] with `Display`, `FromStr`,
/// and serde support. Companion to [`define_string_id`] for UUID-keyed
/// entities (see [`crate::job::JobId`]).
#[macro_export]
macro_rules! define_uuid_id {
    ($(#[$meta:meta])* pub struct $name:ident;) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub uuid::Uuid);

        impl $name {
            /// Generate a new random (v4) identifier.
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4())
            }

            pub fn from_uuid(id: uuid::Uuid) -> Self {
                Self(id)
            }

            pub fn as_uuid(&self) -> uuid::Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(uuid::Uuid::parse_str(s)?))
            }
        }

        impl From<uuid::Uuid> for $name {
            fn from(id: uuid::Uuid) -> Self {
                Self(id)
            }
        }
    };
}

/// Define a newtype wrapper around a plain interned `String`, for entities
/// whose identity is assigned externally rather than generated (service
/// image tags, usernames).
#[macro_export]
macro_rules! define_string_id {
    ($(#[$meta:meta])* pub struct $name:ident;) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

/// Monotonic integer primary key for a [`crate::work_item::WorkItem`].
///
/// Assigned by the database (`BIGSERIAL`) on insert; `0` is never a valid
/// persisted value and is only used as a placeholder before insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkItemId(pub i64);

impl WorkItemId {
    pub const UNASSIGNED: WorkItemId = WorkItemId(0);

    pub fn is_assigned(&self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for WorkItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for WorkItemId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Re-exported so downstream crates don't need a direct `uuid` dependency
/// just to construct [`crate::job::JobId`] values from parsed strings.
pub fn parse_uuid(s: &str) -> Result<Uuid, uuid::Error> {
    Uuid::parse_str(s)
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
