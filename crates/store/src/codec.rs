// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Translates the `SCREAMING_SNAKE_CASE`-serde enums in `cw-core` to and from
//! the plain TEXT columns used for `jobs.status` / `work_items.status`,
//! rather than giving `cw-core` a direct `sqlx` dependency.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StoreError;

pub fn encode<T: Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(s)) => s,
        _ => unreachable!("status enums serialize to a JSON string"),
    }
}

pub fn decode<T: DeserializeOwned>(text: &str) -> Result<T, StoreError> {
    Ok(serde_json::from_value(serde_json::Value::String(text.to_string()))?)
}
