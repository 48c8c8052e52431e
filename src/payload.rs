// icinga2ctl - CLI for the Icinga 2 HTTP API
// Copyright (C) 2024 The icinga2ctl authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Helpers for request bodies and response payloads.

use serde_json::{Map, Value};

/// Deep-merges two JSON objects into a new one.
///
/// Nested objects merge recursively, arrays concatenate (`a` first), and any
/// other collision takes `b`'s value. Inputs are acyclic by construction.
pub fn deep_merge(a: &Map<String, Value>, b: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = a.clone();
    for (key, right) in b {
        let value = match (a.get(key), right) {
            (Some(Value::Object(left)), Value::Object(right)) => {
                Value::Object(deep_merge(left, right))
            }
            (Some(Value::Array(left)), Value::Array(right)) => {
                Value::Array(left.iter().chain(right).cloned().collect())
            }
            _ => right.clone(),
        };
        merged.insert(key.clone(), value);
    }
    merged
}

/// [`deep_merge`] for arbitrary values; a non-object on either side means `b` wins.
pub fn deep_merge_values(a: &Value, b: &Value) -> Value {
    match (a, b) {
        (Value::Object(left), Value::Object(right)) => Value::Object(deep_merge(left, right)),
        _ => b.clone(),
    }
}

/// Drops top-level `null` fields so optional parameters are left out of the
/// request entirely. `false`, `0` and empty collections stay.
pub fn without_nulls(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(map.into_iter().filter(|(_, v)| !v.is_null()).collect()),
        other => other,
    }
}
