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

//! Action and query endpoints of the Icinga 2 API.
//!
//! Bodies are assembled as JSON objects and pass through
//! [`without_nulls`] so unset optional parameters never reach the server.

use crate::client::ApiClient;
use crate::error::{ApiError, ApiResult};
use crate::filters;
use crate::payload::{deep_merge_values, without_nulls};
use crate::timespec::{to_duration_at, to_timestamp_at};
use chrono::{DateTime, Local};
use serde::Serialize;
use serde_json::{Value, json};
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ObjectType {
    Host,
    Service,
}

impl ObjectType {
    pub fn as_str(self) -> &'static str {
        match self {
            ObjectType::Host => "Host",
            ObjectType::Service => "Service",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operator name and free text attached to downtimes and acknowledgements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    author: String,
    text: String,
}

impl Comment {
    pub fn new(author: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            text: text.into(),
        }
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// What a command acts on. Host-like targets can optionally reach their
/// services as well.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Host { name: String, all_services: bool },
    Service { host: String, service: String },
    HostGroup { group: String, all_services: bool },
    ServiceGroup { group: String },
}

impl Target {
    /// The (type, filter) pairs an action on this target is issued for, in
    /// order. Host scope always comes first.
    fn scopes(&self) -> ApiResult<Vec<(ObjectType, String)>> {
        let (primary, filter, all_services) = self.primary()?;
        let mut scopes = vec![(primary, filter.clone())];
        if all_services {
            scopes.push((ObjectType::Service, filter));
        }
        Ok(scopes)
    }

    fn primary(&self) -> ApiResult<(ObjectType, String, bool)> {
        Ok(match self {
            Target::Host { name, all_services } => (
                ObjectType::Host,
                filters::host(required("hostname", name)?),
                *all_services,
            ),
            Target::Service { host, service } => (
                ObjectType::Service,
                filters::service(required("hostname", host)?, required("service name", service)?),
                false,
            ),
            Target::HostGroup {
                group,
                all_services,
            } => (
                ObjectType::Host,
                filters::hostgroup(required("host group", group)?),
                *all_services,
            ),
            Target::ServiceGroup { group } => (
                ObjectType::Service,
                filters::servicegroup(required("service group", group)?),
                false,
            ),
        })
    }
}

fn required<'a>(what: &str, value: &'a str) -> ApiResult<&'a str> {
    if value.trim().is_empty() {
        return Err(ApiError::validation(format!("{what} must not be empty")));
    }
    Ok(value)
}

/// Downtime window as given by the operator. `duration` makes the downtime
/// flexible; without it the downtime is fixed to `start..end`.
#[derive(Debug, Clone)]
pub struct DowntimeSpec {
    pub start: String,
    pub end: String,
    pub duration: Option<String>,
    pub trigger_name: Option<String>,
    pub comment: Comment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DowntimeWindow {
    start_time: i64,
    end_time: i64,
    duration: Option<i64>,
}

impl DowntimeSpec {
    fn resolve(&self, reference: DateTime<Local>) -> ApiResult<DowntimeWindow> {
        let duration = match &self.duration {
            Some(spec) => {
                let seconds = to_duration_at(spec, reference)?.num_seconds();
                if seconds <= 0 {
                    return Err(ApiError::validation(format!(
                        "downtime duration `{spec}` must be positive"
                    )));
                }
                Some(seconds)
            }
            None => None,
        };
        Ok(DowntimeWindow {
            start_time: to_timestamp_at(&self.start, reference)?.timestamp(),
            end_time: to_timestamp_at(&self.end, reference)?.timestamp(),
            duration,
        })
    }

    fn body(&self, object_type: ObjectType, filter: &str, window: DowntimeWindow) -> Value {
        without_nulls(json!({
            "type": object_type,
            "filter": filter,
            "author": self.comment.author(),
            "comment": self.comment.text(),
            "start_time": window.start_time,
            "end_time": window.end_time,
            "duration": window.duration.map_or(Value::Bool(false), Value::from),
            "fixed": window.duration.is_none(),
            "trigger_name": self.trigger_name,
        }))
    }
}

#[derive(Debug, Clone)]
pub struct AcknowledgementSpec {
    pub comment: Comment,
    pub expiry: Option<String>,
    /// Keep the acknowledgement until the object fully recovers instead of
    /// clearing it on any state change.
    pub sticky: bool,
    pub notify: bool,
}

impl AcknowledgementSpec {
    pub fn new(comment: Comment) -> Self {
        Self {
            comment,
            expiry: None,
            sticky: true,
            notify: true,
        }
    }

    fn body(
        &self,
        object_type: ObjectType,
        filter: &str,
        reference: DateTime<Local>,
    ) -> ApiResult<Value> {
        let expiry = match &self.expiry {
            Some(spec) => Some(to_timestamp_at(spec, reference)?.timestamp()),
            None => None,
        };
        Ok(without_nulls(json!({
            "type": object_type,
            "filter": filter,
            "author": self.comment.author(),
            "comment": self.comment.text(),
            "expiry": expiry,
            "sticky": self.sticky,
            "notify": self.notify,
        })))
    }
}

#[derive(Debug, Clone, Default)]
pub struct ObjectQuery {
    pub filter: Option<String>,
    pub attrs: Option<Vec<String>>,
    pub joins: Option<Vec<String>>,
}

/// Runs `call` once per scope of `target` and merges the answers.
///
/// Calls are sequential and the first failure aborts the whole operation, so
/// a partial result is never merged.
fn fan_out<F>(target: &Target, mut call: F) -> ApiResult<Value>
where
    F: FnMut(ObjectType, &str) -> ApiResult<Value>,
{
    let mut merged: Option<Value> = None;
    for (object_type, filter) in target.scopes()? {
        debug!(%object_type, %filter, "issuing action");
        let response = call(object_type, &filter)?;
        merged = Some(match merged {
            Some(previous) => deep_merge_values(&previous, &response),
            None => response,
        });
    }
    Ok(merged.unwrap_or(Value::Null))
}

fn objects_path(kind: &str) -> ApiResult<String> {
    let kind = required("object type", kind)?.trim().to_ascii_lowercase();
    if kind.ends_with('s') {
        Ok(format!("objects/{kind}"))
    } else if let Some(stem) = kind.strip_suffix('y') {
        Ok(format!("objects/{stem}ies"))
    } else {
        Ok(format!("objects/{kind}s"))
    }
}

impl ApiClient {
    pub fn schedule_downtime(
        &self,
        object_type: ObjectType,
        filter: &str,
        spec: &DowntimeSpec,
    ) -> ApiResult<Value> {
        let window = spec.resolve(Local::now())?;
        self.post(
            "actions/schedule-downtime",
            Some(&spec.body(object_type, filter, window)),
        )
    }

    /// Removes downtimes by their full name (`host!service!id`). A single
    /// name is sent as a string, several as an array.
    pub fn remove_downtime_by_name<S: AsRef<str>>(&self, names: &[S]) -> ApiResult<Value> {
        for name in names {
            required("downtime name", name.as_ref())?;
        }
        let downtime = match names {
            [] => return Err(ApiError::validation("no downtime names given")),
            [single] => json!(single.as_ref()),
            many => json!(many.iter().map(|name| name.as_ref()).collect::<Vec<&str>>()),
        };
        self.post(
            "actions/remove-downtime",
            Some(&json!({ "downtime": downtime })),
        )
    }

    pub fn remove_downtime_by_filter(
        &self,
        object_type: ObjectType,
        filter: &str,
    ) -> ApiResult<Value> {
        self.post(
            "actions/remove-downtime",
            Some(&json!({ "type": object_type, "filter": filter })),
        )
    }

    pub fn acknowledge_problem(
        &self,
        object_type: ObjectType,
        filter: &str,
        spec: &AcknowledgementSpec,
    ) -> ApiResult<Value> {
        let body = spec.body(object_type, filter, Local::now())?;
        self.post("actions/acknowledge-problem", Some(&body))
    }

    pub fn remove_acknowledgement(
        &self,
        object_type: ObjectType,
        filter: &str,
    ) -> ApiResult<Value> {
        self.post(
            "actions/remove-acknowledgement",
            Some(&json!({ "type": object_type, "filter": filter })),
        )
    }

    /// `GET objects/<kind>`; `kind` is lowercased and pluralised the way
    /// Icinga names its collections, so `Host`, `hosts` and `Dependency` all
    /// work.
    pub fn list_objects(&self, kind: &str, query: &ObjectQuery) -> ApiResult<Value> {
        let path = objects_path(kind)?;
        let body = without_nulls(json!({
            "filter": query.filter,
            "attrs": query.attrs,
            "joins": query.joins,
        }));
        self.get(&path, Some(&body))
    }

    pub fn status(&self, component: Option<&str>) -> ApiResult<Value> {
        match component.map(str::trim).filter(|c| !c.is_empty()) {
            Some(component) => self.get(&format!("status/{component}"), None),
            None => self.get("status", None),
        }
    }

    /// Schedules downtime for `target`, fanning out to services when asked.
    /// Times are resolved once so both calls share the same window.
    pub fn schedule_target_downtime(
        &self,
        target: &Target,
        spec: &DowntimeSpec,
    ) -> ApiResult<Value> {
        target.scopes()?;
        let window = spec.resolve(Local::now())?;
        fan_out(target, |object_type, filter| {
            self.post(
                "actions/schedule-downtime",
                Some(&spec.body(object_type, filter, window)),
            )
        })
    }

    pub fn remove_target_downtime(&self, target: &Target) -> ApiResult<Value> {
        fan_out(target, |object_type, filter| {
            self.remove_downtime_by_filter(object_type, filter)
        })
    }

    /// Acknowledgements never fan out; they apply to the target's own type.
    pub fn acknowledge_target_problem(
        &self,
        target: &Target,
        spec: &AcknowledgementSpec,
    ) -> ApiResult<Value> {
        let (object_type, filter, _) = target.primary()?;
        self.acknowledge_problem(object_type, &filter, spec)
    }

    pub fn remove_target_acknowledgement(&self, target: &Target) -> ApiResult<Value> {
        let (object_type, filter, _) = target.primary()?;
        self.remove_acknowledgement(object_type, &filter)
    }
}
