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

//! Client for the Icinga 2 HTTP API.
//!
//! [`client::ApiClient`] sends requests; the action and query endpoints are
//! implemented on it in [`methods`]. Filters, time specifications and
//! response merging live in their own modules so they can be used without a
//! server.

pub mod client;
pub mod config;
pub mod error;
pub mod filters;
pub mod methods;
pub mod payload;
pub mod prompt;
pub mod timespec;

pub use client::{ApiClient, ClientOptions};
pub use error::{ApiError, ApiResult};
pub use methods::{AcknowledgementSpec, Comment, DowntimeSpec, ObjectQuery, ObjectType, Target};
