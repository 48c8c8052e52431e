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

use thiserror::Error;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Failures surfaced by the request layer.
///
/// Nothing here is retried; every variant goes straight back to the caller.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Caller supplied too little to identify the target. Raised before any
    /// network call.
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("could not understand time specification `{0}`")]
    InvalidTimespec(String),

    /// Server answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// DNS, connect, TLS or timeout failure.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("decoding response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ApiError {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
