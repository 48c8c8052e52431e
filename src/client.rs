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

use crate::error::{ApiError, ApiResult};
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Url};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

pub const API_PREFIX: &str = "v1";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const USER_AGENT: &str = concat!("icinga2ctl/", env!("CARGO_PKG_VERSION"));

/// Transport settings fixed for the lifetime of one client.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub verify_tls: bool,
    pub timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            verify_tls: true,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Clone)]
struct BasicAuth {
    username: String,
    password: String,
}

impl std::fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .field("password", &"*****")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: Url,
    http: Client,
    default_headers: HeaderMap,
    auth: Option<BasicAuth>,
}

impl ApiClient {
    pub fn new(base_url: &str, options: &ClientOptions) -> ApiResult<Self> {
        let parsed = Url::parse(base_url).map_err(|e| {
            ApiError::validation(format!("invalid API url `{base_url}`: {e}"))
        })?;
        let http = Client::builder()
            .danger_accept_invalid_certs(!options.verify_tls)
            .timeout(options.timeout)
            .connect_timeout(options.timeout.min(CONNECT_TIMEOUT))
            .user_agent(USER_AGENT)
            .build()?;

        let mut default_headers = HeaderMap::new();
        default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        Ok(Self {
            base_url: parsed,
            http,
            default_headers,
            auth: None,
        })
    }

    /// Attaches HTTP basic credentials to every subsequent request.
    pub fn with_basic_auth(mut self, username: &str, password: &str) -> ApiResult<Self> {
        if username.is_empty() || password.is_empty() {
            return Err(ApiError::validation(
                "password authentication requires a username and password",
            ));
        }
        self.auth = Some(BasicAuth {
            username: username.to_string(),
            password: password.to_string(),
        });
        Ok(self)
    }

    /// `<base>/v1/<command>`, tolerating slashes on either side of the join.
    pub fn url(&self, command: &str) -> ApiResult<Url> {
        let joined = format!(
            "{}/{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            API_PREFIX,
            command.trim_start_matches('/')
        );
        Url::parse(&joined)
            .map_err(|e| ApiError::validation(format!("invalid API path `{command}`: {e}")))
    }

    pub fn get(&self, command: &str, body: Option<&Value>) -> ApiResult<Value> {
        self.execute(Method::GET, command, body, &[])
    }

    pub fn post(&self, command: &str, body: Option<&Value>) -> ApiResult<Value> {
        self.execute(Method::POST, command, body, &[])
    }

    /// Sends one request and decodes the JSON answer.
    ///
    /// `headers` are layered over the client defaults, replacing any header of
    /// the same name. Bodies are JSON-encoded regardless of the verb.
    pub fn execute(
        &self,
        method: Method,
        command: &str,
        body: Option<&Value>,
        headers: &[(&str, &str)],
    ) -> ApiResult<Value> {
        let url = self.url(command)?;

        let mut merged = self.default_headers.clone();
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| ApiError::validation(format!("invalid header name `{name}`")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| ApiError::validation(format!("invalid value for header `{name}`")))?;
            merged.insert(name, value);
        }

        debug!(%method, %url, "sending request");
        let mut request = self.http.request(method, url.clone()).headers(merged);
        if let Some(auth) = &self.auth {
            request = request.basic_auth(&auth.username, Some(&auth.password));
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send()?;
        let status = response.status();
        let text = response.text()?;

        if !status.is_success() {
            warn!(status = status.as_u16(), %url, body = %text, "API rejected request");
            return Err(ApiError::Http {
                status: status.as_u16(),
                body: text,
            });
        }

        debug!(status = status.as_u16(), bytes = text.len(), "response received");
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    // base64("icingaadmin:s3cret")
    const AUTH_HEADER: &str = "Basic aWNpbmdhYWRtaW46czNjcmV0";

    fn client(base_url: &str) -> ApiClient {
        ApiClient::new(base_url, &ClientOptions::default())
            .unwrap()
            .with_basic_auth("icingaadmin", "s3cret")
            .unwrap()
    }

    #[test]
    fn builds_versioned_urls() {
        let client = client("https://icinga.example:5665/");
        assert_eq!(
            client.url("/status").unwrap().as_str(),
            "https://icinga.example:5665/v1/status"
        );
        assert_eq!(
            client.url("actions/schedule-downtime").unwrap().as_str(),
            "https://icinga.example:5665/v1/actions/schedule-downtime"
        );

        let nested = self::client("https://proxy.example/icinga");
        assert_eq!(
            nested.url("objects/hosts").unwrap().as_str(),
            "https://proxy.example/icinga/v1/objects/hosts"
        );
    }

    #[test]
    fn sends_credentials_accept_header_and_json_body() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/v1/actions/remove-downtime")
                .header("Authorization", AUTH_HEADER)
                .header("Accept", "application/json")
                .json_body(json!({"downtime": "web01!a1"}));
            then.status(200)
                .json_body(json!({"results": [{"code": 200, "status": "Successfully removed"}]}));
        });

        let response = client(&server.base_url())
            .post("actions/remove-downtime", Some(&json!({"downtime": "web01!a1"})))
            .unwrap();

        mock.assert();
        assert_eq!(response["results"][0]["status"], "Successfully removed");
    }

    #[test]
    fn get_requests_carry_a_json_body() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/v1/objects/hosts")
                .json_body(json!({"filter": "host.name == \"web01\""}));
            then.status(200).json_body(json!({"results": []}));
        });

        client(&server.base_url())
            .get(
                "objects/hosts",
                Some(&json!({"filter": "host.name == \"web01\""})),
            )
            .unwrap();

        mock.assert();
    }

    #[test]
    fn per_call_headers_override_defaults() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/v1/objects/services")
                .header("Accept", "application/vnd.icinga+json")
                .header("X-HTTP-Method-Override", "GET");
            then.status(200).json_body(json!({"results": []}));
        });

        client(&server.base_url())
            .execute(
                reqwest::Method::POST,
                "objects/services",
                None,
                &[
                    ("Accept", "application/vnd.icinga+json"),
                    ("X-HTTP-Method-Override", "GET"),
                ],
            )
            .unwrap();

        mock.assert();
    }

    #[test]
    fn non_success_status_surfaces_body() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/v1/actions/acknowledge-problem");
            then.status(404)
                .body(r#"{"error":404,"status":"No objects found."}"#);
        });

        let err = client(&server.base_url())
            .post("actions/acknowledge-problem", Some(&json!({})))
            .unwrap_err();

        match err {
            ApiError::Http { status, body } => {
                assert_eq!(status, 404);
                assert!(body.contains("No objects found."));
            }
            other => panic!("expected HTTP error, got {other:?}"),
        }
    }

    #[test]
    fn unauthorized_is_an_http_error_not_a_decode_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.path("/v1/status");
            then.status(401).body("<h1>Unauthorized</h1>");
        });

        let err = client(&server.base_url()).get("status", None).unwrap_err();
        assert!(matches!(err, ApiError::Http { status: 401, .. }));
    }

    #[test]
    fn empty_success_body_decodes_to_null() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.path("/v1/status");
            then.status(204);
        });

        let value = client(&server.base_url()).get("status", None).unwrap();
        assert!(value.is_null());
    }

    #[test]
    fn malformed_success_body_is_a_decode_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.path("/v1/status");
            then.status(200).body("<!doctype html>");
        });

        let err = client(&server.base_url()).get("status", None).unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[test]
    fn connection_failure_is_a_transport_error() {
        let options = ClientOptions {
            verify_tls: true,
            timeout: Duration::from_secs(2),
        };
        let err = ApiClient::new("http://127.0.0.1:1", &options)
            .unwrap()
            .get("status", None)
            .unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)));
    }

    #[test]
    fn rejects_bad_urls_and_missing_credentials() {
        assert!(matches!(
            ApiClient::new("not a url", &ClientOptions::default()),
            Err(ApiError::Validation(_))
        ));

        let bare = ApiClient::new("https://icinga.example:5665", &ClientOptions::default()).unwrap();
        assert!(matches!(
            bare.clone().with_basic_auth("", "pw"),
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            bare.with_basic_auth("user", ""),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn debug_output_masks_password() {
        let rendered = format!("{:?}", client("https://icinga.example:5665"));
        assert!(rendered.contains("icingaadmin"));
        assert!(!rendered.contains("s3cret"));
    }
}
