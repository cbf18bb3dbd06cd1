//! HTTP access to the remote service.
//!
//! [`Transport`] is the seam between pagination logic and the network.
//! [`HttpTransport`] talks to an Okapi gateway with `reqwest::blocking`;
//! tests script their own implementation.

use std::io::{BufRead, BufReader};
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};

use super::error::{FetchError, FetchResult};
use crate::config::{RemoteSettings, SettingsError};

/// Query string pairs, sent in order.
pub type QueryParams = Vec<(String, String)>;

/// A buffered response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: String,
}

impl Response {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Blocking GET access to collection paths.
pub trait Transport {
    /// GET `path` and buffer the whole body.
    ///
    /// A timed-out attempt is reported as [`FetchError::Timeout`] so the
    /// caller can retry it. Non-2xx statuses are returned, not raised.
    fn get(&self, path: &str, params: &[(String, String)]) -> FetchResult<Response>;

    /// GET `path` and return the body as a reader, without a time limit.
    /// Non-2xx statuses are raised as [`FetchError::Status`].
    fn stream(&self, path: &str, params: &[(String, String)]) -> FetchResult<Box<dyn BufRead + Send>>;
}

/// [`Transport`] over HTTP(S) with Okapi tenant and token headers.
pub struct HttpTransport {
    base_url: String,
    client: Client,
    stream_client: Client,
}

impl HttpTransport {
    /// Build a transport for `base_url`.
    pub fn new(
        base_url: &str,
        tenant: &str,
        token: Option<&str>,
        timeout: Duration,
    ) -> FetchResult<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let headers = okapi_headers(&base_url, tenant, token)?;
        let build = |timeout: Option<Duration>| {
            Client::builder()
                .default_headers(headers.clone())
                .timeout(timeout)
                .build()
                .map_err(|e| FetchError::Transport {
                    path: base_url.clone(),
                    message: e.to_string(),
                })
        };
        let client = build(Some(timeout))?;
        let stream_client = build(None)?;
        Ok(Self {
            base_url,
            client,
            stream_client,
        })
    }

    /// Build a transport from the `[remote]` settings section.
    pub fn from_settings(remote: &RemoteSettings) -> Result<Self, TransportSetupError> {
        let base_url = remote.resolved_base_url()?;
        let token = remote.resolved_token()?;
        Ok(Self::new(
            &base_url,
            &remote.tenant,
            token.as_deref(),
            remote.timeout(),
        )?)
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

/// Failure to build an [`HttpTransport`] from settings.
#[derive(Debug, thiserror::Error)]
pub enum TransportSetupError {
    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

fn okapi_headers(base_url: &str, tenant: &str, token: Option<&str>) -> FetchResult<HeaderMap> {
    let invalid = |name: &str| FetchError::Transport {
        path: base_url.to_string(),
        message: format!("invalid value for header {}", name),
    };
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(
        HeaderName::from_static("x-okapi-tenant"),
        HeaderValue::from_str(tenant).map_err(|_| invalid("x-okapi-tenant"))?,
    );
    if let Some(token) = token {
        let mut value = HeaderValue::from_str(token).map_err(|_| invalid("x-okapi-token"))?;
        value.set_sensitive(true);
        headers.insert(HeaderName::from_static("x-okapi-token"), value);
    }
    Ok(headers)
}

fn request_error(path: &str, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout {
            path: path.to_string(),
            attempts: 1,
        }
    } else {
        FetchError::Transport {
            path: path.to_string(),
            message: e.to_string(),
        }
    }
}

impl Transport for HttpTransport {
    fn get(&self, path: &str, params: &[(String, String)]) -> FetchResult<Response> {
        let response = self
            .client
            .get(self.url(path))
            .query(params)
            .send()
            .map_err(|e| request_error(path, e))?;
        let status = response.status().as_u16();
        let body = response.text().map_err(|e| request_error(path, e))?;
        Ok(Response { status, body })
    }

    fn stream(&self, path: &str, params: &[(String, String)]) -> FetchResult<Box<dyn BufRead + Send>> {
        let response = self
            .stream_client
            .get(self.url(path))
            .query(params)
            .send()
            .map_err(|e| request_error(path, e))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(FetchError::status(path, status.as_u16(), &body));
        }
        Ok(Box::new(BufReader::new(response)))
    }
}
