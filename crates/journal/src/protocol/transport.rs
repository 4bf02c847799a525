//! HTTP transport seam
//!
//! The protocol client only needs two request shapes: a form POST to the
//! flat endpoint and a GET of the comment export. Uses synchronous HTTP
//! (ureq) to be executor-agnostic.

use std::time::Duration;

use url::Url;

use crate::error::{JournalError, Result};

/// Status and body of one HTTP exchange
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
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

/// Carries requests to the journal server
///
/// Implementations enforce their own timeouts and report network failures
/// as [`JournalError::Transport`]. Non-success statuses are returned as data.
pub trait Transport: Send + Sync {
    /// POST an already-encoded form body to `path`
    fn post_form(&self, path: &str, body: &str) -> Result<HttpResponse>;

    /// GET `path` (which may include a query string) with extra headers
    fn get(&self, path: &str, headers: &[(&str, &str)]) -> Result<HttpResponse>;
}

/// Blocking transport backed by a ureq agent
pub struct UreqTransport {
    agent: ureq::Agent,
    base_url: Url,
}

impl UreqTransport {
    /// Create a transport for `base_url` with a per-request timeout
    pub fn new(base_url: Url, timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build();

        Self {
            agent: ureq::Agent::new_with_config(config),
            base_url,
        }
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| JournalError::User(format!("invalid request path {:?}: {}", path, e)))
    }
}

impl Transport for UreqTransport {
    fn post_form(&self, path: &str, body: &str) -> Result<HttpResponse> {
        let url = self.url(path)?;

        let mut response = self
            .agent
            .post(url.as_str())
            .header("Content-Type", "application/x-www-form-urlencoded")
            .send(body)?;

        let status = response.status().as_u16();
        let body = response.body_mut().read_to_string()?;
        Ok(HttpResponse { status, body })
    }

    fn get(&self, path: &str, headers: &[(&str, &str)]) -> Result<HttpResponse> {
        let url = self.url(path)?;

        let mut request = self.agent.get(url.as_str());
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let mut response = request.call()?;
        let status = response.status().as_u16();
        let body = response.body_mut().read_to_string()?;
        Ok(HttpResponse { status, body })
    }
}
