//! Outbound HTTP to the CAS authority.
//!
//! All endpoints share one `reqwest::Client` with a fixed per-request timeout.
//! Redirects are not followed: a CAS endpoint that redirects is misconfigured,
//! and the restlet `Location` header must stay observable.
//!
//! This layer only maps connection-level failures. Interpreting status codes
//! and bodies is up to the calling operation.

use std::time::Duration;

use reqwest::{RequestBuilder, header::LOCATION, redirect::Policy};
use url::Url;

use crate::{Error, Result};

/// Status, `Location` and body of an authority response.
#[derive(Debug, Clone)]
pub struct AuthorityResponse {
    pub status: u16,
    pub location: Option<String>,
    pub body: Vec<u8>,
}

impl AuthorityResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as text, with invalid UTF-8 replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// HTTP client for the authority's endpoints.
#[derive(Debug, Clone)]
pub struct AuthorityClient {
    http: reqwest::Client,
}

impl AuthorityClient {
    /// Create a client whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(Policy::none())
            .build()
            .map_err(|e| Error::InvalidConfig(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http })
    }

    /// Wrap an existing client, e.g. one with custom TLS roots.
    pub fn from_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    pub async fn get(
        &self,
        endpoint: &'static str,
        url: Url,
        query: &[(&str, &str)],
    ) -> Result<AuthorityResponse> {
        self.execute(endpoint, self.http.get(url).query(query)).await
    }

    pub async fn post_form(
        &self,
        endpoint: &'static str,
        url: Url,
        form: &[(&str, &str)],
    ) -> Result<AuthorityResponse> {
        self.execute(endpoint, self.http.post(url).form(form)).await
    }

    pub async fn delete(&self, endpoint: &'static str, url: Url) -> Result<AuthorityResponse> {
        self.execute(endpoint, self.http.delete(url)).await
    }

    async fn execute(
        &self,
        endpoint: &'static str,
        request: RequestBuilder,
    ) -> Result<AuthorityResponse> {
        let transport_failure = |e: reqwest::Error| Error::TransportFailure {
            endpoint: endpoint.to_string(),
            reason: if e.is_timeout() {
                "request timed out".to_string()
            } else {
                e.to_string()
            },
        };

        let response = request.send().await.map_err(transport_failure)?;
        let status = response.status().as_u16();
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await.map_err(transport_failure)?.to_vec();

        tracing::debug!(endpoint, status, bytes = body.len(), "Authority responded");
        Ok(AuthorityResponse {
            status,
            location,
            body,
        })
    }
}

/// Error for a response whose status the operation cannot use.
pub(crate) fn unexpected_status(endpoint: &'static str, response: &AuthorityResponse) -> Error {
    Error::TransportFailure {
        endpoint: endpoint.to_string(),
        reason: format!("unexpected HTTP status {}", response.status),
    }
}
