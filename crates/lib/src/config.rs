//! Client configuration.
//!
//! [`CasConfig`] names the authority, the paths of its endpoints, and the
//! timing knobs of the correlation store. Paths are either relative to the
//! server URL (`/cas/proxy`) or absolute URLs, which are used verbatim.

use std::time::Duration;

use url::Url;

use crate::{Error, Result};

/// Default path of the XML validation endpoint.
pub const DEFAULT_SERVICE_VALIDATE_PATH: &str = "/cas/serviceValidate";
/// Default path of the proxy ticket endpoint.
pub const DEFAULT_PROXY_PATH: &str = "/cas/proxy";
/// Default path of the restlet tickets endpoint.
pub const DEFAULT_TICKETS_PATH: &str = "/cas/v1/tickets";
/// Default path at which this client receives PGT callbacks.
pub const DEFAULT_PROXY_CALLBACK_PATH: &str = "/cas/proxyCallback";

/// Default time a validation waits for its PGT callback.
pub const DEFAULT_WAIT_BUDGET: Duration = Duration::from_secs(3);
/// Default age after which an unclaimed correlation entry is purged.
pub const DEFAULT_MAX_ENTRY_AGE: Duration = Duration::from_secs(5 * 60);
/// Default interval of the background sweeper.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
/// Default timeout for a single request to the authority.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Paths of the authority endpoints and of the local callback route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointPaths {
    pub service_validate: String,
    pub proxy: String,
    pub tickets: String,
    /// Route served by this client; only the path component is used for routing.
    pub proxy_callback: String,
}

impl Default for EndpointPaths {
    fn default() -> Self {
        Self {
            service_validate: DEFAULT_SERVICE_VALIDATE_PATH.to_string(),
            proxy: DEFAULT_PROXY_PATH.to_string(),
            tickets: DEFAULT_TICKETS_PATH.to_string(),
            proxy_callback: DEFAULT_PROXY_CALLBACK_PATH.to_string(),
        }
    }
}

/// Timing of the PGT correlation bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorrelationConfig {
    /// How long a validation waits for the callback carrying its PGT.
    pub wait_budget: Duration,
    /// Entries older than this are purged whether or not anyone asked for them.
    pub max_entry_age: Duration,
    /// How often the background sweeper runs.
    pub sweep_interval: Duration,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            wait_budget: DEFAULT_WAIT_BUDGET,
            max_entry_age: DEFAULT_MAX_ENTRY_AGE,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

/// Configuration of a [`crate::CasClient`].
#[derive(Debug, Clone)]
pub struct CasConfig {
    /// Base URL of the CAS authority, e.g. `https://cas.example.com`.
    pub server_url: Url,
    pub paths: EndpointPaths,
    /// Timeout applied to every outbound request.
    pub request_timeout: Duration,
    pub correlation: CorrelationConfig,
    /// Extra form parameters sent with every restlet issuance request.
    pub restlet_params: Vec<(String, String)>,
}

impl CasConfig {
    /// Create a configuration with default paths and timings.
    pub fn new(server_url: &str) -> Result<Self> {
        let server_url = Url::parse(server_url)
            .map_err(|e| Error::InvalidConfig(format!("server url '{server_url}': {e}")))?;
        if server_url.cannot_be_a_base() {
            return Err(Error::InvalidConfig(format!(
                "server url '{server_url}' cannot carry a path"
            )));
        }
        Ok(Self {
            server_url,
            paths: EndpointPaths::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            correlation: CorrelationConfig::default(),
            restlet_params: Vec::new(),
        })
    }

    /// Override the endpoint paths.
    pub fn with_paths(mut self, paths: EndpointPaths) -> Self {
        self.paths = paths;
        self
    }

    /// Override the per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Override the correlation timings.
    pub fn with_correlation(mut self, correlation: CorrelationConfig) -> Self {
        self.correlation = correlation;
        self
    }

    /// Add a form parameter to every restlet issuance request.
    pub fn with_restlet_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.restlet_params.push((key.into(), value.into()));
        self
    }

    /// URL of the XML validation endpoint.
    pub fn service_validate_url(&self) -> Result<Url> {
        self.endpoint(&self.paths.service_validate)
    }

    /// URL of the proxy ticket endpoint.
    pub fn proxy_url(&self) -> Result<Url> {
        self.endpoint(&self.paths.proxy)
    }

    /// URL of the restlet tickets collection.
    pub fn tickets_url(&self) -> Result<Url> {
        self.endpoint(&self.paths.tickets)
    }

    /// Resolve a configured path against the server URL.
    ///
    /// Absolute URLs are returned unchanged. Relative paths are appended to the
    /// server URL, keeping any path prefix it carries.
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        if let Ok(absolute) = Url::parse(path) {
            return Ok(absolute);
        }
        let base = self.server_url.as_str().trim_end_matches('/');
        let joined = if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        };
        Url::parse(&joined).map_err(|e| Error::InvalidConfig(format!("endpoint '{joined}': {e}")))
    }
}
