//! CLI argument definitions for the cas-client binary.

use std::time::Duration;

use cas_client::{
    CasConfig, CorrelationConfig, EndpointPaths,
    config::{
        DEFAULT_PROXY_CALLBACK_PATH, DEFAULT_PROXY_PATH, DEFAULT_SERVICE_VALIDATE_PATH,
        DEFAULT_TICKETS_PATH,
    },
};
use clap::{Parser, Subcommand};
use url::Url;

use crate::output::OutputFormat;

/// Loopback by default; see [`CallbackArgs::host`].
pub const DEFAULT_CALLBACK_HOST: &str = "127.0.0.1";

/// CAS client: service ticket validation, proxy tickets and restlet issuance
#[derive(Parser, Debug)]
#[command(name = "cas-client")]
#[command(about = "CAS client: validate service tickets, mint proxy tickets, issue restlet tickets")]
#[command(version)]
pub struct Cli {
    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn output_format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the proxy callback receiver and validation sidecar
    Serve(ServeArgs),
    /// Validate a service ticket
    Validate(ValidateArgs),
    /// Obtain a proxy ticket from a proxy-granting ticket
    Proxy(ProxyArgs),
    /// Exchange credentials for a proxy-granting ticket (restlet)
    Issue(IssueArgs),
    /// Revoke a restlet proxy-granting ticket
    Revoke(RevokeArgs),
    /// Check health of a running sidecar
    Health(HealthArgs),
}

/// Location of the CAS authority and its endpoints
#[derive(clap::Args, Debug, Clone)]
pub struct AuthorityArgs {
    /// Base URL of the CAS server
    #[arg(long = "server", env = "CAS_SERVER_URL")]
    pub server_url: String,

    /// Path (or absolute URL) of the XML validation endpoint
    #[arg(long, default_value = DEFAULT_SERVICE_VALIDATE_PATH, env = "CAS_SERVICE_VALIDATE_PATH")]
    pub service_validate_path: String,

    /// Path (or absolute URL) of the proxy ticket endpoint
    #[arg(long, default_value = DEFAULT_PROXY_PATH, env = "CAS_PROXY_PATH")]
    pub proxy_path: String,

    /// Path (or absolute URL) of the restlet tickets endpoint
    #[arg(long, default_value = DEFAULT_TICKETS_PATH, env = "CAS_TICKETS_PATH")]
    pub tickets_path: String,

    /// Timeout for each request to the CAS server, in milliseconds
    #[arg(long, default_value_t = 10_000, env = "CAS_REQUEST_TIMEOUT_MS")]
    pub request_timeout_ms: u64,
}

impl AuthorityArgs {
    /// Library configuration for these arguments.
    pub fn config(&self) -> cas_client::Result<CasConfig> {
        Ok(CasConfig::new(&self.server_url)?
            .with_paths(EndpointPaths {
                service_validate: self.service_validate_path.clone(),
                proxy: self.proxy_path.clone(),
                tickets: self.tickets_path.clone(),
                ..EndpointPaths::default()
            })
            .with_request_timeout(Duration::from_millis(self.request_timeout_ms)))
    }
}

/// Proxy callback settings
#[derive(clap::Args, Debug, Clone)]
pub struct CallbackArgs {
    /// Public URL the CAS server calls back with the proxy-granting ticket.
    /// Without it, validations do not request proxy capability.
    #[arg(long, env = "CAS_CALLBACK_URL")]
    pub callback_url: Option<Url>,

    /// Local route of the callback
    #[arg(long, default_value = DEFAULT_PROXY_CALLBACK_PATH, env = "CAS_CALLBACK_PATH")]
    pub callback_path: String,

    /// Bind address of the callback listener. The sidecar's /validate and
    /// /proxy routes hand out tickets to any caller, so only bind a public
    /// address behind a proxy that exposes the callback path alone.
    #[arg(long, default_value = DEFAULT_CALLBACK_HOST, env = "CAS_CALLBACK_HOST")]
    pub host: String,

    /// Port of the callback listener
    #[arg(short, long, default_value_t = 8080, env = "CAS_CALLBACK_PORT")]
    pub port: u16,

    /// How long a validation waits for its proxy-granting ticket, in milliseconds
    #[arg(long, default_value_t = 3_000, env = "CAS_WAIT_BUDGET_MS")]
    pub wait_budget_ms: u64,
}

impl CallbackArgs {
    pub fn callback_url(&self) -> Option<&str> {
        self.callback_url.as_ref().map(Url::as_str)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Apply the callback settings to `config`.
    pub fn apply(&self, config: CasConfig) -> CasConfig {
        let correlation = CorrelationConfig {
            wait_budget: Duration::from_millis(self.wait_budget_ms),
            ..config.correlation
        };
        let mut config = config.with_correlation(correlation);
        config.paths.proxy_callback = self.callback_path.clone();
        config
    }
}

/// Arguments for the serve command
#[derive(clap::Args, Debug)]
pub struct ServeArgs {
    #[command(flatten)]
    pub authority: AuthorityArgs,

    #[command(flatten)]
    pub callback: CallbackArgs,

    /// Age after which undelivered correlations are discarded, in seconds
    #[arg(long, default_value_t = 300, env = "CAS_MAX_ENTRY_AGE_SECS")]
    pub max_entry_age_secs: u64,

    /// Interval of the correlation sweep, in seconds
    #[arg(long, default_value_t = 60, env = "CAS_SWEEP_INTERVAL_SECS")]
    pub sweep_interval_secs: u64,
}

/// Arguments for the validate command
#[derive(clap::Args, Debug)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub authority: AuthorityArgs,

    #[command(flatten)]
    pub callback: CallbackArgs,

    /// Service ticket to validate
    #[arg(short, long)]
    pub ticket: String,

    /// Service URL the ticket was issued for
    #[arg(short, long, env = "CAS_SERVICE_URL")]
    pub service: String,
}

/// Arguments for the proxy command
#[derive(clap::Args, Debug)]
pub struct ProxyArgs {
    #[command(flatten)]
    pub authority: AuthorityArgs,

    /// Proxy-granting ticket
    #[arg(long)]
    pub pgt: String,

    /// Service the proxy ticket is for
    #[arg(short, long)]
    pub target: String,
}

/// Arguments for the issue command
#[derive(clap::Args, Debug)]
pub struct IssueArgs {
    #[command(flatten)]
    pub authority: AuthorityArgs,

    #[arg(short, long, env = "CAS_USERNAME")]
    pub username: String,

    #[arg(long, env = "CAS_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Service requesting the ticket, sent as `from`
    #[arg(long = "from", default_value = "", env = "CAS_SERVICE_URL")]
    pub service: String,

    /// Extra form parameter, as key=value. May be repeated.
    #[arg(long = "param", value_parser = parse_key_value)]
    pub params: Vec<(String, String)>,
}

/// Arguments for the revoke command
#[derive(clap::Args, Debug)]
pub struct RevokeArgs {
    #[command(flatten)]
    pub authority: AuthorityArgs,

    /// Proxy-granting ticket to revoke
    #[arg(long)]
    pub pgt: String,
}

/// Arguments for the health command
#[derive(clap::Args, Debug)]
pub struct HealthArgs {
    /// URL of the sidecar to check
    #[arg(long, default_value = "http://127.0.0.1:8080", env = "CAS_SIDECAR_URL")]
    pub url: String,

    /// Timeout in seconds
    #[arg(short, long, default_value_t = 5)]
    pub timeout: u64,
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got '{raw}'")),
    }
}
