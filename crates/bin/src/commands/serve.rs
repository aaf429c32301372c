//! Serve command - runs the proxy callback receiver as a sidecar.
//!
//! The sidecar owns the correlation store, so validations that request proxy
//! capability must go through it as well:
//!
//! ```text
//! GET /health                                  - liveness and store size
//! GET /validate?ticket=..&service=..           - validate a service ticket
//! GET /proxy?pgt=..&targetService=..           - mint a proxy ticket
//! GET|POST <callback path>?pgtIou=..&pgtId=..  - PGT delivery from the CAS server
//! ```

use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    routing::get,
};
use cas_client::{CasClient, Error, ErrorKind, ProxyResult, ValidationResult};
use serde::{Deserialize, Serialize};
use tokio::signal::unix::{SignalKind, signal};

use crate::cli::ServeArgs;

/// Shared application state
#[derive(Clone)]
struct AppState {
    client: CasClient,
    callback_url: Option<String>,
}

#[derive(Deserialize)]
struct ValidateParams {
    #[serde(default)]
    ticket: String,
    #[serde(default)]
    service: String,
}

#[derive(Deserialize)]
struct ProxyParams {
    #[serde(default)]
    pgt: String,
    #[serde(default, rename = "targetService")]
    target_service: String,
}

/// Health check response, also read back by the health command
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    /// Delivered PGTs no validation has claimed yet
    pub pending_correlations: usize,
    /// Validations currently waiting for their callback
    pub waiting_resolvers: usize,
}

impl HealthResponse {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// Run the sidecar
pub async fn run(args: &ServeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = args.callback.apply(args.authority.config()?);
    config.correlation.max_entry_age = Duration::from_secs(args.max_entry_age_secs);
    config.correlation.sweep_interval = Duration::from_secs(args.sweep_interval_secs);
    let client = CasClient::new(config)?;

    let sweeper = client.spawn_sweeper();

    let app_state = AppState {
        client: client.clone(),
        callback_url: args.callback.callback_url().map(str::to_string),
    };
    let app = Router::new()
        .route("/health", get(handle_health_endpoint))
        .route("/validate", get(handle_validate))
        .route("/proxy", get(handle_proxy))
        .with_state(app_state)
        .merge(client.callback_router());

    let listener = tokio::net::TcpListener::bind(args.callback.bind_address()).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(
        address = %local_addr,
        server = %client.config().server_url,
        "CAS client sidecar listening"
    );
    println!("CAS client sidecar listening on http://{local_addr}");
    println!();
    println!("Available endpoints:");
    println!("  GET  /health       - Health check");
    println!("  GET  /validate     - Validate a service ticket");
    println!("  GET  /proxy        - Obtain a proxy ticket");
    println!(
        "  GET  {:<13} - Proxy-granting ticket callback",
        client.config().paths.proxy_callback
    );
    match &args.callback.callback_url {
        Some(url) => println!("\nProxy callback URL: {url}"),
        None => println!("\nNo --callback-url set; validations will not request proxy tickets"),
    }
    println!();
    println!("Press Ctrl+C to shutdown");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let mut sigterm =
                signal(SignalKind::terminate()).expect("failed to set up SIGTERM handler");
            let mut sigint =
                signal(SignalKind::interrupt()).expect("failed to set up SIGINT handler");

            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM, initiating graceful shutdown..."),
                _ = sigint.recv() => tracing::info!("Received SIGINT, initiating graceful shutdown..."),
            }
        })
        .await?;

    sweeper.abort();
    tracing::info!(
        discarded = client.store().len(),
        "Unclaimed proxy-granting tickets dropped at shutdown"
    );
    println!("Server shut down");
    Ok(())
}

/// HTTP status for a failed operation.
fn status_for(error: &Error) -> StatusCode {
    match error.kind() {
        ErrorKind::PreconditionFailed => StatusCode::BAD_REQUEST,
        ErrorKind::AuthorityRejected | ErrorKind::CredentialRejected => StatusCode::FORBIDDEN,
        ErrorKind::TransportFailure => StatusCode::BAD_GATEWAY,
        ErrorKind::CorrelationTimeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::Configuration => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Handler for GET /health
async fn handle_health_endpoint(State(state): State<AppState>) -> Json<HealthResponse> {
    let store = state.client.store();
    Json(HealthResponse {
        status: "healthy".to_string(),
        pending_correlations: store.len(),
        waiting_resolvers: store.pending_resolvers(),
    })
}

/// Handler for GET /validate
async fn handle_validate(
    State(state): State<AppState>,
    Query(params): Query<ValidateParams>,
) -> (StatusCode, Json<ValidationResult>) {
    let result = state
        .client
        .validate(
            &params.ticket,
            &params.service,
            state.callback_url.as_deref(),
        )
        .await;
    let status = result.error.as_ref().map_or(StatusCode::OK, status_for);
    (status, Json(result))
}

/// Handler for GET /proxy
async fn handle_proxy(
    State(state): State<AppState>,
    Query(params): Query<ProxyParams>,
) -> (StatusCode, Json<ProxyResult>) {
    let result = state
        .client
        .proxy_ticket(&params.pgt, &params.target_service)
        .await;
    let status = result.error.as_ref().map_or(StatusCode::OK, status_for);
    (status, Json(result))
}
