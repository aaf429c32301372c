//! Health command - queries a running sidecar's correlation store.

use std::time::Duration;

use crate::cli::HealthArgs;
use crate::commands::serve::HealthResponse;
use crate::output::{OutputFormat, print_fields, print_json};

/// The `/health` URL for a sidecar base URL (or the health URL itself).
fn health_url(base: &str) -> String {
    let base = base.trim_end_matches('/');
    if base.ends_with("/health") {
        base.to_string()
    } else {
        format!("{base}/health")
    }
}

/// Fetch the sidecar's health report.
async fn fetch(url: &str, timeout: Duration) -> Result<HealthResponse, String> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| e.to_string())?;
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| format!("failed to connect to {url}: {e}"))?;
    if !response.status().is_success() {
        return Err(format!("sidecar returned HTTP status {}", response.status()));
    }
    response
        .json::<HealthResponse>()
        .await
        .map_err(|e| format!("unreadable health report: {e}"))
}

/// Run the health command
pub async fn run(args: &HealthArgs, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let url = health_url(&args.url);
    let report = match fetch(&url, Duration::from_secs(args.timeout)).await {
        Ok(report) if report.is_healthy() => report,
        Ok(report) => {
            eprintln!("unhealthy: sidecar reported status {}", report.status);
            std::process::exit(1);
        }
        Err(reason) => {
            eprintln!("unhealthy: {reason}");
            std::process::exit(1);
        }
    };

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Human => print_fields(&[
            ("Status", report.status.clone()),
            ("Unclaimed PGTs", report.pending_correlations.to_string()),
            ("Waiting validations", report.waiting_resolvers.to_string()),
        ]),
    }
    Ok(())
}
