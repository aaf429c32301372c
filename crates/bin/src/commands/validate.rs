//! Validate command - redeems a service ticket at the CAS server.
//!
//! With `--callback-url`, a callback listener runs for the duration of the
//! validation so the server can deliver the proxy-granting ticket.

use cas_client::{CasClient, ValidationResult, callback::CallbackServer};

use crate::cli::ValidateArgs;
use crate::output::{OutputFormat, print_fields, print_json};

/// Run the validate command
pub async fn run(args: &ValidateArgs, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.callback.apply(args.authority.config()?);
    let client = CasClient::new(config)?;

    let mut server = CallbackServer::new();
    if args.callback.callback_url.is_some() {
        server
            .start(&args.callback.bind_address(), client.callback_router())
            .await?;
    }

    let result = client
        .validate(
            &args.ticket,
            &args.service,
            args.callback.callback_url(),
        )
        .await;

    if server.is_running() {
        server.stop().await?;
    }

    report(&result, format)?;
    match result.error {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

fn report(result: &ValidationResult, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => print_json(result),
        OutputFormat::Human => {
            let Some(user) = result.user() else {
                return Ok(());
            };
            let mut rows = vec![("User", user.to_string())];
            for (name, values) in result.attributes.iter() {
                rows.push((name, values.join(", ")));
            }
            if !result.proxies.is_empty() {
                rows.push(("Proxies", result.proxies.join(" -> ")));
            }
            match (&result.proxy_granting_ticket, &result.proxy_error) {
                (Some(pgt), _) => rows.push(("PGT", pgt.clone())),
                (None, Some(e)) => rows.push(("PGT", format!("not available ({e})"))),
                (None, None) => {}
            }
            print_fields(&rows);
            Ok(())
        }
    }
}
