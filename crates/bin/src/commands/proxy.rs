//! Proxy command - mints a proxy ticket for a target service.

use cas_client::CasClient;

use crate::cli::ProxyArgs;
use crate::output::{OutputFormat, print_json};

/// Run the proxy command
pub async fn run(args: &ProxyArgs, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let client = CasClient::new(args.authority.config()?)?;
    let result = client.proxy_ticket(&args.pgt, &args.target).await;

    if format == OutputFormat::Json {
        print_json(&result)?;
    }
    let proxy_ticket = result.into_result()?;
    if format == OutputFormat::Human {
        println!("{proxy_ticket}");
    }
    Ok(())
}
