//! Issue command - exchanges credentials for a proxy-granting ticket.

use cas_client::CasClient;

use crate::cli::IssueArgs;
use crate::output::{OutputFormat, print_json};

/// Run the issue command
pub async fn run(args: &IssueArgs, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = args.authority.config()?;
    for (key, value) in &args.params {
        config = config.with_restlet_param(key, value);
    }
    let client = CasClient::new(config)?;

    let pgt = client
        .issue(&args.username, &args.password, &args.service)
        .await?;

    match format {
        OutputFormat::Human => println!("{pgt}"),
        OutputFormat::Json => print_json(&serde_json::json!({
            "username": args.username,
            "proxy_granting_ticket": pgt,
        }))?,
    }
    Ok(())
}
