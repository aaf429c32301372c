//! Revoke command - deletes a restlet proxy-granting ticket.

use cas_client::CasClient;

use crate::cli::RevokeArgs;
use crate::output::{OutputFormat, print_json};

/// Run the revoke command
pub async fn run(args: &RevokeArgs, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let client = CasClient::new(args.authority.config()?)?;
    client.revoke(&args.pgt).await?;

    match format {
        OutputFormat::Human => println!("revoked"),
        OutputFormat::Json => print_json(&serde_json::json!({ "revoked": true }))?,
    }
    Ok(())
}
