use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod output;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so command output stays parseable.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("cas_client=info".parse().unwrap()),
        )
        .with_writer(std::io::stderr)
        .init();

    let format = cli.output_format();
    let result = match &cli.command {
        Commands::Serve(args) => commands::serve::run(args).await,
        Commands::Validate(args) => commands::validate::run(args, format).await,
        Commands::Proxy(args) => commands::proxy::run(args, format).await,
        Commands::Issue(args) => commands::issue::run(args, format).await,
        Commands::Revoke(args) => commands::revoke::run(args, format).await,
        Commands::Health(args) => commands::health::run(args, format).await,
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
