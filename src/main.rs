mod cli;
mod worker;

use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Consume(args) => worker::consume(args.operator_addr).await?,
        Commands::Sites(args) => worker::print_sites(args.site_id.as_deref())?,
    }

    Ok(())
}
