use clap::{Parser, Subcommand};
use std::net::SocketAddr;

#[derive(Parser, Debug)]
#[command(name = "scrapebox")]
#[command(about = "ScrapeBox scraping job dispatcher", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Consume jobs from RabbitMQ and dispatch them to site handlers
    Consume(ConsumeArgs),
    /// Print registered site handlers and their actions
    Sites(SitesArgs),
}

#[derive(clap::Args, Debug)]
pub struct ConsumeArgs {
    /// Serve the operator API on this address (overrides `server.bind_addr`)
    #[arg(long)]
    pub operator_addr: Option<SocketAddr>,
}

#[derive(clap::Args, Debug)]
pub struct SitesArgs {
    /// Only describe this site
    pub site_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_consume_with_operator_addr() {
        let cli = Cli::parse_from(["scrapebox", "consume", "--operator-addr", "127.0.0.1:9100"]);
        match cli.command {
            Commands::Consume(args) => {
                assert_eq!(args.operator_addr, Some("127.0.0.1:9100".parse().unwrap()));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_sites_filter() {
        let cli = Cli::parse_from(["scrapebox", "sites", "demo"]);
        assert!(matches!(
            cli.command,
            Commands::Sites(SitesArgs { site_id: Some(ref id) }) if id == "demo"
        ));
    }
}
