use crate::demo::{run_bid, run_demo, BidArgs, DemoArgs};
use crate::server;
use bidsmith::error::AppError;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "bidsmith",
    about = "Analyse construction project documents and assemble priced bids",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Assemble a bid from extracted document text and a catalog CSV
    Bid(BidArgs),
    /// Run the full pipeline over a built-in sample project
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Per-document extraction timeout in seconds
    #[arg(long)]
    pub(crate) extraction_timeout_secs: Option<u64>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Bid(args) => run_bid(args).await,
        Command::Demo(args) => run_demo(args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn bid_command_accepts_document_paths() {
        let cli = Cli::try_parse_from([
            "bidsmith",
            "bid",
            "--specifications",
            "specs.txt",
            "--bid-forms",
            "bid.txt",
            "--catalog",
            "catalog.csv",
            "--json",
        ])
        .expect("arguments parse");

        match cli.command {
            Some(Command::Bid(args)) => {
                assert_eq!(args.specifications, Some(PathBuf::from("specs.txt")));
                assert_eq!(args.bid_forms, Some(PathBuf::from("bid.txt")));
                assert_eq!(args.construction_plans, None);
                assert_eq!(args.catalog, Some(PathBuf::from("catalog.csv")));
                assert!(args.json);
            }
            other => panic!("expected bid command, got {other:?}"),
        }
    }

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::try_parse_from(["bidsmith"]).expect("arguments parse");
        assert!(cli.command.is_none());
    }
}
