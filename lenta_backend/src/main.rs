use anyhow::Result;
use clap::{Parser, Subcommand};
use lenta_backend::config::LentaConfig;
use lenta_backend::node::LentaNode;
use lenta_backend::telemetry;
use lenta_backend::utils;

#[derive(Parser)]
#[command(author, version, about = "Lenta social feed backend")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (Axum) for REST/API access
    Serve,
    /// Create the data directories and apply database migrations, then exit
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    utils::print_banner();
    telemetry::init_tracing();

    let args = Args::parse();

    let config = LentaConfig::from_env()?;
    let node = LentaNode::start(config)?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => node.run_http_server().await,
        Command::Migrate => {
            tracing::info!(db_path = %node.config().paths.db_path.display(), "migrations applied");
            Ok(())
        }
    }
}
