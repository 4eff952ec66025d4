use anyhow::Result;
use clap::{Parser, Subcommand};
use murmur_backend::config::MurmurConfig;
use murmur_backend::node::MurmurNode;
use murmur_backend::{bootstrap, reputation, telemetry};

#[derive(Parser)]
#[command(author, version, about = "Murmur backend daemon")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (Axum) for REST access
    Serve,
    /// Run a single reputation decay sweep and exit
    Decay,
}

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_tracing();

    let args = Args::parse();
    let config = MurmurConfig::from_env()?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let node = MurmurNode::start(config)?;
            node.run_http_server().await
        }
        Command::Decay => {
            let resources = bootstrap::initialize(&config)?;
            let updated = reputation::run_cycle(&resources.database)?;
            tracing::info!(updated, "reputation decay sweep finished");
            Ok(())
        }
    }
}
