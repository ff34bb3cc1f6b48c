//! gpubroker CLI
//!
//! Command-line interface for claiming and releasing GPUs on a gpubroker daemon.

mod commands;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// gpubroker - GPU lease broker client
#[derive(Parser, Debug)]
#[command(name = "gpubroker")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Daemon API address
    #[arg(long, default_value = "http://localhost:8080", global = true)]
    api: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show every GPU and who holds it
    Status,

    /// Claim a GPU
    Claim {
        /// User to claim for
        user: String,
    },

    /// Release a user's GPU
    Release {
        /// User whose GPU to release
        user: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    let client = commands::ApiClient::new(&cli.api);

    match cli.command {
        Commands::Status => {
            commands::status(&client).await?;
        }
        Commands::Claim { user } => {
            commands::claim(&client, user).await?;
        }
        Commands::Release { user } => {
            commands::release(&client, user).await?;
        }
    }

    Ok(())
}
