//! CloudHost CLI - Main entry point

mod cli;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// CloudHost - host app sources as supervised background processes
#[derive(Parser, Debug)]
#[command(name = "cloudhost")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Owner id to act as
    #[arg(short, long, default_value = "local")]
    owner: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Host a new instance from a zip archive URL or a git repository
    Host {
        /// Zip archive URL
        #[arg(long)]
        zip_url: Option<String>,

        /// File name of the zip archive (names the instance)
        #[arg(long, requires = "zip_url")]
        zip_name: Option<String>,

        /// Git repository URL
        #[arg(long)]
        repo: Option<String>,

        /// Environment variable as NAME=VALUE (repeatable)
        #[arg(long = "env", value_name = "NAME=VALUE")]
        env: Vec<String>,
    },
    /// List your hosted instances and their state
    List,
    /// Show one instance's state
    Status { id: String },
    /// Start a stopped instance
    Start { id: String },
    /// Stop a running instance
    Stop { id: String },
    /// Restart an instance (stop if running, then start)
    Restart { id: String },
    /// Delete an instance and its files
    Delete { id: String },
    /// Check your premium entitlement
    Premium,
    /// Grant premium to an owner (admin only)
    AddPremium { target: String },
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    if let Err(e) = cli::run(&args.owner, args.command).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
