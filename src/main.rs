use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod backend;
mod commands;
mod config;
mod controller;
mod images;
mod level;
mod onboarding;
mod sandbox;
mod session;
mod ui;

#[derive(Parser)]
#[command(name = "warplay")]
#[command(
    author,
    version,
    about = "Wargame session launcher - level-gated CTF sandboxes over Docker"
)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the wargame session (default when no command is given)
    Play,

    /// Show the stored username, server-side level, and local image availability
    Status,

    /// Reset the stored user (currently disabled server-side)
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("warplay=debug")
    } else {
        EnvFilter::new("warplay=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match cli.command.unwrap_or(Commands::Play) {
        Commands::Play => {
            commands::play::run().await?;
        }
        Commands::Status => {
            commands::status::run().await?;
        }
        Commands::Reset => {
            commands::reset::run();
        }
    }

    Ok(())
}
