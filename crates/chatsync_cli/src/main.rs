//! chatsync CLI
//!
//! Runs the sync server and maintains its storage file.
//!
//! # Commands
//!
//! - `serve` - Run the sync server
//! - `inspect` - Display per-token record counts
//! - `purge-tombstones` - Physically remove old tombstones
//! - `version` - Show version information

mod commands;

use chatsync_server::DEFAULT_PORT;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// chatsync reconciliation server and storage tools.
#[derive(Parser)]
#[command(name = "chatsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the sync server
    Serve {
        /// Address to listen on (overrides --port)
        #[arg(short, long)]
        listen: Option<SocketAddr>,

        /// Port to listen on, on all interfaces
        #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
        port: u16,

        /// Storage file
        #[arg(short, long, env = "CHATSYNC_STORAGE", default_value = "storage.json")]
        storage: PathBuf,

        /// Seconds between backstop saves
        #[arg(long, default_value_t = 300)]
        save_interval_secs: u64,

        /// Maximum request body size in bytes
        #[arg(long, default_value_t = 32 * 1024 * 1024)]
        max_body_size: usize,
    },

    /// Display per-token record counts
    Inspect {
        /// Storage file
        #[arg(short, long, env = "CHATSYNC_STORAGE", default_value = "storage.json")]
        storage: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Physically remove tombstones older than a cutoff
    PurgeTombstones {
        /// Storage file
        #[arg(short, long, env = "CHATSYNC_STORAGE", default_value = "storage.json")]
        storage: PathBuf,

        /// Remove tombstones deleted more than this many days ago
        #[arg(long)]
        older_than_days: u64,

        /// Dry run - show what would be removed
        #[arg(short, long)]
        dry_run: bool,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Serve {
            listen,
            port,
            storage,
            save_interval_secs,
            max_body_size,
        } => {
            let addr = listen.unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], port)));
            commands::serve::run(addr, storage, save_interval_secs, max_body_size)?;
        }
        Commands::Inspect { storage, format } => {
            commands::inspect::run(&storage, &format)?;
        }
        Commands::PurgeTombstones {
            storage,
            older_than_days,
            dry_run,
        } => {
            commands::purge::run(&storage, older_than_days, dry_run)?;
        }
        Commands::Version => {
            println!("chatsync v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn serve_defaults() {
        let cli = Cli::try_parse_from(["chatsync", "serve", "--port", "9000"]).unwrap();
        match cli.command {
            Commands::Serve {
                listen,
                port,
                save_interval_secs,
                ..
            } => {
                assert!(listen.is_none());
                assert_eq!(port, 9000);
                assert_eq!(save_interval_secs, 300);
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn purge_requires_cutoff() {
        assert!(Cli::try_parse_from(["chatsync", "purge-tombstones", "-s", "x.json"]).is_err());
        assert!(Cli::try_parse_from([
            "chatsync",
            "purge-tombstones",
            "-s",
            "x.json",
            "--older-than-days",
            "30",
            "--dry-run"
        ])
        .is_ok());
    }
}
