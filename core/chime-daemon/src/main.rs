//! chime daemon entrypoint.
//!
//! A small single-purpose service: it listens on a Unix socket for host
//! lifecycle events, arbitrates racing idle/error outcomes, and emits at
//! most one desktop notification (and sound) per event. All state is
//! in-memory; restarting the daemon simply starts arbitration fresh.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod logging;
mod lookup;
mod notify;
mod service;
mod sound;

#[derive(Parser)]
#[command(name = "chime-daemon")]
#[command(about = "Session lifecycle notification daemon")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the daemon (binds the Unix socket and serves events)
    Run {
        /// Socket path override
        #[arg(long)]
        socket: Option<PathBuf>,

        /// Config file override
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print the resolved configuration file path
    ConfigPath,
}

#[tokio::main]
async fn main() {
    let _logging_guard = logging::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { socket, config } => {
            if let Err(err) = service::run(socket, config).await {
                tracing::error!(error = %err, "chime daemon failed");
                std::process::exit(1);
            }
        }
        Commands::ConfigPath => match chime_core::config::default_config_path() {
            Some(path) => println!("{}", path.display()),
            None => {
                eprintln!("No config directory available on this platform");
                std::process::exit(1);
            }
        },
    }
}
