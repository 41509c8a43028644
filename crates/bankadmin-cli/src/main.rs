//! bankadmin - terminal front end for the bank CMS admin console.
//!
//! Signs in against the CMS backend, keeps the session token between runs,
//! and reports or watches the session state from the command line.

mod app;
mod shell;

use std::io;

use anyhow::Result;
use bankadmin_core::Route;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use app::App;

#[derive(Parser)]
#[command(name = "bankadmin", version, about = "Bank CMS admin console session client")]
struct Cli {
    /// Backend base URL (overrides the config file)
    #[arg(long, env = "BANKADMIN_API_URL", global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in and store the session token
    Login {
        #[arg(short, long, env = "BANKADMIN_USERNAME")]
        username: Option<String>,
    },
    /// End the session and remove the stored token
    Logout,
    /// Show who is signed in and when the session expires
    Status {
        /// Print the decoded claims as JSON
        #[arg(long)]
        json: bool,
    },
    /// Re-validate the stored token with the backend
    Verify,
    /// Check whether a console view may be opened
    Open { route: Route },
    /// Stay attached until the session ends or Ctrl+C
    Watch,
}

/// Initialize the tracing subscriber for logging
fn init_tracing() -> WorkerGuard {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let (writer, guard) = tracing_appender::non_blocking(io::stderr());

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer))
        .with(filter)
        .init();
    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _log_guard = init_tracing();
    info!("bankadmin starting");

    let mut app = App::new(cli.api_url)?;

    let result = match cli.command {
        Command::Login { username } => app.login(username).await,
        Command::Logout => {
            app.logout();
            Ok(())
        }
        Command::Status { json } => app.status(json),
        Command::Verify => app.verify().await,
        Command::Open { route } => {
            app.open(route);
            Ok(())
        }
        Command::Watch => app.watch().await,
    };

    app.shutdown();
    info!("bankadmin shutting down");
    result
}
