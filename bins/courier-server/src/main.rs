mod cmd;
mod config;
mod error;
mod handler;
mod request;

use std::process::ExitCode;

use clap::Parser;
use config::{Cli, Commands};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Serve(args) => {
            tracing::info!(version = env!("CARGO_PKG_VERSION"), "courier-server");
            cmd::serve::run(args).await
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "courier-server stopped with an error");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
