mod auth;
mod buildinfo;
mod cli;
mod error;
mod grafana;
mod logging;
mod metrics;
mod server;

use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match cli::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
