use crate::auth::StaticCredentials;
use crate::grafana::WebhookPayload;
use crate::logging::{self, LogFormat};
use crate::metrics::setup_metrics;
use crate::server::{self, DEFAULT_MAX_CONTENT_LENGTH, ServerConfig};
use clap::Parser;
use std::error::Error;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::TcpListener;
#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::oneshot;
use tracing::{error, info};

/// Webhook listener for Grafana alert notifications
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Start the webhook listener
    Serve {
        /// Address to bind to
        #[arg(long, env = "MG_WEBHOOK_BIND", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
        bind: IpAddr,

        /// The port to listen on
        #[arg(short, long, env = "MG_WEBHOOK_PORT", default_value_t = 8000)]
        port: u16,

        /// Service name used for the log sink and /status
        #[arg(long, env = "MG_WEBHOOK_APP_NAME", default_value = "mg-webhook")]
        app_name: String,

        /// Username callers must present via HTTP Basic auth
        #[arg(long, env = "MG_WEBHOOK_USERNAME", default_value = "admin")]
        username: String,

        /// Password callers must present via HTTP Basic auth
        #[arg(long, env = "MG_WEBHOOK_PASSWORD", hide_env_values = true)]
        password: String,

        /// Largest accepted Content-Length in bytes
        #[arg(long, env = "MG_WEBHOOK_MAX_CONTENT_LENGTH", default_value_t = DEFAULT_MAX_CONTENT_LENGTH)]
        max_content_length: u64,

        /// Log line format
        #[arg(long, env = "MG_WEBHOOK_LOG_FORMAT", default_value_t = LogFormat::Plain)]
        log_format: LogFormat,
    },
    /// Check a webhook payload file against the schema
    Validate {
        /// JSON file holding a Grafana webhook payload
        file: PathBuf,
    },
}

pub async fn run() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    match args.command {
        Command::Serve {
            bind,
            port,
            app_name,
            username,
            password,
            max_content_length,
            log_format,
        } => {
            logging::init(log_format)?;

            let config = ServerConfig {
                app_name,
                verifier: Arc::new(StaticCredentials::new(username, password)),
                max_content_length,
                prometheus_handle: setup_metrics(),
            };

            let addr = SocketAddr::new(bind, port);
            let listener = TcpListener::bind(&addr).await?;

            let (tx, rx) = oneshot::channel();
            tokio::spawn(async move {
                wait_for_shutdown().await;
                tx.send(()).ok();
            });

            server::start_server(listener, rx, config).await?;
            Ok(())
        }
        Command::Validate { file } => {
            let payload = validate_file(&file)?;
            println!("Receiver: {}", payload.receiver);
            println!("Status: {}", payload.status);
            println!("Alerts: {}", payload.alerts.len());
            Ok(())
        }
    }
}

/// Resolves on Ctrl-C, or on SIGTERM where the platform has it.
///
/// A signal that cannot be listened for never fires; the other one still
/// stops the server.
async fn wait_for_shutdown() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl-C, shutting down"),
            Err(e) => {
                error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, shutting down");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

fn validate_file(file: &Path) -> Result<WebhookPayload, Box<dyn Error>> {
    let body = std::fs::read(file).map_err(|e| format!("{}: {}", file.display(), e))?;
    let payload =
        WebhookPayload::from_slice(&body).map_err(|e| format!("{}: {}", file.display(), e))?;
    Ok(payload)
}
