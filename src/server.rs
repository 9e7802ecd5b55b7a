use crate::auth::{CredentialVerifier, Credentials};
use crate::buildinfo;
use crate::error::WebhookError;
use crate::grafana::{WebhookPayload, WebhookResponse};
use crate::metrics;
use axum::body::{Body, Bytes};
use axum::extract::Request;
use axum::http::HeaderMap;
use axum::http::header::CONTENT_LENGTH;
use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use http_body_util::LengthLimitError;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, info_span};

/// Largest body `POST /webhook` accepts, going by the declared `Content-Length`.
pub const DEFAULT_MAX_CONTENT_LENGTH: u64 = 1_000_000;

pub struct ServerConfig {
    /// Service name attached to every request span.
    pub app_name: String,
    pub verifier: Arc<dyn CredentialVerifier>,
    pub max_content_length: u64,
    pub prometheus_handle: PrometheusHandle,
}

#[derive(Clone)]
pub struct AppState {
    app_name: Arc<str>,
    verifier: Arc<dyn CredentialVerifier>,
    max_content_length: u64,
    prometheus_handle: PrometheusHandle,
    start_time: Instant,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            app_name: Arc::from(config.app_name),
            verifier: config.verifier,
            max_content_length: config.max_content_length,
            prometheus_handle: config.prometheus_handle,
            start_time: Instant::now(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let service = state.app_name.clone();
    Router::new()
        .route("/webhook", post(webhook_handler))
        .route("/metrics", get(metrics_handler))
        .route("/status", get(status_handler))
        .layer(
            TraceLayer::new_for_http().make_span_with(move |request: &Request| {
                info_span!(
                    "request",
                    service = %service,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        .with_state(state)
}

pub async fn start_server(
    listener: TcpListener,
    shutdown_signal: oneshot::Receiver<()>,
    config: ServerConfig,
) -> std::io::Result<()> {
    metrics::record_start();

    let state = AppState::new(config);
    let app_name = state.app_name.clone();
    let app = router(state);

    let addr = listener.local_addr()?;
    info!("{} ({}) listening on {}", app_name, buildinfo::version_full(), addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_signal.await.ok();
        })
        .await?;

    info!("{} stopped", app_name);
    Ok(())
}

/// Checks the Basic credentials of a request against the configured verifier.
fn authenticate(verifier: &dyn CredentialVerifier, headers: &HeaderMap) -> Result<(), WebhookError> {
    let credentials = Credentials::from_headers(headers)?;
    if verifier.verify(&credentials) {
        Ok(())
    } else {
        Err(WebhookError::InvalidCredentials)
    }
}

fn declared_content_length(headers: &HeaderMap) -> Result<u64, WebhookError> {
    headers
        .get(CONTENT_LENGTH)
        .ok_or(WebhookError::MissingContentLength)?
        .to_str()
        .map_err(|_| WebhookError::InvalidContentLength)?
        .trim()
        .parse::<u64>()
        .map_err(|_| WebhookError::InvalidContentLength)
}

/// Buffers the body, refusing to hold more than `max_content_length` bytes
/// whatever the declared length said.
async fn read_body(body: Body, max_content_length: u64) -> Result<Bytes, WebhookError> {
    let limit = usize::try_from(max_content_length).unwrap_or(usize::MAX);
    axum::body::to_bytes(body, limit).await.map_err(|e| {
        let source = e.into_inner();
        if source.is::<LengthLimitError>() {
            WebhookError::ContentTooLong
        } else {
            WebhookError::BodyRead(source.to_string())
        }
    })
}

async fn receive_webhook(
    state: &AppState,
    headers: &HeaderMap,
    body: Body,
) -> Result<WebhookResponse, WebhookError> {
    if let Err(e) = authenticate(state.verifier.as_ref(), headers) {
        error!("Authentication failed: {}", e);
        return Err(e);
    }

    let content_length = declared_content_length(headers)?;
    if content_length > state.max_content_length {
        error!("Content too long");
        return Err(WebhookError::ContentTooLong);
    }

    let body = match read_body(body, state.max_content_length).await {
        Ok(body) => body,
        Err(e) => {
            error!("{}", e);
            return Err(e);
        }
    };
    info!("{}", String::from_utf8_lossy(&body));

    let payload = WebhookPayload::from_slice(&body).inspect_err(|e| {
        debug!("Rejected webhook payload: {}", e);
    })?;

    info!("Receiver: {}", payload.receiver);
    info!("Status: {}", payload.status);
    metrics::record_alerts(payload.alerts.len());

    Ok(WebhookResponse::ok())
}

async fn webhook_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> Result<Json<WebhookResponse>, WebhookError> {
    metrics::record_request("/webhook");

    let result = receive_webhook(&state, &headers, body).await;
    let outcome = match &result {
        Ok(_) => "ok",
        Err(e) => e.outcome(),
    };
    metrics::record_outcome(outcome);

    result.map(Json)
}

async fn metrics_handler(State(state): State<AppState>) -> String {
    metrics::record_request("/metrics");
    state.prometheus_handle.render()
}

#[derive(Debug, Serialize)]
struct StatusReport {
    name: String,
    version: &'static str,
    uptime: String,
}

async fn status_handler(State(state): State<AppState>) -> Json<StatusReport> {
    metrics::record_request("/status");
    Json(StatusReport {
        name: state.app_name.to_string(),
        version: buildinfo::version(),
        uptime: format_uptime(state.start_time.elapsed()),
    })
}

fn format_uptime(duration: std::time::Duration) -> String {
    let total_secs = duration.as_secs();
    let days = total_secs / 86400;
    let hours = (total_secs % 86400) / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if days > 0 {
        format!("{}d {}h {}m {}s", days, hours, minutes, seconds)
    } else if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
