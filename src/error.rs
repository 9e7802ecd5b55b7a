use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::WWW_AUTHENTICATE},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::grafana::PayloadError;

/// Everything that can reject a webhook request.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("Not authenticated")]
    MissingCredentials,

    #[error("Incorrect username or password")]
    InvalidCredentials,

    #[error("Missing Content-Length header")]
    MissingContentLength,

    #[error("Invalid Content-Length header")]
    InvalidContentLength,

    #[error("Content too long")]
    ContentTooLong,

    #[error("Invalid payload: {0}")]
    InvalidPayload(#[from] PayloadError),

    #[error("Failed to read request body: {0}")]
    BodyRead(String),
}

impl WebhookError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingCredentials | Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::ContentTooLong => StatusCode::BAD_REQUEST,
            Self::MissingContentLength | Self::InvalidContentLength | Self::InvalidPayload(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::BodyRead(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Label used for the `outcome` dimension of the request counter.
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::MissingCredentials | Self::InvalidCredentials => "unauthorized",
            Self::ContentTooLong => "too_long",
            Self::MissingContentLength | Self::InvalidContentLength | Self::InvalidPayload(_) => {
                "invalid"
            }
            Self::BodyRead(_) => "error",
        }
    }

    fn detail(&self) -> serde_json::Value {
        match self {
            Self::InvalidPayload(e) => {
                let source = e.json_error();
                let kind = match source.classify() {
                    serde_json::error::Category::Data => "value_error",
                    serde_json::error::Category::Syntax | serde_json::error::Category::Eof => {
                        "json_invalid"
                    }
                    serde_json::error::Category::Io => "io_error",
                };
                let mut loc = vec![json!("body")];
                loc.extend(e.path().iter().cloned());
                json!([{
                    "loc": loc,
                    "msg": e.to_string(),
                    "type": kind,
                    "line": source.line(),
                    "column": source.column(),
                }])
            }
            Self::MissingContentLength | Self::InvalidContentLength => {
                let kind = match self {
                    Self::MissingContentLength => "missing",
                    _ => "int_parsing",
                };
                json!([{
                    "loc": ["header", "content-length"],
                    "msg": self.to_string(),
                    "type": kind,
                }])
            }
            // Internal details stay in the log.
            Self::BodyRead(_) => json!("Internal Server Error"),
            _ => json!(self.to_string()),
        }
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({ "detail": self.detail() }));
        let mut response = (status, body).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Basic"));
        }
        response
    }
}
