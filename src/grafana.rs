//! Grafana unified alerting webhook payload.
//!
//! Every member is required. A missing member or a type mismatch rejects the
//! whole document; unknown members such as `groupLabels` are ignored.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_path_to_error::Segment;
use std::fmt;

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct AlertLabels {
    pub alertname: String,
    pub instance: String,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct AlertAnnotations {
    pub summary: String,
}

/// A single alert instance inside a notification.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Alert {
    pub status: String,
    pub labels: AlertLabels,
    pub annotations: AlertAnnotations,
    #[serde(rename = "startsAt")]
    pub starts_at: DateTime<FixedOffset>,
    /// Grafana sends `0001-01-01T00:00:00Z` while an alert is still firing.
    #[serde(rename = "endsAt")]
    pub ends_at: DateTime<FixedOffset>,
    #[serde(rename = "generatorURL")]
    pub generator_url: String,
    pub fingerprint: String,
    #[serde(rename = "silenceURL")]
    pub silence_url: String,
    #[serde(rename = "dashboardURL")]
    pub dashboard_url: String,
    #[serde(rename = "panelURL")]
    pub panel_url: String,
    #[serde(rename = "valueString")]
    pub value_string: String,
}

/// Top-level request body of `POST /webhook`.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct WebhookPayload {
    pub receiver: String,
    pub status: String,
    pub alerts: Vec<Alert>,
    #[serde(rename = "commonLabels")]
    pub common_labels: AlertLabels,
    #[serde(rename = "commonAnnotations")]
    pub common_annotations: AlertAnnotations,
    pub version: String,
    #[serde(rename = "groupKey")]
    pub group_key: String,
    #[serde(rename = "externalURL")]
    pub external_url: String,
    #[serde(rename = "truncatedAlerts")]
    pub truncated_alerts: u64,
    #[serde(rename = "orgId")]
    pub org_id: i64,
    pub title: String,
    pub state: String,
    pub message: String,
}

impl WebhookPayload {
    pub fn from_slice(body: &[u8]) -> Result<Self, PayloadError> {
        let mut de = serde_json::Deserializer::from_slice(body);
        let payload = serde_path_to_error::deserialize(&mut de).map_err(PayloadError::from)?;
        // Trailing characters after the document.
        de.end().map_err(PayloadError::at_root)?;
        Ok(payload)
    }
}

/// A document that does not match [`WebhookPayload`], with the location of
/// the offending member.
#[derive(Debug)]
pub struct PayloadError {
    path: Vec<serde_json::Value>,
    dotted: String,
    source: serde_json::Error,
}

impl PayloadError {
    fn at_root(source: serde_json::Error) -> Self {
        Self {
            path: Vec::new(),
            dotted: String::new(),
            source,
        }
    }

    /// Member names and array indices leading to the offending value.
    pub fn path(&self) -> &[serde_json::Value] {
        &self.path
    }

    pub fn json_error(&self) -> &serde_json::Error {
        &self.source
    }
}

impl From<serde_path_to_error::Error<serde_json::Error>> for PayloadError {
    fn from(err: serde_path_to_error::Error<serde_json::Error>) -> Self {
        let path: Vec<serde_json::Value> = err
            .path()
            .iter()
            .filter_map(|segment| match segment {
                Segment::Seq { index } => Some(serde_json::Value::from(*index)),
                Segment::Map { key } => Some(serde_json::Value::from(key.as_str())),
                Segment::Enum { variant } => Some(serde_json::Value::from(variant.as_str())),
                Segment::Unknown => None,
            })
            .collect();
        let dotted = if path.is_empty() {
            String::new()
        } else {
            err.path().to_string()
        };
        Self {
            path,
            dotted,
            source: err.into_inner(),
        }
    }
}

impl fmt::Display for PayloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.dotted.is_empty() {
            write!(f, "{}", self.source)
        } else {
            write!(f, "{}: {}", self.dotted, self.source)
        }
    }
}

impl std::error::Error for PayloadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

#[derive(Debug, Deserialize, PartialEq, Serialize)]
pub struct WebhookResponse {
    pub result: String,
}

impl WebhookResponse {
    pub fn ok() -> Self {
        Self {
            result: "ok".to_string(),
        }
    }
}
