//! HTTP Basic authentication for the webhook endpoint.

use axum::http::{HeaderMap, header::AUTHORIZATION};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fmt;
use subtle::ConstantTimeEq;

use crate::error::WebhookError;

/// Username and password taken from an `Authorization: Basic` header.
#[derive(Clone, PartialEq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Decodes the Basic credentials of a request.
    ///
    /// A missing header is `MissingCredentials`; any other malformed value
    /// (wrong scheme, bad base64, no `:` separator, non UTF-8) counts as a
    /// failed login.
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, WebhookError> {
        let value = headers
            .get(AUTHORIZATION)
            .ok_or(WebhookError::MissingCredentials)?
            .to_str()
            .map_err(|_| WebhookError::InvalidCredentials)?;

        let (scheme, encoded) = value
            .trim()
            .split_once(' ')
            .ok_or(WebhookError::InvalidCredentials)?;
        if !scheme.eq_ignore_ascii_case("basic") {
            return Err(WebhookError::InvalidCredentials);
        }

        let decoded = STANDARD
            .decode(encoded.trim())
            .map_err(|_| WebhookError::InvalidCredentials)?;
        let decoded = String::from_utf8(decoded).map_err(|_| WebhookError::InvalidCredentials)?;
        let (username, password) = decoded
            .split_once(':')
            .ok_or(WebhookError::InvalidCredentials)?;

        Ok(Self::new(username, password))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Decides whether a caller may use the webhook.
pub trait CredentialVerifier: Send + Sync {
    fn verify(&self, credentials: &Credentials) -> bool;
}

/// A single expected username/password pair loaded at startup.
#[derive(Clone)]
pub struct StaticCredentials {
    expected: Credentials,
}

impl StaticCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            expected: Credentials::new(username, password),
        }
    }
}

impl CredentialVerifier for StaticCredentials {
    fn verify(&self, credentials: &Credentials) -> bool {
        // Both comparisons always run.
        let username_ok = credentials
            .username
            .as_bytes()
            .ct_eq(self.expected.username.as_bytes());
        let password_ok = credentials
            .password
            .as_bytes()
            .ct_eq(self.expected.password.as_bytes());
        (username_ok & password_ok).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn basic_header(username: &str, password: &str) -> String {
        format!("Basic {}", STANDARD.encode(format!("{}:{}", username, password)))
    }

    fn headers_with(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_decode_basic_header() {
        // admin:password
        let headers = headers_with("Basic YWRtaW46cGFzc3dvcmQ=");
        let creds = Credentials::from_headers(&headers).unwrap();
        assert_eq!(creds.username, "admin");
        assert_eq!(creds.password, "password");
    }

    #[test]
    fn test_decode_keeps_colons_in_password() {
        let encoded = basic_header("admin", "pa:ss:word");
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&encoded).unwrap());
        let creds = Credentials::from_headers(&headers).unwrap();
        assert_eq!(creds.username, "admin");
        assert_eq!(creds.password, "pa:ss:word");
    }

    #[test]
    fn test_scheme_is_case_insensitive() {
        let headers = headers_with("basic YWRtaW46cGFzc3dvcmQ=");
        assert!(Credentials::from_headers(&headers).is_ok());
    }

    #[test]
    fn test_missing_header() {
        let result = Credentials::from_headers(&HeaderMap::new());
        assert!(matches!(result, Err(WebhookError::MissingCredentials)));
    }

    #[test]
    fn test_malformed_headers_are_invalid_credentials() {
        for value in [
            "Bearer YWRtaW46cGFzc3dvcmQ=",
            "Basic not*base64",
            "Basic YWRtaW4=", // "admin", no separator
            "Basic",
        ] {
            let result = Credentials::from_headers(&headers_with(value));
            assert!(
                matches!(result, Err(WebhookError::InvalidCredentials)),
                "{} was not rejected",
                value
            );
        }
    }

    #[test]
    fn test_static_credentials_verify() {
        let verifier = StaticCredentials::new("admin", "password");
        assert!(verifier.verify(&Credentials::new("admin", "password")));
        assert!(!verifier.verify(&Credentials::new("admin", "wrong")));
        assert!(!verifier.verify(&Credentials::new("root", "password")));
        assert!(!verifier.verify(&Credentials::new("root", "wrong")));
        assert!(!verifier.verify(&Credentials::new("admin", "passwor")));
        assert!(!verifier.verify(&Credentials::new("", "")));
    }

    #[test]
    fn test_debug_redacts_password() {
        let debug = format!("{:?}", Credentials::new("admin", "hunter2"));
        assert!(debug.contains("admin"));
        assert!(!debug.contains("hunter2"));
    }
}
