//! HTTP transport for vault backends.
//!
//! The vault client does not own transport details: it speaks through the
//! [`HttpTransport`] capability, which tests replace with scripted
//! responses. [`ReqwestTransport`] is the production implementation, built
//! per vault so that server verification, timeouts, and an optional client
//! TLS identity come from that vault's configuration.

use async_trait::async_trait;
use std::borrow::Cow;
use std::time::Duration;

use crate::errors::{Result, SecretsError};

/// A raw HTTP response: status code plus body bytes.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self { status, body: body.into() }
    }

    /// The body as text, for logging and JSON parsing.
    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// Minimal HTTP capability the vault client needs.
///
/// An `Err` means the request did not produce an HTTP response at all
/// (connect failure, timeout); callers treat that as retryable. Any received
/// status, including 4xx/5xx, comes back as `Ok`.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, url: &str, headers: &[(String, String)]) -> Result<HttpResponse>;

    async fn post_json(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: &serde_json::Value,
    ) -> Result<HttpResponse>;
}

/// Per-vault transport construction settings.
#[derive(Debug, Clone)]
pub struct TransportSettings {
    /// Verify the server certificate.
    pub verify_server: bool,
    pub connect_timeout: Option<Duration>,
    pub read_timeout: Option<Duration>,
    /// reqwest has no distinct write timeout; this bounds the whole request.
    pub write_timeout: Option<Duration>,
    /// PEM bundle (certificate + key) for client certificate authentication.
    pub client_identity_pem: Option<Vec<u8>>,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            verify_server: true,
            connect_timeout: None,
            read_timeout: None,
            write_timeout: None,
            client_identity_pem: None,
        }
    }
}

/// Production transport backed by a `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        Self::with_settings(&TransportSettings::default())
    }

    pub fn with_settings(settings: &TransportSettings) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if !settings.verify_server {
            builder = builder.danger_accept_invalid_certs(true);
        }
        if let Some(timeout) = settings.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(timeout) = settings.read_timeout {
            builder = builder.read_timeout(timeout);
        }
        if let Some(timeout) = settings.write_timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(pem) = &settings.client_identity_pem {
            let identity = reqwest::Identity::from_pem(pem).map_err(|e| {
                SecretsError::config_error(format!("invalid client TLS identity: {e}"))
            })?;
            builder = builder.identity(identity);
        }

        let client = builder
            .build()
            .map_err(|e| SecretsError::config_error(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    async fn read_response(response: reqwest::Response) -> Result<HttpResponse> {
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| SecretsError::connection_failed(format!("reading response body: {e}")))?;
        Ok(HttpResponse { status, body: body.to_vec() })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str, headers: &[(String, String)]) -> Result<HttpResponse> {
        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(name, value);
        }
        let response = request
            .send()
            .await
            .map_err(|e| SecretsError::connection_failed(format!("GET {url}: {e}")))?;
        Self::read_response(response).await
    }

    async fn post_json(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: &serde_json::Value,
    ) -> Result<HttpResponse> {
        let mut request = self.client.post(url).json(body);
        for (name, value) in headers {
            request = request.header(name, value);
        }
        let response = request
            .send()
            .await
            .map_err(|e| SecretsError::connection_failed(format!("POST {url}: {e}")))?;
        Self::read_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_verify_server() {
        let settings = TransportSettings::default();
        assert!(settings.verify_server);
        assert!(settings.connect_timeout.is_none());
        assert!(settings.client_identity_pem.is_none());
    }

    #[test]
    fn test_transport_builds_with_timeouts() {
        let settings = TransportSettings {
            verify_server: false,
            connect_timeout: Some(Duration::from_millis(1500)),
            read_timeout: Some(Duration::from_secs(5)),
            write_timeout: Some(Duration::from_secs(5)),
            client_identity_pem: None,
        };
        assert!(ReqwestTransport::with_settings(&settings).is_ok());
    }

    #[test]
    fn test_transport_rejects_bad_identity() {
        let settings = TransportSettings {
            client_identity_pem: Some(b"not a pem bundle".to_vec()),
            ..TransportSettings::default()
        };
        assert!(ReqwestTransport::with_settings(&settings).is_err());
    }

    #[test]
    fn test_response_body_text() {
        let response = HttpResponse::new(200, &b"{\"ok\":true}"[..]);
        assert_eq!(response.status, 200);
        assert_eq!(response.body_text(), "{\"ok\":true}");
    }
}
