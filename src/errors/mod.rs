//! Error types for secret resolution operations.

use thiserror::Error;

/// Result type for secret resolution operations.
pub type Result<T> = std::result::Result<T, SecretsError>;

/// Errors that can occur while resolving secrets or derived TLS material.
///
/// Transient backend conditions (unreachable vault, 404, second 403) are not
/// represented here: the cache layer swallows them, logs, and serves the last
/// known contents or absent. Only conditions the caller must act on surface
/// as errors.
#[derive(Error, Debug)]
pub enum SecretsError {
    /// A category, secret, or key name failed validation.
    #[error("Invalid secret {kind} name: {name}")]
    InvalidName { kind: &'static str, name: String },

    /// A vault could not produce an access token.
    #[error("Vault [{vault}] {auth} auth error: {message}")]
    VaultAuth { vault: String, auth: &'static str, message: String },

    /// A required secret does not exist in any source.
    #[error("Secret not found: {secret}")]
    NotFound { secret: String },

    /// A required key is missing from an otherwise present secret.
    #[error("Secret {secret} missing key {key}")]
    MissingKey { secret: String, key: String },

    /// A URL could not be parsed.
    #[error("Invalid URL: {message}")]
    InvalidUrl { message: String },

    /// Failed to reach a backend (reported by the transport layer).
    #[error("Backend connection failed: {message}")]
    ConnectionFailed { message: String },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Key material could not be loaded or decoded.
    #[error("Key material error: {message}")]
    KeyMaterial { message: String },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SecretsError {
    /// Create an invalid name error.
    pub fn invalid_name(kind: &'static str, name: impl Into<String>) -> Self {
        Self::InvalidName { kind, name: name.into() }
    }

    /// Create a vault auth error.
    pub fn vault_auth(
        vault: impl Into<String>,
        auth: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self::VaultAuth { vault: vault.into(), auth, message: message.into() }
    }

    /// Create a not found error.
    pub fn not_found(secret: impl Into<String>) -> Self {
        Self::NotFound { secret: secret.into() }
    }

    /// Create a missing key error.
    pub fn missing_key(secret: impl Into<String>, key: impl Into<String>) -> Self {
        Self::MissingKey { secret: secret.into(), key: key.into() }
    }

    /// Create an invalid URL error.
    pub fn invalid_url(message: impl Into<String>) -> Self {
        Self::InvalidUrl { message: message.into() }
    }

    /// Create a connection failed error.
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::ConnectionFailed { message: message.into() }
    }

    /// Create a config error.
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }

    /// Create a key material error.
    pub fn key_material(message: impl Into<String>) -> Self {
        Self::KeyMaterial { message: message.into() }
    }
}
