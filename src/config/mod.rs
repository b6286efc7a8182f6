//! # Configuration
//!
//! Deserializable definitions for the vault backends a process may talk to.
//! The process-wide configuration loader itself lives outside this crate;
//! whatever loads the configuration hands the `vaults` subtree to
//! [`crate::secrets::store::SecretStore::configure_vaults`] as a
//! [`SecretsConfig`].
//!
//! Attribute names mirror the external configuration convention
//! (`retryWait`, `appRoleId`, `client-secret`, ...), so a JSON or YAML
//! rendering of the operator-facing configuration deserializes directly.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use validator::Validate;

use crate::errors::{Result, SecretsError};
use crate::secrets::types::VaultKind;

/// The `vaults` subtree of the process configuration: category name to the
/// ordered list of vaults serving that category.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecretsConfig {
    #[serde(default)]
    pub vaults: BTreeMap<String, Vec<VaultDefinition>>,
}

impl SecretsConfig {
    /// Parse a configuration from its JSON rendering.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Validate every vault definition.
    pub fn validate_all(&self) -> Result<()> {
        for (category, vaults) in &self.vaults {
            for vault in vaults {
                vault.validate().map_err(|e| {
                    SecretsError::config_error(format!(
                        "vault {} in category {}: {}",
                        vault.name, category, e
                    ))
                })?;
            }
        }
        Ok(())
    }
}

/// Configuration for a single vault backend.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct VaultDefinition {
    /// Vault base URL, including the location template for secret reads
    /// (e.g. `https://vault:8200/v1/secret/data/${secret}?version=${version}`).
    /// `${VAR}` references are expanded from the environment.
    #[validate(length(min = 1, message = "url cannot be empty"))]
    pub url: String,

    /// Vault id, unique within its category.
    #[validate(length(min = 1, message = "name cannot be empty"))]
    pub name: String,

    /// KV engine kind; unset means `kv_v2`.
    #[serde(default)]
    pub kind: VaultKind,

    /// Vault Enterprise namespace.
    #[serde(default)]
    pub namespace: Option<String>,

    /// Verify the vault server certificate.
    #[serde(default = "default_verify_server")]
    pub verify_server: bool,

    /// Transport retry count for a single request.
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Wait between transport retries, in milliseconds.
    #[serde(default = "default_retry_wait", rename = "retryWait")]
    pub retry_wait_ms: u64,

    /// Connect timeout in milliseconds; 0 leaves the transport default.
    #[serde(default, rename = "connectTimeout")]
    pub connect_timeout_ms: u64,

    /// Read timeout in milliseconds; 0 leaves the transport default.
    #[serde(default, rename = "readTimeout")]
    pub read_timeout_ms: u64,

    /// Write timeout in milliseconds; 0 leaves the transport default.
    #[serde(default, rename = "writeTimeout")]
    pub write_timeout_ms: u64,

    /// AppRole role id; presence selects appRole authentication.
    #[serde(default, rename = "appRoleId")]
    pub app_role_id: Option<String>,

    /// Name of the local secret holding the appRole `secret-id`.
    #[serde(default, rename = "appRoleSecret")]
    pub app_role_secret: Option<String>,

    /// Name of the local secret holding a static client token.
    #[serde(default, rename = "client-secret")]
    pub client_secret: Option<String>,

    /// Authenticate with the client TLS certificate.
    #[serde(default, rename = "useTLSCertificateAuth")]
    pub use_tls_certificate_auth: bool,

    /// Role for kubernetes or client certificate authentication.
    #[serde(default)]
    pub role: Option<String>,
}

fn default_verify_server() -> bool {
    true
}

fn default_retries() -> u32 {
    3
}

fn default_retry_wait() -> u64 {
    1000
}

impl VaultDefinition {
    /// The vault URL with `${VAR}` environment references expanded.
    pub fn expanded_url(&self) -> String {
        expand_env_vars(&self.url)
    }

    pub fn retry_wait(&self) -> Duration {
        Duration::from_millis(self.retry_wait_ms)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        timeout_ms(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        timeout_ms(self.read_timeout_ms)
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        timeout_ms(self.write_timeout_ms)
    }
}

fn timeout_ms(ms: u64) -> Option<Duration> {
    if ms == 0 {
        None
    } else {
        Some(Duration::from_millis(ms))
    }
}

/// Expand `${VAR}` environment references in a string.
///
/// References to unset variables are left untouched, which is what keeps the
/// `${secret}` and `${version}` location template markers intact inside vault
/// URLs. A `$` not followed by `{` passes through verbatim.
pub fn expand_env_vars(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        match rest[start + 2..].find('}') {
            Some(end) => {
                let reference = &rest[start..start + 2 + end + 1];
                let var = &rest[start + 2..start + 2 + end];
                match std::env::var(var) {
                    Ok(value) => out.push_str(&value),
                    Err(_) => out.push_str(reference),
                }
                rest = &rest[start + 2 + end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}
