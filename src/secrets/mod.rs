//! Secret and certificate resolution.
//!
//! Processes read named secrets (opaque key→value bundles) through a
//! process-wide, TTL-driven cache. A secret is addressed by category and
//! name, optionally pinned to a specific vault and version:
//!
//! - the vault id literal `k8s` restricts resolution to the local
//!   filesystem mount (the container orchestration convention),
//! - any other vault id addresses exactly that configured vault,
//! - with no vault id, the local mount is tried first and the category's
//!   vaults fanned out to afterwards.
//!
//! Cache entries are stable identities: created on first use, never evicted,
//! safe to hold for the process lifetime. When a refresh fails the cache
//! keeps serving the last good contents and merely notes the attempt, so a
//! vault outage degrades freshness, not availability.
//!
//! On top of the resolver sit the synced views: [`SecretView`] for raw
//! contents and [`TlsConfigView`] for TLS/mTLS configuration derived from
//! certificate secrets, both exposing a version counter consumers poll to
//! detect changes.
//!
//! # Example
//!
//! ```rust,ignore
//! use keyplane::secrets;
//!
//! // One file per key under <mount>/appA/db/.
//! let password = secrets::get_secret_value("appA", "db", "password", true).await?;
//!
//! // A live handle that refreshes on access.
//! let view = secrets::resolve_secret("appA", "db", None, None).await?;
//! let version = view.version().await;
//!
//! // Derived mTLS configuration for an issuer.
//! let tls = secrets::issuer_tls_config("public", None, false).await?;
//! ```

pub mod cache;
pub mod certificates;
pub mod local;
pub mod registry;
pub mod store;
pub mod transport;
pub mod types;
pub mod vault;
pub mod view;

pub use cache::{SecretCache, SecretEntry};
pub use certificates::{CaCertificates, IssuerTlsOptions, TlsConfig, TlsConfigView, VerifyConfig};
pub use registry::VaultRegistry;
pub use store::{secret_store, SecretStore, LOCAL_VAULT_ID};
pub use transport::{HttpResponse, HttpTransport, ReqwestTransport, TransportSettings};
pub use types::{SecretContents, SecretKey, SecretString, VaultKind};
pub use vault::{VaultAuthMethod, VaultClient, SERVICE_ACCOUNT_TOKEN_PATH};
pub use view::{SecretView, SyncedSecret};

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::config::SecretsConfig;
use crate::errors::Result;

// Convenience functions over the process-wide store.

/// Override the secret mount directory; `None` restores the default.
pub fn set_secret_mount(path: Option<&Path>) {
    secret_store().set_mount(path);
}

/// The secret mount directory.
pub fn secret_mount() -> std::path::PathBuf {
    secret_store().mount_path()
}

/// Maximum age before a cached secret is re-checked.
pub fn secret_timeout() -> Duration {
    secret_store().ttl()
}

pub fn set_secret_timeout(ttl: Duration) {
    secret_store().set_ttl(ttl);
}

/// Build and install the vault registry from process configuration.
pub async fn configure_vaults(config: &SecretsConfig) {
    secret_store().configure_vaults(config).await;
}

/// Get a secret's contents from any configured source.
pub async fn get_secret(category: &str, name: &str) -> Result<Option<Arc<SecretContents>>> {
    secret_store().get_secret(category, name).await
}

/// Get a secret's contents, optionally pinned to a vault and version.
pub async fn get_secret_with(
    category: &str,
    name: &str,
    vault_id: Option<&str>,
    version: Option<&str>,
) -> Result<Option<Arc<SecretContents>>> {
    secret_store().get_secret_with(category, name, vault_id, version).await
}

/// Get a secret from the local mount only.
pub async fn get_local_secret(category: &str, name: &str) -> Result<Option<Arc<SecretContents>>> {
    secret_store().get_local_secret(category, name).await
}

/// Get one key of a secret; with `required`, absence is an error.
pub async fn get_secret_value(
    category: &str,
    name: &str,
    key: &str,
    required: bool,
) -> Result<Option<Vec<u8>>> {
    secret_store().get_secret_value(category, name, key, required).await
}

/// Get one key of a secret as UTF-8 text.
pub async fn get_secret_value_str(
    category: &str,
    name: &str,
    key: &str,
    required: bool,
) -> Result<Option<String>> {
    secret_store().get_secret_value_str(category, name, key, required).await
}

/// Create a live view over a secret.
pub async fn resolve_secret(
    category: &str,
    name: &str,
    vault_id: Option<&str>,
    version: Option<&str>,
) -> Result<SecretView> {
    secret_store().resolve_secret(category, name, vault_id, version).await
}

/// Interned issuer TLS view for server-side use.
pub async fn issuer_tls_config(
    issuer: &str,
    trusted_peers: Option<&str>,
    disable_mtls: bool,
) -> Result<Arc<TlsConfigView>> {
    secret_store().issuer_tls_config(issuer, trusted_peers, disable_mtls).await
}

/// Build a fresh issuer TLS view with explicit derivation options.
pub async fn issuer_tls_config_with(
    issuer: &str,
    options: IssuerTlsOptions,
) -> Result<TlsConfigView> {
    secret_store().issuer_tls_config_with(issuer, options).await
}

/// Whether an issuer has certificate material available.
pub async fn has_issuer_tls_config(issuer: &str) -> bool {
    secret_store().has_issuer_tls_config(issuer).await
}

/// TLS view for a named storage secret.
pub async fn storage_tls_config(secret_name: &str, add_ca_cert: bool) -> Result<TlsConfigView> {
    secret_store().storage_tls_config(secret_name, add_ca_cert).await
}

/// Load the datagram key from the mount. Idempotent.
pub async fn init_secret_udp_key() {
    secret_store().init_udp_key().await;
}

/// The raw EC private scalar for the datagram transport.
pub fn secret_udp_key(required: bool) -> Result<Option<Vec<u8>>> {
    secret_store().udp_key(required)
}
