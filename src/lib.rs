//! # Keyplane
//!
//! Keyplane is a secret and certificate resolution cache for distributed
//! containerized platforms. It gives processes on-demand, time-bounded-fresh
//! access to named secrets sourced from a local filesystem mount (the
//! container orchestration convention) or from HashiCorp-Vault-compatible
//! HTTP backends, and synthesizes TLS/mTLS configuration from certificate
//! secrets.
//!
//! ## Architecture
//!
//! ```text
//! Synced views (raw secret / derived TLS config)
//!        ↓
//! Secret cache (stable entries, TTL refresh, outage degradation)
//!        ↓                    ↓
//! Local mount source    Vault registry → per-vault clients
//!                                         (auth state, retry, fetch)
//! ```
//!
//! ## Core components
//!
//! - **Secret cache**: one never-evicting entry per `category/name[@vault][#version]`,
//!   refreshed in the caller's task when older than the TTL; failed refreshes
//!   keep the last good contents.
//! - **Vault clients**: per-vault authentication state machines (kubernetes,
//!   appRole, static token, client certificate) with counted retries and a
//!   single forced re-login on permission denial.
//! - **Synced views**: long-lived handles exposing a version counter, with
//!   TLS/mTLS configuration derivation for certificate secrets.

pub mod config;
pub mod errors;
pub mod secrets;
pub mod utils;
pub mod validation;

// Re-export commonly used types
pub use config::{SecretsConfig, VaultDefinition};
pub use errors::{Result, SecretsError};
pub use secrets::{SecretContents, SecretKey, SecretStore, SecretString, VaultKind};

/// Library version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_available() {
        assert!(!VERSION.is_empty());
        assert_eq!(APP_NAME, "keyplane");
    }
}
