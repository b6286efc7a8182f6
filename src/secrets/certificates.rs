//! TLS configuration derived from certificate secrets.
//!
//! Certificate material lives under the `certificates` category (one secret
//! per issuer, with `tls.crt`, `tls.key`, and optionally `ca.crt` keys) or
//! under `storage` for named storage endpoints. A [`TlsConfigView`] wraps the
//! raw secret view with derivation parameters and caches the derived
//! [`TlsConfig`], rebuilding it whenever the underlying secret's version
//! moves.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::{Arc, Mutex};

use crate::errors::{Result, SecretsError};
use crate::secrets::store::SecretStore;
use crate::secrets::view::{SecretView, SyncedSecret};
use crate::secrets::types::SecretContents;

/// Trusted CA material inside the verification section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaCertificates {
    pub pem: String,
}

/// Peer verification section of a derived TLS configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifyConfig {
    /// Whether peer certificates are required (mTLS on/off).
    pub enable: bool,
    pub address_match: bool,
    #[serde(rename = "accept_selfsigned")]
    pub accept_self_signed: bool,
    /// Authorization list; `"anyone"` when unrestricted, empty for none.
    pub trusted_peers: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca_certificates: Option<CaCertificates>,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            enable: false,
            address_match: false,
            accept_self_signed: false,
            trusted_peers: String::new(),
            ca_certificates: None,
        }
    }
}

/// A TLS/mTLS configuration synthesized from a certificate secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct TlsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate: Option<String>,
    #[serde(rename = "privatekey", skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    pub verify: VerifyConfig,
}

/// Parameters for deriving an issuer TLS configuration.
#[derive(Debug, Clone)]
pub struct IssuerTlsOptions {
    /// Authorization list for peers. `None` means anyone; an empty string
    /// means no one.
    pub trusted_peers: Option<String>,
    /// The configuration is for the client side of a connection.
    pub client_connection: bool,
    /// Accept self-signed peers (clients only).
    pub accept_self_signed: bool,
    /// Install the issuer's CA certificate. A client talking to a `public`
    /// issuer wants the system CA list instead and passes false.
    pub add_ca_cert: bool,
    /// Force mTLS off regardless of issuer.
    pub disable_mtls: bool,
}

impl Default for IssuerTlsOptions {
    fn default() -> Self {
        Self {
            trusted_peers: None,
            client_connection: false,
            accept_self_signed: false,
            add_ca_cert: true,
            disable_mtls: false,
        }
    }
}

#[derive(Debug)]
enum Derivation {
    Issuer { issuer: String, options: IssuerTlsOptions },
    Storage { add_ca_cert: bool },
}

#[derive(Debug)]
struct DerivedState {
    config: Option<Arc<TlsConfig>>,
    version: u32,
}

/// A live view producing a derived TLS configuration.
///
/// Remembers the secret version its cached configuration was derived from
/// and rebuilds when an access observes a different version.
#[derive(Debug)]
pub struct TlsConfigView {
    secret: SecretView,
    derivation: Derivation,
    state: Mutex<DerivedState>,
}

impl TlsConfigView {
    /// Derive TLS configuration for an issuer (`certificates/<issuer>`).
    pub(crate) async fn issuer(
        store: &Arc<SecretStore>,
        issuer: &str,
        options: IssuerTlsOptions,
    ) -> Result<Self> {
        let secret = store.resolve_secret("certificates", issuer, None, None).await?;
        let view = Self {
            secret,
            derivation: Derivation::Issuer { issuer: issuer.to_string(), options },
            state: Mutex::new(DerivedState { config: None, version: 0 }),
        };
        view.config().await;
        Ok(view)
    }

    /// Derive TLS configuration for a named storage secret
    /// (`storage/<name>`). Unlike issuer views, the secret must exist.
    pub(crate) async fn storage(
        store: &Arc<SecretStore>,
        secret_name: &str,
        add_ca_cert: bool,
    ) -> Result<Self> {
        let secret = store.resolve_secret("storage", secret_name, None, None).await?;
        if !secret.is_valid() {
            return Err(SecretsError::not_found(format!("storage/{secret_name}")));
        }
        let view = Self {
            secret,
            derivation: Derivation::Storage { add_ca_cert },
            state: Mutex::new(DerivedState { config: None, version: 0 }),
        };
        view.config().await;
        Ok(view)
    }

    /// The current derived configuration, rebuilt if the secret changed.
    pub async fn config(&self) -> Option<Arc<TlsConfig>> {
        // Capture the version before reading the tree; a concurrent update
        // between the two reads just means one extra rebuild later.
        let version = self.secret.version().await;
        {
            let state = self.state.lock().unwrap();
            if state.version == version && state.config.is_some() {
                return state.config.clone();
            }
            if state.version == version && version == 0 {
                return None;
            }
        }

        let config = self
            .secret
            .tree()
            .await
            .map(|contents| Arc::new(self.build_config(&contents)));

        let mut state = self.state.lock().unwrap();
        state.version = version;
        state.config = config.clone();
        config
    }

    fn build_config(&self, contents: &SecretContents) -> TlsConfig {
        let mut config = TlsConfig::default();
        match &self.derivation {
            Derivation::Issuer { issuer, options } => {
                let public_issuer = issuer.eq_ignore_ascii_case("public");

                // A client hitting a public service presents no certificate
                // and relies on its system trust store.
                if !options.client_connection || !public_issuer {
                    install_certificate(&mut config, Some(issuer), contents);
                }
                if !options.client_connection || options.add_ca_cert {
                    install_certificate_authority(&mut config, contents);
                }

                // For now only the public issuer implies client certificates
                // are not required.
                config.verify.enable =
                    !options.disable_mtls && (options.client_connection || !public_issuer);
                config.verify.address_match = false;
                config.verify.accept_self_signed =
                    options.client_connection && options.accept_self_signed;
                // A blank list means no one; absent means anyone.
                config.verify.trusted_peers =
                    options.trusted_peers.clone().unwrap_or_else(|| "anyone".to_string());
            }
            Derivation::Storage { add_ca_cert } => {
                install_certificate(&mut config, None, contents);
                if *add_ca_cert {
                    install_certificate_authority(&mut config, contents);
                }
            }
        }
        config
    }
}

fn install_certificate(config: &mut TlsConfig, issuer: Option<&str>, contents: &SecretContents) {
    config.issuer = issuer.map(str::to_string);
    if let Some(certificate) = contents.get_str("tls.crt") {
        config.certificate = Some(certificate.to_string());
    }
    if let Some(private_key) = contents.get_str("tls.key") {
        config.private_key = Some(private_key.to_string());
    }
}

fn install_certificate_authority(config: &mut TlsConfig, contents: &SecretContents) {
    if let Some(ca) = contents.get_str("ca.crt") {
        config.verify.ca_certificates = Some(CaCertificates { pem: ca.to_string() });
    }
}

#[async_trait]
impl SyncedSecret for TlsConfigView {
    fn is_stale(&self) -> bool {
        self.secret.is_stale()
    }

    fn is_valid(&self) -> bool {
        self.secret.is_valid()
    }

    async fn version(&self) -> u32 {
        self.secret.version().await
    }
}
