//! Vault registry: groups configured vaults by secret category.
//!
//! Resolution has two shapes. By category, the vaults of that category are
//! tried in configuration order and the first hit wins; by category and
//! vault id, exactly that vault is consulted with no fallback.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::SecretsConfig;
use crate::errors::Result;
use crate::secrets::transport::{ReqwestTransport, TransportSettings};
use crate::secrets::types::VaultKind;
use crate::secrets::vault::VaultClient;

/// Registry of vault clients grouped by category.
#[derive(Default)]
pub struct VaultRegistry {
    categories: HashMap<String, Vec<Arc<VaultClient>>>,
}

impl fmt::Debug for VaultRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut summary: Vec<(&str, usize)> =
            self.categories.iter().map(|(category, vaults)| (category.as_str(), vaults.len())).collect();
        summary.sort_unstable();
        f.debug_struct("VaultRegistry").field("categories", &summary).finish()
    }
}

impl VaultRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from the `vaults` configuration subtree.
    ///
    /// Each vault gets its own transport carrying that vault's TLS settings.
    /// A vault that fails to construct is logged and skipped so one bad
    /// definition does not take down the others.
    pub async fn from_config(config: &SecretsConfig, mount: &Path) -> Self {
        let mut registry = Self::new();
        for (category, definitions) in &config.vaults {
            for definition in definitions {
                let transport =
                    match build_transport(category, definition, mount).await {
                        Ok(transport) => transport,
                        Err(e) => {
                            warn!(vault = %definition.name, category = %category, error = %e,
                                "failed to build vault transport, skipping vault");
                            continue;
                        }
                    };
                match VaultClient::new(category, definition, mount, transport).await {
                    Ok(vault) => registry.register(Arc::new(vault)),
                    Err(e) => {
                        warn!(vault = %definition.name, category = %category, error = %e,
                            "failed to initialize vault, skipping");
                    }
                }
            }
        }
        registry
    }

    /// Add a vault to its category, preserving insertion order.
    pub fn register(&mut self, vault: Arc<VaultClient>) {
        info!(vault = %vault.name(), category = %vault.category(), "registering vault");
        self.categories.entry(vault.category().to_string()).or_default().push(vault);
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn has_category(&self, category: &str) -> bool {
        self.categories.contains_key(category)
    }

    /// Fetch from the vaults of a category in order; first hit wins.
    pub async fn fetch_by_category(
        &self,
        category: &str,
        secret: &str,
        version: Option<&str>,
    ) -> Result<Option<(VaultKind, Vec<u8>)>> {
        let Some(vaults) = self.categories.get(category) else {
            return Ok(None);
        };
        for vault in vaults {
            if let Some(found) = vault.fetch_secret(secret, version).await? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    /// Fetch from one specific vault of a category; no fallback.
    pub async fn fetch_from_vault(
        &self,
        category: &str,
        vault_id: &str,
        secret: &str,
        version: Option<&str>,
    ) -> Result<Option<(VaultKind, Vec<u8>)>> {
        if vault_id.is_empty() {
            return Ok(None);
        }
        let Some(vaults) = self.categories.get(category) else {
            return Ok(None);
        };
        let Some(vault) = vaults.iter().find(|vault| vault.name() == vault_id) else {
            return Ok(None);
        };
        vault.fetch_secret(secret, version).await
    }
}

/// Build the transport for one vault definition.
///
/// When the vault authenticates with its client certificate, the identity is
/// loaded from `<mount>/certificates/vaultclient/<category>/tls.{crt,key}`.
/// Missing material is warned about and the transport built without it, so
/// the failure shows up at login time rather than at configuration time.
async fn build_transport(
    category: &str,
    definition: &crate::config::VaultDefinition,
    mount: &Path,
) -> Result<Arc<ReqwestTransport>> {
    let mut settings = TransportSettings {
        verify_server: definition.verify_server,
        connect_timeout: definition.connect_timeout(),
        read_timeout: definition.read_timeout(),
        write_timeout: definition.write_timeout(),
        client_identity_pem: None,
    };

    if definition.use_tls_certificate_auth {
        let dir = mount.join("certificates").join("vaultclient").join(category.to_ascii_lowercase());
        let cert_path = dir.join("tls.crt");
        let key_path = dir.join("tls.key");
        match (tokio::fs::read(&cert_path).await, tokio::fs::read(&key_path).await) {
            (Ok(cert), Ok(key)) => {
                let mut bundle = cert;
                bundle.push(b'\n');
                bundle.extend_from_slice(&key);
                settings.client_identity_pem = Some(bundle);
            }
            (Err(_), _) => {
                warn!(vault = %definition.name, path = %cert_path.display(),
                    "vault client cert not found");
            }
            (_, Err(_)) => {
                warn!(vault = %definition.name, path = %key_path.display(),
                    "vault client key not found");
            }
        }
    }

    Ok(Arc::new(ReqwestTransport::with_settings(&settings)?))
}
